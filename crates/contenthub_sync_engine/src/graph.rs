//! Dependency graph expansion.
//!
//! Starting from a root record, follow reference attributes and asset
//! tokens breadth first, up to a maximum number of host-to-dependency
//! edges. Each discovered record is classified as a pre-dependency
//! (independent: must exist before its host) or a post-dependency
//! (dependent: owned by its host, created after it).

use crate::config::HubConfig;
use contenthub_cdf::{CdfDocument, CdfRecord};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;
use uuid::Uuid;

/// How a dependency relates to its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// Exists on its own; materialized before its host.
    Independent,
    /// Owned by its host; materialized after it.
    Dependent,
}

/// Classifies records by type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyClassifier {
    dependent_types: BTreeSet<String>,
}

impl DependencyClassifier {
    /// Creates a classifier treating `dependent_types` as post-dependencies.
    pub fn new<I, S>(dependent_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dependent_types: dependent_types.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the kind of a record type.
    pub fn classify(&self, record_type: &str) -> DependencyKind {
        if self.dependent_types.contains(record_type) {
            DependencyKind::Dependent
        } else {
            DependencyKind::Independent
        }
    }
}

/// Options for [`DependencyGraph::expand`].
#[derive(Debug, Clone)]
pub struct GraphOptions {
    /// Maximum host-to-dependency edges followed. `0` keeps the root alone.
    pub max_depth: u32,
    /// Dependency classifier.
    pub classifier: DependencyClassifier,
    /// Reference attributes that are not followed.
    pub excluded_attributes: BTreeSet<String>,
}

impl Default for GraphOptions {
    fn default() -> Self {
        HubConfig::default().graph_options()
    }
}

impl GraphOptions {
    /// Sets the maximum depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Looks up records by UUID while expanding a graph.
///
/// `None` means the record cannot be expanded; the UUID is dropped from
/// the graph and reported by [`DependencyGraph::missing`].
pub trait RecordResolver {
    /// Resolves `uuid` to its record.
    fn resolve(&self, uuid: Uuid) -> Option<CdfRecord>;
}

impl<F> RecordResolver for F
where
    F: Fn(Uuid) -> Option<CdfRecord>,
{
    fn resolve(&self, uuid: Uuid) -> Option<CdfRecord> {
        self(uuid)
    }
}

/// Resolves records from a CDF document.
#[derive(Debug, Clone, Copy)]
pub struct DocumentResolver<'a> {
    document: &'a CdfDocument,
}

impl<'a> DocumentResolver<'a> {
    /// Creates a resolver over `document`.
    pub fn new(document: &'a CdfDocument) -> Self {
        Self { document }
    }
}

impl RecordResolver for DocumentResolver<'_> {
    fn resolve(&self, uuid: Uuid) -> Option<CdfRecord> {
        self.document.get(uuid).cloned()
    }
}

/// A record discovered while expanding the graph.
#[derive(Debug, Clone)]
pub struct DependencyNode {
    /// The dependency.
    pub record: CdfRecord,
    /// Pre- or post-dependency.
    pub kind: DependencyKind,
    /// Edges from the root (direct references are at depth 1).
    pub depth: u32,
    /// UUID of the record that first referenced this one.
    pub host: Uuid,
    /// UUIDs this record references, in attribute order.
    pub references: Vec<Uuid>,
}

impl DependencyNode {
    /// Returns the dependency UUID.
    pub fn uuid(&self) -> Uuid {
        self.record.uuid()
    }
}

/// The dependency closure of a root record.
///
/// # Invariants
///
/// - The root is never one of its own dependencies
/// - Each UUID appears at most once
/// - Every node has `depth <= max_depth`
/// - A node's host is the root or a node one level shallower
/// - Outside reference cycles, an independent node is ordered after the
///   independent nodes it references
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    root: CdfRecord,
    root_references: Vec<Uuid>,
    nodes: Vec<DependencyNode>,
    index: HashMap<Uuid, usize>,
    missing: Vec<Uuid>,
}

impl DependencyGraph {
    /// Expands the dependencies of `root`.
    ///
    /// A node at depth `d` is included when `d <= max_depth` and its own
    /// references are followed when `d < max_depth`. Records already seen
    /// are skipped, so reference cycles terminate.
    pub fn expand(root: CdfRecord, resolver: &dyn RecordResolver, options: &GraphOptions) -> Self {
        let root_uuid = root.uuid();
        let root_references = root.reference_uuids(&options.excluded_attributes);
        let mut seen: HashSet<Uuid> = HashSet::from([root_uuid]);
        let mut queue: VecDeque<(Uuid, Uuid, u32)> = VecDeque::new();
        if options.max_depth > 0 {
            queue.extend(root_references.iter().map(|&uuid| (root_uuid, uuid, 1)));
        }

        let mut graph = Self {
            root,
            root_references,
            nodes: Vec::new(),
            index: HashMap::new(),
            missing: Vec::new(),
        };

        while let Some((host, uuid, depth)) = queue.pop_front() {
            if !seen.insert(uuid) {
                continue;
            }
            let Some(record) = resolver.resolve(uuid) else {
                debug!(%uuid, %host, depth, "dependency could not be resolved");
                graph.missing.push(uuid);
                continue;
            };

            let references = record.reference_uuids(&options.excluded_attributes);
            if depth < options.max_depth {
                queue.extend(
                    references
                        .iter()
                        .filter(|next| !seen.contains(next))
                        .map(|&next| (uuid, next, depth + 1)),
                );
            }
            let kind = options.classifier.classify(record.record_type());
            graph.index.insert(uuid, graph.nodes.len());
            graph.nodes.push(DependencyNode {
                record,
                kind,
                depth,
                host,
                references,
            });
        }

        debug!(
            root = %root_uuid,
            dependencies = graph.nodes.len(),
            missing = graph.missing.len(),
            "expanded dependency graph"
        );
        graph
    }

    /// Returns the root record.
    pub fn root(&self) -> &CdfRecord {
        &self.root
    }

    /// Returns the dependencies in discovery order.
    pub fn dependencies(&self) -> &[DependencyNode] {
        &self.nodes
    }

    /// Returns the root UUID followed by every dependency UUID.
    pub fn visited(&self) -> Vec<Uuid> {
        std::iter::once(self.root.uuid())
            .chain(self.nodes.iter().map(DependencyNode::uuid))
            .collect()
    }

    /// Returns true if `uuid` is the root or one of its dependencies.
    pub fn contains(&self, uuid: Uuid) -> bool {
        uuid == self.root.uuid() || self.index.contains_key(&uuid)
    }

    /// Returns the dependency node for `uuid`.
    pub fn get(&self, uuid: Uuid) -> Option<&DependencyNode> {
        self.index.get(&uuid).map(|&i| &self.nodes[i])
    }

    /// Returns the independent dependencies in discovery order.
    pub fn independent(&self) -> impl Iterator<Item = &DependencyNode> {
        self.of_kind(DependencyKind::Independent)
    }

    /// Returns the dependent dependencies in discovery order.
    pub fn dependent(&self) -> impl Iterator<Item = &DependencyNode> {
        self.of_kind(DependencyKind::Dependent)
    }

    fn of_kind(&self, kind: DependencyKind) -> impl Iterator<Item = &DependencyNode> {
        self.nodes.iter().filter(move |node| node.kind == kind)
    }

    /// Returns UUIDs that were referenced but could not be resolved.
    pub fn missing(&self) -> &[Uuid] {
        &self.missing
    }

    /// Returns the independent dependencies, each after every in-graph
    /// independent record it references.
    ///
    /// Depth-first post-order from the root over the references of every
    /// node. Visited records are skipped, so a cycle breaks at the first
    /// of its records reached.
    pub fn pre_dependencies(&self) -> Vec<&DependencyNode> {
        let root = self.root.uuid();
        let mut pre = Vec::new();
        let mut visited: HashSet<Uuid> = HashSet::from([root]);
        let mut stack: Vec<(Uuid, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let (uuid, cursor) = *frame;
            match self.references_of(uuid).get(cursor) {
                Some(&next) => {
                    frame.1 += 1;
                    if self.index.contains_key(&next) && visited.insert(next) {
                        stack.push((next, 0));
                    }
                }
                None => {
                    stack.pop();
                    if let Some(node) = self.get(uuid) {
                        if node.kind == DependencyKind::Independent {
                            pre.push(node);
                        }
                    }
                }
            }
        }
        pre
    }

    fn references_of(&self, uuid: Uuid) -> &[Uuid] {
        if uuid == self.root.uuid() {
            &self.root_references
        } else {
            self.get(uuid)
                .map(|node| node.references.as_slice())
                .unwrap_or_default()
        }
    }

    /// Returns the dependent dependencies, hosts before their dependents.
    pub fn post_dependencies(&self) -> Vec<&DependencyNode> {
        self.dependent().collect()
    }

    /// Returns the order in which records must be created locally.
    pub fn materialization_order(&self) -> Vec<Uuid> {
        let pre = self.pre_dependencies().into_iter().map(DependencyNode::uuid);
        let post = self.post_dependencies().into_iter().map(DependencyNode::uuid);
        pre.chain(std::iter::once(self.root.uuid()))
            .chain(post)
            .collect()
    }

    /// Returns the number of dependencies, excluding the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the root has no dependencies.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the root followed by every dependency as a document.
    pub fn to_document(&self) -> CdfDocument {
        CdfDocument::from_records(
            std::iter::once(self.root.clone())
                .chain(self.nodes.iter().map(|node| node.record.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contenthub_cdf::{Attribute, AttributeType, BaseType};
    use contenthub_testkit::{cycle_document, fixture_uuid, reference_graph_strategy};
    use proptest::prelude::*;
    use serde_json::json;

    const ORIGIN: Uuid = Uuid::from_u128(0xaaaa);

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn record(n: u128, record_type: &str, refs: &[u128]) -> CdfRecord {
        let mut record = CdfRecord::new(uuid(n), record_type, ORIGIN);
        if !refs.is_empty() {
            let values: Vec<_> = refs.iter().map(|r| json!(uuid(*r).to_string())).collect();
            let attribute =
                Attribute::with_value(AttributeType::Array(BaseType::Reference), json!(values))
                    .unwrap();
            record.set_attribute("field_refs", attribute).unwrap();
        }
        record
    }

    fn node(n: u128, refs: &[u128]) -> CdfRecord {
        record(n, "node", refs)
    }

    fn options(max_depth: u32) -> GraphOptions {
        GraphOptions {
            max_depth,
            classifier: DependencyClassifier::new(["paragraph"]),
            excluded_attributes: BTreeSet::new(),
        }
    }

    fn chain() -> CdfDocument {
        CdfDocument::from_records(vec![
            node(0, &[1]),
            node(1, &[2]),
            node(2, &[3]),
            node(3, &[4]),
            node(4, &[]),
        ])
    }

    fn expand(document: &CdfDocument, root: u128, max_depth: u32) -> DependencyGraph {
        let root = document.get(uuid(root)).unwrap().clone();
        DependencyGraph::expand(root, &DocumentResolver::new(document), &options(max_depth))
    }

    fn uuids(nodes: &[DependencyNode]) -> Vec<Uuid> {
        nodes.iter().map(DependencyNode::uuid).collect()
    }

    #[test]
    fn chain_respects_depth() {
        let document = chain();
        assert_eq!(
            uuids(expand(&document, 0, 3).dependencies()),
            vec![uuid(1), uuid(2), uuid(3)]
        );
        assert_eq!(expand(&document, 0, 4).len(), 4);
        assert_eq!(
            uuids(expand(&document, 0, 2).dependencies()),
            vec![uuid(1), uuid(2)]
        );
        assert!(expand(&document, 0, 0).is_empty());
    }

    #[test]
    fn depth_and_host_are_recorded() {
        let graph = expand(&chain(), 0, 3);
        let third = graph.get(uuid(3)).unwrap();
        assert_eq!(third.depth, 3);
        assert_eq!(third.host, uuid(2));
        assert_eq!(graph.get(uuid(1)).unwrap().host, uuid(0));
    }

    #[test]
    fn cycle_terminates() {
        let graph = expand(&cycle_document(2), 0, 10);
        assert_eq!(uuids(graph.dependencies()), vec![fixture_uuid(1)]);
        assert_eq!(graph.visited(), vec![fixture_uuid(0), fixture_uuid(1)]);

        let graph = expand(&cycle_document(4), 0, 10);
        assert_eq!(graph.len(), 3);
        assert_eq!(
            graph.materialization_order(),
            vec![fixture_uuid(3), fixture_uuid(2), fixture_uuid(1), fixture_uuid(0)]
        );
    }

    #[test]
    fn self_reference_is_ignored() {
        let document = CdfDocument::from_records(vec![node(1, &[1])]);
        assert!(expand(&document, 1, 3).is_empty());
    }

    #[test]
    fn shared_dependency_appears_once() {
        let document = CdfDocument::from_records(vec![
            node(1, &[2, 3]),
            node(2, &[4]),
            node(3, &[4]),
            node(4, &[]),
        ]);
        let graph = expand(&document, 1, 3);
        assert_eq!(uuids(graph.dependencies()), vec![uuid(2), uuid(3), uuid(4)]);
        assert_eq!(graph.get(uuid(4)).unwrap().host, uuid(2));
    }

    #[test]
    fn missing_records_are_dropped() {
        let document = CdfDocument::from_records(vec![node(1, &[2, 9]), node(2, &[])]);
        let graph = expand(&document, 1, 3);
        assert_eq!(uuids(graph.dependencies()), vec![uuid(2)]);
        assert_eq!(graph.missing(), &[uuid(9)]);
        assert!(!graph.contains(uuid(9)));
    }

    #[test]
    fn excluded_attributes_are_not_followed() {
        let mut root = node(1, &[2]);
        root.set_attribute(
            "author",
            Attribute::with_value(AttributeType::REFERENCE, json!(uuid(3).to_string())).unwrap(),
        )
        .unwrap();
        let document = CdfDocument::from_records(vec![root.clone(), node(2, &[]), node(3, &[])]);
        let mut options = options(3);
        options.excluded_attributes.insert("author".into());

        let graph = DependencyGraph::expand(root, &DocumentResolver::new(&document), &options);
        assert_eq!(uuids(graph.dependencies()), vec![uuid(2)]);
    }

    #[test]
    fn materialization_order() {
        // root X -> tag Y (independent) -> vocabulary W (independent)
        //        -> paragraph Z (dependent) -> paragraph V (dependent)
        let document = CdfDocument::from_records(vec![
            node(10, &[11, 12]),
            record(11, "taxonomy_term", &[13]),
            record(12, "paragraph", &[14]),
            record(13, "taxonomy_vocabulary", &[]),
            record(14, "paragraph", &[]),
        ]);
        let graph = expand(&document, 10, 3);

        assert_eq!(
            graph.materialization_order(),
            vec![uuid(13), uuid(11), uuid(10), uuid(12), uuid(14)]
        );
        assert_eq!(graph.independent().count(), 2);
        assert_eq!(graph.get(uuid(14)).unwrap().host, uuid(12));
        assert_eq!(graph.get(uuid(12)).unwrap().kind, DependencyKind::Dependent);
    }

    #[test]
    fn sibling_dependency_comes_first() {
        // root 0 -> [2, 1], 1 -> [2]
        let document = CdfDocument::from_records(vec![node(0, &[2, 1]), node(1, &[2]), node(2, &[])]);
        let graph = expand(&document, 0, 3);
        assert_eq!(graph.materialization_order(), vec![uuid(2), uuid(1), uuid(0)]);

        // root 0 -> [3, 1], 1 -> [2], 2 -> [3]
        let document = CdfDocument::from_records(vec![
            node(0, &[3, 1]),
            node(1, &[2]),
            node(2, &[3]),
            node(3, &[]),
        ]);
        let graph = expand(&document, 0, 3);
        assert_eq!(
            graph.materialization_order(),
            vec![uuid(3), uuid(2), uuid(1), uuid(0)]
        );
    }

    #[test]
    fn independent_reached_through_dependent_is_pre() {
        // root 0 -> paragraph 1 -> term 2, term 2 also referenced by root
        let document = CdfDocument::from_records(vec![
            node(0, &[1, 2]),
            record(1, "paragraph", &[2, 3]),
            record(2, "taxonomy_term", &[]),
            record(3, "taxonomy_term", &[]),
        ]);
        let graph = expand(&document, 0, 3);
        assert_eq!(
            graph.materialization_order(),
            vec![uuid(2), uuid(3), uuid(0), uuid(1)]
        );
    }

    #[test]
    fn closure_resolver() {
        let document = chain();
        let resolver = |id: Uuid| document.get(id).cloned();
        let graph = DependencyGraph::expand(node(0, &[1]), &resolver, &options(1));
        assert_eq!(uuids(graph.dependencies()), vec![uuid(1)]);
    }

    #[test]
    fn to_document_starts_with_root() {
        let graph = expand(&chain(), 0, 2);
        assert_eq!(graph.to_document().uuids(), vec![uuid(0), uuid(1), uuid(2)]);
    }

    fn reaches(graph: &DependencyGraph, from: Uuid, to: Uuid) -> bool {
        let mut seen = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                return true;
            }
            for &next in graph.references_of(current) {
                if graph.contains(next) && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    proptest! {
        #[test]
        fn expansion_invariants(document in reference_graph_strategy(12), max_depth in 0u32..6) {
            let graph = expand(&document, 1, max_depth);

            let mut seen = HashSet::new();
            for node in graph.dependencies() {
                prop_assert!(node.uuid() != uuid(1));
                prop_assert!(seen.insert(node.uuid()));
                prop_assert!(node.depth >= 1 && node.depth <= max_depth);
                if node.depth == 1 {
                    prop_assert_eq!(node.host, uuid(1));
                } else {
                    let host = graph.get(node.host).unwrap();
                    prop_assert_eq!(host.depth, node.depth - 1);
                }
            }

            let order = graph.materialization_order();
            prop_assert_eq!(order.len(), graph.len() + 1);
            prop_assert_eq!(graph.pre_dependencies().len(), graph.independent().count());
            let position = |id: Uuid| order.iter().position(|u| *u == id).unwrap();
            for node in graph.post_dependencies() {
                prop_assert!(position(node.host) < position(node.uuid()));
            }
            for node in graph.pre_dependencies() {
                for &reference in &node.references {
                    let Some(target) = graph.get(reference) else { continue };
                    if target.kind != DependencyKind::Independent || reaches(&graph, reference, node.uuid()) {
                        continue;
                    }
                    prop_assert!(
                        position(reference) < position(node.uuid()),
                        "{} references {} but is materialized first",
                        node.uuid(),
                        reference
                    );
                }
            }
        }
    }
}
