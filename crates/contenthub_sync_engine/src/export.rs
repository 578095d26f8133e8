//! Export coordination.
//!
//! Turns local entity changes into Content Hub publications: the changed
//! entity and its dependency closure are normalized into one CDF batch,
//! sent through the gateway, and recorded as `INITIATED` exports.

use crate::context::SyncContext;
use crate::entity::{ChangeAction, EntityChange, LocalEntity};
use crate::error::{SyncError, SyncResult};
use crate::gateway::ExportResource;
use crate::graph::{DependencyGraph, DependencyKind, RecordResolver};
use contenthub_cdf::{CdfDocument, CdfRecord};
use contenthub_state::{Direction, SyncStatus, TrackedEntity};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Why an entity was not exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The change was written by the importer.
    Synchronized,
    /// Not a content entity.
    NotContent,
    /// The entity has no local id yet.
    Unsaved,
    /// Imported from elsewhere, or its type or bundle is disabled.
    NotEligible,
    /// Deleted locally but never exported.
    NotExported,
}

/// An entity left out of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedEntity {
    /// Entity UUID.
    pub uuid: Uuid,
    /// Why it was left out.
    pub reason: String,
}

/// A batch of records ready to publish.
#[derive(Debug, Clone)]
pub struct ExportBatch {
    /// Resource handed to the gateway.
    pub resource: ExportResource,
    /// UUIDs of the entities the batch was built for.
    pub roots: Vec<Uuid>,
    /// Kind of every non-root record in the batch.
    pub kinds: BTreeMap<Uuid, DependencyKind>,
    /// Dependencies left out of the batch.
    pub excluded: Vec<ExcludedEntity>,
    identities: Vec<TrackedEntity>,
}

impl ExportBatch {
    /// Returns the records in the batch.
    pub fn records(&self) -> &[CdfRecord] {
        &self.resource.document.entities
    }

    /// Returns the UUIDs in the batch.
    pub fn uuids(&self) -> Vec<Uuid> {
        self.resource.document.uuids()
    }

    /// Returns the dependency kind of `uuid`. `None` for roots and
    /// records outside the batch.
    pub fn kind(&self, uuid: Uuid) -> Option<DependencyKind> {
        self.kinds.get(&uuid).copied()
    }

    /// Returns true if `uuid` is in the batch.
    pub fn contains(&self, uuid: Uuid) -> bool {
        self.resource.document.contains(uuid)
    }
}

/// Result of exporting a single change.
#[derive(Debug)]
pub enum ExportOutcome {
    /// The batch was accepted by Content Hub.
    Exported(ExportBatch),
    /// The remote entity was deleted.
    Deleted(Uuid),
    /// Nothing was sent.
    Skipped(SkipReason),
    /// Sending failed. The error has been logged.
    Failed(SyncError),
}

impl ExportOutcome {
    /// Returns true for `Exported` and `Deleted`.
    pub fn is_success(&self) -> bool {
        matches!(self, ExportOutcome::Exported(_) | ExportOutcome::Deleted(_))
    }
}

/// Result of exporting several entities in one batch.
#[derive(Debug, Default)]
pub struct ExportReport {
    /// The batch that was sent, if any root could be exported.
    pub batch: Option<ExportBatch>,
    /// Roots and dependencies left out.
    pub excluded: Vec<ExcludedEntity>,
    /// The send failure, if the batch was rejected.
    pub failure: Option<SyncError>,
}

impl ExportReport {
    /// Returns the UUIDs that were published.
    pub fn exported(&self) -> Vec<Uuid> {
        match (&self.batch, &self.failure) {
            (Some(batch), None) => batch.uuids(),
            _ => Vec::new(),
        }
    }
}

/// Resolves dependencies from the local store, normalizing as it goes.
///
/// Entities that cannot be exported are not resolved; they are collected
/// as exclusions instead.
struct LocalResolver<'c, 'a> {
    ctx: &'c SyncContext<'a>,
    excluded: RefCell<BTreeMap<Uuid, String>>,
    identities: RefCell<HashMap<Uuid, TrackedEntity>>,
}

impl<'c, 'a> LocalResolver<'c, 'a> {
    fn new(ctx: &'c SyncContext<'a>) -> Self {
        Self {
            ctx,
            excluded: RefCell::new(BTreeMap::new()),
            identities: RefCell::new(HashMap::new()),
        }
    }

    fn exclude(&self, uuid: Uuid, reason: impl Into<String>) {
        let reason = reason.into();
        debug!(%uuid, %reason, "excluded from export");
        self.excluded.borrow_mut().entry(uuid).or_insert(reason);
    }

    /// Checks that `entity` may be exported and returns its identity.
    fn admit(&self, entity: &LocalEntity) -> SyncResult<TrackedEntity> {
        let refuse = |reason: &str| SyncError::not_exportable(entity.uuid, reason);
        if !entity.kind.is_content() {
            return Err(refuse("not a content entity"));
        }
        let id = entity.id.ok_or_else(|| refuse("not saved"))?;
        if !self
            .ctx
            .tracker
            .is_eligible_for_export(&entity.entity_type, &entity.bundle, id)?
        {
            return Err(refuse("imported from another site or type disabled"));
        }
        Ok(TrackedEntity::new(entity.entity_type.clone(), id, entity.uuid))
    }

    /// Normalizes an admitted entity.
    fn normalize(&self, entity: &LocalEntity) -> SyncResult<CdfRecord> {
        let identity = self.admit(entity)?;
        let record = self.ctx.mapper.normalize(entity, self.ctx.origin)?;
        self.identities.borrow_mut().insert(entity.uuid, identity);
        Ok(record)
    }

    fn identity(&self, uuid: Uuid) -> Option<TrackedEntity> {
        self.identities.borrow().get(&uuid).cloned()
    }

    fn into_excluded(self) -> Vec<ExcludedEntity> {
        self.excluded
            .into_inner()
            .into_iter()
            .map(|(uuid, reason)| ExcludedEntity { uuid, reason })
            .collect()
    }
}

impl RecordResolver for LocalResolver<'_, '_> {
    fn resolve(&self, uuid: Uuid) -> Option<CdfRecord> {
        let entity = match self.ctx.store.load_by_uuid(uuid) {
            Ok(Some(entity)) => entity,
            Ok(None) => return None,
            Err(e) => {
                self.exclude(uuid, e.to_string());
                return None;
            }
        };
        match self.normalize(&entity) {
            Ok(record) => Some(record),
            Err(e) => {
                self.exclude(uuid, e.to_string());
                None
            }
        }
    }
}

/// Publishes local changes to Content Hub.
#[derive(Debug)]
pub struct ExportCoordinator<'a> {
    ctx: SyncContext<'a>,
}

impl<'a> ExportCoordinator<'a> {
    /// Creates a coordinator.
    pub fn new(ctx: SyncContext<'a>) -> Self {
        Self { ctx }
    }

    /// Exports one change.
    ///
    /// Never returns an error: failures are logged and reported as
    /// [`ExportOutcome::Failed`] so the caller's own save is unaffected.
    pub fn export_entity(&self, change: &EntityChange) -> ExportOutcome {
        let entity = &change.entity;
        if change.synchronized {
            debug!(uuid = %entity.uuid, "skipping export of synchronized change");
            return ExportOutcome::Skipped(SkipReason::Synchronized);
        }
        if change.action == ChangeAction::Delete {
            return self.delete(entity);
        }
        if !entity.kind.is_content() {
            return ExportOutcome::Skipped(SkipReason::NotContent);
        }
        let Some(id) = entity.id else {
            return ExportOutcome::Skipped(SkipReason::Unsaved);
        };
        match self
            .ctx
            .tracker
            .is_eligible_for_export(&entity.entity_type, &entity.bundle, id)
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(uuid = %entity.uuid, "entity is not eligible for export");
                return ExportOutcome::Skipped(SkipReason::NotEligible);
            }
            Err(e) => return self.failed(entity.uuid, e.into()),
        }

        let resolver = LocalResolver::new(&self.ctx);
        let record = match resolver.normalize(entity) {
            Ok(record) => record,
            Err(e) => return self.failed(entity.uuid, e),
        };
        let batch = self.assemble(resolver, vec![record], std::slice::from_ref(entity));

        match self.send(&batch) {
            Ok(()) => ExportOutcome::Exported(batch),
            Err(e) => ExportOutcome::Failed(e),
        }
    }

    /// Exports several entities in a single batch.
    ///
    /// Roots or dependencies that cannot be exported are listed in the
    /// report instead of aborting the batch.
    pub fn export_entities(&self, entities: &[LocalEntity]) -> ExportReport {
        let resolver = LocalResolver::new(&self.ctx);
        let mut roots: Vec<CdfRecord> = Vec::new();
        for entity in entities {
            if roots.iter().any(|root| root.uuid() == entity.uuid) {
                continue;
            }
            match resolver.normalize(entity) {
                Ok(record) => roots.push(record),
                Err(e) => resolver.exclude(entity.uuid, e.to_string()),
            }
        }
        if roots.is_empty() {
            return ExportReport {
                batch: None,
                excluded: resolver.into_excluded(),
                failure: None,
            };
        }

        let batch = self.assemble(resolver, roots, entities);
        let failure = self.send(&batch).err();
        ExportReport {
            excluded: batch.excluded.clone(),
            batch: Some(batch),
            failure,
        }
    }

    fn delete(&self, entity: &LocalEntity) -> ExportOutcome {
        let uuid = entity.uuid;
        match self.ctx.tracker.load_exported_by_uuid(uuid) {
            Ok(Some(_)) => {}
            Ok(None) => return ExportOutcome::Skipped(SkipReason::NotExported),
            Err(e) => return self.failed(uuid, e.into()),
        }
        if let Err(e) = self.ctx.gateway.delete_entity(uuid) {
            error!(%uuid, "Could not delete remote entity {uuid}: {e}");
            return ExportOutcome::Failed(e);
        }
        if let Err(e) = self.ctx.tracker.delete(uuid, Direction::Export) {
            return self.failed(uuid, e.into());
        }
        info!(%uuid, "deleted remote entity");
        ExportOutcome::Deleted(uuid)
    }

    /// Expands every normalized root into one batch. Records shared by
    /// several roots appear once.
    fn assemble(
        &self,
        resolver: LocalResolver<'_, '_>,
        roots: Vec<CdfRecord>,
        entities: &[LocalEntity],
    ) -> ExportBatch {
        let options = self.ctx.config.graph_options();
        let root_uuids: Vec<Uuid> = roots.iter().map(CdfRecord::uuid).collect();
        let mut document = CdfDocument::new();
        let mut kinds = BTreeMap::new();

        for record in roots {
            let graph = DependencyGraph::expand(record, &resolver, &options);
            document.push_unique(graph.root().clone());
            for node in graph.dependencies() {
                if root_uuids.contains(&node.uuid()) {
                    continue;
                }
                if document.push_unique(node.record.clone()) {
                    kinds.insert(node.uuid(), node.kind);
                }
            }
        }

        let identities = document
            .uuids()
            .into_iter()
            .filter_map(|uuid| resolver.identity(uuid))
            .collect();
        let url = match (entities, root_uuids.as_slice()) {
            ([entity], [_]) => match entity.id {
                Some(id) => self.ctx.config.entity_resource_url(&entity.entity_type, id),
                None => self.ctx.config.batch_resource_url(&root_uuids),
            },
            _ => self.ctx.config.batch_resource_url(&document.uuids()),
        };
        ExportBatch {
            resource: ExportResource::new(url, document),
            roots: root_uuids,
            kinds,
            excluded: resolver.into_excluded(),
            identities,
        }
    }

    fn send(&self, batch: &ExportBatch) -> SyncResult<()> {
        let update_of = match batch.roots.as_slice() {
            [root] => self
                .ctx
                .tracker
                .load_exported_by_uuid(*root)
                .map_err(|e| self.log_failure(*root, e.into()))?
                .map(|_| *root),
            _ => None,
        };

        let sent = match update_of {
            Some(uuid) => self
                .ctx
                .gateway
                .update_entity(&batch.resource, uuid)
                .map_err(|e| {
                    error!(%uuid, "Could not update remote entity {uuid}: {e}");
                    e
                }),
            None => self
                .ctx
                .gateway
                .create_entities(&batch.resource)
                .map_err(|e| {
                    error!(url = %batch.resource.url, "Could not create remote entities: {e}");
                    e
                }),
        };
        sent?;

        for (identity, record) in batch.identities.iter().filter_map(|identity| {
            batch
                .resource
                .document
                .get(identity.uuid)
                .map(|record| (identity, record))
        }) {
            self.ctx
                .tracker
                .record_export(identity, SyncStatus::Initiated, record.modified(), self.ctx.origin)
                .map_err(|e| self.log_failure(identity.uuid, e.into()))?;
        }
        info!(
            roots = batch.roots.len(),
            records = batch.records().len(),
            excluded = batch.excluded.len(),
            "export initiated"
        );
        Ok(())
    }

    fn log_failure(&self, uuid: Uuid, err: SyncError) -> SyncError {
        error!(%uuid, "Export of {uuid} failed: {err}");
        err
    }

    fn failed(&self, uuid: Uuid, err: SyncError) -> ExportOutcome {
        ExportOutcome::Failed(self.log_failure(uuid, err))
    }
}
