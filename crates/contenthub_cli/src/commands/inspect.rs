//! Inspect command implementation.

use contenthub_cdf::CdfDocument;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use uuid::Uuid;

/// Document inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Document path.
    pub path: String,
    /// Number of records.
    pub record_count: usize,
    /// Record count per type.
    pub types: BTreeMap<String, usize>,
    /// Record count per origin site.
    pub origins: BTreeMap<Uuid, usize>,
    /// Number of assets across all records.
    pub asset_count: usize,
    /// Referenced UUIDs with no record in the document.
    pub dangling_references: Vec<Uuid>,
    /// Per-record details (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<RecordSummary>>,
}

/// Summary of a single record.
#[derive(Debug, Serialize)]
pub struct RecordSummary {
    /// Record UUID.
    pub uuid: Uuid,
    /// Record type.
    pub record_type: String,
    /// Origin site.
    pub origin: Uuid,
    /// Last modification time (RFC 3339).
    pub modified: String,
    /// Number of attributes.
    pub attributes: usize,
    /// UUIDs the record depends on.
    pub references: Vec<Uuid>,
}

/// Reads and validates a CDF document.
pub fn load_document(path: &Path) -> Result<CdfDocument, Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Could not read {}: {e}", path.display()))?;
    Ok(CdfDocument::from_json(&json)?)
}

/// Runs the inspect command.
pub fn run(path: &Path, show_records: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let document = load_document(path)?;
    let result = inspect(&document, &path.display().to_string(), show_records);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Summarizes `document`.
pub fn inspect(document: &CdfDocument, path: &str, show_records: bool) -> InspectResult {
    let no_exclusions = BTreeSet::new();
    let mut types = BTreeMap::new();
    let mut origins = BTreeMap::new();
    let mut dangling: BTreeSet<Uuid> = BTreeSet::new();
    let mut asset_count = 0;
    let mut records = Vec::new();

    for record in &document.entities {
        *types.entry(record.record_type().to_string()).or_insert(0) += 1;
        *origins.entry(record.origin()).or_insert(0) += 1;
        asset_count += record.assets().len();

        let references = record.reference_uuids(&no_exclusions);
        dangling.extend(references.iter().copied().filter(|uuid| !document.contains(*uuid)));

        if show_records {
            records.push(RecordSummary {
                uuid: record.uuid(),
                record_type: record.record_type().to_string(),
                origin: record.origin(),
                modified: record.modified().to_rfc3339(),
                attributes: record.attributes().len(),
                references,
            });
        }
    }

    InspectResult {
        path: path.to_string(),
        record_count: document.len(),
        types,
        origins,
        asset_count,
        dangling_references: dangling.into_iter().collect(),
        records: show_records.then_some(records),
    }
}

fn print_text_output(result: &InspectResult) {
    println!("CDF Document Inspection");
    println!("=======================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Records: {}", result.record_count);
    for (record_type, count) in &result.types {
        println!("  {record_type:<24} {count}");
    }
    println!();
    println!("Origins:");
    for (origin, count) in &result.origins {
        println!("  {origin}  {count}");
    }
    println!();
    println!("Assets: {}", result.asset_count);

    if !result.dangling_references.is_empty() {
        println!();
        println!("Dangling references:");
        for uuid in &result.dangling_references {
            println!("  {uuid}");
        }
    }

    if let Some(records) = &result.records {
        println!();
        println!("Records:");
        for record in records {
            println!(
                "  {} {} ({} attributes, {} references, modified {})",
                record.uuid,
                record.record_type,
                record.attributes,
                record.references.len(),
                record.modified
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contenthub_testkit::{article_document, chain_document, fixture_uuid, RecordBuilder};

    #[test]
    fn counts_types_and_origins() {
        let result = inspect(&article_document(), "article.json", false);
        assert_eq!(result.record_count, 5);
        assert_eq!(result.types["paragraph"], 2);
        assert_eq!(result.types["node"], 1);
        assert_eq!(result.origins.len(), 1);
        assert!(result.dangling_references.is_empty());
        assert!(result.records.is_none());
    }

    #[test]
    fn reports_dangling_references() {
        let mut document = chain_document(2);
        document.push_unique(
            RecordBuilder::new(fixture_uuid(7), "node")
                .references("field_refs", &[fixture_uuid(8)])
                .asset(fixture_uuid(9))
                .build(),
        );
        let result = inspect(&document, "chain.json", true);
        assert_eq!(result.dangling_references, vec![fixture_uuid(8), fixture_uuid(9)]);
        assert_eq!(result.asset_count, 1);
        assert_eq!(result.records.unwrap().len(), 3);
    }

    #[test]
    fn loads_and_validates_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cdf.json");
        std::fs::write(&path, article_document().to_json().unwrap()).unwrap();
        assert_eq!(load_document(&path).unwrap().len(), 5);

        std::fs::write(&path, r#"{"entities": [{"uuid": "nope"}]}"#).unwrap();
        assert!(load_document(&path).is_err());
        assert!(load_document(&dir.path().join("missing.json")).is_err());
    }
}
