//! Test fixtures.
//!
//! Record builders, reference graphs, and temporary state stores.

use chrono::{DateTime, TimeZone, Utc};
use contenthub_cdf::{Attribute, AttributeType, BaseType, CdfDocument, CdfRecord};
use contenthub_state::{JsonFileStateStore, SyncStateTracker};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

/// Origin used for records authored by "another site" in fixtures.
pub const REMOTE_ORIGIN: Uuid = Uuid::from_u128(0xa0a0_a0a0);

/// Origin used for the site under test.
pub const LOCAL_ORIGIN: Uuid = Uuid::from_u128(0x51);

/// Deterministic UUID for fixture number `n`.
pub fn fixture_uuid(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

/// A fixed timestamp, `2024-01-01T00:00:00Z` plus `minutes`.
pub fn timestamp(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid fixture timestamp")
        + chrono::Duration::minutes(minutes)
}

/// Builds CDF records for tests.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: CdfRecord,
}

impl RecordBuilder {
    /// Starts a record of `record_type` authored by [`REMOTE_ORIGIN`],
    /// with bundle `default` and fixed timestamps.
    pub fn new(uuid: Uuid, record_type: &str) -> Self {
        Self {
            record: CdfRecord::new(uuid, record_type, REMOTE_ORIGIN)
                .with_timestamps(timestamp(0), timestamp(0)),
        }
        .string("bundle", "default")
    }

    /// Sets the origin.
    pub fn origin(mut self, origin: Uuid) -> Self {
        let (created, modified) = (self.record.created(), self.record.modified());
        let mut record = CdfRecord::new(self.record.uuid(), self.record.record_type(), origin)
            .with_timestamps(created, modified);
        for (name, attribute) in self.record.attributes() {
            record
                .set_attribute(name.clone(), attribute.clone())
                .expect("attribute copied from a valid record");
        }
        for asset in self.record.assets() {
            record.add_asset(asset.url.clone(), asset.replace_token.clone());
        }
        self.record = record;
        self
    }

    /// Sets the modified timestamp, `minutes` after the fixture epoch.
    pub fn modified(mut self, minutes: i64) -> Self {
        self.record = self
            .record
            .with_timestamps(timestamp(0), timestamp(minutes));
        self
    }

    /// Sets a language-neutral attribute.
    pub fn attribute(mut self, name: &str, attr_type: AttributeType, value: Value) -> Self {
        let attribute = Attribute::with_value(attr_type, value).expect("fixture value matches type");
        self.record
            .set_attribute(name, attribute)
            .expect("fixture attribute type is consistent");
        self
    }

    /// Sets a string attribute.
    pub fn string(self, name: &str, value: &str) -> Self {
        self.attribute(name, AttributeType::STRING, json!(value))
    }

    /// Sets an `array<reference>` attribute.
    pub fn references(self, name: &str, targets: &[Uuid]) -> Self {
        let values: Vec<Value> = targets.iter().map(|u| json!(u.to_string())).collect();
        self.attribute(name, AttributeType::Array(BaseType::Reference), json!(values))
    }

    /// Adds an asset whose token points at `uuid`.
    pub fn asset(mut self, uuid: Uuid) -> Self {
        self.record.add_asset(
            format!("https://cdn.example.com/{uuid}"),
            format!("[{uuid}]"),
        );
        self
    }

    /// Finishes the record.
    pub fn build(self) -> CdfRecord {
        self.record
    }
}

/// A document of `len` nodes where node `i` references node `i + 1`.
///
/// UUIDs are `fixture_uuid(0)` to `fixture_uuid(len - 1)`.
pub fn chain_document(len: u128) -> CdfDocument {
    CdfDocument::from_records(
        (0..len)
            .map(|i| {
                let mut builder = RecordBuilder::new(fixture_uuid(i), "node");
                if i + 1 < len {
                    builder = builder.references("field_next", &[fixture_uuid(i + 1)]);
                }
                builder.build()
            })
            .collect(),
    )
}

/// A document of `len` nodes referencing each other in a ring.
pub fn cycle_document(len: u128) -> CdfDocument {
    CdfDocument::from_records(
        (0..len)
            .map(|i| {
                RecordBuilder::new(fixture_uuid(i), "node")
                    .references("field_next", &[fixture_uuid((i + 1) % len)])
                    .build()
            })
            .collect(),
    )
}

/// An article (1) referencing a tag (2) in a vocabulary (3) and a
/// paragraph (4) that holds another paragraph (5).
pub fn article_document() -> CdfDocument {
    CdfDocument::from_records(vec![
        RecordBuilder::new(fixture_uuid(1), "node")
            .string("bundle", "article")
            .string("title", "Hello")
            .references("field_tags", &[fixture_uuid(2)])
            .references("field_body", &[fixture_uuid(4)])
            .build(),
        RecordBuilder::new(fixture_uuid(2), "taxonomy_term")
            .string("bundle", "tags")
            .string("name", "rust")
            .references("vid", &[fixture_uuid(3)])
            .build(),
        RecordBuilder::new(fixture_uuid(3), "taxonomy_vocabulary")
            .string("name", "Tags")
            .build(),
        RecordBuilder::new(fixture_uuid(4), "paragraph")
            .string("bundle", "section")
            .references("field_items", &[fixture_uuid(5)])
            .build(),
        RecordBuilder::new(fixture_uuid(5), "paragraph")
            .string("bundle", "text")
            .string("field_text", "Body text")
            .build(),
    ])
}

/// A file-backed state store in a temporary directory.
///
/// The directory is removed when the value is dropped.
pub struct TempStateStore {
    dir: TempDir,
}

impl TempStateStore {
    /// Creates an empty temporary directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the state file path.
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("contenthub_state.json")
    }

    /// Returns the directory.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Opens a store over the state file.
    pub fn open(&self) -> JsonFileStateStore {
        JsonFileStateStore::open(&self.path()).expect("Failed to open state store")
    }

    /// Opens a tracker over the state file.
    pub fn tracker(&self) -> SyncStateTracker {
        SyncStateTracker::new(Box::new(self.open()))
    }
}

impl Default for TempStateStore {
    fn default() -> Self {
        Self::new()
    }
}
