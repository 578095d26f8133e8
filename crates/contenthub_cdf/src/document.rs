//! The CDF wire document.

use crate::error::{CdfError, CdfResult};
use crate::record::CdfRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A batch of CDF records as exchanged with Content Hub.
///
/// Wire shape: `{"entities": [record, ...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CdfDocument {
    /// Records in the batch.
    #[serde(default)]
    pub entities: Vec<CdfRecord>,
}

impl CdfDocument {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a document from records.
    pub fn from_records(entities: Vec<CdfRecord>) -> Self {
        Self { entities }
    }

    /// Appends a record unless one with the same UUID is already present.
    ///
    /// Returns true if the record was added.
    pub fn push_unique(&mut self, record: CdfRecord) -> bool {
        if self.contains(record.uuid()) {
            return false;
        }
        self.entities.push(record);
        true
    }

    /// Returns the record with `uuid`.
    pub fn get(&self, uuid: Uuid) -> Option<&CdfRecord> {
        self.entities.iter().find(|record| record.uuid() == uuid)
    }

    /// Returns true if a record with `uuid` is present.
    pub fn contains(&self, uuid: Uuid) -> bool {
        self.get(uuid).is_some()
    }

    /// Returns the UUIDs in document order.
    pub fn uuids(&self) -> Vec<Uuid> {
        self.entities.iter().map(CdfRecord::uuid).collect()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the document holds no records.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Encodes to pretty-printed JSON.
    pub fn to_json(&self) -> CdfResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decodes from JSON and validates every record.
    ///
    /// Fails on duplicate UUIDs or attribute values that do not match
    /// their declared types.
    pub fn from_json(json: &str) -> CdfResult<Self> {
        let document: Self = serde_json::from_str(json)?;
        let mut seen = HashSet::new();
        for record in &document.entities {
            record.validate()?;
            if !seen.insert(record.uuid()) {
                return Err(CdfError::invalid_record(record.uuid(), "duplicate uuid"));
            }
        }
        Ok(document)
    }
}
