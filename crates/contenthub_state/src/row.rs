//! Persisted sync state rows.

use crate::error::StateError;
use crate::status::{Direction, SyncStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local and global identity of a tracked entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackedEntity {
    /// Local entity type (e.g. `node`).
    pub entity_type: String,
    /// Local entity ID.
    pub entity_id: u64,
    /// Global UUID.
    pub uuid: Uuid,
}

impl TrackedEntity {
    /// Creates a new identity.
    pub fn new(entity_type: impl Into<String>, entity_id: u64, uuid: Uuid) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
            uuid,
        }
    }
}

/// Sync state of one entity in one direction.
///
/// Stored in the tracking table schema: `entity_type`, `entity_id`,
/// `entity_uuid`, `status_export`, `status_import`, `modified`,
/// `origin`. Exactly one of the two status columns is set; which one
/// determines the row's direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredRow", into = "StoredRow")]
pub struct SyncStateRow {
    /// Local entity type.
    pub entity_type: String,
    /// Local entity ID.
    pub entity_id: u64,
    /// Global UUID.
    pub uuid: Uuid,
    /// Direction of this row.
    pub direction: Direction,
    /// Current status; always belongs to `direction`.
    pub status: SyncStatus,
    /// Last synchronized modification time.
    pub modified: DateTime<Utc>,
    /// Site that authored the entity.
    pub origin: Uuid,
}

impl SyncStateRow {
    /// Creates a row. The direction is taken from `status`.
    pub fn new(
        entity: &TrackedEntity,
        status: SyncStatus,
        modified: DateTime<Utc>,
        origin: Uuid,
    ) -> Self {
        Self {
            entity_type: entity.entity_type.clone(),
            entity_id: entity.entity_id,
            uuid: entity.uuid,
            direction: status.direction(),
            status,
            modified,
            origin,
        }
    }

    /// Returns the identity of the tracked entity.
    pub fn entity(&self) -> TrackedEntity {
        TrackedEntity::new(self.entity_type.clone(), self.entity_id, self.uuid)
    }
}

#[derive(Serialize, Deserialize)]
struct StoredRow {
    entity_type: String,
    entity_id: u64,
    entity_uuid: Uuid,
    #[serde(default)]
    status_export: Option<SyncStatus>,
    #[serde(default)]
    status_import: Option<SyncStatus>,
    modified: DateTime<Utc>,
    origin: Uuid,
}

impl From<SyncStateRow> for StoredRow {
    fn from(row: SyncStateRow) -> Self {
        let (status_export, status_import) = match row.direction {
            Direction::Export => (Some(row.status), None),
            Direction::Import => (None, Some(row.status)),
        };
        Self {
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            entity_uuid: row.uuid,
            status_export,
            status_import,
            modified: row.modified,
            origin: row.origin,
        }
    }
}

impl TryFrom<StoredRow> for SyncStateRow {
    type Error = StateError;

    fn try_from(stored: StoredRow) -> Result<Self, Self::Error> {
        let (direction, status) = match (stored.status_export, stored.status_import) {
            (Some(status), None) => (Direction::Export, status),
            (None, Some(status)) => (Direction::Import, status),
            _ => {
                return Err(StateError::corrupt(format!(
                    "row {} must set exactly one status column",
                    stored.entity_uuid
                )))
            }
        };
        if status.direction() != direction {
            return Err(StateError::corrupt(format!(
                "row {} holds {status} in the {direction:?} column",
                stored.entity_uuid
            )));
        }
        Ok(Self {
            entity_type: stored.entity_type,
            entity_id: stored.entity_id,
            uuid: stored.entity_uuid,
            direction,
            status,
            modified: stored.modified,
            origin: stored.origin,
        })
    }
}
