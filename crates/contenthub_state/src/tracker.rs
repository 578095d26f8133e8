//! Sync state tracker.

use crate::config::EntityTypeConfig;
use crate::error::StateResult;
use crate::row::{SyncStateRow, TrackedEntity};
use crate::status::{Direction, SyncStatus};
use crate::store::StateStore;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

/// Records export and import state and decides export eligibility.
///
/// Every mutating method is a write to the underlying [`StateStore`];
/// the tracker itself keeps no cached rows.
///
/// # Anti-loop invariant
///
/// An entity that has an import row was authored elsewhere and is never
/// eligible for export. Without this, an imported entity would be sent
/// back to Content Hub and re-imported by its origin.
pub struct SyncStateTracker {
    store: Box<dyn StateStore>,
    entity_types: EntityTypeConfig,
}

impl SyncStateTracker {
    /// Creates a tracker with every entity type enabled for export.
    pub fn new(store: Box<dyn StateStore>) -> Self {
        Self::with_entity_types(store, EntityTypeConfig::default())
    }

    /// Creates a tracker with an export allow-list.
    pub fn with_entity_types(store: Box<dyn StateStore>, entity_types: EntityTypeConfig) -> Self {
        Self {
            store,
            entity_types,
        }
    }

    /// Returns the export allow-list.
    pub fn entity_types(&self) -> &EntityTypeConfig {
        &self.entity_types
    }

    /// Upserts the export row for `entity`.
    ///
    /// Returns `Ok(false)` without writing if `status` is an import
    /// status.
    pub fn record_export(
        &self,
        entity: &TrackedEntity,
        status: SyncStatus,
        modified: DateTime<Utc>,
        origin: Uuid,
    ) -> StateResult<bool> {
        self.record(Direction::Export, entity, status, modified, origin)
    }

    /// Upserts the import row for `entity`.
    ///
    /// Returns `Ok(false)` without writing if `status` is an export
    /// status.
    pub fn record_import(
        &self,
        entity: &TrackedEntity,
        status: SyncStatus,
        modified: DateTime<Utc>,
        origin: Uuid,
    ) -> StateResult<bool> {
        self.record(Direction::Import, entity, status, modified, origin)
    }

    fn record(
        &self,
        direction: Direction,
        entity: &TrackedEntity,
        status: SyncStatus,
        modified: DateTime<Utc>,
        origin: Uuid,
    ) -> StateResult<bool> {
        if status.direction() != direction {
            warn!(
                uuid = %entity.uuid,
                %status,
                ?direction,
                "rejected sync status for the wrong direction"
            );
            return Ok(false);
        }
        self.store
            .put(SyncStateRow::new(entity, status, modified, origin))?;
        debug!(uuid = %entity.uuid, %status, ?direction, "recorded sync state");
        Ok(true)
    }

    /// Returns the export row for `uuid`.
    pub fn load_exported_by_uuid(&self, uuid: Uuid) -> StateResult<Option<SyncStateRow>> {
        self.store.get(uuid, Direction::Export)
    }

    /// Returns the import row for `uuid`.
    pub fn load_imported_by_uuid(&self, uuid: Uuid) -> StateResult<Option<SyncStateRow>> {
        self.store.get(uuid, Direction::Import)
    }

    /// Returns the export row for a local identity.
    pub fn load_exported_by_local(
        &self,
        entity_type: &str,
        entity_id: u64,
    ) -> StateResult<Option<SyncStateRow>> {
        self.store
            .find_by_local(entity_type, entity_id, Direction::Export)
    }

    /// Returns the import row for a local identity.
    pub fn load_imported_by_local(
        &self,
        entity_type: &str,
        entity_id: u64,
    ) -> StateResult<Option<SyncStateRow>> {
        self.store
            .find_by_local(entity_type, entity_id, Direction::Import)
    }

    /// Returns true if the local entity may be exported.
    ///
    /// False when the entity has an import row, or when its type or
    /// bundle is not enabled for export.
    pub fn is_eligible_for_export(
        &self,
        entity_type: &str,
        bundle: &str,
        entity_id: u64,
    ) -> StateResult<bool> {
        if !self.entity_types.is_enabled(entity_type, bundle) {
            return Ok(false);
        }
        Ok(self.load_imported_by_local(entity_type, entity_id)?.is_none())
    }

    /// Changes the status of an existing import row.
    ///
    /// Returns `Ok(false)` if there is no import row or `status` is an
    /// export status.
    pub fn set_import_status(&self, uuid: Uuid, status: SyncStatus) -> StateResult<bool> {
        self.set_status(uuid, Direction::Import, status)
    }

    /// Moves an export row from `Initiated` to `Exported`.
    ///
    /// Returns `Ok(false)` if there is no export row.
    pub fn confirm_export(&self, uuid: Uuid) -> StateResult<bool> {
        self.set_status(uuid, Direction::Export, SyncStatus::Exported)
    }

    fn set_status(&self, uuid: Uuid, direction: Direction, status: SyncStatus) -> StateResult<bool> {
        if status.direction() != direction {
            return Ok(false);
        }
        match self.store.get(uuid, direction)? {
            Some(mut row) => {
                row.status = status;
                self.store.put(row)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Flags an auto-updating import as locally changed.
    ///
    /// Only rows in `AutoUpdateEnabled` are changed; returns true if the
    /// row moved to `AutoUpdateLocalChange`.
    pub fn mark_local_change(&self, uuid: Uuid) -> StateResult<bool> {
        match self.load_imported_by_uuid(uuid)? {
            Some(row) if row.status == SyncStatus::AutoUpdateEnabled => {
                self.set_import_status(uuid, SyncStatus::AutoUpdateLocalChange)
            }
            _ => Ok(false),
        }
    }

    /// Returns true if the import row accepts automatic updates.
    pub fn is_auto_update(&self, uuid: Uuid) -> StateResult<bool> {
        Ok(self
            .load_imported_by_uuid(uuid)?
            .map(|row| row.status == SyncStatus::AutoUpdateEnabled)
            .unwrap_or(false))
    }

    /// Returns true if the imported entity has local changes.
    pub fn has_local_change(&self, uuid: Uuid) -> StateResult<bool> {
        Ok(self
            .load_imported_by_uuid(uuid)?
            .map(|row| row.status == SyncStatus::AutoUpdateLocalChange)
            .unwrap_or(false))
    }

    /// Removes the row for `uuid` in `direction`.
    pub fn delete(&self, uuid: Uuid, direction: Direction) -> StateResult<bool> {
        self.store.delete(uuid, direction)
    }

    /// Removes every row. Used when the site disconnects from Content Hub.
    pub fn purge(&self) -> StateResult<usize> {
        let removed = self.store.clear()?;
        warn!(removed, "purged all sync state");
        Ok(removed)
    }

    /// Returns all export rows.
    pub fn exported_rows(&self) -> StateResult<Vec<SyncStateRow>> {
        self.rows_for(Direction::Export)
    }

    /// Returns all import rows.
    pub fn imported_rows(&self) -> StateResult<Vec<SyncStateRow>> {
        self.rows_for(Direction::Import)
    }

    fn rows_for(&self, direction: Direction) -> StateResult<Vec<SyncStateRow>> {
        Ok(self
            .store
            .rows()?
            .into_iter()
            .filter(|row| row.direction == direction)
            .collect())
    }
}

impl std::fmt::Debug for SyncStateTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncStateTracker")
            .field("entity_types", &self.entity_types)
            .finish_non_exhaustive()
    }
}
