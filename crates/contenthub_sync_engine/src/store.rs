//! Local entity storage seam.

use crate::entity::{ChangeAction, EntityChange, LocalEntity, SaveMode};
use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Access to the site's own entities.
///
/// Saves are atomic per entity: a failed save leaves nothing behind.
/// Every successful save or delete is reported on the change feed,
/// flagged as synchronized when written with [`SaveMode::Synchronized`].
pub trait LocalEntityStore: Send + Sync {
    /// Loads an entity by local identity.
    fn load(&self, entity_type: &str, id: u64) -> SyncResult<Option<LocalEntity>>;

    /// Loads an entity by UUID.
    fn load_by_uuid(&self, uuid: Uuid) -> SyncResult<Option<LocalEntity>>;

    /// Inserts or updates an entity and returns its local id.
    fn save(&self, entity: LocalEntity, mode: SaveMode) -> SyncResult<u64>;

    /// Deletes an entity. Returns false if it did not exist.
    fn delete(&self, uuid: Uuid, mode: SaveMode) -> SyncResult<bool>;

    /// Takes every change recorded since the last call.
    fn drain_changes(&self) -> Vec<EntityChange>;
}

#[derive(Default)]
struct StoreInner {
    entities: BTreeMap<Uuid, LocalEntity>,
    changes: Vec<EntityChange>,
    rejected_types: BTreeSet<String>,
}

/// In-memory entity store.
///
/// Ids are assigned from a counter starting at 1, per store rather than
/// per type.
pub struct MemoryEntityStore {
    inner: RwLock<StoreInner>,
    next_id: AtomicU64,
}

impl MemoryEntityStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Makes every later save of `entity_type` fail.
    pub fn reject_type(&self, entity_type: impl Into<String>) {
        self.inner.write().rejected_types.insert(entity_type.into());
    }

    /// Lifts a rejection set with [`reject_type`](Self::reject_type).
    pub fn accept_type(&self, entity_type: &str) {
        self.inner.write().rejected_types.remove(entity_type);
    }

    /// Returns every stored entity in UUID order.
    pub fn entities(&self) -> Vec<LocalEntity> {
        self.inner.read().entities.values().cloned().collect()
    }

    /// Returns the number of stored entities.
    pub fn len(&self) -> usize {
        self.inner.read().entities.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entities.is_empty()
    }
}

impl Default for MemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalEntityStore for MemoryEntityStore {
    fn load(&self, entity_type: &str, id: u64) -> SyncResult<Option<LocalEntity>> {
        Ok(self
            .inner
            .read()
            .entities
            .values()
            .find(|e| e.entity_type == entity_type && e.id == Some(id))
            .cloned())
    }

    fn load_by_uuid(&self, uuid: Uuid) -> SyncResult<Option<LocalEntity>> {
        Ok(self.inner.read().entities.get(&uuid).cloned())
    }

    fn save(&self, mut entity: LocalEntity, mode: SaveMode) -> SyncResult<u64> {
        let mut inner = self.inner.write();
        if inner.rejected_types.contains(&entity.entity_type) {
            return Err(SyncError::local_store(format!(
                "saving {} entities is not allowed",
                entity.entity_type
            )));
        }

        let existing_id = inner.entities.get(&entity.uuid).and_then(|e| e.id);
        let (id, action) = match (entity.id, existing_id) {
            (None, None) => (
                self.next_id.fetch_add(1, Ordering::SeqCst),
                ChangeAction::Insert,
            ),
            (Some(id), Some(stored)) if id == stored => (id, ChangeAction::Update),
            (Some(id), None) => (id, ChangeAction::Insert),
            (_, Some(stored)) => {
                return Err(SyncError::local_store(format!(
                    "uuid {} already belongs to {}/{stored}",
                    entity.uuid, entity.entity_type
                )))
            }
        };
        entity.id = Some(id);

        let change = EntityChange {
            entity: entity.clone(),
            action,
            synchronized: mode == SaveMode::Synchronized,
        };
        inner.entities.insert(entity.uuid, entity);
        inner.changes.push(change);
        Ok(id)
    }

    fn delete(&self, uuid: Uuid, mode: SaveMode) -> SyncResult<bool> {
        let mut inner = self.inner.write();
        match inner.entities.remove(&uuid) {
            Some(entity) => {
                inner.changes.push(EntityChange {
                    entity,
                    action: ChangeAction::Delete,
                    synchronized: mode == SaveMode::Synchronized,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn drain_changes(&self) -> Vec<EntityChange> {
        std::mem::take(&mut self.inner.write().changes)
    }
}

impl std::fmt::Debug for MemoryEntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEntityStore")
            .field("entities", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(n: u128) -> LocalEntity {
        LocalEntity::new("node", "article", Uuid::from_u128(n))
    }

    #[test]
    fn save_assigns_ids_and_reports_changes() {
        let store = MemoryEntityStore::new();
        let first = store.save(article(1), SaveMode::Local).unwrap();
        let second = store.save(article(2), SaveMode::Synchronized).unwrap();
        assert_eq!((first, second), (1, 2));

        let changes = store.drain_changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].action, ChangeAction::Insert);
        assert!(!changes[0].synchronized);
        assert!(changes[1].synchronized);
        assert!(store.drain_changes().is_empty());
    }

    #[test]
    fn update_keeps_id() {
        let store = MemoryEntityStore::new();
        let id = store.save(article(1), SaveMode::Local).unwrap();
        let mut loaded = store.load("node", id).unwrap().unwrap();
        loaded.bundle = "page".into();
        assert_eq!(store.save(loaded, SaveMode::Local).unwrap(), id);

        let changes = store.drain_changes();
        assert_eq!(changes[1].action, ChangeAction::Update);
        assert_eq!(
            store.load_by_uuid(Uuid::from_u128(1)).unwrap().unwrap().bundle,
            "page"
        );
    }

    #[test]
    fn duplicate_uuid_is_rejected() {
        let store = MemoryEntityStore::new();
        store.save(article(1), SaveMode::Local).unwrap();
        assert!(matches!(
            store.save(article(1), SaveMode::Local),
            Err(SyncError::LocalStore(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn rejected_type_leaves_nothing_behind() {
        let store = MemoryEntityStore::new();
        store.reject_type("node");
        assert!(store.save(article(1), SaveMode::Local).is_err());
        assert!(store.is_empty());
        assert!(store.drain_changes().is_empty());

        store.accept_type("node");
        assert!(store.save(article(1), SaveMode::Local).is_ok());
    }

    #[test]
    fn delete_reports_change() {
        let store = MemoryEntityStore::new();
        store.save(article(1), SaveMode::Local).unwrap();
        store.drain_changes();

        assert!(store.delete(Uuid::from_u128(1), SaveMode::Local).unwrap());
        assert!(!store.delete(Uuid::from_u128(1), SaveMode::Local).unwrap());
        let changes = store.drain_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ChangeAction::Delete);
    }
}
