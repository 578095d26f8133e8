//! In-memory state store.

use crate::error::StateResult;
use crate::row::SyncStateRow;
use crate::status::Direction;
use crate::store::StateStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use uuid::Uuid;

pub(crate) type RowTable = BTreeMap<(Uuid, Direction), SyncStateRow>;

pub(crate) fn find_local<'a>(
    table: &'a RowTable,
    entity_type: &str,
    entity_id: u64,
    direction: Direction,
) -> Option<&'a SyncStateRow> {
    table.values().find(|row| {
        row.direction == direction && row.entity_type == entity_type && row.entity_id == entity_id
    })
}

/// A state store that keeps all rows in memory.
///
/// Suitable for tests and for runs whose state does not need to
/// survive the process.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    rows: RwLock<RowTable>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, uuid: Uuid, direction: Direction) -> StateResult<Option<SyncStateRow>> {
        Ok(self.rows.read().get(&(uuid, direction)).cloned())
    }

    fn put(&self, row: SyncStateRow) -> StateResult<()> {
        self.rows.write().insert((row.uuid, row.direction), row);
        Ok(())
    }

    fn delete(&self, uuid: Uuid, direction: Direction) -> StateResult<bool> {
        Ok(self.rows.write().remove(&(uuid, direction)).is_some())
    }

    fn find_by_local(
        &self,
        entity_type: &str,
        entity_id: u64,
        direction: Direction,
    ) -> StateResult<Option<SyncStateRow>> {
        Ok(find_local(&self.rows.read(), entity_type, entity_id, direction).cloned())
    }

    fn rows(&self) -> StateResult<Vec<SyncStateRow>> {
        Ok(self.rows.read().values().cloned().collect())
    }

    fn clear(&self) -> StateResult<usize> {
        let mut rows = self.rows.write();
        let count = rows.len();
        rows.clear();
        Ok(count)
    }
}
