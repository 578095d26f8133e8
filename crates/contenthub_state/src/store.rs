//! State store trait definition.

use crate::error::StateResult;
use crate::row::SyncStateRow;
use crate::status::Direction;
use uuid::Uuid;

/// Persistence for sync state rows.
///
/// Rows are keyed by `(uuid, direction)`. Stores only persist rows; the
/// rules about which statuses are valid live in
/// [`crate::SyncStateTracker`].
///
/// # Invariants
///
/// - `put` replaces any existing row with the same key
/// - `get` returns `Ok(None)` for absent rows, never an error
/// - Stores must be `Send + Sync`; mutation goes through `&self`
///
/// # Implementors
///
/// - [`crate::MemoryStateStore`] - For tests and ephemeral runs
/// - [`crate::JsonFileStateStore`] - Persists the table to a JSON file
pub trait StateStore: Send + Sync {
    /// Returns the row for `uuid` in `direction`.
    fn get(&self, uuid: Uuid, direction: Direction) -> StateResult<Option<SyncStateRow>>;

    /// Inserts or replaces a row.
    fn put(&self, row: SyncStateRow) -> StateResult<()>;

    /// Removes a row. Returns true if it existed.
    fn delete(&self, uuid: Uuid, direction: Direction) -> StateResult<bool>;

    /// Finds the row for a local identity in `direction`.
    fn find_by_local(
        &self,
        entity_type: &str,
        entity_id: u64,
        direction: Direction,
    ) -> StateResult<Option<SyncStateRow>>;

    /// Returns every row, ordered by key.
    fn rows(&self) -> StateResult<Vec<SyncStateRow>>;

    /// Removes every row. Returns how many were removed.
    fn clear(&self) -> StateResult<usize>;
}
