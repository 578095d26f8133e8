//! JSON-file state store for persistent tracking.

use crate::error::{StateError, StateResult};
use crate::memory::{find_local, RowTable};
use crate::row::SyncStateRow;
use crate::status::Direction;
use crate::store::StateStore;
use parking_lot::RwLock;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// A state store persisted as a JSON array of tracking rows.
///
/// The whole table is rewritten on every mutation: written to a
/// sibling temporary file, synced, then renamed over the original.
/// A mutation whose write fails leaves both the file and the in-memory
/// table unchanged.
///
/// # Example
///
/// ```no_run
/// use contenthub_state::{JsonFileStateStore, StateStore};
/// use std::path::Path;
///
/// let store = JsonFileStateStore::open(Path::new("tracking.json")).unwrap();
/// println!("{} rows", store.rows().unwrap().len());
/// ```
#[derive(Debug)]
pub struct JsonFileStateStore {
    path: PathBuf,
    rows: RwLock<RowTable>,
}

impl JsonFileStateStore {
    /// Opens the table at `path`, or starts an empty one if the file
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON,
    /// or holds two rows with the same UUID and direction.
    pub fn open(path: &Path) -> StateResult<Self> {
        let rows = if path.exists() {
            Self::load(path)?
        } else {
            RowTable::new()
        };
        debug!(path = %path.display(), rows = rows.len(), "opened state table");
        Ok(Self {
            path: path.to_path_buf(),
            rows: RwLock::new(rows),
        })
    }

    /// Returns the path of the table file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> StateResult<RowTable> {
        let bytes = fs::read(path)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(RowTable::new());
        }
        let rows: Vec<SyncStateRow> = serde_json::from_slice(&bytes)?;
        let mut table = RowTable::new();
        for row in rows {
            let key = (row.uuid, row.direction);
            if table.insert(key, row).is_some() {
                return Err(StateError::corrupt(format!(
                    "duplicate {:?} row for {}",
                    key.1, key.0
                )));
            }
        }
        Ok(table)
    }

    fn persist(&self, table: &RowTable) -> StateResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let rows: Vec<&SyncStateRow> = table.values().collect();
        let encoded = serde_json::to_vec_pretty(&rows)?;

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Applies `mutate` to a copy of the table and commits it only if
    /// the copy was written to disk.
    fn mutate<T>(&self, mutate: impl FnOnce(&mut RowTable) -> T) -> StateResult<T> {
        let mut rows = self.rows.write();
        let mut next = rows.clone();
        let result = mutate(&mut next);
        self.persist(&next)?;
        *rows = next;
        Ok(result)
    }
}

impl StateStore for JsonFileStateStore {
    fn get(&self, uuid: Uuid, direction: Direction) -> StateResult<Option<SyncStateRow>> {
        Ok(self.rows.read().get(&(uuid, direction)).cloned())
    }

    fn put(&self, row: SyncStateRow) -> StateResult<()> {
        self.mutate(|table| {
            table.insert((row.uuid, row.direction), row);
        })
    }

    fn delete(&self, uuid: Uuid, direction: Direction) -> StateResult<bool> {
        if !self.rows.read().contains_key(&(uuid, direction)) {
            return Ok(false);
        }
        self.mutate(|table| table.remove(&(uuid, direction)).is_some())
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
        self.mutate(|table| {
            let count = table.len();
            table.clear();
            count
        })
    }
}
