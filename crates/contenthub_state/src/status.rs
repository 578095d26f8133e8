//! Sync directions and statuses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way an entity was synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Local entity sent to Content Hub.
    Export,
    /// Remote entity materialized locally.
    Import,
}

/// Synchronization status of a tracked entity.
///
/// `Initiated` and `Exported` belong to the export direction; the
/// `AutoUpdate*` statuses belong to the import direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// Export request sent, remote fetch not yet confirmed.
    Initiated,
    /// Remote confirmed it holds the exported entity.
    Exported,
    /// Imported entity follows remote updates.
    AutoUpdateEnabled,
    /// Imported entity ignores remote updates.
    AutoUpdateDisabled,
    /// Imported entity was edited locally; remote updates are held back.
    AutoUpdateLocalChange,
}

impl SyncStatus {
    /// Returns the direction this status belongs to.
    pub fn direction(&self) -> Direction {
        match self {
            SyncStatus::Initiated | SyncStatus::Exported => Direction::Export,
            SyncStatus::AutoUpdateEnabled
            | SyncStatus::AutoUpdateDisabled
            | SyncStatus::AutoUpdateLocalChange => Direction::Import,
        }
    }

    /// Returns the stored name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Initiated => "INITIATED",
            SyncStatus::Exported => "EXPORTED",
            SyncStatus::AutoUpdateEnabled => "AUTO_UPDATE_ENABLED",
            SyncStatus::AutoUpdateDisabled => "AUTO_UPDATE_DISABLED",
            SyncStatus::AutoUpdateLocalChange => "AUTO_UPDATE_LOCAL_CHANGE",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directions() {
        assert_eq!(SyncStatus::Initiated.direction(), Direction::Export);
        assert_eq!(SyncStatus::Exported.direction(), Direction::Export);
        assert_eq!(SyncStatus::AutoUpdateEnabled.direction(), Direction::Import);
        assert_eq!(SyncStatus::AutoUpdateDisabled.direction(), Direction::Import);
        assert_eq!(
            SyncStatus::AutoUpdateLocalChange.direction(),
            Direction::Import
        );
    }

    #[test]
    fn serde_names_match_display() {
        for status in [
            SyncStatus::Initiated,
            SyncStatus::Exported,
            SyncStatus::AutoUpdateEnabled,
            SyncStatus::AutoUpdateDisabled,
            SyncStatus::AutoUpdateLocalChange,
        ] {
            let encoded = serde_json::to_string(&status).unwrap();
            assert_eq!(encoded, format!("\"{status}\""));
        }
    }
}
