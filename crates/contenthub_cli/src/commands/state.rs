//! State command implementation.

use contenthub_state::{JsonFileStateStore, SyncStateRow, SyncStateTracker};
use std::path::Path;
use tracing::info;

fn open(path: &Path) -> Result<SyncStateTracker, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No sync state found at {}", path.display()).into());
    }
    Ok(SyncStateTracker::new(Box::new(JsonFileStateStore::open(path)?)))
}

/// Returns every row, export rows first.
pub fn rows(path: &Path) -> Result<Vec<SyncStateRow>, Box<dyn std::error::Error>> {
    let tracker = open(path)?;
    let mut rows = tracker.exported_rows()?;
    rows.extend(tracker.imported_rows()?);
    Ok(rows)
}

/// Runs `state list`.
pub fn list(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let rows = rows(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        _ => {
            println!("Sync state at {}", path.display());
            println!();
            if rows.is_empty() {
                println!("No tracked entities");
            }
            for row in &rows {
                println!("{}", row_line(row));
            }
        }
    }

    Ok(())
}

/// Runs `state purge`.
pub fn purge(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let removed = open(path)?.purge()?;
    info!(path = %path.display(), removed, "purged sync state");
    println!("Removed {removed} rows");
    Ok(())
}

fn row_line(row: &SyncStateRow) -> String {
    format!(
        "{:<24} {}/{} {} origin {} modified {}",
        row.status.as_str(),
        row.entity_type,
        row.entity_id,
        row.uuid,
        row.origin,
        row.modified.to_rfc3339()
    )
}
