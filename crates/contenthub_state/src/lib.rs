//! # Content Hub State
//!
//! Synchronization state tracking for Content Hub sync.
//!
//! This crate provides:
//! - `SyncStatus` and `Direction` (export vs. import lifecycle)
//! - `SyncStateRow`, one persisted row per entity and direction
//! - The `StateStore` trait with in-memory and JSON-file stores
//! - `SyncStateTracker`, which decides export eligibility
//!
//! ## Key Invariants
//!
//! - At most one export row and one import row per UUID
//! - An export row only ever holds an export status, and vice versa
//! - An entity with an import row is never eligible for export
//! - Rows are only removed on explicit delete or purge

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod file;
mod memory;
mod row;
mod status;
mod store;
mod tracker;

pub use config::EntityTypeConfig;
pub use error::{StateError, StateResult};
pub use file::JsonFileStateStore;
pub use memory::MemoryStateStore;
pub use row::{SyncStateRow, TrackedEntity};
pub use status::{Direction, SyncStatus};
pub use store::StateStore;
pub use tracker::SyncStateTracker;
