//! # Content Hub Sync Engine
//!
//! Export and import of local entities through Content Hub.
//!
//! This crate provides:
//! - Dependency graph expansion with pre- and post-dependency ordering
//! - Field type mapping between local entities and CDF records
//! - Export coordination (local change to CDF batch to Content Hub)
//! - Import coordination (Content Hub record to local entities)
//! - Webhook dispatch (export confirmation, automatic updates)
//! - Collaborator traits with in-memory implementations
//!
//! ## Architecture
//!
//! The engine sits between two seams:
//! 1. [`RemoteGateway`] talks to Content Hub
//! 2. [`LocalEntityStore`] holds the site's own entities
//!
//! Sync state lives in a [`SyncStateTracker`](contenthub_state::SyncStateTracker).
//! Export publishes a root entity together with its dependency closure;
//! import materializes a remote record after everything it needs.
//!
//! ## Key Invariants
//!
//! - An entity authored by this site is never imported
//! - An imported entity is never exported
//! - Writes made by the importer are flagged and never re-exported
//! - Dependency walks terminate on cycles and respect the depth limit
//! - A failed export never fails the local save that caused it

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod context;
mod engine;
mod entity;
mod error;
mod export;
mod gateway;
mod graph;
mod import;
mod mapping;
mod store;
mod webhook;

pub use config::{ConnectionSettings, HubConfig, DEFAULT_DEPENDENCY_DEPTH};
pub use context::SyncContext;
pub use engine::{SyncEngine, SyncStats};
pub use entity::{ChangeAction, EntityChange, EntityKind, Field, HostRef, LocalEntity, SaveMode};
pub use error::{SyncError, SyncResult, TransportErrorKind};
pub use export::{
    ExcludedEntity, ExportBatch, ExportCoordinator, ExportOutcome, ExportReport, SkipReason,
};
pub use gateway::{ExportResource, GatewayCall, ListOptions, MemoryGateway, RemoteGateway, SearchHit};
pub use graph::{
    DependencyClassifier, DependencyGraph, DependencyKind, DependencyNode, DocumentResolver,
    GraphOptions, RecordResolver,
};
pub use import::{
    ImportCoordinator, ImportMode, ImportReport, ImportSkip, ImportState, ImportedEntity,
    SkippedImport,
};
pub use mapping::{EntityMapper, FieldTypeMapping, BUNDLE_ATTRIBUTE, LANGCODE_ATTRIBUTE};
pub use store::{LocalEntityStore, MemoryEntityStore};
pub use webhook::{Crud, WebhookAction, WebhookAsset, WebhookOutcome, WebhookPayload, WebhookStatus};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
