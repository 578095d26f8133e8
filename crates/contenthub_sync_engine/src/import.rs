//! Import coordination.
//!
//! Fetches a record from Content Hub, expands its dependencies, and
//! creates or updates the local entities in dependency order:
//! pre-dependencies deepest first, then the root, then post-dependencies
//! attached to their hosts.

use crate::context::SyncContext;
use crate::entity::{ChangeAction, HostRef, LocalEntity, SaveMode};
use crate::error::{SyncError, SyncResult};
use crate::graph::{DependencyGraph, RecordResolver};
use contenthub_cdf::CdfRecord;
use contenthub_state::{SyncStatus, TrackedEntity};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Progress of an import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    /// The root record was fetched.
    Fetched,
    /// Independent dependencies were materialized.
    PreDependenciesResolved,
    /// The root entity was saved.
    SelfMaterialized,
    /// Dependent dependencies were materialized.
    PostDependenciesResolved,
    /// The run completed.
    Done,
    /// The run stopped with an error.
    Failed,
}

/// Who asked for the import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// An explicit request. Overrides disabled automatic updates.
    #[default]
    Manual,
    /// A webhook. Only touches entities with automatic updates enabled.
    Automatic,
}

/// Why a record was not materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSkip {
    /// Authored by this site.
    LocalOrigin,
    /// The local copy is at least as new.
    UpToDate,
    /// Automatic updates are disabled for the entity.
    AutoUpdateDisabled,
    /// The entity was changed locally since it was imported.
    LocalChange,
    /// A local entity with the same UUID exists but was never imported.
    LocallyAuthored,
    /// Referenced but not available from Content Hub.
    Missing,
    /// The host of a dependent record is not available locally.
    HostUnavailable,
    /// The record could not be turned into a local entity.
    Invalid(String),
}

impl fmt::Display for ImportSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportSkip::LocalOrigin => f.write_str("originates from this site"),
            ImportSkip::UpToDate => f.write_str("already up to date"),
            ImportSkip::AutoUpdateDisabled => f.write_str("automatic updates disabled"),
            ImportSkip::LocalChange => f.write_str("changed locally"),
            ImportSkip::LocallyAuthored => f.write_str("local entity was not imported"),
            ImportSkip::Missing => f.write_str("not available from Content Hub"),
            ImportSkip::HostUnavailable => f.write_str("host entity not available"),
            ImportSkip::Invalid(reason) => write!(f, "invalid record: {reason}"),
        }
    }
}

/// A record that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedImport {
    /// Record UUID.
    pub uuid: Uuid,
    /// Why.
    pub reason: ImportSkip,
}

/// A local entity written by the importer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedEntity {
    /// UUID.
    pub uuid: Uuid,
    /// Local entity type.
    pub entity_type: String,
    /// Local id.
    pub entity_id: u64,
    /// `Insert` or `Update`.
    pub action: ChangeAction,
}

/// Result of an import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// UUID of the requested record.
    pub root: Uuid,
    /// Entities written, in materialization order.
    pub materialized: Vec<ImportedEntity>,
    /// Records not written.
    pub skipped: Vec<SkippedImport>,
    /// States the run passed through.
    pub trace: Vec<ImportState>,
}

impl ImportReport {
    fn new(root: Uuid) -> Self {
        Self {
            root,
            materialized: Vec::new(),
            skipped: Vec::new(),
            trace: Vec::new(),
        }
    }

    /// Returns the UUIDs written, in order.
    pub fn materialized_uuids(&self) -> Vec<Uuid> {
        self.materialized.iter().map(|e| e.uuid).collect()
    }

    /// Returns the skip reason for `uuid`.
    pub fn skip_reason(&self, uuid: Uuid) -> Option<&ImportSkip> {
        self.skipped
            .iter()
            .find(|s| s.uuid == uuid)
            .map(|s| &s.reason)
    }

    /// Returns true if the root entity was written.
    pub fn root_materialized(&self) -> bool {
        self.materialized.iter().any(|e| e.uuid == self.root)
    }
}

enum Materialized {
    Saved(ImportedEntity),
    Skipped(ImportSkip),
}

/// Resolves dependencies through the gateway.
///
/// Transport failures are logged and treated as unavailable records.
struct GatewayResolver<'c, 'a> {
    ctx: &'c SyncContext<'a>,
}

impl RecordResolver for GatewayResolver<'_, '_> {
    fn resolve(&self, uuid: Uuid) -> Option<CdfRecord> {
        match self.ctx.gateway.read_entity(uuid) {
            Ok(record) => record,
            Err(e) => {
                warn!(%uuid, "Could not read remote entity {uuid}: {e}");
                None
            }
        }
    }
}

/// Materializes Content Hub records as local entities.
#[derive(Debug)]
pub struct ImportCoordinator<'a> {
    ctx: SyncContext<'a>,
}

impl<'a> ImportCoordinator<'a> {
    /// Creates a coordinator.
    pub fn new(ctx: SyncContext<'a>) -> Self {
        Self { ctx }
    }

    /// Imports the record `uuid` and its dependencies.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotFound`] if Content Hub has no such record
    /// - [`SyncError::SelfOrigin`] if this site authored it; nothing is
    ///   written
    /// - [`SyncError::Transport`] if the root could not be fetched
    /// - [`SyncError::Denormalize`] if the root record is unusable
    /// - [`SyncError::LocalStore`] if a local save failed
    ///
    /// Dependencies that are missing or unusable are skipped and listed
    /// in the report.
    pub fn import_entity(&self, uuid: Uuid, mode: ImportMode) -> SyncResult<ImportReport> {
        let root = match self.ctx.gateway.read_entity(uuid) {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(%uuid, "remote entity not found");
                return Err(SyncError::NotFound { uuid });
            }
            Err(e) => {
                error!(%uuid, "Could not read remote entity {uuid}: {e}");
                return Err(e);
            }
        };
        if root.origin() == self.ctx.origin {
            warn!(%uuid, "refusing to import an entity that originates from this site");
            return Err(SyncError::SelfOrigin { uuid });
        }

        let mut report = ImportReport::new(uuid);
        report.trace.push(ImportState::Fetched);
        match self.run(root, mode, &mut report) {
            Ok(()) => {
                report.trace.push(ImportState::Done);
                info!(
                    %uuid,
                    materialized = report.materialized.len(),
                    skipped = report.skipped.len(),
                    "import finished"
                );
                Ok(report)
            }
            Err(e) => {
                report.trace.push(ImportState::Failed);
                error!(%uuid, trace = ?report.trace, "Import of {uuid} failed: {e}");
                Err(e)
            }
        }
    }

    fn run(&self, root: CdfRecord, mode: ImportMode, report: &mut ImportReport) -> SyncResult<()> {
        let resolver = GatewayResolver { ctx: &self.ctx };
        let graph = DependencyGraph::expand(root, &resolver, &self.ctx.config.graph_options());
        for &uuid in graph.missing() {
            report.skipped.push(SkippedImport {
                uuid,
                reason: ImportSkip::Missing,
            });
        }

        let mut processed = HashSet::new();
        for node in graph.pre_dependencies() {
            self.materialize_dependency(&node.record, None, mode, &mut processed, report)?;
        }
        report.trace.push(ImportState::PreDependenciesResolved);

        processed.insert(graph.root().uuid());
        match self.materialize(graph.root(), None, mode)? {
            Materialized::Saved(entity) => report.materialized.push(entity),
            Materialized::Skipped(reason) => {
                debug!(uuid = %graph.root().uuid(), %reason, "root not materialized");
                report.skipped.push(SkippedImport {
                    uuid: graph.root().uuid(),
                    reason,
                });
            }
        }
        report.trace.push(ImportState::SelfMaterialized);

        for node in graph.post_dependencies() {
            let host = self.ctx.store.load_by_uuid(node.host)?.and_then(|h| h.host_ref());
            if host.is_none() {
                processed.insert(node.uuid());
                report.skipped.push(SkippedImport {
                    uuid: node.uuid(),
                    reason: ImportSkip::HostUnavailable,
                });
                continue;
            }
            self.materialize_dependency(&node.record, host, mode, &mut processed, report)?;
        }
        report.trace.push(ImportState::PostDependenciesResolved);
        Ok(())
    }

    fn materialize_dependency(
        &self,
        record: &CdfRecord,
        host: Option<HostRef>,
        mode: ImportMode,
        processed: &mut HashSet<Uuid>,
        report: &mut ImportReport,
    ) -> SyncResult<()> {
        let uuid = record.uuid();
        if !processed.insert(uuid) {
            return Ok(());
        }
        let reason = match self.materialize(record, host, mode) {
            Ok(Materialized::Saved(entity)) => {
                report.materialized.push(entity);
                return Ok(());
            }
            Ok(Materialized::Skipped(reason)) => reason,
            Err(SyncError::Denormalize { message, .. }) => ImportSkip::Invalid(message),
            Err(e) => return Err(e),
        };
        debug!(%uuid, %reason, "dependency not materialized");
        report.skipped.push(SkippedImport { uuid, reason });
        Ok(())
    }

    fn materialize(
        &self,
        record: &CdfRecord,
        host: Option<HostRef>,
        mode: ImportMode,
    ) -> SyncResult<Materialized> {
        let uuid = record.uuid();
        if record.origin() == self.ctx.origin {
            return Ok(Materialized::Skipped(ImportSkip::LocalOrigin));
        }

        let row = self.ctx.tracker.load_imported_by_uuid(uuid)?;
        let existing = self.ctx.store.load_by_uuid(uuid)?;
        match (&row, &existing) {
            (Some(row), _) if mode == ImportMode::Automatic => match row.status {
                SyncStatus::AutoUpdateDisabled => {
                    return Ok(Materialized::Skipped(ImportSkip::AutoUpdateDisabled))
                }
                SyncStatus::AutoUpdateLocalChange => {
                    return Ok(Materialized::Skipped(ImportSkip::LocalChange))
                }
                _ => {}
            },
            (None, Some(_)) => return Ok(Materialized::Skipped(ImportSkip::LocallyAuthored)),
            _ => {}
        }
        if let (Some(row), Some(_)) = (&row, &existing) {
            if record.modified() <= row.modified {
                return Ok(Materialized::Skipped(ImportSkip::UpToDate));
            }
        }

        let entity = self.ctx.mapper.denormalize(record, existing.as_ref(), host)?;
        let entity_type = entity.entity_type.clone();
        let id = self
            .ctx
            .store
            .save(entity, SaveMode::Synchronized)
            .map_err(|e| {
                error!(%uuid, "Could not save imported entity {uuid}: {e}");
                e
            })?;

        let status = row
            .map(|row| row.status)
            .unwrap_or(SyncStatus::AutoUpdateEnabled);
        self.ctx.tracker.record_import(
            &TrackedEntity::new(entity_type.clone(), id, uuid),
            status,
            record.modified(),
            record.origin(),
        )?;
        debug!(%uuid, entity_type = %entity_type, entity_id = id, "materialized entity");

        Ok(Materialized::Saved(ImportedEntity {
            uuid,
            entity_type,
            entity_id: id,
            action: if existing.is_some() {
                ChangeAction::Update
            } else {
                ChangeAction::Insert
            },
        }))
    }

    /// Flags an imported entity as changed locally.
    ///
    /// Call for local, non-synchronized edits. Returns true if the
    /// entity stopped accepting automatic updates.
    pub fn note_local_change(&self, entity: &LocalEntity) -> SyncResult<bool> {
        let changed = self.ctx.tracker.mark_local_change(entity.uuid)?;
        if changed {
            info!(uuid = %entity.uuid, "imported entity changed locally, automatic updates paused");
        }
        Ok(changed)
    }
}
