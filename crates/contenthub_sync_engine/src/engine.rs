//! The sync engine facade.

use crate::config::HubConfig;
use crate::context::SyncContext;
use crate::entity::{ChangeAction, EntityChange, LocalEntity};
use crate::error::SyncResult;
use crate::export::{ExportCoordinator, ExportOutcome, ExportReport};
use crate::gateway::RemoteGateway;
use crate::import::{ImportCoordinator, ImportMode, ImportReport};
use crate::mapping::EntityMapper;
use crate::store::LocalEntityStore;
use crate::webhook::{self, WebhookAction, WebhookOutcome, WebhookPayload};
use contenthub_state::{StateStore, SyncStateTracker};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Counters for the lifetime of an engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Batches accepted by Content Hub.
    pub exports_sent: u64,
    /// Changes that were not exported.
    pub exports_skipped: u64,
    /// Exports that failed.
    pub exports_failed: u64,
    /// Import runs that completed.
    pub imports_completed: u64,
    /// Import runs that failed.
    pub imports_failed: u64,
    /// Webhooks handled.
    pub webhooks_handled: u64,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Connects a site to Content Hub.
///
/// Owns the configuration, sync state, gateway, local store, and mapper,
/// and hands borrowed views of them to the export and import
/// coordinators.
pub struct SyncEngine<G: RemoteGateway, S: LocalEntityStore> {
    config: HubConfig,
    origin: Uuid,
    tracker: SyncStateTracker,
    gateway: Arc<G>,
    store: Arc<S>,
    mapper: EntityMapper,
    stats: RwLock<SyncStats>,
}

impl<G: RemoteGateway, S: LocalEntityStore> SyncEngine<G, S> {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// [`SyncError::Configuration`](crate::SyncError::Configuration) if
    /// the connection settings are incomplete.
    pub fn new(
        config: HubConfig,
        state: Box<dyn StateStore>,
        gateway: G,
        store: S,
    ) -> SyncResult<Self> {
        Self::with_shared(config, state, Arc::new(gateway), Arc::new(store))
    }

    /// Creates an engine over collaborators shared with the caller.
    pub fn with_shared(
        config: HubConfig,
        state: Box<dyn StateStore>,
        gateway: Arc<G>,
        store: Arc<S>,
    ) -> SyncResult<Self> {
        let origin = config.validate()?;
        let tracker = SyncStateTracker::with_entity_types(state, config.entity_types.clone());
        let mapper = EntityMapper::new(
            config.field_types.clone(),
            config.excluded_fields.clone(),
            config.resource_base_url.clone(),
        );
        info!(
            %origin,
            hostname = %config.connection.hostname,
            depth = config.dependency_depth,
            "sync engine ready"
        );
        Ok(Self {
            config,
            origin,
            tracker,
            gateway,
            store,
            mapper,
            stats: RwLock::new(SyncStats::default()),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Returns the UUID of this site.
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Returns the sync state tracker.
    pub fn tracker(&self) -> &SyncStateTracker {
        &self.tracker
    }

    /// Returns the gateway.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Returns the local store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the mapper.
    pub fn mapper(&self) -> &EntityMapper {
        &self.mapper
    }

    /// Returns the counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns a borrowed view for the coordinators.
    pub fn context(&self) -> SyncContext<'_> {
        SyncContext {
            config: &self.config,
            origin: self.origin,
            tracker: &self.tracker,
            gateway: self.gateway.as_ref(),
            store: self.store.as_ref(),
            mapper: &self.mapper,
        }
    }

    /// Returns an export coordinator.
    pub fn exporter(&self) -> ExportCoordinator<'_> {
        ExportCoordinator::new(self.context())
    }

    /// Returns an import coordinator.
    pub fn importer(&self) -> ImportCoordinator<'_> {
        ImportCoordinator::new(self.context())
    }

    /// Reacts to a local change.
    ///
    /// A local edit of an imported entity pauses its automatic updates;
    /// then the change is offered for export.
    pub fn on_entity_change(&self, change: &EntityChange) -> ExportOutcome {
        if change.action == ChangeAction::Update && !change.synchronized {
            if let Err(e) = self.importer().note_local_change(&change.entity) {
                warn!(uuid = %change.entity.uuid, "Could not record local change: {e}");
            }
        }
        let outcome = self.exporter().export_entity(change);
        self.count_export(&outcome);
        outcome
    }

    /// Exports every change queued by the local store.
    pub fn process_changes(&self) -> Vec<(Uuid, ExportOutcome)> {
        self.store
            .drain_changes()
            .iter()
            .map(|change| (change.entity.uuid, self.on_entity_change(change)))
            .collect()
    }

    /// Exports several entities in a single batch.
    pub fn export_entities(&self, entities: &[LocalEntity]) -> ExportReport {
        let report = self.exporter().export_entities(entities);
        let mut stats = self.stats.write();
        match (&report.batch, &report.failure) {
            (_, Some(e)) => {
                stats.exports_failed += 1;
                stats.last_error = Some(e.to_string());
            }
            (Some(_), None) => stats.exports_sent += 1,
            (None, None) => stats.exports_skipped += 1,
        }
        report
    }

    /// Imports a record and its dependencies on explicit request.
    pub fn import_entity(&self, uuid: Uuid) -> SyncResult<ImportReport> {
        let result = self.importer().import_entity(uuid, ImportMode::Manual);
        self.count_import(&result);
        result
    }

    /// Handles a Content Hub webhook.
    pub fn handle_webhook(&self, payload: &WebhookPayload) -> Vec<WebhookOutcome> {
        let outcomes = webhook::dispatch(self.context(), payload);
        let mut stats = self.stats.write();
        stats.webhooks_handled += 1;
        for outcome in &outcomes {
            match &outcome.action {
                WebhookAction::Imported(_) => stats.imports_completed += 1,
                WebhookAction::ImportFailed(e) => {
                    stats.imports_failed += 1;
                    stats.last_error = Some(e.to_string());
                }
                _ => {}
            }
        }
        outcomes
    }

    /// Forgets all sync state, as when the site leaves Content Hub.
    pub fn disconnect(&self) -> SyncResult<usize> {
        let removed = self.tracker.purge()?;
        info!(origin = %self.origin, removed, "disconnected from Content Hub");
        Ok(removed)
    }

    fn count_export(&self, outcome: &ExportOutcome) {
        let mut stats = self.stats.write();
        match outcome {
            ExportOutcome::Exported(_) | ExportOutcome::Deleted(_) => stats.exports_sent += 1,
            ExportOutcome::Skipped(_) => stats.exports_skipped += 1,
            ExportOutcome::Failed(e) => {
                stats.exports_failed += 1;
                stats.last_error = Some(e.to_string());
            }
        }
    }

    fn count_import(&self, result: &SyncResult<ImportReport>) {
        let mut stats = self.stats.write();
        match result {
            Ok(_) => stats.imports_completed += 1,
            Err(e) => {
                stats.imports_failed += 1;
                stats.last_error = Some(e.to_string());
            }
        }
    }
}

impl<G: RemoteGateway, S: LocalEntityStore> std::fmt::Debug for SyncEngine<G, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("origin", &self.origin)
            .field("tracker", &self.tracker)
            .field("stats", &*self.stats.read())
            .finish_non_exhaustive()
    }
}
