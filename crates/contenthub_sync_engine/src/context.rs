//! Shared collaborators for a sync run.

use crate::config::HubConfig;
use crate::gateway::RemoteGateway;
use crate::mapping::EntityMapper;
use crate::store::LocalEntityStore;
use contenthub_state::SyncStateTracker;
use uuid::Uuid;

/// Everything a coordinator needs, borrowed from the engine.
#[derive(Clone, Copy)]
pub struct SyncContext<'a> {
    /// Validated configuration.
    pub config: &'a HubConfig,
    /// UUID of this site.
    pub origin: Uuid,
    /// Sync state.
    pub tracker: &'a SyncStateTracker,
    /// Content Hub.
    pub gateway: &'a dyn RemoteGateway,
    /// Local entities.
    pub store: &'a dyn LocalEntityStore,
    /// Field mapper.
    pub mapper: &'a EntityMapper,
}

impl std::fmt::Debug for SyncContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("origin", &self.origin)
            .field("dependency_depth", &self.config.dependency_depth)
            .finish_non_exhaustive()
    }
}
