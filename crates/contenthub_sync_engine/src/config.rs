//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use crate::graph::{DependencyClassifier, GraphOptions};
use crate::mapping::FieldTypeMapping;
use contenthub_state::EntityTypeConfig;
use serde::Deserialize;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Default number of host-to-dependency edges followed.
pub const DEFAULT_DEPENDENCY_DEPTH: u32 = 3;

/// Credentials and identity for the Content Hub connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Content Hub hostname.
    pub hostname: String,
    /// API key.
    pub api_key: String,
    /// Secret key.
    pub secret_key: String,
    /// UUID of this site as registered with Content Hub.
    pub origin: Option<Uuid>,
    /// Human-readable client name.
    pub client_name: String,
}

impl ConnectionSettings {
    /// Creates connection settings.
    pub fn new(
        hostname: impl Into<String>,
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        origin: Uuid,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            origin: Some(origin),
            client_name: String::new(),
        }
    }

    /// Checks that every required setting is present.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first missing setting.
    pub fn validate(&self) -> SyncResult<Uuid> {
        let required = [
            ("hostname", &self.hostname),
            ("api key", &self.api_key),
            ("secret key", &self.secret_key),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(SyncError::configuration(format!("missing {name}")));
        }
        match self.origin {
            Some(origin) if !origin.is_nil() => Ok(origin),
            _ => Err(SyncError::configuration("missing origin")),
        }
    }
}

/// Configuration for export and import runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Connection settings.
    pub connection: ConnectionSettings,
    /// Maximum host-to-dependency edges followed on export and import.
    pub dependency_depth: u32,
    /// Record types that are post-dependencies of their host.
    pub dependent_types: BTreeSet<String>,
    /// Reference attributes that never count as dependencies.
    pub excluded_reference_attributes: BTreeSet<String>,
    /// Local fields never exported.
    pub excluded_fields: BTreeSet<String>,
    /// Export allow-list by entity type and bundle.
    pub entity_types: EntityTypeConfig,
    /// Local field type to attribute type table.
    pub field_types: FieldTypeMapping,
    /// Base URL of this site, used for resource and asset URLs.
    pub resource_base_url: String,
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings::default(),
            dependency_depth: DEFAULT_DEPENDENCY_DEPTH,
            dependent_types: names(&["paragraph", "field_collection_item"]),
            excluded_reference_attributes: names(&["author", "parent", "comments", "host_entity"]),
            excluded_fields: names(&["id", "revision_id", "uuid", "created", "changed"]),
            entity_types: EntityTypeConfig::default(),
            field_types: FieldTypeMapping::default(),
            resource_base_url: String::from("http://localhost"),
        }
    }
}

impl HubConfig {
    /// Creates a configuration with default sync settings.
    pub fn new(connection: ConnectionSettings) -> Self {
        Self {
            connection,
            ..Self::default()
        }
    }

    /// Loads a configuration from JSON. Missing keys take defaults.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SyncError::configuration(format!("invalid configuration: {e}")))
    }

    /// Sets the dependency depth.
    #[must_use]
    pub fn with_dependency_depth(mut self, depth: u32) -> Self {
        self.dependency_depth = depth;
        self
    }

    /// Adds a post-dependency record type.
    #[must_use]
    pub fn with_dependent_type(mut self, record_type: impl Into<String>) -> Self {
        self.dependent_types.insert(record_type.into());
        self
    }

    /// Sets the export allow-list.
    #[must_use]
    pub fn with_entity_types(mut self, entity_types: EntityTypeConfig) -> Self {
        self.entity_types = entity_types;
        self
    }

    /// Sets the field type mapping.
    #[must_use]
    pub fn with_field_types(mut self, field_types: FieldTypeMapping) -> Self {
        self.field_types = field_types;
        self
    }

    /// Sets the site base URL.
    #[must_use]
    pub fn with_resource_base_url(mut self, url: impl Into<String>) -> Self {
        self.resource_base_url = url.into();
        self
    }

    /// Validates the connection and returns the local origin.
    pub fn validate(&self) -> SyncResult<Uuid> {
        self.connection.validate()
    }

    /// Returns the graph walk options derived from this configuration.
    pub fn graph_options(&self) -> GraphOptions {
        GraphOptions {
            max_depth: self.dependency_depth,
            classifier: DependencyClassifier::new(self.dependent_types.iter().cloned()),
            excluded_attributes: self.excluded_reference_attributes.clone(),
        }
    }

    fn base_url(&self) -> &str {
        self.resource_base_url.trim_end_matches('/')
    }

    /// Builds the CDF resource URL for a single entity.
    pub fn entity_resource_url(&self, entity_type: &str, entity_id: u64) -> String {
        format!("{}/contenthub/cdf/{entity_type}/{entity_id}", self.base_url())
    }

    /// Builds the CDF resource URL for a batch of records.
    pub fn batch_resource_url(&self, uuids: &[Uuid]) -> String {
        let list: Vec<String> = uuids.iter().map(Uuid::to_string).collect();
        format!("{}/contenthub/cdf?uuids={}", self.base_url(), list.join(","))
    }

    /// Builds the public URL of a file asset.
    pub fn asset_url(&self, uuid: Uuid) -> String {
        format!("{}/contenthub/asset/{uuid}", self.base_url())
    }
}
