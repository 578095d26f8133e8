//! Export allow-list per entity type and bundle.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which entity types and bundles may be exported.
///
/// An empty configuration enables everything. Once any type is listed,
/// only listed types are enabled; a listed type with no bundles enables
/// all of its bundles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityTypeConfig {
    types: BTreeMap<String, BTreeSet<String>>,
}

impl EntityTypeConfig {
    /// Creates a configuration that enables everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables every bundle of `entity_type`.
    #[must_use]
    pub fn enable_type(mut self, entity_type: impl Into<String>) -> Self {
        self.types.entry(entity_type.into()).or_default();
        self
    }

    /// Enables a single bundle of `entity_type`.
    #[must_use]
    pub fn enable_bundle(mut self, entity_type: impl Into<String>, bundle: impl Into<String>) -> Self {
        self.types
            .entry(entity_type.into())
            .or_default()
            .insert(bundle.into());
        self
    }

    /// Returns true if `entity_type`/`bundle` may be exported.
    pub fn is_enabled(&self, entity_type: &str, bundle: &str) -> bool {
        if self.types.is_empty() {
            return true;
        }
        match self.types.get(entity_type) {
            Some(bundles) => bundles.is_empty() || bundles.contains(bundle),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_enables_all() {
        let config = EntityTypeConfig::new();
        assert!(config.is_enabled("node", "article"));
        assert!(config.is_enabled("taxonomy_term", "tags"));
    }

    #[test]
    fn listed_types_only() {
        let config = EntityTypeConfig::new()
            .enable_type("taxonomy_term")
            .enable_bundle("node", "article");
        assert!(config.is_enabled("taxonomy_term", "tags"));
        assert!(config.is_enabled("node", "article"));
        assert!(!config.is_enabled("node", "page"));
        assert!(!config.is_enabled("user", "user"));
    }

    #[test]
    fn deserializes_from_map() {
        let config: EntityTypeConfig =
            serde_json::from_str(r#"{"node": ["article"], "file": []}"#).unwrap();
        assert!(config.is_enabled("file", "image"));
        assert!(!config.is_enabled("node", "page"));
    }
}
