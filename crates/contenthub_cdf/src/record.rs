//! The syndicated form of a single entity.

use crate::asset::Asset;
use crate::attribute::{Attribute, BaseType};
use crate::error::{CdfError, CdfResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// A CDF record.
///
/// `CdfRecord` is what travels between a site and Content Hub for one
/// entity: its global identity, the site that authored it, timestamps,
/// typed attributes, and file assets.
///
/// # Identity
///
/// Two records are equal when their UUIDs are equal, regardless of
/// content. Use [`CdfRecord::same_content`] to compare payloads.
///
/// # Invariants
///
/// - `uuid` is fixed at construction
/// - an attribute name keeps its first declared type
/// - `metadata` never takes part in dependency resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdfRecord {
    uuid: Uuid,
    #[serde(rename = "type")]
    record_type: String,
    origin: Uuid,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    #[serde(default)]
    attributes: BTreeMap<String, Attribute>,
    #[serde(default)]
    assets: Vec<Asset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
}

impl CdfRecord {
    /// Creates an empty record stamped with the current time.
    pub fn new(uuid: Uuid, record_type: impl Into<String>, origin: Uuid) -> Self {
        let now = Utc::now();
        Self {
            uuid,
            record_type: record_type.into(),
            origin,
            created: now,
            modified: now,
            attributes: BTreeMap::new(),
            assets: Vec::new(),
            metadata: None,
        }
    }

    /// Sets the created and modified timestamps.
    #[must_use]
    pub fn with_timestamps(mut self, created: DateTime<Utc>, modified: DateTime<Utc>) -> Self {
        self.created = created;
        self.modified = modified;
        self
    }

    /// Returns the record UUID.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the type discriminator (the entity type).
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Returns the UUID of the authoring site.
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Returns the creation timestamp.
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Returns the last modification timestamp.
    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    /// Sets the attribute `name`.
    ///
    /// Fails when `name` already holds an attribute of another type; the
    /// existing attribute is left as it was.
    pub fn set_attribute(&mut self, name: impl Into<String>, attribute: Attribute) -> CdfResult<()> {
        let name = name.into();
        attribute.validate()?;
        if let Some(existing) = self.attributes.get(&name) {
            if existing.attr_type() != attribute.attr_type() {
                return Err(CdfError::AttributeTypeMismatch {
                    name,
                    existing: existing.attr_type().to_string(),
                    attempted: attribute.attr_type().to_string(),
                });
            }
        }
        self.attributes.insert(name, attribute);
        Ok(())
    }

    /// Returns the attribute `name`.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Returns all attributes in name order.
    pub fn attributes(&self) -> &BTreeMap<String, Attribute> {
        &self.attributes
    }

    /// Appends an asset. Duplicates are kept.
    pub fn add_asset(&mut self, url: impl Into<String>, replace_token: impl Into<String>) {
        self.assets.push(Asset::new(url, replace_token));
    }

    /// Returns the assets in insertion order.
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// Returns the metadata sidecar.
    pub fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    /// Sets the metadata sidecar.
    pub fn set_metadata(&mut self, metadata: Value) {
        self.metadata = Some(metadata);
    }

    /// Returns the UUIDs this record depends on.
    ///
    /// Reference attributes come first (attribute name order, skipping
    /// `excluded` names), then asset tokens. Duplicates and the record's
    /// own UUID are dropped; malformed asset tokens are ignored.
    pub fn reference_uuids(&self, excluded: &BTreeSet<String>) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        seen.insert(self.uuid);

        let from_attributes = self
            .attributes
            .iter()
            .filter(|(name, _)| !excluded.contains(name.as_str()))
            .flat_map(|(_, attribute)| attribute.referenced_uuids());
        let from_assets = self.assets.iter().filter_map(|asset| asset.uuid().ok());

        from_attributes
            .chain(from_assets)
            .filter(|uuid| seen.insert(*uuid))
            .collect()
    }

    /// Replaces asset tokens inside string attribute values.
    ///
    /// `replacement` returns the text to substitute for an asset, or
    /// `None` to leave its token in place.
    pub fn replace_asset_tokens<F>(&mut self, mut replacement: F)
    where
        F: FnMut(&Asset) -> Option<String>,
    {
        let substitutions: Vec<(String, String)> = self
            .assets
            .iter()
            .filter_map(|asset| replacement(asset).map(|text| (asset.replace_token.clone(), text)))
            .collect();
        if substitutions.is_empty() {
            return;
        }

        for attribute in self.attributes.values_mut() {
            if attribute.attr_type().base() != BaseType::String {
                continue;
            }
            for value in attribute.values_mut() {
                substitute(value, &substitutions);
            }
        }
    }

    /// Compares everything except timestamps.
    pub fn same_content(&self, other: &CdfRecord) -> bool {
        self.uuid == other.uuid
            && self.record_type == other.record_type
            && self.origin == other.origin
            && self.attributes == other.attributes
            && self.assets == other.assets
    }

    /// Checks structural rules after decoding.
    pub fn validate(&self) -> CdfResult<()> {
        if self.record_type.is_empty() {
            return Err(CdfError::invalid_record(self.uuid, "empty type"));
        }
        for (name, attribute) in &self.attributes {
            attribute.validate().map_err(|e| {
                CdfError::invalid_record(self.uuid, format!("attribute '{name}': {e}"))
            })?;
        }
        Ok(())
    }
}

fn substitute(value: &mut Value, substitutions: &[(String, String)]) {
    match value {
        Value::String(text) => {
            for (token, replacement) in substitutions {
                if text.contains(token.as_str()) {
                    *text = text.replace(token.as_str(), replacement);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                substitute(item, substitutions);
            }
        }
        _ => {}
    }
}

impl PartialEq for CdfRecord {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for CdfRecord {}

impl Hash for CdfRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}
