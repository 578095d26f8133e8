//! Local entity model.
//!
//! A [`LocalEntity`] is the site's own representation of a piece of
//! content: typed fields holding per-language value lists. The mapper
//! turns it into a CDF record and back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Broad class of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Revisionable, user-authored content. The only kind that is exported.
    Content,
    /// Site configuration.
    Config,
    /// Anything else.
    Other,
}

impl EntityKind {
    /// Resolves the kind of a well-known entity type.
    pub fn of(entity_type: &str) -> Self {
        match entity_type {
            "node" | "taxonomy_term" | "file" | "media" | "paragraph"
            | "field_collection_item" | "block_content" | "user" | "comment" => {
                EntityKind::Content
            }
            t if t.ends_with("_config") || t.ends_with("_type") || t == "view" => {
                EntityKind::Config
            }
            _ => EntityKind::Other,
        }
    }

    /// Returns true for content entities.
    pub fn is_content(&self) -> bool {
        matches!(self, EntityKind::Content)
    }
}

/// A typed field with values per language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Local field type (`string`, `entity_reference`, ...).
    pub field_type: String,
    /// True if the field holds several values.
    pub multiple: bool,
    /// Values keyed by language code.
    pub values: BTreeMap<String, Vec<Value>>,
}

impl Field {
    /// Creates an empty single-valued field.
    pub fn new(field_type: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            multiple: false,
            values: BTreeMap::new(),
        }
    }

    /// Creates an empty multi-valued field.
    pub fn multiple(field_type: impl Into<String>) -> Self {
        Self {
            multiple: true,
            ..Self::new(field_type)
        }
    }

    /// Sets the values for `lang`.
    #[must_use]
    pub fn with_values(mut self, lang: impl Into<String>, values: Vec<Value>) -> Self {
        self.values.insert(lang.into(), values);
        self
    }

    /// Sets a single value for `lang`.
    #[must_use]
    pub fn with_value(self, lang: impl Into<String>, value: Value) -> Self {
        self.with_values(lang, vec![value])
    }
}

/// Back-reference from a dependent entity to its host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRef {
    /// Host entity type.
    pub entity_type: String,
    /// Host local id.
    pub entity_id: u64,
    /// Host UUID.
    pub uuid: Uuid,
}

/// A local CMS entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalEntity {
    /// Kind resolved from `entity_type`.
    pub kind: EntityKind,
    /// Entity type (`node`, `taxonomy_term`, ...).
    pub entity_type: String,
    /// Bundle within the type.
    pub bundle: String,
    /// Local id, `None` until first saved.
    pub id: Option<u64>,
    /// Global identity.
    pub uuid: Uuid,
    /// Default language.
    pub langcode: String,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Last change time.
    pub changed: DateTime<Utc>,
    /// Fields by name.
    pub fields: BTreeMap<String, Field>,
    /// Host, for dependent entities.
    pub host: Option<HostRef>,
}

impl LocalEntity {
    /// Creates an unsaved entity with no fields.
    pub fn new(entity_type: impl Into<String>, bundle: impl Into<String>, uuid: Uuid) -> Self {
        let entity_type = entity_type.into();
        let now = Utc::now();
        Self {
            kind: EntityKind::of(&entity_type),
            entity_type,
            bundle: bundle.into(),
            id: None,
            uuid,
            langcode: String::from("en"),
            created: now,
            changed: now,
            fields: BTreeMap::new(),
            host: None,
        }
    }

    /// Adds or replaces a field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Sets the timestamps.
    #[must_use]
    pub fn with_timestamps(mut self, created: DateTime<Utc>, changed: DateTime<Utc>) -> Self {
        self.created = created;
        self.changed = changed;
        self
    }

    /// Returns the field `name`.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Returns the host back-reference for entities hosted by this one.
    ///
    /// `None` while the entity is unsaved.
    pub fn host_ref(&self) -> Option<HostRef> {
        self.id.map(|entity_id| HostRef {
            entity_type: self.entity_type.clone(),
            entity_id,
            uuid: self.uuid,
        })
    }
}

impl fmt::Display for LocalEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.entity_type, self.bundle, self.uuid)
    }
}

/// What happened to a local entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    /// Created.
    Insert,
    /// Modified.
    Update,
    /// Removed.
    Delete,
}

/// How a save should be reported on the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// An ordinary local edit.
    #[default]
    Local,
    /// A write performed by the importer. Never re-exported.
    Synchronized,
}

/// A change notification from the local store.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityChange {
    /// Entity state after the change (before it, for deletes).
    pub entity: LocalEntity,
    /// What happened.
    pub action: ChangeAction,
    /// True if the change was written by the importer.
    pub synchronized: bool,
}

impl EntityChange {
    /// Creates a change caused by a local edit.
    pub fn local(entity: LocalEntity, action: ChangeAction) -> Self {
        Self {
            entity,
            action,
            synchronized: false,
        }
    }

    /// Creates a change caused by the importer.
    pub fn synchronized(entity: LocalEntity, action: ChangeAction) -> Self {
        Self {
            entity,
            action,
            synchronized: true,
        }
    }
}
