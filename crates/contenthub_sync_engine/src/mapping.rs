//! Field mapping between local entities and CDF records.

use crate::entity::{Field, HostRef, LocalEntity};
use crate::error::{SyncError, SyncResult};
use contenthub_cdf::{
    Asset, Attribute, AttributeType, BaseType, CdfRecord, LANGUAGE_UNDEFINED,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Attribute holding the entity bundle.
pub const BUNDLE_ATTRIBUTE: &str = "bundle";

/// Attribute holding the entity default language.
pub const LANGCODE_ATTRIBUTE: &str = "langcode";

const ASSET_FIELD_TYPES: [&str; 2] = ["file", "image"];

/// Immutable table from local field type to attribute base type.
///
/// Multi-valued fields map to `array<T>` of the same base type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldTypeMapping {
    types: BTreeMap<String, BaseType>,
}

impl Default for FieldTypeMapping {
    fn default() -> Self {
        let table: [(&str, BaseType); 19] = [
            ("string", BaseType::String),
            ("text", BaseType::String),
            ("text_long", BaseType::String),
            ("text_with_summary", BaseType::String),
            ("list_string", BaseType::String),
            ("email", BaseType::String),
            ("link", BaseType::String),
            ("integer", BaseType::Integer),
            ("timestamp", BaseType::Integer),
            ("list_integer", BaseType::Integer),
            ("decimal", BaseType::Number),
            ("float", BaseType::Number),
            ("boolean", BaseType::Boolean),
            ("entity_reference", BaseType::Reference),
            ("entity_reference_revisions", BaseType::Reference),
            ("file", BaseType::Reference),
            ("image", BaseType::Reference),
            ("uuid", BaseType::String),
            ("language", BaseType::String),
        ];
        Self {
            types: table
                .iter()
                .map(|(name, base)| (name.to_string(), *base))
                .collect(),
        }
    }
}

impl FieldTypeMapping {
    /// Creates an empty mapping.
    pub fn empty() -> Self {
        Self {
            types: BTreeMap::new(),
        }
    }

    /// Adds or replaces an entry.
    #[must_use]
    pub fn with_type(mut self, field_type: impl Into<String>, base: BaseType) -> Self {
        self.types.insert(field_type.into(), base);
        self
    }

    /// Returns the base type of a local field type.
    pub fn base_type(&self, field_type: &str) -> Option<BaseType> {
        self.types.get(field_type).copied()
    }

    /// Returns the attribute type for a field, honouring cardinality.
    pub fn attribute_type(&self, field: &Field) -> Option<AttributeType> {
        self.base_type(&field.field_type).map(|base| {
            if field.multiple {
                AttributeType::Array(base)
            } else {
                AttributeType::Scalar(base)
            }
        })
    }

    /// Returns the local field type used for attributes with no local
    /// counterpart.
    pub fn canonical_field_type(base: BaseType) -> &'static str {
        match base {
            BaseType::String => "string",
            BaseType::Integer => "integer",
            BaseType::Number => "decimal",
            BaseType::Boolean => "boolean",
            BaseType::Reference => "entity_reference",
        }
    }

    /// Returns true for field types that reference files.
    pub fn is_asset_type(field_type: &str) -> bool {
        ASSET_FIELD_TYPES.contains(&field_type)
    }
}

/// Converts local entities to CDF records and back.
#[derive(Debug, Clone)]
pub struct EntityMapper {
    mapping: FieldTypeMapping,
    excluded_fields: BTreeSet<String>,
    asset_base_url: String,
}

impl EntityMapper {
    /// Creates a mapper.
    pub fn new(
        mapping: FieldTypeMapping,
        excluded_fields: BTreeSet<String>,
        asset_base_url: impl Into<String>,
    ) -> Self {
        Self {
            mapping,
            excluded_fields,
            asset_base_url: asset_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Returns the field type mapping.
    pub fn mapping(&self) -> &FieldTypeMapping {
        &self.mapping
    }

    fn asset_url(&self, uuid: Uuid) -> String {
        format!("{}/contenthub/asset/{uuid}", self.asset_base_url)
    }

    /// Builds the CDF record of `entity`, authored by `origin`.
    ///
    /// # Errors
    ///
    /// [`SyncError::Mapping`] for a field type with no mapping, a value
    /// that does not fit its type, or a field named like a reserved
    /// attribute.
    pub fn normalize(&self, entity: &LocalEntity, origin: Uuid) -> SyncResult<CdfRecord> {
        let mapping_error = |field: &str, message: String| SyncError::Mapping {
            entity: entity.to_string(),
            field: field.to_string(),
            message,
        };

        let mut record = CdfRecord::new(entity.uuid, entity.entity_type.clone(), origin)
            .with_timestamps(entity.created, entity.changed);
        record.set_attribute(
            BUNDLE_ATTRIBUTE,
            Attribute::with_value(AttributeType::STRING, Value::from(entity.bundle.clone()))?,
        )?;
        record.set_attribute(
            LANGCODE_ATTRIBUTE,
            Attribute::with_value(AttributeType::STRING, Value::from(entity.langcode.clone()))?,
        )?;

        for (name, field) in &entity.fields {
            if self.excluded_fields.contains(name) {
                continue;
            }
            if name == BUNDLE_ATTRIBUTE || name == LANGCODE_ATTRIBUTE {
                return Err(mapping_error(name, "field uses a reserved name".into()));
            }
            let attr_type = self.mapping.attribute_type(field).ok_or_else(|| {
                mapping_error(name, format!("unmapped field type {}", field.field_type))
            })?;

            let mut attribute = Attribute::new(attr_type);
            for (lang, values) in &field.values {
                let value = if field.multiple {
                    Value::Array(values.clone())
                } else {
                    match values.as_slice() {
                        [] => continue,
                        [single] => single.clone(),
                        _ => {
                            return Err(mapping_error(
                                name,
                                format!("single-valued field holds {} values", values.len()),
                            ))
                        }
                    }
                };
                attribute
                    .set_value(lang.clone(), value)
                    .map_err(|e| mapping_error(name, e.to_string()))?;
            }

            if FieldTypeMapping::is_asset_type(&field.field_type) {
                for uuid in attribute.referenced_uuids() {
                    let token = Asset::token_for(uuid);
                    if !record.assets().iter().any(|a| a.replace_token == token) {
                        record.add_asset(self.asset_url(uuid), token);
                    }
                }
            }
            record
                .set_attribute(name.clone(), attribute)
                .map_err(|e| mapping_error(name, e.to_string()))?;
        }
        Ok(record)
    }

    /// Builds the local entity for `record`.
    ///
    /// `existing` is the local entity with the same UUID, if any: its id,
    /// creation time, and field types are kept. Asset tokens in string
    /// values are replaced with asset URLs.
    ///
    /// # Errors
    ///
    /// [`SyncError::Denormalize`] if the record has no bundle, if it
    /// disagrees with `existing` on the entity type, or if an attribute
    /// type conflicts with the local field type.
    pub fn denormalize(
        &self,
        record: &CdfRecord,
        existing: Option<&LocalEntity>,
        host: Option<HostRef>,
    ) -> SyncResult<LocalEntity> {
        let uuid = record.uuid();
        let bundle = string_attribute(record, BUNDLE_ATTRIBUTE)
            .ok_or_else(|| SyncError::denormalize(uuid, "missing bundle"))?;

        let mut entity = match existing {
            Some(existing) if existing.entity_type != record.record_type() => {
                return Err(SyncError::denormalize(
                    uuid,
                    format!(
                        "local entity is a {}, record is a {}",
                        existing.entity_type,
                        record.record_type()
                    ),
                ))
            }
            Some(existing) => existing.clone(),
            None => LocalEntity::new(record.record_type(), bundle.clone(), uuid)
                .with_timestamps(record.created(), record.modified()),
        };
        entity.bundle = bundle;
        entity.changed = record.modified();
        if let Some(langcode) = string_attribute(record, LANGCODE_ATTRIBUTE) {
            entity.langcode = langcode;
        }
        if host.is_some() {
            entity.host = host;
        }

        let mut resolved = record.clone();
        resolved.replace_asset_tokens(|asset| Some(asset.url.clone()));

        let mut fields: BTreeMap<String, Field> = entity
            .fields
            .iter()
            .filter(|(name, _)| self.excluded_fields.contains(name.as_str()))
            .map(|(name, field)| (name.clone(), field.clone()))
            .collect();

        for (name, attribute) in resolved.attributes() {
            if name == BUNDLE_ATTRIBUTE || name == LANGCODE_ATTRIBUTE {
                continue;
            }
            let attr_type = attribute.attr_type();
            let field_type = match entity.fields.get(name) {
                Some(local) => match self.mapping.base_type(&local.field_type) {
                    Some(base) if base == attr_type.base() => local.field_type.clone(),
                    _ => {
                        return Err(SyncError::denormalize(
                            uuid,
                            format!(
                                "attribute '{name}' is {attr_type}, local field is {}",
                                local.field_type
                            ),
                        ))
                    }
                },
                None => FieldTypeMapping::canonical_field_type(attr_type.base()).to_string(),
            };

            let values = attribute
                .values()
                .iter()
                .map(|(lang, value)| {
                    let list = match value {
                        Value::Array(items) if attr_type.is_array() => items.clone(),
                        other => vec![other.clone()],
                    };
                    (lang.clone(), list)
                })
                .collect();
            fields.insert(
                name.clone(),
                Field {
                    field_type,
                    multiple: attr_type.is_array(),
                    values,
                },
            );
        }
        entity.fields = fields;
        Ok(entity)
    }
}

fn string_attribute(record: &CdfRecord, name: &str) -> Option<String> {
    record
        .attribute(name)
        .and_then(|a| a.value(LANGUAGE_UNDEFINED))
        .and_then(Value::as_str)
        .map(str::to_string)
}
