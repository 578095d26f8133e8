//! Typed, language-keyed attributes.

use crate::error::{CdfError, CdfResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Language key used for values that are not language specific.
pub const LANGUAGE_UNDEFINED: &str = "und";

/// Scalar type of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseType {
    /// UTF-8 text.
    String,
    /// Whole number.
    Integer,
    /// Any JSON number.
    Number,
    /// `true` / `false`.
    Boolean,
    /// UUID of another record.
    Reference,
}

impl BaseType {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseType::String => "string",
            BaseType::Integer => "integer",
            BaseType::Number => "number",
            BaseType::Boolean => "boolean",
            BaseType::Reference => "reference",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(BaseType::String),
            "integer" => Some(BaseType::Integer),
            "number" => Some(BaseType::Number),
            "boolean" => Some(BaseType::Boolean),
            "reference" => Some(BaseType::Reference),
            _ => None,
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            BaseType::String => value.is_string(),
            BaseType::Integer => value.is_i64() || value.is_u64(),
            BaseType::Number => value.is_number(),
            BaseType::Boolean => value.is_boolean(),
            BaseType::Reference => value
                .as_str()
                .map(|s| Uuid::parse_str(s).is_ok())
                .unwrap_or(false),
        }
    }
}

/// Declared type of an attribute: a scalar or an array of scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AttributeType {
    /// A single value per language.
    Scalar(BaseType),
    /// A list of values per language (`array<T>`).
    Array(BaseType),
}

impl AttributeType {
    /// Shorthand for `Scalar(BaseType::String)`.
    pub const STRING: Self = AttributeType::Scalar(BaseType::String);
    /// Shorthand for `Scalar(BaseType::Integer)`.
    pub const INTEGER: Self = AttributeType::Scalar(BaseType::Integer);
    /// Shorthand for `Scalar(BaseType::Number)`.
    pub const NUMBER: Self = AttributeType::Scalar(BaseType::Number);
    /// Shorthand for `Scalar(BaseType::Boolean)`.
    pub const BOOLEAN: Self = AttributeType::Scalar(BaseType::Boolean);
    /// Shorthand for `Scalar(BaseType::Reference)`.
    pub const REFERENCE: Self = AttributeType::Scalar(BaseType::Reference);

    /// Returns the scalar type, unwrapping arrays.
    pub fn base(&self) -> BaseType {
        match self {
            AttributeType::Scalar(base) | AttributeType::Array(base) => *base,
        }
    }

    /// Returns true for `array<T>` types.
    pub fn is_array(&self) -> bool {
        matches!(self, AttributeType::Array(_))
    }

    /// Returns true for `reference` and `array<reference>`.
    pub fn is_reference(&self) -> bool {
        self.base() == BaseType::Reference
    }

    /// Checks that `value` conforms to this type.
    pub fn validate(&self, value: &Value) -> CdfResult<()> {
        match self {
            AttributeType::Scalar(base) => {
                if base.accepts(value) {
                    Ok(())
                } else {
                    Err(CdfError::invalid_value(self, format!("got {value}")))
                }
            }
            AttributeType::Array(base) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| CdfError::invalid_value(self, "expected an array"))?;
                match items.iter().position(|item| !base.accepts(item)) {
                    Some(index) => Err(CdfError::invalid_value(
                        self,
                        format!("item {index} is not a {}", base.as_str()),
                    )),
                    None => Ok(()),
                }
            }
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::Scalar(base) => f.write_str(base.as_str()),
            AttributeType::Array(base) => write!(f, "array<{}>", base.as_str()),
        }
    }
}

impl FromStr for AttributeType {
    type Err = CdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || CdfError::UnknownAttributeType(s.to_string());
        match s.strip_prefix("array<").and_then(|rest| rest.strip_suffix('>')) {
            Some(inner) => BaseType::from_name(inner)
                .map(AttributeType::Array)
                .ok_or_else(unknown),
            None => BaseType::from_name(s)
                .map(AttributeType::Scalar)
                .ok_or_else(unknown),
        }
    }
}

impl TryFrom<String> for AttributeType {
    type Error = CdfError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AttributeType> for String {
    fn from(value: AttributeType) -> Self {
        value.to_string()
    }
}

/// A typed attribute holding one value per language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    attr_type: AttributeType,
    #[serde(rename = "value", default)]
    values: BTreeMap<String, Value>,
}

impl Attribute {
    /// Creates an attribute with no values.
    pub fn new(attr_type: AttributeType) -> Self {
        Self {
            attr_type,
            values: BTreeMap::new(),
        }
    }

    /// Creates an attribute holding a single language-neutral value.
    pub fn with_value(attr_type: AttributeType, value: Value) -> CdfResult<Self> {
        let mut attribute = Self::new(attr_type);
        attribute.set_value(LANGUAGE_UNDEFINED, value)?;
        Ok(attribute)
    }

    /// Returns the declared type.
    pub fn attr_type(&self) -> AttributeType {
        self.attr_type
    }

    /// Sets the value for `lang`. Rejects values that do not match the type.
    pub fn set_value(&mut self, lang: impl Into<String>, value: Value) -> CdfResult<()> {
        self.attr_type.validate(&value)?;
        self.values.insert(lang.into(), value);
        Ok(())
    }

    /// Returns the value for `lang`.
    pub fn value(&self, lang: &str) -> Option<&Value> {
        self.values.get(lang)
    }

    /// Returns all values keyed by language.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Mutable access for in-place rewrites that keep the value's shape.
    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.values.values_mut()
    }

    /// Re-checks every stored value against the declared type.
    pub fn validate(&self) -> CdfResult<()> {
        self.values
            .values()
            .try_for_each(|value| self.attr_type.validate(value))
    }

    /// Returns every UUID referenced by this attribute, in language order.
    ///
    /// Empty for non-reference types.
    pub fn referenced_uuids(&self) -> Vec<Uuid> {
        if !self.attr_type.is_reference() {
            return Vec::new();
        }
        let mut uuids = Vec::new();
        for value in self.values.values() {
            match value {
                Value::String(s) => uuids.extend(Uuid::parse_str(s).ok()),
                Value::Array(items) => uuids.extend(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .filter_map(|s| Uuid::parse_str(s).ok()),
                ),
                _ => {}
            }
        }
        uuids
    }
}
