//! Error types for CDF records.

use thiserror::Error;

/// Result type for CDF operations.
pub type CdfResult<T> = Result<T, CdfError>;

/// Errors that can occur while building or decoding CDF records.
#[derive(Debug, Error)]
pub enum CdfError {
    /// An attribute was re-assigned with a different declared type.
    #[error("attribute '{name}' is typed {existing}, cannot assign {attempted}")]
    AttributeTypeMismatch {
        /// Attribute name.
        name: String,
        /// Type already recorded for the name.
        existing: String,
        /// Type of the rejected attribute.
        attempted: String,
    },

    /// A value does not match the attribute's declared type.
    #[error("invalid {attr_type} value: {message}")]
    InvalidValue {
        /// Declared attribute type.
        attr_type: String,
        /// What was wrong with the value.
        message: String,
    },

    /// An attribute type name could not be parsed.
    #[error("unknown attribute type: {0}")]
    UnknownAttributeType(String),

    /// An asset replace token is not of the form `[<uuid>]`.
    #[error("invalid replace token: {0}")]
    InvalidToken(String),

    /// A decoded record violates a structural rule.
    #[error("invalid record {uuid}: {message}")]
    InvalidRecord {
        /// UUID of the offending record.
        uuid: String,
        /// Description of the problem.
        message: String,
    },

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CdfError {
    /// Creates an invalid value error.
    pub fn invalid_value(attr_type: impl ToString, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            attr_type: attr_type.to_string(),
            message: message.into(),
        }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(uuid: impl ToString, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            uuid: uuid.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_display_names_both_types() {
        let err = CdfError::AttributeTypeMismatch {
            name: "title".into(),
            existing: "string".into(),
            attempted: "integer".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("title"));
        assert!(msg.contains("string"));
        assert!(msg.contains("integer"));
    }
}
