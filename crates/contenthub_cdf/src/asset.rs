//! Binary asset references.

use crate::error::{CdfError, CdfResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A file dependency of a record.
///
/// Attribute values refer to the asset through `replace_token`, which has
/// the literal form `[<uuid>]`. Consumers substitute the token with a
/// local location once the asset has been materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Where the asset can be fetched from.
    pub url: String,
    /// Token embedded in attribute values.
    #[serde(rename = "replace-token")]
    pub replace_token: String,
}

impl Asset {
    /// Creates an asset with an arbitrary token.
    pub fn new(url: impl Into<String>, replace_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            replace_token: replace_token.into(),
        }
    }

    /// Creates an asset whose token points at `uuid`.
    pub fn for_uuid(url: impl Into<String>, uuid: Uuid) -> Self {
        Self::new(url, Self::token_for(uuid))
    }

    /// Formats the replace token for `uuid`.
    pub fn token_for(uuid: Uuid) -> String {
        format!("[{uuid}]")
    }

    /// Parses the UUID out of the replace token.
    pub fn uuid(&self) -> CdfResult<Uuid> {
        self.replace_token
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .and_then(|inner| Uuid::parse_str(inner).ok())
            .ok_or_else(|| CdfError::InvalidToken(self.replace_token.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_roundtrip() {
        let uuid = Uuid::from_u128(0xabc);
        let asset = Asset::for_uuid("https://example.com/a.png", uuid);
        assert_eq!(asset.replace_token, format!("[{uuid}]"));
        assert_eq!(asset.uuid().unwrap(), uuid);
    }

    #[test]
    fn malformed_tokens() {
        for token in ["", "[]", "[not-a-uuid]", "00000000-0000-0000-0000-000000000001"] {
            let asset = Asset::new("u", token);
            assert!(matches!(asset.uuid(), Err(CdfError::InvalidToken(_))));
        }
    }

    #[test]
    fn wire_field_name() {
        let asset = Asset::new("u", "[t]");
        let json = serde_json::to_string(&asset).unwrap();
        assert!(json.contains("\"replace-token\""));
    }
}
