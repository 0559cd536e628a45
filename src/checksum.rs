//! Content fingerprints for registered schemas
//!
//! Two registrations under one id are only expected to agree; the checksum of
//! the source text and of the compiled JSON Schema make a disagreement visible.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(data)))
    }

    /// Digest of line-notation source, ignoring the whitespace the parser
    /// strips anyway
    pub fn of_source(text: &str) -> Self {
        Self::from_bytes(crate::parser::compress(text).as_bytes())
    }

    /// Digest of a compiled JSON Schema. `serde_json` keeps object keys
    /// sorted, so equal schemas hash equally.
    pub fn of_schema(schema: &serde_json::Value) -> Self {
        Self::from_bytes(schema.to_string().as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Checksum {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_checksum_ignores_layout() {
        let a = Checksum::of_source("id=a\nfullname=name,format=int");
        let b = Checksum::of_source("id=a\n  fullname=name, format=int\r");
        assert_eq!(a, b);
        assert_ne!(a, Checksum::of_source("id=a\nfullname=name"));
    }

    #[test]
    fn test_schema_checksum_is_key_order_independent() {
        let a = json!({"type": "object", "properties": {"a": {"type": "string"}}});
        let b: serde_json::Value =
            serde_json::from_str(r#"{"properties":{"a":{"type":"string"}},"type":"object"}"#).unwrap();
        assert_eq!(Checksum::of_schema(&a), Checksum::of_schema(&b));
    }

    #[test]
    fn test_short_form() {
        let sum = Checksum::from_bytes(b"lineschema");
        assert_eq!(sum.as_str().len(), 64);
        assert_eq!(sum.short().len(), 12);
        assert!(sum.as_str().starts_with(sum.short()));
    }
}
