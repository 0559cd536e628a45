//! Type vocabulary shared by the compiler stages
//!
//! Item types come in three shapes:
//! - a base type from the closed set (`string`, `int`, `object`, ...)
//! - an array-decorated type `[]T`
//! - anything else, which names another item's fullname and acts as a
//!   structure template

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Closed base type set, including the accepted aliases
pub const BASE_TYPES: &[&str] = &[
    "string", "int", "integer", "float", "number", "bool", "boolean", "object", "array", "null",
];

/// Prefix marking an array-decorated type
pub const ARRAY_PREFIX: &str = "[]";

pub fn is_base_type(ty: &str) -> bool {
    BASE_TYPES.contains(&ty)
}

/// Element type of `[]T`, or `None` for anything else
pub fn array_element(ty: &str) -> Option<&str> {
    ty.strip_prefix(ARRAY_PREFIX)
}

/// True for a named-structure reference (neither base nor array-decorated)
pub fn is_user_type(ty: &str) -> bool {
    !ty.is_empty() && !is_base_type(ty) && array_element(ty).is_none()
}

pub fn is_container(ty: &str) -> bool {
    matches!(ty, "object" | "array")
}

/// JSON Schema `type` keyword for an item type
pub fn json_type(ty: &str) -> Option<&'static str> {
    match ty {
        "string" => Some("string"),
        "int" | "integer" => Some("integer"),
        "float" | "number" => Some("number"),
        "bool" | "boolean" => Some("boolean"),
        "object" => Some("object"),
        "array" => Some("array"),
        "null" => Some("null"),
        _ => None,
    }
}

/// Value-coercion function appended to a source path, keyed by destination type
pub fn coercion_suffix(ty: &str) -> Option<&'static str> {
    match ty {
        "int" | "integer" | "number" | "float" => Some(".@tonum"),
        "bool" | "boolean" => Some(".@tobool"),
        "string" => Some(".@tostring"),
        _ => None,
    }
}

/// Parse attribute text into a JSON value of the given item type. Text that
/// does not fit the type is kept as a string.
pub fn coerce_text(text: &str, ty: &str) -> Value {
    match ty {
        "int" | "integer" | "number" | "float" => {
            if let Ok(n) = text.parse::<i64>() {
                return Value::from(n);
            }
            text.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(text.to_string()))
        }
        "bool" | "boolean" => match text {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text.to_string()),
        },
        "object" | "array" => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        }
        "null" => Value::Null,
        _ => Value::String(text.to_string()),
    }
}

// =============================================================================
// Format table
// =============================================================================

/// One `format -> canonical type` row, as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatMapping {
    pub format: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// Maps a `format` attribute to the canonical type used for coercion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatTable {
    entries: BTreeMap<String, String>,
}

impl Default for FormatTable {
    fn default() -> Self {
        let builtin = [
            ("int", "int"),
            ("number", "number"),
            ("float", "number"),
            ("bool", "bool"),
            ("boolean", "bool"),
            ("time", "string"),
            ("datetime", "string"),
            ("date", "string"),
            ("email", "string"),
            ("phone", "string"),
            ("string", "string"),
        ];
        Self {
            entries: builtin
                .iter()
                .map(|(f, t)| (f.to_string(), t.to_string()))
                .collect(),
        }
    }
}

impl FormatTable {
    /// Built-in table extended (or overridden) by extra rows
    pub fn with_mappings<'a>(mappings: impl IntoIterator<Item = &'a FormatMapping>) -> Self {
        let mut table = Self::default();
        for m in mappings {
            table.insert(&m.format, &m.ty);
        }
        table
    }

    pub fn insert(&mut self, format: &str, ty: &str) {
        self.entries.insert(format.to_string(), ty.to_string());
    }

    /// Canonical type for a format, `None` when the format is not recognized
    pub fn canonical(&self, format: &str) -> Option<&str> {
        self.entries.get(format).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
