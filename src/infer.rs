//! Line schemas from existing JSON
//!
//! [`from_json_example`] infers items from an example document: every scalar
//! becomes a `type=string` item whose `format` records the JSON kind, so the
//! transfer compiler coerces it back, and array elements are merged into one
//! set of `name[]` items.
//!
//! [`from_json_schema`] converts a JSON Schema document back into notation.

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::compiler::DRAFT_07;
use crate::error::{LineschemaError, ParseError, ParseErrorKind, Result};
use crate::item::{Item, Meta};
use crate::schema::Lineschema;
use crate::types::ARRAY_PREFIX;

/// Build a schema with meta id `id` describing `document`
pub fn from_json_example(id: &str, document: &Value) -> Lineschema {
    let mut meta = Meta::new(id);
    meta.version = DRAFT_07.to_string();
    if document.is_array() {
        meta.ty = "array".to_string();
    }

    let mut items = Vec::new();
    collect("", document, &mut items);
    debug!(id = %id, items = items.len(), "inferred line schema");
    Lineschema::new(meta, items)
}

fn collect(prefix: &str, value: &Value, out: &mut Vec<Item>) {
    match value {
        Value::Object(map) => {
            if map.is_empty() && !prefix.is_empty() {
                let mut item = Item::with_type(prefix, "object");
                item.example = Some("{}".to_string());
                push_unique(out, item);
            }
            for (key, child) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                collect(&name, child, out);
            }
        }
        Value::Array(elements) => {
            if elements.is_empty() {
                if !prefix.is_empty() {
                    let mut item = Item::with_type(prefix, "array");
                    item.example = Some("[]".to_string());
                    push_unique(out, item);
                }
                return;
            }
            let element_name = format!("{}{}", prefix, ARRAY_PREFIX);
            for element in elements {
                collect(&element_name, element, out);
            }
        }
        scalar => {
            if prefix.is_empty() {
                return;
            }
            push_unique(out, scalar_item(prefix, scalar));
        }
    }
}

fn scalar_item(fullname: &str, value: &Value) -> Item {
    match value {
        Value::Null => Item::with_type(fullname, "null"),
        Value::Bool(b) => {
            let mut item = Item::new(fullname);
            item.format = Some("boolean".to_string());
            item.example = Some(b.to_string());
            item
        }
        Value::Number(n) => {
            let text = n.to_string();
            let format = if n.is_f64() && text.contains('.') { "float" } else { "int" };
            let mut item = Item::new(fullname);
            item.format = Some(format.to_string());
            item.example = Some(text);
            item
        }
        Value::String(s) => {
            let mut item = Item::new(fullname);
            item.example = Some(s.clone());
            item
        }
        // containers are handled by the caller
        Value::Array(_) | Value::Object(_) => Item::new(fullname),
    }
}

/// First declaration of a fullname wins
fn push_unique(out: &mut Vec<Item>, item: Item) {
    if !out.iter().any(|existing| existing.fullname == item.fullname) {
        out.push(item);
    }
}

// =============================================================================
// From JSON Schema
// =============================================================================

/// Keywords carried onto the item attribute of the same name
const CARRIED_KEYWORDS: &[&str] = &[
    "format",
    "title",
    "description",
    "enum",
    "const",
    "default",
    "pattern",
    "multipleOf",
    "maximum",
    "exclusiveMaximum",
    "minimum",
    "exclusiveMinimum",
    "maxLength",
    "minLength",
    "maxItems",
    "minItems",
    "uniqueItems",
    "maxContains",
    "minContains",
    "maxProperties",
    "minProperties",
    "contentEncoding",
    "contentMediaType",
    "deprecated",
    "readOnly",
    "writeOnly",
    "example",
    "examples",
];

/// Convert a JSON Schema document into a line schema.
///
/// Every node below the root reached through `properties` becomes one item;
/// object elements of arrays are addressed with `[]`. `required` lists are
/// hoisted onto the named items, `$comment` becomes `comment` and `oneOf`
/// titles become `enumNames`. The meta id is `$id`, or `example` when absent.
pub fn from_json_schema(schema: &Value) -> Result<Lineschema> {
    let root = schema
        .as_object()
        .ok_or_else(|| LineschemaError::InvalidSchema("root must be an object".to_string()))?;
    let text = |key: &str| {
        root.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let id = root
        .get("$id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .unwrap_or("example");
    let mut meta = Meta::new(id);
    meta.version = text("$schema");
    meta.description = text("description");
    if node_type(schema) == "array" {
        meta.ty = "array".to_string();
    }

    let mut items = Vec::new();
    walk("", schema, &mut items)?;
    debug!(id = %meta.id, items = items.len(), "converted json schema");
    Ok(Lineschema::new(meta, items))
}

fn walk(prefix: &str, node: &Value, out: &mut Vec<Item>) -> Result<()> {
    if let Some(properties) = node.get("properties").and_then(Value::as_object) {
        let required: Vec<&str> = node
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        for (name, property) in properties {
            let fullname = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", prefix, name)
            };
            let mut item = schema_item(&fullname, property, out.len())?;
            item.required = required.contains(&name.as_str());
            out.push(item);
            walk(&fullname, property, out)?;
        }
    }

    // scalar elements are described on the array item itself
    if let Some(element) = node.get("items").filter(|e| is_container_node(e)) {
        let element_name = format!("{}{}", prefix, ARRAY_PREFIX);
        if node_type(element) == "array" {
            out.push(schema_item(&element_name, element, out.len())?);
        }
        walk(&element_name, element, out)?;
    }
    Ok(())
}

fn node_type(node: &Value) -> &str {
    match node.get("type").and_then(Value::as_str) {
        Some(ty) => ty,
        None if node.get("properties").is_some() => "object",
        None if node.get("items").is_some() => "array",
        None => "string",
    }
}

fn is_container_node(node: &Value) -> bool {
    matches!(node_type(node), "object" | "array")
}

/// One item from a schema node; `index` places it in the notation for errors
fn schema_item(fullname: &str, node: &Value, index: usize) -> Result<Item> {
    // line 1 is the meta line
    let line = index + 2;
    let mut item = Item::with_type(fullname, node_type(node));

    for key in CARRIED_KEYWORDS {
        if let Some(value) = node.get(*key) {
            set_attr(&mut item, key, value, line)?;
        }
    }
    if let Some(value) = node.get("$comment") {
        set_attr(&mut item, "comment", value, line)?;
    }
    if let Some(one_of) = node.get("oneOf").and_then(Value::as_array) {
        let titles: Vec<Value> = one_of.iter().filter_map(|v| v.get("title").cloned()).collect();
        if !titles.is_empty() && titles.len() == one_of.len() {
            item.enum_names = Some(Value::Array(titles).to_string());
        }
    }
    if item.ty == "array" && item.format.is_none() {
        item.format = node
            .get("items")
            .and_then(|e| e.get("format"))
            .and_then(Value::as_str)
            .map(str::to_string);
    }

    if let Some(pattern) = &item.pattern {
        if Regex::new(pattern).is_err() {
            let kind = ParseErrorKind::InvalidPattern {
                value: pattern.clone(),
            };
            return Err(ParseError::new(line, kind).into());
        }
    }
    Ok(item)
}

fn set_attr(item: &mut Item, key: &str, value: &Value, line: usize) -> Result<()> {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    item.set_attr(key, &text)
        .map_err(|kind| ParseError::new(line, kind))?;
    Ok(())
}
