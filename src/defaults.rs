//! Default skeletons, default merging and example documents

use serde_json::{Map, Value};

use crate::schema::Lineschema;
use crate::types::{coerce_text, FormatTable, ARRAY_PREFIX};

// =============================================================================
// Default skeleton
// =============================================================================

/// Collect declared defaults from a JSON Schema into a skeleton document.
///
/// A node with `default` yields it verbatim. Objects yield their properties'
/// defaults (properties without one are left out). Arrays wrap the default of
/// `items` in a one-element array. Everything else yields `None`.
pub fn generate_default(schema: &Value) -> Option<Value> {
    if let Some(default) = schema.get("default") {
        return Some(default.clone());
    }
    match schema.get("type").and_then(Value::as_str) {
        Some("object") => {
            let properties = schema.get("properties")?.as_object()?;
            let out: Map<String, Value> = properties
                .iter()
                .filter_map(|(name, prop)| generate_default(prop).map(|d| (name.clone(), d)))
                .collect();
            Some(Value::Object(out))
        }
        Some("array") => {
            let element = generate_default(schema.get("items")?)?;
            Some(Value::Array(vec![element]))
        }
        _ => None,
    }
}

// =============================================================================
// Merge
// =============================================================================

/// Fill `document` with `defaults` wherever the document is absent, null or
/// an empty string.
///
/// Present non-empty values are never touched. An array in `defaults` applies
/// its first element to every element the document already has; an absent
/// array receives nothing.
pub fn merge_default(document: &mut Value, defaults: &Value) {
    if is_blank(document) {
        if let Some(filled) = prune(defaults) {
            *document = filled;
        }
        return;
    }
    match (document, defaults) {
        (Value::Object(doc), Value::Object(defs)) => {
            for (key, default) in defs {
                if doc.get(key).map_or(true, is_blank) {
                    if let Some(filled) = prune(default) {
                        doc.insert(key.clone(), filled);
                    }
                } else if let Some(current) = doc.get_mut(key) {
                    merge_default(current, default);
                }
            }
        }
        (Value::Array(doc), Value::Array(defs)) => {
            if let Some(element_default) = defs.first() {
                for element in doc.iter_mut() {
                    merge_default(element, element_default);
                }
            }
        }
        _ => {}
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// The part of a default value that can be written into an absent slot:
/// blank leaves and arrays are dropped, objects only survive with content
fn prune(value: &Value) -> Option<Value> {
    match value {
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .iter()
                .filter_map(|(k, v)| prune(v).map(|p| (k.clone(), p)))
                .collect();
            (!kept.is_empty()).then_some(Value::Object(kept))
        }
        Value::Array(_) => None,
        v if is_blank(v) => None,
        v => Some(v.clone()),
    }
}

// =============================================================================
// Example
// =============================================================================

/// Build an example document straight from the items.
///
/// Each item contributes `examples` (first element when it is a JSON array),
/// else `example`, else `default`, else a zero value (`0` for integers, `""`
/// for strings). Values are coerced into the item's effective type and written
/// at the fullname with every `[]` addressing element 0.
pub fn json_example(schema: &Lineschema, formats: &FormatTable) -> Value {
    let mut root = Value::Null;

    for item in schema.items() {
        let ty = item
            .format
            .as_deref()
            .and_then(|f| formats.canonical(f))
            .unwrap_or(item.ty.as_str());

        let value = if let Some(examples) = &item.examples {
            match serde_json::from_str::<Value>(examples) {
                Ok(Value::Array(values)) if !values.is_empty() && ty != "array" => {
                    match &values[0] {
                        Value::String(s) => Some(coerce_text(s, ty)),
                        other => Some(other.clone()),
                    }
                }
                _ => Some(coerce_text(examples, ty)),
            }
        } else if let Some(text) = item.example.as_ref().or(item.default.as_ref()) {
            Some(coerce_text(text, ty))
        } else {
            zero_value(ty)
        };

        if let Some(value) = value {
            write_at(&mut root, &steps(&item.fullname), value);
        }
    }

    if root.is_null() {
        root = if schema.is_array_root() {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        };
    }
    root
}

fn zero_value(ty: &str) -> Option<Value> {
    match ty {
        "int" | "integer" => Some(Value::from(0)),
        "string" => Some(Value::String(String::new())),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Key(String),
    First,
}

fn steps(fullname: &str) -> Vec<Step> {
    let mut out = Vec::new();
    for segment in fullname.trim_matches('.').split('.') {
        let mut name = segment;
        let mut depth = 0;
        while let Some(stripped) = name.strip_suffix(ARRAY_PREFIX) {
            name = stripped;
            depth += 1;
        }
        if !name.is_empty() {
            out.push(Step::Key(name.to_string()));
        }
        out.extend(std::iter::repeat(Step::First).take(depth));
    }
    out
}

/// Child slot for `step`, created as null when missing. A null node turns
/// into the container the step needs; any other mismatch yields `None`.
fn slot<'a>(node: &'a mut Value, step: &Step) -> Option<&'a mut Value> {
    if node.is_null() {
        *node = match step {
            Step::Key(_) => Value::Object(Map::new()),
            Step::First => Value::Array(Vec::new()),
        };
    }
    match (node, step) {
        (Value::Object(map), Step::Key(key)) => Some(map.entry(key.clone()).or_insert(Value::Null)),
        (Value::Array(arr), Step::First) => {
            if arr.is_empty() {
                arr.push(Value::Null);
            }
            arr.first_mut()
        }
        _ => None,
    }
}

/// Write `value` unless something already sits there
fn write_at(root: &mut Value, path: &[Step], value: Value) {
    let mut node = root;
    for step in path {
        node = match slot(node, step) {
            Some(next) => next,
            None => return,
        };
    }
    if node.is_null() {
        *node = value;
    }
}
