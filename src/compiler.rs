//! JSON Schema compiler
//!
//! Walks each flattened item's fullname segment by segment and writes its
//! facets at the addressed node. A segment is `name` followed by zero or more
//! `[]` markers: the name routes through `properties`, each marker through
//! `items`.
//!
//! Writes are first-write-wins, so item order matters: an earlier leaf is never
//! overwritten by a later container line.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::item::{is_descendant, Exclusive, Item};
use crate::schema::Lineschema;
use crate::types::{coerce_text, json_type, ARRAY_PREFIX};

/// Draft-07 metaschema URI
pub const DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

/// Compiler switches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerSettings {
    /// Emit `$schema`, `$id` and the meta description at the root
    #[serde(default)]
    pub emit_meta_keywords: bool,
}

/// Compile a flattened schema into a JSON Schema document
pub fn compile_json_schema(schema: &Lineschema, settings: &CompilerSettings) -> Value {
    let items = schema.items();
    let mut root = SchemaNode::default();

    for item in items {
        let has_children = items.iter().any(|other| is_descendant(&other.fullname, &item.fullname));
        write_item(&mut root, item, has_children);
    }

    let root_type = match schema.meta().ty.as_str() {
        "" => {
            if schema.is_array_root() {
                "array"
            } else {
                "object"
            }
        }
        ty => json_type(ty).unwrap_or("object"),
    };
    root.set_if_absent("type", json!(root_type));

    let mut value = root.into_value();
    if settings.emit_meta_keywords {
        if let Value::Object(map) = &mut value {
            let meta = schema.meta();
            let version = if meta.version.is_empty() { DRAFT_07 } else { meta.version.as_str() };
            map.entry("$schema").or_insert_with(|| json!(version));
            if !meta.id.is_empty() {
                map.entry("$id").or_insert_with(|| json!(meta.id));
            }
            if !meta.description.is_empty() {
                map.entry("description").or_insert_with(|| json!(meta.description));
            }
        }
    }

    debug!(id = %schema.id(), items = items.len(), "compiled json schema");
    value
}

// =============================================================================
// Schema tree
// =============================================================================

#[derive(Debug, Default)]
struct SchemaNode {
    keywords: Map<String, Value>,
    properties: BTreeMap<String, SchemaNode>,
    items: Option<Box<SchemaNode>>,
    required: Vec<String>,
}

impl SchemaNode {
    fn set_if_absent(&mut self, key: &str, value: Value) {
        self.keywords.entry(key).or_insert(value);
    }

    fn property(&mut self, name: &str) -> &mut SchemaNode {
        self.set_if_absent("type", json!("object"));
        self.properties.entry(name.to_string()).or_default()
    }

    fn element(&mut self) -> &mut SchemaNode {
        self.set_if_absent("type", json!("array"));
        self.items.get_or_insert_with(Box::default)
    }

    fn require(&mut self, name: &str) {
        if !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
    }

    fn into_value(self) -> Value {
        let mut map = self.keywords;
        if !self.properties.is_empty() && !map.contains_key("properties") {
            let props: Map<String, Value> = self
                .properties
                .into_iter()
                .map(|(name, node)| (name, node.into_value()))
                .collect();
            map.insert("properties".to_string(), Value::Object(props));
        }
        if let Some(items) = self.items {
            map.entry("items").or_insert_with(|| items.into_value());
        }
        if !self.required.is_empty() {
            map.entry("required").or_insert_with(|| json!(self.required));
        }
        Value::Object(map)
    }
}

/// Split `name[][]` into `("name", 2)`
fn split_segment(segment: &str) -> (&str, usize) {
    let mut name = segment;
    let mut depth = 0;
    while let Some(stripped) = name.strip_suffix(ARRAY_PREFIX) {
        name = stripped;
        depth += 1;
    }
    (name, depth)
}

fn write_item(root: &mut SchemaNode, item: &Item, has_children: bool) {
    let fullname = item.fullname.trim_matches('.');
    let segments: Vec<&str> = fullname.split('.').collect();
    let last = segments.len() - 1;

    let mut node = root;
    for (i, segment) in segments.iter().enumerate() {
        let (name, depth) = split_segment(segment);
        if !name.is_empty() {
            if i == last && item.required {
                node.require(name);
            }
            node = node.property(name);
        }
        for _ in 0..depth {
            node = node.element();
        }
    }

    for (key, value) in facets(item) {
        node.set_if_absent(&key, value);
    }

    // a declared scalar array describes its elements: wire strings, with the
    // format that drives their coercion
    if item.ty == "array" && !has_children && node.items.is_none() {
        let mut elem = SchemaNode::default();
        elem.set_if_absent("type", json!("string"));
        if let Some(format) = &item.format {
            elem.set_if_absent("format", json!(format));
        }
        node.items = Some(Box::new(elem));
    }
}

// =============================================================================
// Facets
// =============================================================================

/// Keywords written at an item's terminal node, in a fixed order
fn facets(item: &Item) -> Vec<(String, Value)> {
    let mut out: Vec<(String, Value)> = Vec::new();
    let mut put = |key: &str, value: Value| out.push((key.to_string(), value));
    let jtype = json_type(&item.ty);

    if let Some(t) = jtype {
        put("type", json!(t));
    }
    let value_type = jtype.map(|_| item.ty.as_str()).unwrap_or("string");

    if let Some(v) = &item.format {
        put("format", json!(v));
    }
    if let Some(v) = &item.title {
        put("title", json!(v));
    }
    if let Some(v) = &item.description {
        put("description", json!(v));
    }
    if let Some(v) = &item.comment {
        put("$comment", json!(v));
    }

    if let Some(raw) = &item.enum_values {
        let values = parse_list(raw, value_type);
        if let Some(names) = item.enum_names.as_deref().map(|n| parse_list(n, "string")) {
            let one_of: Vec<Value> = values
                .iter()
                .zip(names.iter())
                .map(|(value, title)| json!({"const": value, "title": title}))
                .collect();
            if !one_of.is_empty() {
                put("oneOf", Value::Array(one_of));
            }
        }
        put("enum", Value::Array(values));
    }
    if let Some(v) = &item.const_value {
        put("const", coerce_text(v, value_type));
    }
    if let Some(v) = &item.default {
        put("default", coerce_text(v, value_type));
    }
    if let Some(v) = &item.pattern {
        put("pattern", json!(v));
    }

    if let Some(v) = &item.multiple_of {
        put("multipleOf", Value::Number(v.clone()));
    }
    bound(&mut put, "maximum", "exclusiveMaximum", &item.maximum, &item.exclusive_maximum);
    bound(&mut put, "minimum", "exclusiveMinimum", &item.minimum, &item.exclusive_minimum);

    let counts = [
        ("maxLength", item.max_length),
        ("minLength", item.min_length),
        ("maxItems", item.max_items),
        ("minItems", item.min_items),
        ("maxProperties", item.max_properties),
        ("minProperties", item.min_properties),
    ];
    for (key, value) in counts {
        if let Some(n) = value {
            put(key, json!(n));
        }
    }

    if item.unique_items {
        put("uniqueItems", json!(true));
    }
    if item.read_only {
        put("readOnly", json!(true));
    }
    if item.write_only {
        put("writeOnly", json!(true));
    }
    if let Some(v) = &item.content_encoding {
        put("contentEncoding", json!(v));
    }
    if let Some(v) = &item.content_media_type {
        put("contentMediaType", json!(v));
    }
    out
}

/// `maximum` plus the boolean exclusive flag becomes the numeric draft-07 form
fn bound(
    put: &mut impl FnMut(&str, Value),
    inclusive_key: &str,
    exclusive_key: &str,
    limit: &Option<serde_json::Number>,
    exclusive: &Option<Exclusive>,
) {
    match (limit, exclusive) {
        (Some(n), Some(Exclusive::Flag)) => put(exclusive_key, Value::Number(n.clone())),
        (limit, other) => {
            if let Some(n) = limit {
                put(inclusive_key, Value::Number(n.clone()));
            }
            if let Some(Exclusive::Value(n)) = other {
                put(exclusive_key, Value::Number(n.clone()));
            }
        }
    }
}

/// A JSON array, or else a comma-separated list whose entries are coerced
/// into `ty`
pub fn parse_list(raw: &str, ty: &str) -> Vec<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(values)) => values,
        _ => raw
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| coerce_text(s, ty))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(text: &str) -> Value {
        let schema = Lineschema::parse(text).unwrap();
        compile_json_schema(&schema, &CompilerSettings::default())
    }

    #[test]
    fn test_nested_arrays_and_objects() {
        let schema = compile(
            "id=list
            fullname=items[].id,type=int,required
            fullname=items[].title
            fullname=pagination.total,type=int",
        );
        assert_eq!(
            schema,
            json!({
                "type": "object",
                "properties": {
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": {"type": "integer"},
                                "title": {"type": "string"}
                            },
                            "required": ["id"]
                        }
                    },
                    "pagination": {
                        "type": "object",
                        "properties": {"total": {"type": "integer"}}
                    }
                }
            })
        );
    }

    #[test]
    fn test_first_write_wins() {
        let schema = compile(
            "id=fw
            fullname=config.mode,type=int
            fullname=config,type=array
            fullname=config.mode,title=Mode",
        );
        let config = &schema["properties"]["config"];
        assert_eq!(config["type"], json!("object"));
        assert!(config.get("items").is_none());
        assert_eq!(config["properties"]["mode"], json!({"type": "integer", "title": "Mode"}));
    }

    #[test]
    fn test_enum_names_expand_to_one_of() {
        let schema = compile(
            r#"id=e
            fullname=status,enum=["on","off"],enumNames=["On","Off","Extra"]"#,
        );
        let status = &schema["properties"]["status"];
        assert_eq!(status["enum"], json!(["on", "off"]));
        assert_eq!(
            status["oneOf"],
            json!([{"const": "on", "title": "On"}, {"const": "off", "title": "Off"}])
        );
    }

    #[test]
    fn test_exclusive_flag_becomes_numeric() {
        let schema = compile(
            "id=n
            fullname=age,type=int,maximum=120,exclusiveMaximum,minimum=0",
        );
        let age = &schema["properties"]["age"];
        assert_eq!(age["exclusiveMaximum"], json!(120));
        assert!(age.get("maximum").is_none());
        assert_eq!(age["minimum"], json!(0));
    }

    #[test]
    fn test_default_is_coerced_and_example_skipped() {
        let schema = compile(
            "id=d
            fullname=size,type=int,default=10,example=3
            fullname=flag,type=bool,default=true",
        );
        assert_eq!(schema["properties"]["size"], json!({"type": "integer", "default": 10}));
        assert_eq!(schema["properties"]["flag"], json!({"type": "boolean", "default": true}));
    }

    #[test]
    fn test_scalar_array_gets_items() {
        let schema = compile(
            "id=s
            fullname=ids,type=array,format=int
            fullname=names[]",
        );
        assert_eq!(
            schema["properties"]["ids"],
            json!({"type": "array", "format": "int", "items": {"type": "string", "format": "int"}})
        );
        assert_eq!(
            schema["properties"]["names"],
            json!({"type": "array", "items": {"type": "string"}})
        );
    }

    #[test]
    fn test_root_array() {
        let schema = compile("id=r\nfullname=[].id,type=int");
        assert_eq!(
            schema,
            json!({
                "type": "array",
                "items": {"type": "object", "properties": {"id": {"type": "integer"}}}
            })
        );
    }

    #[test]
    fn test_meta_keywords_on_request() {
        let schema = Lineschema::parse("id=out,description=reply\nfullname=code").unwrap();
        let value = compile_json_schema(&schema, &CompilerSettings { emit_meta_keywords: true });
        assert_eq!(value["$schema"], json!(DRAFT_07));
        assert_eq!(value["$id"], json!("out"));
        assert_eq!(value["description"], json!("reply"));
    }

    #[test]
    fn test_comma_list_enum() {
        assert_eq!(parse_list("a,b", "string"), vec![json!("a"), json!("b")]);
        assert_eq!(parse_list("[1,2]", "string"), vec![json!(1), json!(2)]);
        assert_eq!(parse_list("1,2.5", "int"), vec![json!(1), json!(2.5)]);
        assert_eq!(parse_list("true,false", "bool"), vec![json!(true), json!(false)]);
    }

    #[test]
    fn test_comma_list_enum_follows_item_type() {
        let schema = compile(
            "id=e
            fullname=level,type=int,enum=1,2,3
            fullname=mode,enum=1,2",
        );
        assert_eq!(
            schema["properties"]["level"],
            json!({"type": "integer", "enum": [1, 2, 3]})
        );
        assert_eq!(
            schema["properties"]["mode"],
            json!({"type": "string", "enum": ["1", "2"]})
        );
    }
}
