//! Meta and item records
//!
//! An [`Item`] is one field declaration. Its `path` is always derived from
//! `fullname` (every `[]` becomes `.#`) and is never stored inconsistently.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::ParseErrorKind;
use crate::types::ARRAY_PREFIX;

/// Closed attribute-key set, in canonical serialization order
pub const ATTRIBUTE_KEYS: &[&str] = &[
    "fullname",
    "path",
    "type",
    "format",
    "description",
    "comment",
    "enum",
    "enumNames",
    "const",
    "multipleOf",
    "maximum",
    "exclusiveMaximum",
    "minimum",
    "exclusiveMinimum",
    "maxLength",
    "minLength",
    "pattern",
    "maxItems",
    "minItems",
    "uniqueItems",
    "maxContains",
    "minContains",
    "maxProperties",
    "minProperties",
    "required",
    "contentEncoding",
    "contentMediaType",
    "title",
    "default",
    "deprecated",
    "readOnly",
    "writeOnly",
    "example",
    "examples",
    "src",
    "dst",
    "allowEmptyValue",
    "id",
    "version",
];

pub fn is_attribute_key(key: &str) -> bool {
    ATTRIBUTE_KEYS.contains(&key)
}

/// Schema-level header parsed from the meta line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub description: String,
}

impl Meta {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn to_line(&self) -> String {
        let mut line = String::new();
        if !self.version.is_empty() {
            let _ = write!(line, "version={},", self.version);
        }
        let _ = write!(line, "id={}", self.id);
        if !self.ty.is_empty() {
            let _ = write!(line, ",type={}", self.ty);
        }
        if !self.description.is_empty() {
            let _ = write!(line, ",description={}", self.description);
        }
        line
    }
}

/// `exclusiveMaximum` / `exclusiveMinimum` accept both the boolean flag form
/// and the numeric draft-07 form
#[derive(Debug, Clone, PartialEq)]
pub enum Exclusive {
    Flag,
    Value(Number),
}

/// One field declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub fullname: String,
    pub path: String,
    pub ty: String,
    pub format: Option<String>,
    pub description: Option<String>,
    pub comment: Option<String>,
    pub enum_values: Option<String>,
    pub enum_names: Option<String>,
    pub const_value: Option<String>,
    pub multiple_of: Option<Number>,
    pub maximum: Option<Number>,
    pub exclusive_maximum: Option<Exclusive>,
    pub minimum: Option<Number>,
    pub exclusive_minimum: Option<Exclusive>,
    pub max_length: Option<u64>,
    pub min_length: Option<u64>,
    pub pattern: Option<String>,
    pub max_items: Option<u64>,
    pub min_items: Option<u64>,
    pub unique_items: bool,
    pub max_contains: Option<u64>,
    pub min_contains: Option<u64>,
    pub max_properties: Option<u64>,
    pub min_properties: Option<u64>,
    pub required: bool,
    pub content_encoding: Option<String>,
    pub content_media_type: Option<String>,
    pub title: Option<String>,
    pub default: Option<String>,
    pub deprecated: bool,
    pub read_only: bool,
    pub write_only: bool,
    pub example: Option<String>,
    pub examples: Option<String>,
    pub src: Option<String>,
    pub dst: Option<String>,
    pub allow_empty_value: bool,
}

impl Item {
    /// A string item at `fullname` with its path derived
    pub fn new(fullname: impl Into<String>) -> Self {
        Self::with_type(fullname, "string")
    }

    pub fn with_type(fullname: impl Into<String>, ty: impl Into<String>) -> Self {
        let mut item = Self {
            fullname: fullname.into(),
            path: String::new(),
            ty: ty.into(),
            format: None,
            description: None,
            comment: None,
            enum_values: None,
            enum_names: None,
            const_value: None,
            multiple_of: None,
            maximum: None,
            exclusive_maximum: None,
            minimum: None,
            exclusive_minimum: None,
            max_length: None,
            min_length: None,
            pattern: None,
            max_items: None,
            min_items: None,
            unique_items: false,
            max_contains: None,
            min_contains: None,
            max_properties: None,
            min_properties: None,
            required: false,
            content_encoding: None,
            content_media_type: None,
            title: None,
            default: None,
            deprecated: false,
            read_only: false,
            write_only: false,
            example: None,
            examples: None,
            src: None,
            dst: None,
            allow_empty_value: false,
        };
        item.init_path();
        item
    }

    /// Re-derive `path` from `fullname` and `type`
    pub fn init_path(&mut self) {
        self.path = derive_path(&self.fullname, &self.ty);
    }

    /// Rename the item, keeping `path` in sync
    pub fn set_fullname(&mut self, fullname: impl Into<String>) {
        self.fullname = fullname.into();
        self.init_path();
    }

    pub fn set_type(&mut self, ty: impl Into<String>) {
        self.ty = ty.into();
        self.init_path();
    }

    /// Apply one `key=value` attribute. Keys outside the item set are ignored.
    pub fn set_attr(&mut self, key: &str, value: &str) -> Result<(), ParseErrorKind> {
        let text = || Some(value.to_string());
        match key {
            "fullname" => self.fullname = value.to_string(),
            // authored paths are checked against the derived one by the parser
            "path" => self.path = value.to_string(),
            "type" => self.ty = value.to_string(),
            "format" => self.format = text(),
            "description" => self.description = text(),
            "comment" => self.comment = text(),
            "enum" => self.enum_values = text(),
            "enumNames" => self.enum_names = text(),
            "const" => self.const_value = text(),
            "multipleOf" => self.multiple_of = Some(parse_number(key, value)?),
            "maximum" => self.maximum = Some(parse_number(key, value)?),
            "minimum" => self.minimum = Some(parse_number(key, value)?),
            "exclusiveMaximum" => self.exclusive_maximum = parse_exclusive(key, value)?,
            "exclusiveMinimum" => self.exclusive_minimum = parse_exclusive(key, value)?,
            "maxLength" => self.max_length = Some(parse_count(key, value)?),
            "minLength" => self.min_length = Some(parse_count(key, value)?),
            "pattern" => self.pattern = text(),
            "maxItems" => self.max_items = Some(parse_count(key, value)?),
            "minItems" => self.min_items = Some(parse_count(key, value)?),
            "uniqueItems" => self.unique_items = parse_bool(key, value)?,
            "maxContains" => self.max_contains = Some(parse_count(key, value)?),
            "minContains" => self.min_contains = Some(parse_count(key, value)?),
            "maxProperties" => self.max_properties = Some(parse_count(key, value)?),
            "minProperties" => self.min_properties = Some(parse_count(key, value)?),
            "required" => self.required = parse_bool(key, value)?,
            "contentEncoding" => self.content_encoding = text(),
            "contentMediaType" => self.content_media_type = text(),
            "title" => self.title = text(),
            "default" => self.default = text(),
            "deprecated" => self.deprecated = parse_bool(key, value)?,
            "readOnly" => self.read_only = parse_bool(key, value)?,
            "writeOnly" => self.write_only = parse_bool(key, value)?,
            "example" => self.example = text(),
            "examples" => self.examples = text(),
            "src" => self.src = text(),
            "dst" => self.dst = text(),
            "allowEmptyValue" => self.allow_empty_value = parse_bool(key, value)?,
            _ => {}
        }
        Ok(())
    }

    /// Serialize back to one line of notation, canonical attribute order.
    /// The derived `path` is omitted.
    pub fn to_line(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut push = |key: &str, value: &str| parts.push(format!("{}={}", key, value));

        push("fullname", &self.fullname);
        push("type", &self.ty);
        let text_attrs: [(&str, &Option<String>); 7] = [
            ("format", &self.format),
            ("description", &self.description),
            ("comment", &self.comment),
            ("enum", &self.enum_values),
            ("enumNames", &self.enum_names),
            ("const", &self.const_value),
            ("pattern", &self.pattern),
        ];
        for (key, value) in text_attrs {
            if let Some(v) = value {
                push(key, v);
            }
        }
        let numbers: [(&str, &Option<Number>); 3] = [
            ("multipleOf", &self.multiple_of),
            ("maximum", &self.maximum),
            ("minimum", &self.minimum),
        ];
        for (key, value) in numbers {
            if let Some(n) = value {
                push(key, &n.to_string());
            }
        }
        for (key, value) in [
            ("exclusiveMaximum", &self.exclusive_maximum),
            ("exclusiveMinimum", &self.exclusive_minimum),
        ] {
            match value {
                Some(Exclusive::Flag) => push(key, "true"),
                Some(Exclusive::Value(n)) => push(key, &n.to_string()),
                None => {}
            }
        }
        let counts: [(&str, Option<u64>); 8] = [
            ("maxLength", self.max_length),
            ("minLength", self.min_length),
            ("maxItems", self.max_items),
            ("minItems", self.min_items),
            ("maxContains", self.max_contains),
            ("minContains", self.min_contains),
            ("maxProperties", self.max_properties),
            ("minProperties", self.min_properties),
        ];
        for (key, value) in counts {
            if let Some(n) = value {
                push(key, &n.to_string());
            }
        }
        let more_text: [(&str, &Option<String>); 7] = [
            ("contentEncoding", &self.content_encoding),
            ("contentMediaType", &self.content_media_type),
            ("title", &self.title),
            ("default", &self.default),
            ("example", &self.example),
            ("examples", &self.examples),
            ("src", &self.src),
        ];
        for (key, value) in more_text {
            if let Some(v) = value {
                push(key, v);
            }
        }
        if let Some(dst) = &self.dst {
            push("dst", dst);
        }

        let flags = [
            ("uniqueItems", self.unique_items),
            ("required", self.required),
            ("deprecated", self.deprecated),
            ("readOnly", self.read_only),
            ("writeOnly", self.write_only),
            ("allowEmptyValue", self.allow_empty_value),
        ];
        for (key, set) in flags {
            if set {
                parts.push(key.to_string());
            }
        }
        parts.join(",")
    }

    /// True when `other` sits strictly below this item
    pub fn is_ancestor_of(&self, other: &Item) -> bool {
        is_descendant(&other.fullname, &self.fullname)
    }
}

/// `fullname` with every `[]` replaced by `.#`; a declared `array` type
/// addresses its elements, so one more `.#` is appended
pub fn derive_path(fullname: &str, ty: &str) -> String {
    let mut path = fullname.replace(ARRAY_PREFIX, ".#");
    if ty == "array" {
        path.push_str(".#");
    }
    path.trim_start_matches('.').to_string()
}

/// `child` is `parent.` followed by something, or `parent[]...`
pub fn is_descendant(child: &str, parent: &str) -> bool {
    match child.strip_prefix(parent) {
        Some(rest) => rest.starts_with('.') || rest.starts_with(ARRAY_PREFIX),
        None => false,
    }
}

fn parse_number(key: &str, value: &str) -> Result<Number, ParseErrorKind> {
    Number::from_str(value).map_err(|_| ParseErrorKind::InvalidNumber {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_count(key: &str, value: &str) -> Result<u64, ParseErrorKind> {
    value.parse::<u64>().map_err(|_| ParseErrorKind::InvalidNumber {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ParseErrorKind> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        _ => Err(ParseErrorKind::InvalidBool {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_exclusive(key: &str, value: &str) -> Result<Option<Exclusive>, ParseErrorKind> {
    match value {
        "true" => Ok(Some(Exclusive::Flag)),
        "false" | "" => Ok(None),
        _ => parse_number(key, value).map(|n| Some(Exclusive::Value(n))),
    }
}
