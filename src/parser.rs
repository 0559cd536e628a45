//! Line notation parser
//!
//! A line is `chunk0,chunk1,...` where a chunk is normally `key=value`. Free
//! text values may contain commas, so a chunk only opens a new attribute when
//! it starts with a key from the closed attribute set.

use regex::Regex;
use tracing::debug;

use crate::error::{ParseError, ParseErrorKind, Result};
use crate::item::{derive_path, is_attribute_key, Item, Meta};
use crate::schema::Lineschema;

/// Ordered attribute pairs of one line
pub type Attributes = Vec<(String, String)>;

/// Parse line-notation text into a [`Lineschema`]
pub fn parse(text: &str) -> Result<Lineschema> {
    let compressed = compress(text);
    let mut meta: Option<Meta> = None;
    let mut items = Vec::new();

    for (index, line) in compressed.split('\n').enumerate() {
        if line.is_empty() {
            continue;
        }
        let line_no = index + 1;

        if meta.is_none() {
            let attrs = split_attributes(line);
            if has_key(&attrs, "fullname") {
                return Err(ParseError::new(line_no, ParseErrorKind::MissingMeta).into());
            }
            meta = Some(parse_meta(&attrs).map_err(|kind| ParseError::new(line_no, kind))?);
            continue;
        }

        let attrs = tokenize(line);
        let item = parse_item(&attrs).map_err(|kind| ParseError::new(line_no, kind))?;
        items.push(item);
    }

    let meta = meta.ok_or_else(|| ParseError::new(1, ParseErrorKind::MissingMeta))?;
    debug!(id = %meta.id, items = items.len(), "parsed line schema");
    Ok(Lineschema::new(meta, items))
}

/// Strip spaces, tabs and carriage returns; values never rely on them
pub fn compress(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, ' ' | '\t' | '\r'))
        .collect()
}

/// Split one compressed item line into attribute pairs, filling a missing
/// `type` with `string`
pub fn tokenize(line: &str) -> Attributes {
    let mut attrs = split_attributes(line);
    if !has_key(&attrs, "type") {
        attrs.push(("type".to_string(), "string".to_string()));
    }
    attrs
}

/// Chunks that do not start a recognized attribute are glued back onto the
/// previous value with the comma restored. A bare key gets `"true"`.
pub fn split_attributes(line: &str) -> Attributes {
    let mut pairs: Vec<String> = Vec::new();
    for chunk in line.split(',') {
        match pairs.last_mut() {
            Some(last) if !starts_attribute(chunk) => {
                last.push(',');
                last.push_str(chunk);
            }
            _ => pairs.push(chunk.to_string()),
        }
    }

    pairs
        .into_iter()
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair, "true".to_string()),
        })
        .collect()
}

fn starts_attribute(chunk: &str) -> bool {
    match chunk.split_once('=') {
        Some((key, _)) => is_attribute_key(key),
        None => is_attribute_key(chunk),
    }
}

fn has_key(attrs: &Attributes, key: &str) -> bool {
    attrs.iter().any(|(k, _)| k == key)
}

fn parse_meta(attrs: &Attributes) -> std::result::Result<Meta, ParseErrorKind> {
    let mut meta = Meta::default();
    let mut has_id = false;
    for (key, value) in attrs {
        match key.as_str() {
            "id" => {
                meta.id = value.clone();
                has_id = true;
            }
            "version" => meta.version = value.clone(),
            "type" => meta.ty = value.clone(),
            "description" => meta.description = value.clone(),
            _ => {}
        }
    }
    if !has_id {
        return Err(ParseErrorKind::MissingId);
    }
    Ok(meta)
}

fn parse_item(attrs: &Attributes) -> std::result::Result<Item, ParseErrorKind> {
    if !has_key(attrs, "fullname") {
        return Err(ParseErrorKind::MissingFullname);
    }

    let mut item = Item::new(String::new());
    for (key, value) in attrs {
        item.set_attr(key, value)?;
    }

    if item.fullname.trim_matches('.').is_empty() {
        return Err(ParseErrorKind::EmptyFullname);
    }

    let expected = derive_path(&item.fullname, &item.ty);
    if !item.path.is_empty() && item.path != expected {
        return Err(ParseErrorKind::InconsistentPath {
            fullname: item.fullname.clone(),
            path: item.path.clone(),
            expected,
        });
    }
    item.path = expected;

    if let Some(pattern) = &item.pattern {
        if Regex::new(pattern).is_err() {
            return Err(ParseErrorKind::InvalidPattern {
                value: pattern.clone(),
            });
        }
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get<'a>(attrs: &'a Attributes, key: &str) -> Option<&'a str> {
        attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_tokenize_restores_commas_in_free_text() {
        let attrs = tokenize("fullname=note,description=a,b,c,required");
        assert_eq!(get(&attrs, "description"), Some("a,b,c"));
        assert_eq!(get(&attrs, "required"), Some("true"));
        assert_eq!(get(&attrs, "type"), Some("string"));
    }

    #[test]
    fn test_tokenize_keeps_json_enum_together() {
        let attrs = tokenize(r#"fullname=status,enum=["on","off"],enumNames=["On","Off"]"#);
        assert_eq!(get(&attrs, "enum"), Some(r#"["on","off"]"#));
        assert_eq!(get(&attrs, "enumNames"), Some(r#"["On","Off"]"#));
    }

    #[test]
    fn test_tokenize_does_not_inject_type_twice() {
        let attrs = tokenize("fullname=n,type=int");
        assert_eq!(attrs.iter().filter(|(k, _)| k == "type").count(), 1);
        assert_eq!(get(&attrs, "type"), Some("int"));
    }

    #[test]
    fn test_unknown_key_prefix_is_a_continuation() {
        // `types` is not an attribute key, so it belongs to the description
        let attrs = tokenize("fullname=x,description=one,types=two");
        assert_eq!(get(&attrs, "description"), Some("one,types=two"));
    }

    #[test]
    fn test_parse_strips_whitespace() {
        let schema = parse(
            "
            version = http://json-schema.org/draft-07/schema#, id = out
            fullname = code, format = int, example = 0
            fullname = message,\texample = ok
            ",
        )
        .unwrap();
        assert_eq!(schema.meta().id, "out");
        assert_eq!(schema.items().len(), 2);
        assert_eq!(schema.items()[0].format.as_deref(), Some("int"));
        assert_eq!(schema.items()[1].example.as_deref(), Some("ok"));
    }

    #[test]
    fn test_first_line_must_be_meta() {
        let err = parse("fullname=code").unwrap_err();
        assert!(matches!(
            err,
            crate::LineschemaError::Parse(ParseError { line: 1, kind: ParseErrorKind::MissingMeta })
        ));
    }

    #[test]
    fn test_meta_without_id() {
        let err = parse("version=1\nfullname=a").unwrap_err();
        assert!(matches!(
            err,
            crate::LineschemaError::Parse(ParseError { kind: ParseErrorKind::MissingId, .. })
        ));
    }

    #[test]
    fn test_item_without_fullname_reports_line() {
        let err = parse("id=x\n\nfullname=a\ntitle=oops").unwrap_err();
        assert!(matches!(
            err,
            crate::LineschemaError::Parse(ParseError { line: 4, kind: ParseErrorKind::MissingFullname })
        ));
    }

    #[test]
    fn test_inconsistent_authored_path() {
        let err = parse("id=x\nfullname=items[].id,path=items.id").unwrap_err();
        assert!(matches!(
            err,
            crate::LineschemaError::Parse(ParseError {
                kind: ParseErrorKind::InconsistentPath { .. },
                ..
            })
        ));
        let ok = parse("id=x\nfullname=items[].id,path=items.#.id").unwrap();
        assert_eq!(ok.items()[0].path, "items.#.id");
    }

    #[test]
    fn test_invalid_pattern() {
        let err = parse("id=x\nfullname=code,pattern=[0-9").unwrap_err();
        assert!(matches!(
            err,
            crate::LineschemaError::Parse(ParseError {
                kind: ParseErrorKind::InvalidPattern { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_meta_type_only_when_authored() {
        let schema = parse("id=x").unwrap();
        assert_eq!(schema.meta().ty, "");
        let schema = parse("id=x,type=array").unwrap();
        assert_eq!(schema.meta().ty, "array");
    }
}
