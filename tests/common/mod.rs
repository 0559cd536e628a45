//! Reference evaluator for the transfer expression subset the compiler emits
//!
//! Supports `{key:expr,...}` literals, `|@group`, dotted paths with `#`
//! mapping over arrays, `@this`, `@tostring`, `@tonum` and `@tobool`.

use lineschema::{LineschemaError, PathEvaluator, Result};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Path(Vec<String>),
    Object(Vec<(Option<String>, Expr)>),
    Group(Box<Expr>),
}

pub struct ReferenceEvaluator;

impl PathEvaluator for ReferenceEvaluator {
    fn evaluate(&self, document: &[u8], expression: &str) -> Result<Vec<u8>> {
        let root: Value = serde_json::from_slice(document)?;
        let chars: Vec<char> = expression.chars().collect();
        let mut pos = 0;
        let expr = parse_expr(&chars, &mut pos)?;
        if pos != chars.len() {
            return Err(LineschemaError::Evaluator(format!(
                "trailing input at {} in {}",
                pos, expression
            )));
        }
        let out = eval(&expr, &root).unwrap_or(Value::Null);
        Ok(serde_json::to_vec(&out)?)
    }
}

// =============================================================================
// Parsing
// =============================================================================

fn parse_expr(chars: &[char], pos: &mut usize) -> Result<Expr> {
    if chars.get(*pos) == Some(&'{') {
        let object = parse_object(chars, pos)?;
        let rest: String = chars[*pos..].iter().collect();
        if rest.starts_with("|@group") {
            *pos += "|@group".len();
            return Ok(Expr::Group(Box::new(object)));
        }
        return Ok(object);
    }

    let start = *pos;
    while *pos < chars.len() && !matches!(chars[*pos], ',' | '}' | '|') {
        *pos += 1;
    }
    let path: String = chars[start..*pos].iter().collect();
    Ok(Expr::Path(path.split('.').map(str::to_string).collect()))
}

fn parse_object(chars: &[char], pos: &mut usize) -> Result<Expr> {
    // opening brace
    *pos += 1;
    let mut entries = Vec::new();
    loop {
        let start = *pos;
        let mut end = start;
        while end < chars.len() && !matches!(chars[end], ':' | ',' | '}' | '{') {
            end += 1;
        }
        let key = if chars.get(end) == Some(&':') {
            let key: String = chars[start..end].iter().collect();
            *pos = end + 1;
            Some(key)
        } else {
            None
        };
        entries.push((key, parse_expr(chars, pos)?));

        match chars.get(*pos) {
            Some(',') => *pos += 1,
            Some('}') => {
                *pos += 1;
                return Ok(Expr::Object(entries));
            }
            other => {
                return Err(LineschemaError::Evaluator(format!(
                    "unexpected {:?} at {}",
                    other, pos
                )))
            }
        }
    }
}

// =============================================================================
// Evaluation
// =============================================================================

fn eval(expr: &Expr, root: &Value) -> Option<Value> {
    match expr {
        Expr::Path(segments) => eval_path(root, segments),
        Expr::Object(entries) => {
            let mut map = Map::new();
            for (key, value) in entries {
                if let (Some(key), Some(value)) = (key, eval(value, root)) {
                    map.insert(key.clone(), value);
                }
            }
            Some(Value::Object(map))
        }
        Expr::Group(inner) => eval(inner, root).map(|v| group(&v)),
    }
}

fn eval_path(value: &Value, segments: &[String]) -> Option<Value> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(value.clone());
    };
    match first.as_str() {
        "@this" => eval_path(value, rest),
        "#" => {
            let elements = value.as_array()?;
            Some(Value::Array(
                elements.iter().filter_map(|e| eval_path(e, rest)).collect(),
            ))
        }
        "@tostring" => eval_path(&to_string(value), rest),
        "@tonum" => eval_path(&to_num(value)?, rest),
        "@tobool" => eval_path(&to_bool(value), rest),
        name => eval_path(value.get(name)?, rest),
    }
}

fn to_string(value: &Value) -> Value {
    match value {
        Value::String(_) => value.clone(),
        other => Value::String(other.to_string()),
    }
}

fn to_num(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => s
            .parse::<i64>()
            .map(Value::from)
            .ok()
            .or_else(|| s.parse::<f64>().ok().map(Value::from)),
        Value::Bool(b) => Some(Value::from(i64::from(*b))),
        _ => None,
    }
}

fn to_bool(value: &Value) -> Value {
    match value {
        Value::Bool(_) => value.clone(),
        Value::String(s) => Value::Bool(s == "true" || s == "1"),
        Value::Number(n) => Value::Bool(n.as_f64().map_or(false, |f| f != 0.0)),
        _ => Value::Bool(false),
    }
}

/// `{"a":[1,2],"b":["x","y"]}` -> `[{"a":1,"b":"x"},{"a":2,"b":"y"}]`
fn group(value: &Value) -> Value {
    let Some(map) = value.as_object() else {
        return Value::Array(Vec::new());
    };
    let len = map
        .values()
        .filter_map(Value::as_array)
        .map(Vec::len)
        .max()
        .unwrap_or(0);
    let rows = (0..len)
        .map(|i| {
            let row: Map<String, Value> = map
                .iter()
                .filter_map(|(k, v)| v.as_array()?.get(i).map(|e| (k.clone(), e.clone())))
                .collect();
            Value::Object(row)
        })
        .collect();
    Value::Array(rows)
}

#[test]
fn test_reference_evaluator_group() {
    let doc = br#"{"items":[{"id":"1","title":"a"},{"id":"2","title":"b"}]}"#;
    let out = ReferenceEvaluator
        .evaluate(doc, "{items:{id:items.#.id.@tonum,title:items.#.title.@tostring}|@group}")
        .unwrap();
    let value: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(
        value,
        serde_json::json!({"items": [{"id": 1, "title": "a"}, {"id": 2, "title": "b"}]})
    );
}
