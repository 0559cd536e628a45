//! Error types for line schema compilation

use std::fmt;

use thiserror::Error;

/// Result type for line schema operations
pub type Result<T> = std::result::Result<T, LineschemaError>;

/// Line schema errors
#[derive(Error, Debug)]
pub enum LineschemaError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Invalid JSON Schema: {0}")]
    InvalidSchema(String),

    #[error("Path evaluator error: {0}")]
    Evaluator(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A line that could not be turned into a meta or item record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Parse error at line {line}: {kind}")]
pub struct ParseError {
    /// 1-based line number within the source text (blank lines counted)
    pub line: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(line: usize, kind: ParseErrorKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("item line has no fullname")]
    MissingFullname,

    #[error("item line has an empty fullname")]
    EmptyFullname,

    #[error("meta line has no id")]
    MissingId,

    #[error("first line must be a meta line (id without fullname)")]
    MissingMeta,

    #[error("attribute {key} expects a number, got {value:?}")]
    InvalidNumber { key: String, value: String },

    #[error("attribute {key} expects true or false, got {value:?}")]
    InvalidBool { key: String, value: String },

    #[error("attribute pattern is not a valid regular expression: {value:?}")]
    InvalidPattern { value: String },

    #[error("path {path:?} of {fullname} does not match derived path {expected:?}")]
    InconsistentPath {
        fullname: String,
        path: String,
        expected: String,
    },
}

/// Named-structure references that cannot be expanded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("type {type_name} referenced by {field} has no definition")]
    Unresolved { type_name: String, field: String },

    #[error("type {type_name} references itself through {field}")]
    SelfReference { type_name: String, field: String },

    #[error("reference cycle through {type_name}: {}", .cycle.join(" -> "))]
    Cycle { type_name: String, cycle: Vec<String> },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Schema not found: {id}")]
    NotFound { id: String },
}

/// One failed keyword check against a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON pointer of the offending instance location
    pub path: String,
    pub message: String,
}

/// All violations found for a single document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            if v.path.is_empty() {
                write!(f, "{}", v.message)?;
            } else {
                write!(f, "{}: {}", v.path, v.message)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message_carries_line() {
        let err = LineschemaError::from(ParseError::new(3, ParseErrorKind::EmptyFullname));
        assert_eq!(
            err.to_string(),
            "Parse error at line 3: item line has an empty fullname"
        );
    }

    #[test]
    fn test_cycle_message_joins_path() {
        let err = ReferenceError::Cycle {
            type_name: "A".to_string(),
            cycle: vec!["A".to_string(), "B".to_string(), "A".to_string()],
        };
        assert_eq!(err.to_string(), "reference cycle through A: A -> B -> A");
    }

    #[test]
    fn test_report_display() {
        let report = ValidationReport {
            violations: vec![
                Violation { path: "/code".to_string(), message: "bad".to_string() },
                Violation { path: String::new(), message: "root".to_string() },
            ],
        };
        assert_eq!(report.to_string(), "/code: bad; root");
        assert_eq!(report.len(), 2);
    }
}
