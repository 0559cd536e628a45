//! Compile pipeline and the per-schema hooks
//!
//! [`CompiledSchema::compile`] runs text through every stage once:
//!
//! ```text
//! parse -> resolve_refs -> compile_json_schema -> generate_default
//!                       \-> json_example
//!                       \-> Transfers::to_format / to_type
//! ```
//!
//! The result is immutable and is shared through the registry.

use std::fmt;

use chrono::{DateTime, Utc};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use tracing::{debug, info};

use crate::checksum::Checksum;
use crate::compiler::{compile_json_schema, CompilerSettings};
use crate::defaults::{generate_default, json_example, merge_default};
use crate::error::{LineschemaError, Result, ValidationReport, Violation};
use crate::resolve::resolve_refs;
use crate::schema::Lineschema;
use crate::transfer::Transfers;
use crate::types::FormatTable;

/// Applies a path expression to a JSON document.
///
/// The expression language (paths with `#`, `{k:expr}` literals, `|@group`,
/// `@this`, `@tostring`, `@tonum`, `@tobool`) is evaluated outside this crate.
pub trait PathEvaluator {
    fn evaluate(&self, document: &[u8], expression: &str) -> Result<Vec<u8>>;
}

impl<F> PathEvaluator for F
where
    F: Fn(&[u8], &str) -> Result<Vec<u8>>,
{
    fn evaluate(&self, document: &[u8], expression: &str) -> Result<Vec<u8>> {
        self(document, expression)
    }
}

/// Checks an instance against a compiled JSON Schema and lists every
/// violation. Compilation installs a draft-07 `jsonschema` validator.
pub trait DocumentValidator: Send + Sync {
    fn check(&self, instance: &Value) -> ValidationReport;
}

impl DocumentValidator for JSONSchema {
    fn check(&self, instance: &Value) -> ValidationReport {
        let violations = match self.validate(instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| Violation {
                    path: e.instance_path.to_string(),
                    message: e.to_string(),
                })
                .collect(),
        };
        ValidationReport { violations }
    }
}

/// Everything the stages need besides the text
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub compiler: CompilerSettings,
    pub formats: FormatTable,
}

/// Artifacts derived from one line schema
pub struct CompiledSchema {
    id: String,
    source: Lineschema,
    flattened: Lineschema,
    json_schema: Value,
    defaults: Option<Value>,
    example: Value,
    to_format: Transfers,
    to_type: Transfers,
    to_format_expression: String,
    to_type_expression: String,
    validator: Box<dyn DocumentValidator>,
    source_checksum: Checksum,
    schema_checksum: Checksum,
    compiled_at: DateTime<Utc>,
}

impl CompiledSchema {
    /// Run every stage over `text`
    pub fn compile(id: impl Into<String>, text: &str, options: &CompileOptions) -> Result<Self> {
        let id = id.into();
        let source = Lineschema::parse(text)?;
        Self::from_lineschema(id, source, Checksum::of_source(text), options)
    }

    /// Run the stages after parsing over an already parsed schema
    pub fn from_parsed(id: impl Into<String>, source: Lineschema, options: &CompileOptions) -> Result<Self> {
        let checksum = Checksum::of_source(&source.to_string());
        Self::from_lineschema(id.into(), source, checksum, options)
    }

    fn from_lineschema(
        id: String,
        source: Lineschema,
        source_checksum: Checksum,
        options: &CompileOptions,
    ) -> Result<Self> {
        let flattened = resolve_refs(&source)?;
        let json_schema = compile_json_schema(&flattened, &options.compiler);

        let validator = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&json_schema)
            .map_err(|e| LineschemaError::InvalidSchema(e.to_string()))?;

        let defaults = generate_default(&json_schema);
        let example = json_example(&flattened, &options.formats);
        let to_format = Transfers::to_format(&flattened, &options.formats);
        let to_type = to_format.reverse();
        let to_format_expression = to_format.to_expression();
        let to_type_expression = to_type.to_expression();
        let schema_checksum = Checksum::of_schema(&json_schema);

        info!(
            id = %id,
            items = flattened.len(),
            checksum = %schema_checksum.short(),
            "compiled line schema"
        );
        debug!(id = %id, expression = %to_format_expression, "to-format transfer");

        Ok(Self {
            id,
            source,
            flattened,
            json_schema,
            defaults,
            example,
            to_format,
            to_type,
            to_format_expression,
            to_type_expression,
            validator: Box::new(validator),
            source_checksum,
            schema_checksum,
            compiled_at: Utc::now(),
        })
    }

    // =========================================================================
    // Artifacts
    // =========================================================================

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &Lineschema {
        &self.source
    }

    /// The schema after reference resolution
    pub fn flattened(&self) -> &Lineschema {
        &self.flattened
    }

    pub fn json_schema(&self) -> &Value {
        &self.json_schema
    }

    /// Default skeleton, `None` when the root is neither an object nor an
    /// array and declares no default
    pub fn defaults(&self) -> Option<&Value> {
        self.defaults.as_ref()
    }

    pub fn example(&self) -> &Value {
        &self.example
    }

    pub fn to_format(&self) -> &Transfers {
        &self.to_format
    }

    pub fn to_type(&self) -> &Transfers {
        &self.to_type
    }

    pub fn to_format_expression(&self) -> &str {
        &self.to_format_expression
    }

    pub fn to_type_expression(&self) -> &str {
        &self.to_type_expression
    }

    pub fn source_checksum(&self) -> &Checksum {
        &self.source_checksum
    }

    pub fn schema_checksum(&self) -> &Checksum {
        &self.schema_checksum
    }

    pub fn compiled_at(&self) -> DateTime<Utc> {
        self.compiled_at
    }

    // =========================================================================
    // Hooks
    // =========================================================================

    /// Validate a JSON document. Empty input counts as an empty object (or an
    /// empty array for array-rooted schemas).
    pub fn validate(&self, document: &[u8]) -> Result<()> {
        let instance = self.read_document(document)?;
        let report = self.check(&instance);
        if report.is_empty() {
            Ok(())
        } else {
            debug!(id = %self.id, violations = report.len(), "document rejected");
            Err(LineschemaError::Validation(report))
        }
    }

    /// Collect every violation of `instance` without failing
    pub fn check(&self, instance: &Value) -> ValidationReport {
        self.validator.check(instance)
    }

    /// Replace the installed validator
    pub fn with_validator(mut self, validator: impl DocumentValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Fill absent or blank fields with declared defaults
    pub fn merge_default(&self, document: &[u8]) -> Result<Vec<u8>> {
        let Some(defaults) = &self.defaults else {
            return Ok(document.to_vec());
        };
        let mut value = if is_blank_input(document) {
            Value::Null
        } else {
            serde_json::from_slice(document)?
        };
        merge_default(&mut value, defaults);
        Ok(serde_json::to_vec(&value)?)
    }

    /// Wire document to typed document
    pub fn transfer_to_format(&self, document: &[u8], evaluator: &dyn PathEvaluator) -> Result<Vec<u8>> {
        apply(&self.to_format_expression, document, evaluator)
    }

    /// Typed document to wire document
    pub fn transfer_to_type(&self, document: &[u8], evaluator: &dyn PathEvaluator) -> Result<Vec<u8>> {
        apply(&self.to_type_expression, document, evaluator)
    }

    fn read_document(&self, document: &[u8]) -> Result<Value> {
        if is_blank_input(document) {
            return Ok(if self.flattened.is_array_root() {
                Value::Array(Vec::new())
            } else {
                Value::Object(serde_json::Map::new())
            });
        }
        Ok(serde_json::from_slice(document)?)
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("id", &self.id)
            .field("items", &self.flattened.len())
            .field("schema_checksum", &self.schema_checksum)
            .field("compiled_at", &self.compiled_at)
            .finish()
    }
}

fn is_blank_input(document: &[u8]) -> bool {
    document.iter().all(u8::is_ascii_whitespace)
}

fn apply(expression: &str, document: &[u8], evaluator: &dyn PathEvaluator) -> Result<Vec<u8>> {
    if expression.is_empty() {
        return Ok(document.to_vec());
    }
    evaluator.evaluate(document, expression)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGED: &str = "
        version=http://json-schema.org/draft-07/schema#,id=paged
        fullname=pageSize,type=int,default=20,required
        fullname=items[].id,format=int
        fullname=items[].title
    ";

    fn compiled() -> CompiledSchema {
        CompiledSchema::compile("paged", PAGED, &CompileOptions::default()).unwrap()
    }

    #[test]
    fn test_compile_builds_all_artifacts() {
        let schema = compiled();
        assert_eq!(schema.id(), "paged");
        assert_eq!(schema.json_schema()["required"], serde_json::json!(["pageSize"]));
        assert_eq!(
            schema.defaults(),
            Some(&serde_json::json!({"pageSize": 20, "items": [{}]}))
        );
        assert_eq!(
            schema.to_format_expression(),
            "{items:{id:items.#.id.@tonum,title:items.#.title.@tostring}|@group,pageSize:pageSize.@tonum}"
        );
        assert_eq!(schema.to_type().len(), schema.to_format().len());
    }

    #[test]
    fn test_validate_reports_violations() {
        let schema = compiled();
        assert!(schema.validate(br#"{"pageSize": 10}"#).is_ok());

        match schema.validate(br#"{"pageSize": "ten"}"#) {
            Err(LineschemaError::Validation(report)) => {
                assert_eq!(report.len(), 1);
                assert_eq!(report.violations[0].path, "/pageSize");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input_is_an_empty_object() {
        let schema = compiled();
        // pageSize is required
        assert!(matches!(schema.validate(b"  "), Err(LineschemaError::Validation(_))));
        let merged = schema.merge_default(b"").unwrap();
        assert_eq!(merged, br#"{"pageSize":20}"#.to_vec());
    }

    #[test]
    fn test_merge_keeps_present_values() {
        let merged = compiled().merge_default(br#"{"pageSize":5}"#).unwrap();
        assert_eq!(merged, br#"{"pageSize":5}"#.to_vec());
    }

    #[test]
    fn test_transfer_hands_expression_to_evaluator() {
        let schema = compiled();
        let echo = |_doc: &[u8], expr: &str| -> Result<Vec<u8>> { Ok(expr.as_bytes().to_vec()) };
        let out = schema.transfer_to_type(b"{}", &echo).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), schema.to_type_expression());
    }

    struct RejectAll;

    impl DocumentValidator for RejectAll {
        fn check(&self, _instance: &Value) -> ValidationReport {
            ValidationReport {
                violations: vec![Violation {
                    path: String::new(),
                    message: "rejected".to_string(),
                }],
            }
        }
    }

    #[test]
    fn test_validation_goes_through_installed_validator() {
        let schema = compiled().with_validator(RejectAll);
        match schema.validate(br#"{"pageSize": 10}"#) {
            Err(LineschemaError::Validation(report)) => {
                assert_eq!(report.violations[0].message, "rejected");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_reference_fails_compile() {
        let err = CompiledSchema::compile("bad", "id=bad\nfullname=owner,type=User", &CompileOptions::default())
            .unwrap_err();
        assert!(matches!(err, LineschemaError::Reference(_)));
    }
}
