//! Line Schema
//!
//! A compact line-oriented notation for describing JSON documents, and the
//! compiler that turns it into everything an API gateway needs per message.
//!
//! ## Features
//!
//! - **Line Notation**: one `key=value,...` line per field, addressed by a dotted fullname
//! - **Named Structures**: items typed by another item's fullname are expanded in place
//! - **JSON Schema**: draft-07 output with validation via `jsonschema`
//! - **Defaults**: default skeletons, non-clobbering merge, example documents
//! - **Transfers**: path expressions that coerce between wire and typed documents
//! - **Conversion**: line schemas from example documents or JSON Schema
//! - **Registry**: compile once, share by id
//!
//! ## Notation
//!
//! ```text
//! version=http://json-schema.org/draft-07/schema#,id=list-input
//! fullname=pageIndex,format=int,default=0,required
//! fullname=items[].id,format=int
//! fullname=items[].title,maxLength=64
//! fullname=servers,type=[]Server
//! fullname=Server.url,format=uri
//! ```

pub mod checksum;
pub mod compiler;
pub mod config;
pub mod defaults;
pub mod error;
pub mod infer;
pub mod item;
pub mod names;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod resolve;
pub mod schema;
pub mod transfer;
pub mod types;

pub use checksum::Checksum;
pub use compiler::{compile_json_schema, CompilerSettings, DRAFT_07};
pub use config::{LineschemaConfig, OutputFormat};
pub use defaults::{generate_default, json_example, merge_default};
pub use error::{LineschemaError, ParseError, ParseErrorKind, ReferenceError, Result, ValidationReport};
pub use infer::{from_json_example, from_json_schema};
pub use item::{Item, Meta};
pub use names::PathModifier;
pub use pipeline::{CompileOptions, CompiledSchema, DocumentValidator, PathEvaluator};
pub use registry::{ApiKey, Registry};
pub use resolve::resolve_refs;
pub use schema::Lineschema;
pub use transfer::{Describe, FieldDescriptor, Transfer, TransferUnit, Transfers};
pub use types::{FormatMapping, FormatTable};
