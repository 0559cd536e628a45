//! Schema registry
//!
//! Process-wide store of compiled schemas keyed by id. Compilation runs
//! outside the lock; when two callers race on one id the first insert wins
//! and both get the stored schema.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{RegistryError, Result};
use crate::pipeline::{CompileOptions, CompiledSchema};

/// Identifies one API operation; its input and output schemas are
/// registered under derived ids
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiKey {
    pub method: String,
    pub path: String,
}

impl ApiKey {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }

    pub fn input_id(&self) -> String {
        format!("{}-{}-input", self.method, self.path)
    }

    pub fn output_id(&self) -> String {
        format!("{}-{}-output", self.method, self.path)
    }
}

/// Outcome of [`Registry::load_dir`]
#[derive(Debug, Default)]
pub struct LoadReport {
    /// File and the id it was registered under
    pub loaded: Vec<(PathBuf, String)>,
    /// File and the error that kept it out
    pub failed: Vec<(PathBuf, String)>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Compiled schemas by id
#[derive(Debug, Default)]
pub struct Registry {
    options: CompileOptions,
    schemas: Mutex<HashMap<String, Arc<CompiledSchema>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CompileOptions) -> Self {
        Self {
            options,
            schemas: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile and store `text` under `id`. An id that is already present
    /// keeps its first schema.
    pub fn register(&self, id: &str, text: &str) -> Result<Arc<CompiledSchema>> {
        if let Some(existing) = self.lock().get(id) {
            debug!(id = %id, "schema already registered");
            return Ok(Arc::clone(existing));
        }

        let compiled = Arc::new(CompiledSchema::compile(id, text, &self.options)?);

        let mut schemas = self.lock();
        let stored = schemas
            .entry(id.to_string())
            .or_insert_with(|| Arc::clone(&compiled));
        if stored.schema_checksum() != compiled.schema_checksum() {
            warn!(
                id = %id,
                stored = %stored.schema_checksum().short(),
                rejected = %compiled.schema_checksum().short(),
                "concurrent registration with different content, keeping the first"
            );
        }
        Ok(Arc::clone(stored))
    }

    /// Register the input and output schemas of one API operation
    pub fn register_api(
        &self,
        key: &ApiKey,
        input: &str,
        output: &str,
    ) -> Result<(Arc<CompiledSchema>, Arc<CompiledSchema>)> {
        let input = self.register(&key.input_id(), input)?;
        let output = self.register(&key.output_id(), output)?;
        Ok((input, output))
    }

    pub fn get(&self, id: &str) -> Result<Arc<CompiledSchema>> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() }.into())
    }

    /// Stored schema, or compile `text` when the id is new
    pub fn get_or_register(&self, id: &str, text: &str) -> Result<Arc<CompiledSchema>> {
        self.register(id, text)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Register every `*.{extension}` file below `dir`, keyed by its meta id.
    ///
    /// Unreadable or uncompilable files are collected in the report instead of
    /// aborting the walk.
    pub fn load_dir(&self, dir: &Path, extension: &str) -> anyhow::Result<LoadReport> {
        let mut report = LoadReport::default();

        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().map(|e| e != extension).unwrap_or(true) {
                continue;
            }

            let text = fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
            let outcome = crate::schema::Lineschema::parse(&text)
                .and_then(|schema| self.register(schema.id(), &text));
            match outcome {
                Ok(compiled) => report.loaded.push((path.to_path_buf(), compiled.id().to_string())),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping line schema");
                    report.failed.push((path.to_path_buf(), e.to_string()));
                }
            }
        }

        info!(
            dir = %dir.display(),
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "loaded line schemas"
        );
        Ok(report)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<CompiledSchema>>> {
        // the map is never left half-written, so a poisoned lock is still usable
        self.schemas.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LineschemaError;

    const USER: &str = "id=user\nfullname=id,format=int\nfullname=name";

    #[test]
    fn test_register_and_get() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        registry.register("user", USER).unwrap();
        assert!(registry.contains("user"));
        assert_eq!(registry.get("user").unwrap().id(), "user");
        assert_eq!(registry.ids(), vec!["user".to_string()]);
    }

    #[test]
    fn test_missing_id() {
        let registry = Registry::new();
        match registry.get("nope") {
            Err(LineschemaError::Registry(RegistryError::NotFound { id })) => assert_eq!(id, "nope"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_first_registration_wins() {
        let registry = Registry::new();
        let first = registry.register("user", USER).unwrap();
        let second = registry.register("user", "id=user\nfullname=other").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_failed_compile_stores_nothing() {
        let registry = Registry::new();
        assert!(registry.register("bad", "fullname=x").is_err());
        assert!(!registry.contains("bad"));
    }

    #[test]
    fn test_api_ids() {
        let key = ApiKey::new("GET", "/users");
        assert_eq!(key.input_id(), "GET-/users-input");
        assert_eq!(key.output_id(), "GET-/users-output");

        let registry = Registry::new();
        let (input, output) = registry.register_api(&key, USER, "id=out\nfullname=ok,format=bool").unwrap();
        assert_eq!(input.id(), "GET-/users-input");
        assert_eq!(output.id(), "GET-/users-output");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("user.lineschema"), USER).unwrap();
        fs::write(dir.path().join("nested/order.lineschema"), "id=order\nfullname=total,format=number").unwrap();
        fs::write(dir.path().join("broken.lineschema"), "fullname=x").unwrap();
        fs::write(dir.path().join("notes.txt"), "id=ignored").unwrap();

        let registry = Registry::new();
        let report = registry.load_dir(dir.path(), "lineschema").unwrap();
        assert_eq!(report.loaded.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_clean());
        assert_eq!(registry.ids(), vec!["order".to_string(), "user".to_string()]);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.register("user", USER).unwrap())
            })
            .collect();
        let schemas: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(schemas.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
