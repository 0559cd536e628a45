//! Configuration for the compiler and the command line tool
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (lineschema.toml)
//! - Environment variables (LINESCHEMA__*)
//!
//! ## Example config file (lineschema.toml):
//! ```toml
//! [compiler]
//! emit_meta_keywords = true
//!
//! [transfer]
//! formats = [{ format = "uuid", type = "string" }, { format = "money", type = "number" }]
//! dst_modifiers = [{ kind = "camel_case" }]
//!
//! [output]
//! format = "compact"
//!
//! [check]
//! extension = "lineschema"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::compiler::CompilerSettings;
use crate::names::PathModifier;
use crate::pipeline::CompileOptions;
use crate::types::{FormatMapping, FormatTable};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineschemaConfig {
    #[serde(default)]
    pub compiler: CompilerSettings,

    #[serde(default)]
    pub transfer: TransferConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub check: CheckConfig,
}

/// Transfer compiler settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Extra `format -> type` rows on top of the built-in table
    #[serde(default)]
    pub formats: Vec<FormatMapping>,

    /// Rewrites applied to destination paths of emitted transfers
    #[serde(default)]
    pub dst_modifiers: Vec<PathModifier>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_format")]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

/// Directory check settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// File extension of line schema sources
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Pretty
}

fn default_extension() -> String {
    "lineschema".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_output_format(),
        }
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
        }
    }
}

impl LineschemaConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, with an explicit file layered over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["lineschema.toml", ".lineschema.toml", "config/lineschema.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "lineschema", "lineschema") {
            let xdg_config = config_dir.config_dir().join("lineschema.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // LINESCHEMA__OUTPUT__FORMAT=compact
        builder = builder.add_source(
            Environment::with_prefix("LINESCHEMA")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Built-in format table extended with the configured rows
    pub fn format_table(&self) -> FormatTable {
        FormatTable::with_mappings(&self.transfer.formats)
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            compiler: self.compiler.clone(),
            formats: self.format_table(),
        }
    }

    /// Render JSON in the configured output format
    pub fn render_json(&self, value: &serde_json::Value) -> serde_json::Result<String> {
        match self.output.format {
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
            OutputFormat::Compact => serde_json::to_string(value),
        }
    }
}
