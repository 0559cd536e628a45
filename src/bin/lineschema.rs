//! Line Schema CLI
//!
//! Compiles line schemas and prints the derived artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use lineschema::{
    from_json_example, from_json_schema, CompiledSchema, LineschemaConfig, LineschemaError,
    Registry,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lineschema")]
#[command(about = "Compile line schemas into JSON Schema, defaults and transfer expressions")]
struct Cli {
    /// Configuration file (layered over lineschema.toml and LINESCHEMA__*)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the draft-07 JSON Schema
    Schema {
        file: PathBuf,
    },

    /// Print the default skeleton
    Default {
        file: PathBuf,
    },

    /// Print an example document
    Example {
        file: PathBuf,
    },

    /// Print the transfer expression
    Transfer {
        file: PathBuf,
        /// Typed to wire instead of wire to typed
        #[arg(long)]
        reverse: bool,
    },

    /// Print the schema with named structures expanded
    Flatten {
        file: PathBuf,
    },

    /// Validate a JSON document
    Validate {
        file: PathBuf,
        document: PathBuf,
    },

    /// Fill a JSON document with declared defaults
    Merge {
        file: PathBuf,
        document: PathBuf,
    },

    /// Infer a line schema from an example JSON document
    Infer {
        document: PathBuf,
        /// Meta id of the generated schema
        #[arg(long, default_value = "example")]
        id: String,
    },

    /// Convert a JSON Schema document into a line schema
    FromSchema {
        document: PathBuf,
    },

    /// Compile every line schema below a directory
    Check {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => LineschemaConfig::load_from(path.to_str())?,
        None => LineschemaConfig::load()?,
    };

    match cli.command {
        Commands::Schema { file } => {
            let compiled = compile(&file, &config)?;
            println!("{}", config.render_json(compiled.json_schema())?);
        }

        Commands::Default { file } => {
            let compiled = compile(&file, &config)?;
            let defaults = compiled.defaults().cloned().unwrap_or(serde_json::Value::Null);
            println!("{}", config.render_json(&defaults)?);
        }

        Commands::Example { file } => {
            let compiled = compile(&file, &config)?;
            println!("{}", config.render_json(compiled.example())?);
        }

        Commands::Transfer { file, reverse } => {
            let compiled = compile(&file, &config)?;
            let modifiers = &config.transfer.dst_modifiers;
            let transfers = if reverse {
                compiled.to_format().modify_dst_path(modifiers).reverse()
            } else {
                compiled.to_format().modify_dst_path(modifiers)
            };
            println!("{}", transfers);
        }

        Commands::Flatten { file } => {
            let compiled = compile(&file, &config)?;
            print!("{}", compiled.flattened());
        }

        Commands::Validate { file, document } => {
            let compiled = compile(&file, &config)?;
            let bytes = read(&document)?;
            match compiled.validate(&bytes) {
                Ok(()) => println!("✅ {} is valid against {}", document.display(), compiled.id()),
                Err(LineschemaError::Validation(report)) => {
                    for violation in &report.violations {
                        println!("❌ {}: {}", violation.path, violation.message);
                    }
                    anyhow::bail!("{} violation(s)", report.len());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Merge { file, document } => {
            let compiled = compile(&file, &config)?;
            let merged = compiled.merge_default(&read(&document)?)?;
            let value: serde_json::Value = serde_json::from_slice(&merged)?;
            println!("{}", config.render_json(&value)?);
        }

        Commands::Infer { document, id } => {
            let bytes = read(&document)?;
            let value: serde_json::Value = serde_json::from_slice(&bytes)
                .with_context(|| format!("Failed to parse JSON in {}", document.display()))?;
            print!("{}", from_json_example(&id, &value));
        }

        Commands::FromSchema { document } => {
            let bytes = read(&document)?;
            let value: serde_json::Value = serde_json::from_slice(&bytes)
                .with_context(|| format!("Failed to parse JSON in {}", document.display()))?;
            print!("{}", from_json_schema(&value)?);
        }

        Commands::Check { dir } => {
            let registry = Registry::with_options(config.compile_options());
            let report = registry.load_dir(&dir, &config.check.extension)?;
            for (path, id) in &report.loaded {
                println!("✅ {} ({})", path.display(), id);
            }
            for (path, error) in &report.failed {
                println!("❌ {}: {}", path.display(), error);
            }
            println!();
            println!("📊 {} compiled, {} failed", report.loaded.len(), report.failed.len());
            if !report.is_clean() {
                anyhow::bail!("{} line schema(s) failed to compile", report.failed.len());
            }
        }
    }

    Ok(())
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn compile(path: &Path, config: &LineschemaConfig) -> anyhow::Result<CompiledSchema> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let compiled = CompiledSchema::compile(id, &text, &config.compile_options())?;
    Ok(compiled)
}
