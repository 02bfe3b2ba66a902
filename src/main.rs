//! # Search Bridge CLI (`sbx`)
//!
//! The `sbx` binary is the administrative interface for Search Bridge. It
//! loads a JSON schema-description file, compiles mappings, and drives the
//! search engine: index creation and deletion, refresh, per-record indexing,
//! and raw search.
//!
//! ## Usage
//!
//! ```bash
//! sbx --config ./sbx.toml --schemas ./schemas.json <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sbx mapping <model>` | Print the compiled index mapping as JSON |
//! | `sbx create-index <model>` | Create the model's index with mapping and settings |
//! | `sbx delete-index <model>` | Delete the model's index (absent is success) |
//! | `sbx refresh <model>` | Refresh the index so recent writes become searchable |
//! | `sbx index <model> <record.json>` | Serialize and upsert one record |
//! | `sbx remove <model> <id>` | Delete one record's document |
//! | `sbx search <model> <body.json>` | Run a search body and print the raw response |

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use search_bridge::bridge::{BindOptions, Bridge};
use search_bridge::config;
use search_bridge::engine::EsClient;
use search_bridge::mapping;
use search_bridge::schema::SchemaRegistry;

/// Search Bridge CLI — compile data-model schemas into search-index
/// mappings and keep engine documents in sync with the primary store.
#[derive(Parser)]
#[command(
    name = "sbx",
    about = "Search Bridge — schema-to-mapping compiler and document sync bridge",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./sbx.toml")]
    config: PathBuf,

    /// Path to the JSON schema-description file (model name → schema).
    #[arg(long, global = true, default_value = "./schemas.json")]
    schemas: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a model's compiled index mapping as JSON.
    Mapping {
        /// Model name as declared in the schema file.
        model: String,
    },

    /// Create a model's index, sending its compiled mapping and settings.
    CreateIndex {
        model: String,

        /// JSON file with index settings merged over the model's own
        /// (e.g. an `analysis` section).
        #[arg(long)]
        settings: Option<PathBuf>,
    },

    /// Delete a model's index. Deleting an absent index is a no-op.
    DeleteIndex { model: String },

    /// Refresh a model's index so earlier writes become searchable.
    Refresh { model: String },

    /// Serialize one record (JSON file) and upsert it by its `_id`.
    Index {
        model: String,
        record: PathBuf,
    },

    /// Delete one record's document by identifier.
    Remove { model: String, id: String },

    /// Execute a search body (JSON file) and print the raw engine response.
    Search {
        model: String,
        body: PathBuf,
    },
}

fn load_registry(path: &Path) -> Result<SchemaRegistry> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse schema file: {}", path.display()))
}

fn load_json(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON file: {}", path.display()))
}

fn build_bridge(cfg: &config::Config, registry: SchemaRegistry) -> Result<Bridge> {
    let client = EsClient::new(&cfg.engine)?;
    let mut bridge = Bridge::new(Arc::new(client)).with_prefix(cfg.index.prefix.clone());
    for (model, schema) in registry.models() {
        bridge.register(model, schema.clone(), BindOptions::default())?;
    }
    Ok(bridge)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let registry = load_registry(&cli.schemas)?;

    // `mapping` is pure compilation — no engine, no config needed.
    if let Commands::Mapping { model } = &cli.command {
        let schema = registry
            .get(model)
            .with_context(|| format!("Unknown model: {}", model))?;
        let mapping = mapping::compile(schema, &registry);
        println!("{}", serde_json::to_string_pretty(&mapping.to_value())?);
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    let bridge = build_bridge(&cfg, registry)?;

    match cli.command {
        Commands::Mapping { .. } => unreachable!(),
        Commands::CreateIndex { model, settings } => {
            let settings = settings.as_deref().map(load_json).transpose()?;
            bridge.create_index(&model, settings).await?;
            println!("Created index {}.", bridge.options(&model)?.index);
        }
        Commands::DeleteIndex { model } => {
            bridge.delete_index(&model).await?;
            println!("Deleted index {}.", bridge.options(&model)?.index);
        }
        Commands::Refresh { model } => {
            bridge.refresh(&model).await?;
            println!("Refreshed index {}.", bridge.options(&model)?.index);
        }
        Commands::Index { model, record } => {
            let record = load_json(&record)?;
            let id = bridge.index_record(&model, &record).await?;
            println!("Indexed {} {}.", bridge.options(&model)?.doc_type, id);
        }
        Commands::Remove { model, id } => {
            bridge.remove_record(&model, &id).await?;
            println!("Removed {} {}.", bridge.options(&model)?.doc_type, id);
        }
        Commands::Search { model, body } => {
            let body = load_json(&body)?;
            let response = bridge.search(&model, body).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
