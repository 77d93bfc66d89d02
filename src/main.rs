//! cbjoint CLI - queries, reference resolution and index DDL over a JSON-seeded store

use anyhow::Context;
use cbjoint::config::{self, CbjointConfig};
use cbjoint::{IndexManager, Joint, MemoryStore, N1ql, Store};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "cbjoint")]
#[command(version = "0.0.1")]
#[command(about = "Query builder, reference resolver and index manager for document stores")]
#[command(long_about = r#"
cbjoint loads documents from a JSON file ({"key": body, ...}) into an
in-memory store and runs statements against it:
  • N1QL queries with store placeholder substitution
  • Entity queries on the `_class` discriminator
  • Foreign-key resolution across documents
  • Primary and secondary index DDL

Example usage:
  cbjoint --data beers.json --primary query "select * from %store%"
  cbjoint --data beers.json entity com.acme.Beer name abv
  cbjoint --data beers.json joint --from beer-1 beer-2 --to brewery_id --include-root
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// JSON file seeding the store
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,

    /// Store identifier
    #[arg(short, long, global = true)]
    store: Option<String>,

    /// Placeholder token replaced with the store identifier
    #[arg(long, global = true)]
    placeholder: Option<String>,

    /// Create the primary index before running the command
    #[arg(long, global = true)]
    primary: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Run a raw N1QL statement
    Query {
        /// Statement text; the placeholder is replaced with the store identifier
        text: String,
    },

    /// Select fields from every document of one `_class`
    Entity {
        /// Value of the `_class` field
        type_name: String,

        /// Fields to project
        fields: Vec<String>,
    },

    /// Resolve the documents referenced from root documents
    Joint {
        /// Root document keys
        #[arg(long, num_args = 1.., required = true)]
        from: Vec<String>,

        /// Path to the foreign key(s) inside each root
        #[arg(long)]
        to: String,

        /// Also output the root documents
        #[arg(long)]
        include_root: bool,

        /// Fetch each distinct foreign key once
        #[arg(long)]
        dedup: bool,
    },

    /// Manage indexes
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Create the primary index
    CreatePrimary {
        #[arg(long)]
        name: Option<String>,
    },

    /// Drop the primary index
    DropPrimary {
        #[arg(long)]
        name: Option<String>,
    },

    /// Create a secondary index filtered on one field value
    Create {
        name: String,
        filter_value: String,
        target_field: String,
        additional_fields: Vec<String>,
    },

    /// Drop a secondary index
    Drop { name: String },
}

/// Settings after merging the config file with command-line flags
struct Settings {
    store: String,
    placeholder: String,
    data: Option<PathBuf>,
    dedup: bool,
}

impl Settings {
    fn resolve(cli: &Cli, file: Option<CbjointConfig>) -> Self {
        let file = file.unwrap_or_default();
        Self {
            store: cli
                .store
                .clone()
                .or(file.store)
                .unwrap_or_else(|| "default".to_string()),
            placeholder: cli.placeholder.clone().unwrap_or(file.placeholder),
            data: cli.data.clone().or(file.data.map(PathBuf::from)),
            dedup: file.dedup,
        }
    }

    fn open_store(&self) -> anyhow::Result<Arc<MemoryStore>> {
        let store = match &self.data {
            Some(path) => MemoryStore::from_json_file(&self.store, path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => MemoryStore::new(&self.store),
        };
        Ok(Arc::new(store))
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Commands::Init { force } = cli.command {
        let path = cli.config.clone().unwrap_or_else(config::default_config_path);
        let defaults = CbjointConfig {
            store: cli.store.clone(),
            data: cli.data.as_ref().map(|p| p.display().to_string()),
            ..CbjointConfig::default()
        };
        config::write_config(&path, &defaults, force)?;
        tracing::info!("Wrote {}", path.display());
        return Ok(());
    }

    let file_config = config::load_config(cli.config.as_deref())?;
    let settings = Settings::resolve(&cli, file_config);
    let store = settings.open_store()?;
    tracing::debug!("Store `{}` holds {} documents", store.name(), store.len());

    if cli.primary {
        IndexManager::new(store.clone()).create_primary_index(None)?;
    }

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),

        Commands::Query { text } => {
            let rows = N1ql::with(store)
                .placeholder(&settings.placeholder)
                .query(&text)
                .execute()?;
            for row in rows {
                print_json(&row)?;
            }
        }

        Commands::Entity { type_name, fields } => {
            let rows = N1ql::with(store)
                .placeholder(&settings.placeholder)
                .query_entity(&type_name, fields.as_slice())
                .execute()?;
            for row in rows {
                print_json(&row)?;
            }
        }

        Commands::Joint {
            from,
            to,
            include_root,
            dedup,
        } => {
            let run = Joint::with(store)
                .from(from)
                .to(&to)
                .dedup(dedup || settings.dedup);
            let documents = cbjoint::runtime::block_on(run.collect(include_root))??;
            for document in documents {
                print_json(&document)?;
            }
        }

        Commands::Index { action } => {
            let manager = IndexManager::new(store.clone());
            match action {
                IndexAction::CreatePrimary { name } => manager.create_primary_index(name.as_deref())?,
                IndexAction::DropPrimary { name } => manager.drop_primary_index(name.as_deref())?,
                IndexAction::Create {
                    name,
                    filter_value,
                    target_field,
                    additional_fields,
                } => manager.create_secondary_index(
                    &name,
                    &filter_value,
                    &target_field,
                    additional_fields.as_slice(),
                )?,
                IndexAction::Drop { name } => manager.drop_secondary_index(&name)?,
            }
            if let Some(statement) = store.last_statement() {
                print_json(&statement)?;
            }
        }
    }

    Ok(())
}
