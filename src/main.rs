//! relgraph CLI - triplet and property graph stores over SQLite

use clap::{Parser, Subcommand, ValueEnum};
use rusqlite::types::Value;
use std::path::{Path, PathBuf};
use relgraph::config::{self, StoreConfig};
use relgraph::traversal::{DEFAULT_DEPTH, DEFAULT_LIMIT};
use relgraph::ui::{self, Icons};
use relgraph::{
    Properties, PropertyValue, SqlGraphStore, SqlPropertyGraphStore, TripletFilter, VectorStoreQuery,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "relgraph")]
#[command(version)]
#[command(about = "Relational graph store - triplets and labelled property graphs over SQLite")]
#[command(long_about = r#"
relgraph keeps graph data in ordinary relational tables:
  • A subject-relation-object triplet store
  • A labelled property graph with properties and embeddings
  • Depth-bounded traversal from seed nodes

Example usage:
  relgraph init
  relgraph upsert Alice knows Bob
  relgraph rel-map Alice --depth 2
  relgraph triplets --entity Alice --format json
  relgraph similar Alice --top-k 5
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to ./relgraph.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Connection string, overrides the config file
    #[arg(short, long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Add a subject-relation-object triplet
    Upsert {
        subject: String,
        relation: String,
        object: String,
    },

    /// List the relations of a subject
    Get { subject: String },

    /// Show what is reachable from seed entities
    RelMap {
        /// Seed entity names
        #[arg(required = true)]
        seeds: Vec<String>,

        /// Maximum number of hops
        #[arg(long, default_value_t = DEFAULT_DEPTH)]
        depth: u32,

        /// Maximum number of rows
        #[arg(short, long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Delete a triplet and any entity left without relations
    Delete {
        subject: String,
        relation: String,
        object: String,
    },

    /// Run a raw SQL statement
    Query { statement: String },

    /// List property graph nodes
    Nodes {
        /// Node ids
        #[arg(long = "id")]
        ids: Vec<String>,

        /// Property filters as key=value
        #[arg(long = "prop")]
        props: Vec<String>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List property graph triplets
    Triplets {
        /// Entity names on either end
        #[arg(long = "entity")]
        entities: Vec<String>,

        /// Relation labels
        #[arg(long = "relation")]
        relations: Vec<String>,

        /// Node ids on either end
        #[arg(long = "id")]
        ids: Vec<String>,

        /// Property filters as key=value
        #[arg(long = "prop")]
        props: Vec<String>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Find the nodes nearest to a stored node's embedding
    Similar {
        /// Node id whose embedding is the query
        id: String,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value_t = 10)]
        top_k: usize,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show row counts of both stores
    Stats,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(e) = run(cli) {
        ui::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();
    let database = cli.database.as_deref();

    match cli.command {
        Commands::Init { force } => {
            let path = config_path.map(Path::to_path_buf).unwrap_or_else(config::default_config_path);
            let mut store_config = StoreConfig::default();
            if let Some(database) = database {
                store_config.database = database.to_string();
            }
            config::write_config(&path, &store_config, force)?;
            ui::success(&format!("Wrote {}", path.display()));
            ui::info("Database", &store_config.database);
        }

        Commands::Upsert { subject, relation, object } => {
            let store = SqlGraphStore::with_config(&resolve_config(config_path, database)?)?;
            store.upsert_triplet(&subject, &relation, &object)?;
            ui::success(&format!("Stored {}", ui::triplet_line(&subject, &relation, &object)));
        }

        Commands::Get { subject } => {
            let store = SqlGraphStore::with_config(&resolve_config(config_path, database)?)?;
            let rels = store.get(&subject)?;
            if rels.is_empty() {
                println!("{} No relations for {}", Icons::EMPTY, subject);
            } else {
                for [relation, object] in &rels {
                    println!("{} {}", Icons::LINK, ui::triplet_line(&subject, relation, object));
                }
            }
        }

        Commands::RelMap { seeds, depth, limit, format } => {
            let store = SqlGraphStore::with_config(&resolve_config(config_path, database)?)?;
            let rel_map = store.get_rel_map(Some(seeds.as_slice()), depth, limit)?;

            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&rel_map)?);
            } else if rel_map.is_empty() {
                println!("{} Nothing reachable within {} hops", Icons::EMPTY, depth);
            } else {
                ui::header(Icons::MAG, &format!("Rel map (depth {}, limit {})", depth, limit));
                println!("{}", ui::rel_map_table(&rel_map));
                let total: usize = rel_map.values().map(Vec::len).sum();
                println!("{}", ui::dim(&format!("{} triplets from {} seeds", total, rel_map.len())));
            }
        }

        Commands::Delete { subject, relation, object } => {
            let store = SqlGraphStore::with_config(&resolve_config(config_path, database)?)?;
            store.delete(&subject, &relation, &object)?;
            ui::success(&format!("Deleted {}", ui::triplet_line(&subject, &relation, &object)));
        }

        Commands::Query { statement } => {
            let store = SqlGraphStore::with_config(&resolve_config(config_path, database)?)?;
            let rows = store.query(&statement, &[])?;
            for row in &rows {
                let cells: Vec<String> = row.iter().map(format_value).collect();
                println!("{}", cells.join(" | "));
            }
            println!("{}", ui::dim(&format!("{} rows", rows.len())));
        }

        Commands::Nodes { ids, props, format } => {
            let store = SqlPropertyGraphStore::with_config(&resolve_config(config_path, database)?)?;
            let properties = parse_props(&props)?;
            let nodes = store.get(
                (!properties.is_empty()).then_some(&properties),
                (!ids.is_empty()).then_some(ids.as_slice()),
            )?;

            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&nodes)?);
            } else if nodes.is_empty() {
                println!("{} No nodes found", Icons::EMPTY);
            } else {
                println!("{}", ui::node_table(&nodes, None));
            }
        }

        Commands::Triplets { entities, relations, ids, props, format } => {
            let store = SqlPropertyGraphStore::with_config(&resolve_config(config_path, database)?)?;
            let mut filter = TripletFilter::new()
                .entity_names(entities)
                .relation_names(relations)
                .ids(ids);
            filter.properties = parse_props(&props)?;

            if filter.is_empty() {
                ui::warn("No filter given; pass --entity, --relation, --id or --prop");
                return Ok(());
            }

            let triplets = store.get_triplets(&filter)?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&triplets)?);
            } else if triplets.is_empty() {
                println!("{} No triplets found", Icons::EMPTY);
            } else {
                println!("{}", ui::triplet_table(&triplets));
            }
        }

        Commands::Similar { id, top_k, format } => {
            let store = SqlPropertyGraphStore::with_config(&resolve_config(config_path, database)?)?;
            let Some(embedding) = store.find_node(&id)?.and_then(|node| node.embedding) else {
                anyhow::bail!("Node {:?} not found or has no embedding", id);
            };
            let (nodes, scores) = store.vector_query(&VectorStoreQuery::new(embedding, top_k))?;

            if format == OutputFormat::Json {
                let hits: Vec<_> = nodes
                    .iter()
                    .zip(&scores)
                    .map(|(node, distance)| serde_json::json!({ "node": node, "distance": distance }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if nodes.is_empty() {
                println!("{} No embedded nodes found", Icons::EMPTY);
            } else {
                ui::header(Icons::MAG, &format!("Nearest to {}", id));
                println!("{}", ui::node_table(&nodes, Some(scores.as_slice())));
            }
        }

        Commands::Stats => {
            let store_config = resolve_config(config_path, database)?;
            ui::header(Icons::STATS, &format!("relgraph statistics ({})", store_config.database));

            let triplets = SqlGraphStore::with_config(&store_config)?.stats()?;
            ui::section("Triplet store");
            println!("{}", ui::stats_table(&triplets));

            let property = SqlPropertyGraphStore::with_config(&store_config)?.stats()?;
            ui::section("Property graph store");
            println!("{}", ui::stats_table(&property));
        }
    }

    Ok(())
}

/// Config file values, with `--database` taking precedence
fn resolve_config(path: Option<&Path>, database: Option<&str>) -> anyhow::Result<StoreConfig> {
    let mut store_config = config::load_config(path)?.unwrap_or_default();
    if let Some(database) = database {
        store_config.database = database.to_string();
    }
    tracing::debug!(database = store_config.database.as_str(), "Resolved configuration");
    Ok(store_config)
}

/// Parse `key=value` pairs; values become bool, int, float or string
fn parse_props(raw: &[String]) -> anyhow::Result<Properties> {
    raw.iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("Expected key=value, got {:?}", pair))?;
            Ok((key.trim().to_string(), PropertyValue::parse_literal(value.trim())))
        })
        .collect()
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => ui::muted("NULL"),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => ui::muted(&format!("<{} bytes>", b.len())),
    }
}
