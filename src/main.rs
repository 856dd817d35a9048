//! grimoire CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use grimoire::{
    commands::{
        cmd_ingest_pack, cmd_init, cmd_list_sources, cmd_list_topics, cmd_query, cmd_stats,
        print_ingest_stats, print_init, print_query_results, print_sources, print_stats,
        print_topics, IngestOptions, InitOptions, QueryOptions,
    },
    config::Config,
    embed::create_embedder,
    error::Result,
    mcp::McpServer,
    progress::LogWriterFactory,
    store::Store,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "grimoire")]
#[command(version, about = "Local documentation knowledge base with MCP server support", long_about = None)]
struct Cli {
    /// Path to config file or base directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file
    #[arg(long, global = true, env = "GRIMOIRE_DB")]
    db: Option<PathBuf>,

    /// Ollama server URL
    #[arg(long, global = true, env = "OLLAMA_URL")]
    ollama_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and create the database
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Ingest a language pack manifest
    Ingest {
        /// Path to the pack YAML file
        manifest: PathBuf,

        /// Only ingest the source with this name
        #[arg(short, long)]
        source: Option<String>,

        /// Re-index documents that are already stored
        #[arg(long)]
        force: bool,
    },

    /// Search the knowledge base
    Query {
        /// The search query
        query: String,

        /// Restrict results to one topic
        #[arg(short, long)]
        topic: Option<String>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Rank by vector similarity only
        #[arg(long)]
        vector_only: bool,
    },

    /// List installed topics
    Topics,

    /// List documentation sources
    Sources {
        /// Only list sources of this topic
        #[arg(short, long)]
        topic: Option<String>,
    },

    /// Show knowledge base statistics
    Stats,

    /// Run the MCP server on stdio
    Mcp,

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(*shell, &mut cmd, "grimoire", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Init { force } => {
            let options = InitOptions {
                base_dir: base_dir(cli.config.as_deref()),
                force: *force,
            };
            let info = cmd_init(options).await?;
            return output(cli.json, &info, print_init);
        }
        _ => {}
    }

    let config = load_config(&cli)?;
    let store = Store::open(&config.paths.db_file, config.store_options()).await?;

    match cli.command {
        Commands::Ingest {
            manifest,
            source,
            force,
        } => {
            let embedder = create_embedder(&config)?;
            let options = IngestOptions { source, force };
            let stats =
                cmd_ingest_pack(&config, &store, embedder.as_ref(), &manifest, options).await?;
            output(cli.json, &stats, print_ingest_stats)?;
        }
        Commands::Query {
            query,
            topic,
            limit,
            vector_only,
        } => {
            let embedder = create_embedder(&config)?;
            let options = QueryOptions {
                topic,
                limit,
                vector_only,
            };
            let result = cmd_query(&config, &store, embedder.as_ref(), &query, options).await?;
            output(cli.json, &result, print_query_results)?;
        }
        Commands::Topics => {
            let topics = cmd_list_topics(&store).await?;
            output(cli.json, &topics, |t: &Vec<_>| print_topics(t))?;
        }
        Commands::Sources { topic } => {
            let sources = cmd_list_sources(&store, topic.as_deref()).await?;
            output(cli.json, &sources, |s: &Vec<_>| print_sources(s))?;
        }
        Commands::Stats => {
            let stats = cmd_stats(&config, &store).await?;
            output(cli.json, &stats, print_stats)?;
        }
        Commands::Mcp => {
            let embedder = create_embedder(&config)?;
            let server = McpServer::new(config, store.clone(), embedder);
            server.run().await?;
        }
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),
    }

    store.close().await;
    Ok(())
}

/// Print `value` as pretty JSON or with the human printer
fn output<T: Serialize>(json: bool, value: &T, print: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(())
}

/// Base directory named by `--config`: a `.toml` path means its parent
fn base_dir(config: Option<&Path>) -> PathBuf {
    match config {
        Some(path) if is_config_file(path) => path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_base_dir),
        Some(path) => path.to_path_buf(),
        None => Config::default_base_dir(),
    }
}

fn is_config_file(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "toml")
}

/// Load configuration and apply command-line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.config.as_deref() {
        Some(path) if is_config_file(path) => Config::load(path)?,
        other => Config::load_from(Some(base_dir(other)))?,
    };

    if let Some(db) = &cli.db {
        config.paths.db_file = db.clone();
    }
    if let Some(url) = &cli.ollama_url {
        config.embedding.url = url.clone();
    }

    Ok(config)
}
