//! # Transcript Recall CLI (`recall`)
//!
//! ## Usage
//!
//! ```bash
//! recall --config ./config/recall.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall init` | Create the SQLite database and run schema migrations |
//! | `recall ingest` | Ingest new or modified transcripts from the archive |
//! | `recall search "<query>"` | Hybrid search with an LLM-formatted answer |
//! | `recall stats` | Corpus and index statistics |
//! | `recall session <id>` | Print every message of one session |
//! | `recall serve` | Ingest, then start the HTTP server |
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use transcript_recall::config::{self, Config};
use transcript_recall::services::Services;
use transcript_recall::{ingest, migrate, search, server, session, stats};

/// Transcript Recall: hybrid search over archived AI-assistant conversations.
#[derive(Parser)]
#[command(
    name = "recall",
    about = "Transcript Recall — hybrid search over archived AI-assistant conversations",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all tables (messages,
    /// messages_fts, message_vectors, cursors). Idempotent.
    Init,

    /// Ingest transcripts from the archive.
    ///
    /// Unchanged files (modification time not newer than their cursor) are
    /// skipped. Failures are reported per file and do not stop the pass.
    Ingest {
        /// Ingest a single transcript file instead of the whole archive.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Search past conversations.
    Search {
        /// Natural-language query.
        query: String,

        /// Print the search plan and fused result list instead of an answer.
        #[arg(long)]
        raw: bool,
    },

    /// Show corpus statistics.
    Stats,

    /// Print every message of a session, oldest first.
    Session {
        /// Session id (transcript file stem).
        id: String,
    },

    /// Run an initial ingest and start the HTTP server.
    Serve,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg: Config = config::load_config(&cli.config)?;

    // Schema creation needs no embedding provider or oracle.
    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized at {}", cfg.db.path.display());
        return Ok(());
    }

    let services = Arc::new(Services::open(&cfg).await?);

    let result = match cli.command {
        Commands::Init => Ok(()),
        Commands::Ingest { file } => ingest::run_ingest(&services, file).await,
        Commands::Search { query, raw } => search::run_search(&services, &query, raw).await,
        Commands::Stats => stats::run_stats(&services).await,
        Commands::Session { id } => session::run_session(&services, &id).await,
        Commands::Serve => return server::run_server(services).await,
    };

    services.close().await;
    result
}
