//! # Startup Radar CLI (`radar`)
//!
//! ## Usage
//!
//! ```bash
//! radar --config ./config/radar.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `radar init` | Create the SQLite database and run schema migrations |
//! | `radar sync` | Query the upstream for every configured investor and merge the results |
//! | `radar serve` | Start the HTTP server |
//! | `radar list` | Print stored startups as JSON lines |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! radar init --config ./config/radar.toml
//!
//! # Sync two investors without writing anything
//! radar sync --subject Kaszek --subject Monashees --dry-run
//!
//! # Second page of 20
//! radar list --skip 20 --limit 20
//! ```
//!
//! Periodic ingestion is left to an external timer (cron, systemd) invoking
//! `radar sync`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use startup_radar::{config, list, logging, migrate, pipeline, server};

/// Startup Radar: ingest startup investment data from a generative chat
/// API into a local store.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/radar.example.toml` for a full example. A `.env` file
/// in the working directory is loaded first, so the API key can live there.
#[derive(Parser)]
#[command(name = "radar", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/radar.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `startups` table. Running
    /// it more than once is safe.
    Init,

    /// Run the batch ingestion.
    ///
    /// Queries each subject in order, parses the replies and merges every
    /// record. Prints the number of records merged.
    Sync {
        /// Investor to query. Repeatable. Defaults to `[ingest].subjects`.
        #[arg(long = "subject")]
        subjects: Vec<String>,

        /// Fetch and parse only; print the candidate records without merging.
        #[arg(long)]
        dry_run: bool,
    },

    /// Start the HTTP server.
    Serve,

    /// Print stored startups ordered by id, one JSON object per line.
    List {
        /// Number of startups to skip.
        #[arg(long, default_value_t = 0)]
        skip: i64,

        /// Maximum number to print. Defaults to `[server].page_limit`.
        #[arg(long)]
        limit: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let cfg = config::load_config(&cli.config)?;
    logging::init_logging(&cfg.log)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sync { subjects, dry_run } => {
            let subjects = if subjects.is_empty() {
                cfg.ingest.subjects.clone()
            } else {
                subjects
            };
            pipeline::run_sync(&cfg, &subjects, dry_run).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::List { skip, limit } => {
            list::run_list(&cfg, skip, limit).await?;
        }
    }

    Ok(())
}
