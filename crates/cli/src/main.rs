mod commands;

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use terrareg_schema_core::{DEFAULT_DATABASE_URL, Target};
use terrareg_schema_storage::{DatabaseLocation, MigrationBackend};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "terrareg-schema")]
#[command(about = "Schema migrations for the terrareg module registry", long_about = None)]
#[command(version)]
struct Cli {
    /// Database URL: sqlite:///path.db, a bare SQLite path, or postgres://...
    #[arg(long, global = true, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database: String,

    /// Print machine-readable JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upgrade to a later revision
    Upgrade {
        /// head, a revision id or prefix, or +N
        #[arg(default_value = "head")]
        target: Target,
    },
    /// Revert to an earlier revision
    Downgrade {
        /// base, a revision id or prefix, or -N
        #[arg(allow_hyphen_values = true)]
        target: Target,
    },
    /// Show the revision the database is at
    Current,
    /// List revisions, newest first
    History,
    /// Show the head revision
    Heads,
    /// Record a revision without running any migration
    Stamp {
        #[arg(allow_hyphen_values = true)]
        target: Target,
    },
}

pub(crate) fn ensure_db_dir(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Open the backend for `url`, creating the SQLite file's directory if needed.
pub(crate) async fn connect(url: &str) -> Result<MigrationBackend> {
    if let DatabaseLocation::Sqlite(path) = DatabaseLocation::parse(url)? {
        ensure_db_dir(&path)?;
    }
    Ok(MigrationBackend::connect(url).await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let database = cli.database.as_str();
    let json = cli.json;

    match cli.command {
        Commands::Upgrade { target } => {
            commands::migrate::run_upgrade(database, target, json).await?;
        },
        Commands::Downgrade { target } => {
            commands::migrate::run_downgrade(database, target, json).await?;
        },
        Commands::Stamp { target } => {
            commands::migrate::run_stamp(database, target, json).await?;
        },
        Commands::Current => commands::inspect::run_current(database, json).await?,
        Commands::History => commands::inspect::run_history(database, json).await?,
        Commands::Heads => commands::inspect::run_heads(json)?,
    }

    Ok(())
}
