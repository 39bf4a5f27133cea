//! `profilectl` — inspect and edit the Atlas property store.
//!
//! Usage:
//!   profilectl [-c <config.toml> | --db <config.db>] <command>
//!
//! Without `-c`/`--db` the store is located through `ATLAS_PROFILE_CONFIG`
//! or `ATLAS_DATA_DIR`, the same way the analyzer finds it.

mod commands;

use std::path::PathBuf;

use atlas_profile::{ProfileConfig, PropertyStore, ValueKind};
use clap::{Parser, Subcommand};
use tracing::debug;

/// Atlas property store CLI.
#[derive(Parser, Debug)]
#[command(name = "profilectl", about = "Atlas property store CLI")]
struct Cli {
    /// Path to a TOML store configuration.
    #[arg(short = 'c', long = "config", global = true, conflicts_with = "db")]
    config: Option<PathBuf>,

    /// Path to the config database; QC and data databases sit next to it.
    #[arg(long = "db", global = true)]
    db: Option<PathBuf>,

    /// Output format: text or json.
    #[arg(long = "output", short = 'o', global = true, default_value = "text")]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the value of a key.
    Get {
        key: String,
        /// Key consulted when KEY has no value.
        #[arg(long)]
        fallback: Option<String>,
    },

    /// Set a key.
    Set {
        key: String,
        value: String,
        /// Value kind: text, int, bool or color. Declared properties
        /// default to their declared kind, other keys to text.
        #[arg(long)]
        kind: Option<ValueKind>,
        /// Keep the value in this process only; do not write the database.
        #[arg(long)]
        transient: bool,
    },

    /// Remove a key.
    #[command(name = "rm")]
    Remove { key: String },

    /// List stored keys.
    Keys,

    /// List declared properties with their current and default values.
    Props,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = match cli.output.as_str() {
        "text" => false,
        "json" => true,
        other => anyhow::bail!("unknown output format '{}', expected text or json", other),
    };

    let config = match (&cli.config, &cli.db) {
        (Some(path), _) => ProfileConfig::load(path)?,
        (None, Some(db)) => ProfileConfig::for_config_file(db),
        (None, None) => ProfileConfig::from_env()?,
    };
    debug!(config_db = %config.resolve_config_db().display(), "opening property store");
    let store = PropertyStore::open(&config)?;

    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::Get { key, fallback } => {
            commands::get(&store, &key, fallback.as_deref(), json, &mut out)
        }
        Commands::Set {
            key,
            value,
            kind,
            transient,
        } => commands::set(&store, &key, &value, kind, !transient),
        Commands::Remove { key } => commands::remove(&store, &key),
        Commands::Keys => commands::keys(&store, json, &mut out),
        Commands::Props => commands::props(&store, json, &mut out),
    }
}
