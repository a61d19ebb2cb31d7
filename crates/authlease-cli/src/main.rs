//! CLI entry point for authlease.
//!
//! This binary provides the `authlease` command for operators: validating a
//! session configuration and inspecting the return location persisted in a
//! SQLite key-value store between the login redirect and the callback.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use authlease_session::{KeyValueStore, Location, SessionConfig, SqliteStore};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// authlease: client-side OAuth/OIDC session tooling.
#[derive(Parser)]
#[command(name = "authlease", version, about = "authlease session tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and show the resulting authorize parameters.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Inspect or clear the persisted pre-login return location.
    #[command(subcommand)]
    ReturnLocation(ReturnLocationCommand),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Load a TOML configuration file.
    Check {
        /// Path to the TOML file.
        path: PathBuf,
    },
    /// Load configuration from AUTHLEASE_* environment variables (and .env).
    Env,
}

#[derive(Subcommand)]
enum ReturnLocationCommand {
    /// Print the stored return location.
    Show {
        /// SQLite store path.
        #[arg(long)]
        db: PathBuf,
        /// Store key.
        #[arg(long, default_value = authlease_session::config::DEFAULT_RETURN_LOCATION_KEY)]
        key: String,
    },
    /// Remove the stored return location.
    Clear {
        #[arg(long)]
        db: PathBuf,
        #[arg(long, default_value = authlease_session::config::DEFAULT_RETURN_LOCATION_KEY)]
        key: String,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing("info");
    let cli = Cli::parse();

    match cli.command {
        Commands::Config(ConfigCommand::Check { path }) => {
            let config = SessionConfig::load(&path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            print_config(&config)
        }
        Commands::Config(ConfigCommand::Env) => {
            let config =
                SessionConfig::from_env().context("failed to read configuration from env")?;
            print_config(&config)
        }
        Commands::ReturnLocation(ReturnLocationCommand::Show { db, key }) => {
            cmd_show_return_location(&db, &key)
        }
        Commands::ReturnLocation(ReturnLocationCommand::Clear { db, key }) => {
            let store = open_store(&db)?;
            store.remove(&key).context("failed to clear return location")?;
            info!(key = %key, "return location cleared");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn print_config(config: &SessionConfig) -> Result<()> {
    let request = config.authorize_request();

    println!();
    println!("  Domain:            {}", config.domain);
    println!("  Client ID:         {}", config.client_id);
    println!(
        "  Audience:          {}",
        config.audience.as_deref().unwrap_or("(none)")
    );
    println!("  Redirect URI:      {}", request.redirect_uri);
    println!("  Logout return:     {}", config.logout_return_to);
    println!("  Response type:     {}", request.response_type);
    println!("  Scopes:            {}", request.scope);
    println!("  Renewal leeway:    {}s", config.renewal_leeway_secs);
    println!(
        "  Profile refresh:   {}",
        if config.refresh_profile_on_renewal {
            "on renewal"
        } else {
            "never"
        }
    );
    println!();
    println!("{}", serde_json::to_string_pretty(&request)?);

    Ok(())
}

fn cmd_show_return_location(db: &Path, key: &str) -> Result<()> {
    let store = open_store(db)?;
    let Some(raw) = store.get(key).context("failed to read return location")? else {
        println!("  No return location stored under {key:?}.");
        return Ok(());
    };

    match serde_json::from_str::<Location>(&raw) {
        Ok(location) => println!("  Return location:   {location}"),
        Err(e) => println!("  Malformed value ({e}): {raw}"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open_store(db: &Path) -> Result<SqliteStore> {
    SqliteStore::open(db).with_context(|| format!("failed to open store {}", db.display()))
}

/// Initialize the tracing subscriber with the given default log level.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
