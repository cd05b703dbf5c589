//! ctrl-ha - operator tooling for controller HA recovery
//!
//! Inspects what recovery runs leave behind and checks a controller by hand:
//! - `check-config`: load and validate the configuration
//! - `checkpoint`: print the durable checkpoint
//! - `history <run-id>`: print the stage transitions of one run
//! - `pending`: print the ingress rule the next run will revert, if any
//! - `probe <address>`: log in to a controller and ask for its bootstrap status
//!
//! Recovery itself runs inside the event handler that owns the cloud
//! adapters; this binary never starts one.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ctrl_ha_config::{validate_config, AppConfig, ConfigLoader, ENV_PREFIX};
use ctrl_ha_controller::{ControllerSession, Credentials, HttpControllerClient};
use ctrl_ha_metrics::init_tracing;
use ctrl_ha_store::{CheckpointStore, SqliteCheckpointStore};
use tracing::{debug, info};

/// Controller HA recovery CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML, YAML or JSON); environment overrides apply on top
    #[arg(long, short, default_value = "config/default.toml")]
    config: PathBuf,

    /// Log level, overriding the configuration
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and validate the configuration, then print it
    CheckConfig,

    /// Print the durable checkpoint as JSON
    Checkpoint,

    /// Print the stage transitions of a run
    History {
        /// Run id from the `recovery` log span
        run_id: String,
    },

    /// Print the ingress rule a killed run left open
    Pending,

    /// Log in to a controller and report its bootstrap status
    Probe {
        /// Controller address
        address: String,

        /// Login password; defaults to the configured one, then the address
        #[arg(long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ConfigLoader::from_file_with_env(&args.config, ENV_PREFIX)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, config.logging.json)?;
    debug!(config = %args.config.display(), "Configuration loaded");

    match args.command {
        Command::CheckConfig => check_config(&config),
        Command::Checkpoint => show_checkpoint(&config).await,
        Command::History { run_id } => show_history(&config, &run_id).await,
        Command::Pending => show_pending(&config).await,
        Command::Probe { address, password } => probe(&config, &address, password).await,
    }
}

fn check_config(config: &AppConfig) -> anyhow::Result<()> {
    validate_config(config)?;
    info!("Configuration is valid");
    println!("{}", serde_json::to_string_pretty(&redacted(config))?);
    Ok(())
}

fn redacted(config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    if config.controller.password.is_some() {
        config.controller.password = Some("<redacted>".to_string());
    }
    config
}

async fn open_store(config: &AppConfig) -> anyhow::Result<SqliteCheckpointStore> {
    SqliteCheckpointStore::new(&config.store.path)
        .await
        .with_context(|| format!("opening checkpoint store {}", config.store.path))
}

async fn show_checkpoint(config: &AppConfig) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let checkpoint = store.load().await?;
    println!("{}", serde_json::to_string_pretty(&checkpoint)?);
    store.close().await;
    Ok(())
}

async fn show_history(config: &AppConfig, run_id: &str) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let history = store.get_history(run_id).await?;
    if history.is_empty() {
        anyhow::bail!("no transitions recorded for run {run_id}");
    }
    for transition in &history {
        println!("{}", serde_json::to_string(transition)?);
    }
    store.close().await;
    Ok(())
}

async fn show_pending(config: &AppConfig) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    match store.load().await?.pending_grant_group {
        Some(group_id) => println!(
            "{group_id} tcp/{} from {}",
            config.network.management_port, config.network.ingress_cidr
        ),
        None => println!("none"),
    }
    store.close().await;
    Ok(())
}

async fn probe(config: &AppConfig, address: &str, password: Option<String>) -> anyhow::Result<()> {
    let client = HttpControllerClient::new(
        config.controller.request_timeout(),
        config.controller.accept_invalid_certs,
    )?;
    let password = password.unwrap_or_else(|| config.password_for(address));
    let mut session = ControllerSession::new(
        Arc::new(client),
        address,
        Credentials::new(config.controller.username.clone(), password),
    );

    session
        .authenticate()
        .await
        .with_context(|| format!("logging in to {address}"))?;
    let token = session.require()?;
    let status = session.api().initial_setup_check(token).await?;

    println!(
        "{address}: logged in, initial setup {}",
        if status.ok { "complete" } else { "not complete" }
    );
    if !status.ok && !status.reason_str().is_empty() {
        println!("reason: {}", status.reason_str());
    }
    Ok(())
}
