mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{Action, Context};
use std::path::PathBuf;
use std::sync::Arc;
use vmaas_cloud::{CancellationToken, StateManager};
use vmaas_cloud_cmp::CmpClient;
use vmaas_config::Settings;

#[derive(Parser)]
#[command(name = "vmaas")]
#[command(about = "Provision VM instances and snapshots through a CMP", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project directory holding the .vmaas state
    #[arg(long, global = true, default_value = ".", env = "VMAAS_PROJECT")]
    project: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage a VM instance described by a YAML spec
    Instance {
        #[arg(value_enum)]
        action: Action,
        /// Instance spec file
        spec: PathBuf,
    },
    /// Manage an instance snapshot described by a YAML spec
    Snapshot {
        #[arg(value_enum)]
        action: Action,
        /// Snapshot spec file
        spec: PathBuf,
    },
    /// Show version information
    Version,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if matches!(cli.command, Commands::Version) {
        println!("vmaas {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let settings = Settings::load()?;
    tracing::debug!(
        api_url = %settings.api_url,
        api_shape = ?settings.api_shape,
        "Loaded settings"
    );
    let client = CmpClient::new(settings.client_config())?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, cancelling...".yellow());
            trigger.cancel();
        }
    });

    let state = StateManager::new(&cli.project);
    tracing::debug!("Using state file {}", state.state_path().display());
    let lock = state.acquire_lock().await?;

    let ctx = Context {
        backend: Arc::new(client),
        policies: settings.retry,
        cancel,
        state,
    };

    let result = match cli.command {
        Commands::Instance { action, spec } => commands::instance::handle(&ctx, action, &spec).await,
        Commands::Snapshot { action, spec } => commands::snapshot::handle(&ctx, action, &spec).await,
        Commands::Version => Ok(()),
    };

    lock.release().await?;
    result
}
