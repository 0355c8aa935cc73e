//! filc - storage deal client

use clap::Parser;
use filc_cli::{run, AppState, Command, FilcConfig};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "filc")]
#[command(about = "Import content and make storage deals with providers")]
#[command(version)]
struct Args {
    /// Directory holding the block store, deal records and config.toml
    #[arg(long, global = true, env = "FILC_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Provider gateway JSON-RPC endpoint
    #[arg(long, global = true, env = "FILC_ENDPOINT")]
    endpoint: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true, env = "FILC_DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("filc={},filc_core={}", log_level, log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run_cli(args).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run_cli(args: Args) -> anyhow::Result<()> {
    let mut config = FilcConfig::load(args.data_dir.as_deref())?;
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    tracing::debug!(endpoint = %config.endpoint, "gateway");

    let state = AppState::new(config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping");
            let _ = shutdown_tx.send(true);
        }
    });

    run(&state, args.command, shutdown_rx).await
}
