use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

use commands::{
    backfill::BackfillArgs, map_address::MapAddressArgs, status::StatusArgs, watch::WatchArgs,
};

#[derive(Parser)]
#[command(name = "nft-migration-cli")]
#[command(about = "Burn-to-mint NFT migration pipeline", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the pipeline YAML config
    #[arg(long, short = 'c', default_value = "migration.yaml", global = true)]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the origin collection for burns and record them
    Watch(WatchArgs),

    /// Scan a fixed block range once
    Backfill(BackfillArgs),

    /// Mint recorded burns on the destination until interrupted
    Mint,

    /// Run a single minting pass
    MintOnce,

    /// Redirect an origin wallet's mints to another destination wallet
    MapAddress(MapAddressArgs),

    /// Show record counts and scan progress
    Status(StatusArgs),
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = config::load(&cli.config)?;

    match cli.command {
        Commands::Watch(args) => commands::watch::execute(config, args).await,
        Commands::Backfill(args) => commands::backfill::execute(config, args).await,
        Commands::Mint => commands::mint::execute(config).await,
        Commands::MintOnce => commands::mint::execute_once(config).await,
        Commands::MapAddress(args) => commands::map_address::execute(config, args).await,
        Commands::Status(args) => commands::status::execute(config, args).await,
    }
}
