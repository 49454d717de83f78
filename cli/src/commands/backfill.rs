use anyhow::{bail, Context, Result};
use clap::Args;
use nft_migration_client::MigrationConfig;

use super::{block_monitor, open_store, rate_limiter};

#[derive(Args)]
pub struct BackfillArgs {
    /// First block of the range
    #[arg(long)]
    from_block: u64,

    /// Last block of the range (defaults to the current head)
    #[arg(long)]
    to_block: Option<u64>,
}

pub async fn execute(config: MigrationConfig, args: BackfillArgs) -> Result<()> {
    if config.origin_is_cursor_based() {
        bail!(
            "Origin chain {} has no block numbers; use `watch` instead",
            config.origin_chain_id
        );
    }

    let store = open_store(&config).await?;
    let monitor = block_monitor(&config, store, rate_limiter(&config))?;

    let to_block = match args.to_block {
        Some(to_block) => to_block,
        None => monitor.safe_head().await.context("Failed to fetch the current block")?,
    };
    if to_block < args.from_block {
        bail!("--to-block {} is before --from-block {}", to_block, args.from_block);
    }

    let summary = monitor
        .backfill_range(args.from_block, to_block)
        .await
        .with_context(|| format!("Backfill of blocks {}-{} failed", args.from_block, to_block))?;

    println!("Backfill complete");
    println!("  Windows scanned:   {}", summary.windows);
    match summary.last_block {
        Some(last_block) => println!("  Last block:        {}", last_block),
        None => println!("  Last block:        none (range beyond the chain head)"),
    }
    println!("  Records inserted:  {}", summary.load.inserted);
    println!("  Duplicates:        {}", summary.load.duplicates);
    println!("  Collisions:        {}", summary.load.collisions);
    println!("  Skipped:           {}", summary.load.skipped);
    Ok(())
}
