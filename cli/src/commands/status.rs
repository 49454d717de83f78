use anyhow::{Context, Result};
use clap::Args;
use nft_migration_client::{MigrationConfig, MigrationStore};
use serde::Serialize;

use super::open_store;

#[derive(Args)]
pub struct StatusArgs {
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct StatusReport {
    origin_chain_id: u64,
    origin_collection: String,
    destination_chain_id: u64,
    destination_collection: String,
    burned: u64,
    minted: u64,
    pending: u64,
    last_polled_block: Option<u64>,
    cursor: Option<String>,
}

pub async fn execute(config: MigrationConfig, args: StatusArgs) -> Result<()> {
    let store = open_store(&config).await?;
    let stats = store
        .migration_stats()
        .await
        .context("Failed to read record counts")?;
    let watermark = store
        .load_watermark(config.origin_chain_id, &config.origin_collection)
        .await
        .context("Failed to read scan progress")?;

    let report = StatusReport {
        origin_chain_id: config.origin_chain_id,
        origin_collection: config.origin_collection.clone(),
        destination_chain_id: config.destination_chain_id,
        destination_collection: config.destination_collection.clone(),
        burned: stats.total,
        minted: stats.minted,
        pending: stats.pending,
        last_polled_block: watermark.as_ref().and_then(|w| w.last_polled_block),
        cursor: watermark.and_then(|w| w.cursor),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Migration {}:{} -> {}:{}",
        report.origin_chain_id,
        report.origin_collection,
        report.destination_chain_id,
        report.destination_collection
    );
    println!("  Burned:            {}", report.burned);
    println!("  Minted:            {}", report.minted);
    println!("  Pending:           {}", report.pending);
    match (report.last_polled_block, &report.cursor) {
        (Some(block), _) => println!("  Last polled block: {}", block),
        (None, Some(cursor)) => println!("  Resume cursor:     {}", cursor),
        (None, None) => println!("  Scan progress:     not started"),
    }
    Ok(())
}
