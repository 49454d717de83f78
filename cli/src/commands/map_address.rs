use anyhow::{Context, Result};
use clap::Args;
use nft_migration_client::{MigrationConfig, MigrationStore};
use nft_migration_core::{normalize_address, AddressMapping};

use super::open_store;

#[derive(Args)]
pub struct MapAddressArgs {
    /// Wallet that burns on the origin chain
    #[arg(long)]
    origin_wallet: String,

    /// Wallet that should receive the mints instead
    #[arg(long)]
    destination_wallet: String,
}

pub async fn execute(config: MigrationConfig, args: MapAddressArgs) -> Result<()> {
    let mapping = AddressMapping {
        origin_chain_id: config.origin_chain_id,
        destination_chain_id: config.destination_chain_id,
        origin_wallet: normalize_address(&args.origin_wallet)
            .with_context(|| format!("Invalid origin wallet: {}", args.origin_wallet))?,
        destination_wallet: normalize_address(&args.destination_wallet)
            .with_context(|| format!("Invalid destination wallet: {}", args.destination_wallet))?,
    };

    let store = open_store(&config).await?;
    store
        .upsert_address_mapping(&mapping)
        .await
        .context("Failed to save address mapping")?;

    if !config.address_mapping_enabled {
        println!("Note: address_mapping is disabled in the config; this mapping is not applied yet");
    }
    println!(
        "Mapped {} -> {} (chain {} -> {})",
        mapping.origin_wallet,
        mapping.destination_wallet,
        mapping.origin_chain_id,
        mapping.destination_chain_id
    );
    Ok(())
}
