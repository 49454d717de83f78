//! Subcommands and the wiring they share.

pub mod backfill;
pub mod map_address;
pub mod mint;
pub mod status;
pub mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};
use nft_migration_client::{
    BackfillMonitor, BurnRecordWriter, BurnScanner, MigrationConfig, MonitorHandle,
    MoralisClient, ProviderRateLimiter, SqliteStore, WatchTarget,
};
use tracing::info;

pub(crate) async fn open_store(config: &MigrationConfig) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open store at {}", config.database_url))?;
    Ok(Arc::new(store))
}

pub(crate) fn rate_limiter(config: &MigrationConfig) -> Arc<ProviderRateLimiter> {
    Arc::new(ProviderRateLimiter::new(config.rate_limit.clone()))
}

pub(crate) fn watch_target(config: &MigrationConfig) -> WatchTarget {
    WatchTarget {
        chain_id: config.origin_chain_id,
        collection_address: config.origin_collection.clone(),
        burn_address: config.burn_address.clone(),
    }
}

pub(crate) fn record_writer(config: &MigrationConfig, store: Arc<SqliteStore>) -> BurnRecordWriter {
    BurnRecordWriter::new(store, config.migration_target(), config.address_mapping_enabled)
}

/// Block-windowed monitor over the chain-data provider.
pub(crate) fn block_monitor(
    config: &MigrationConfig,
    store: Arc<SqliteStore>,
    limiter: Arc<ProviderRateLimiter>,
) -> Result<BackfillMonitor> {
    config.require_scan_credentials()?;
    let api_key = config
        .credentials
        .chain_data_api_key
        .clone()
        .unwrap_or_default();
    let source = Arc::new(MoralisClient::new(
        &config.endpoints.chain_data_url,
        api_key,
        limiter,
    ));

    Ok(BackfillMonitor::new(
        BurnScanner::new(source, &config.scan),
        record_writer(config, store.clone()),
        store,
        watch_target(config),
        config.monitor.clone(),
    ))
}

/// Block until Ctrl-C, then stop the loop and wait for it to wind down.
pub(crate) async fn run_until_interrupted(mut handle: MonitorHandle) -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Interrupt received, shutting down");
    handle.join().await.context("Loop task panicked")?;
    Ok(())
}
