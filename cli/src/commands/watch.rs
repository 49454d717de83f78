use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use nft_migration_client::{ImxBurnWatcher, ImxClient, MigrationConfig};
use tracing::info;

use super::{block_monitor, open_store, rate_limiter, record_writer, run_until_interrupted, watch_target};

#[derive(Args)]
pub struct WatchArgs {
    /// First block to scan, ignoring the persisted watermark
    #[arg(long)]
    start_block: Option<u64>,
}

pub async fn execute(mut config: MigrationConfig, args: WatchArgs) -> Result<()> {
    if args.start_block.is_some() {
        config.monitor.start_block = args.start_block;
    }

    let store = open_store(&config).await?;
    let limiter = rate_limiter(&config);

    let handle = if config.origin_is_cursor_based() {
        info!(chain_id = config.origin_chain_id, "Watching origin through the transfers feed");
        let client = Arc::new(ImxClient::new(
            &config.endpoints.imx_api_url,
            config.origin_chain_id,
            limiter,
        ));
        let watcher = ImxBurnWatcher::new(
            client,
            record_writer(&config, store.clone()),
            store,
            watch_target(&config),
            config.watcher.clone(),
        );
        Arc::new(watcher).spawn()
    } else {
        info!(chain_id = config.origin_chain_id, "Watching origin by block windows");
        Arc::new(block_monitor(&config, store, limiter)?).spawn()
    };

    run_until_interrupted(handle).await
}
