use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use nft_migration_client::{
    AlloyTransactor, ImxClient, ManagedApiConfig, ManagedApiMinter, MigrationConfig,
    MintBackend, MintBatcher, MintExecutionEngine, Minter, MintingLoop, OnChainMinter,
    ProviderRateLimiter,
};
use tracing::info;

use super::{open_store, rate_limiter, run_until_interrupted};

fn build_minter(config: &MigrationConfig, limiter: Arc<ProviderRateLimiter>) -> Result<Arc<dyn Minter>> {
    config.require_mint_credentials()?;
    let mint = &config.mint;

    let minter: Arc<dyn Minter> = match mint.backend {
        MintBackend::OnChain => {
            let rpc_url = config.endpoints.destination_rpc_url.as_deref().unwrap_or_default();
            let private_key = config.credentials.minter_private_key.as_deref().unwrap_or_default();
            let transactor = Arc::new(
                AlloyTransactor::connect(rpc_url, private_key)
                    .context("Failed to set up the destination signer")?,
            );
            Arc::new(OnChainMinter::new(
                transactor.clone(),
                transactor,
                config.destination_chain_id,
                mint.gas_price_gwei,
                mint.gas_limit,
                mint.confirmation.clone(),
            ))
        }
        MintBackend::ManagedApi => {
            let managed = ManagedApiMinter::new(
                ManagedApiConfig {
                    base_url: config.endpoints.minting_api_url.clone(),
                    chain_name: config.endpoints.minting_chain_name.clone(),
                    api_key: config.credentials.minting_api_key.clone().unwrap_or_default(),
                    destination_chain_id: config.destination_chain_id,
                    ipfs_cid: mint.ipfs_cid.clone(),
                    require_registration: mint.require_registration,
                    confirmation: mint.confirmation.clone(),
                },
                limiter.clone(),
            );
            let registry = Arc::new(ImxClient::new(
                &config.endpoints.imx_api_url,
                config.destination_chain_id,
                limiter,
            ));
            Arc::new(managed.with_registry(registry))
        }
    };

    info!(backend = %mint.backend, "Mint backend ready");
    Ok(minter)
}

async fn build_loop(config: &MigrationConfig) -> Result<MintingLoop> {
    let store = open_store(config).await?;
    let minter = build_minter(config, rate_limiter(config))?;

    Ok(MintingLoop::new(
        store.clone(),
        MintBatcher::new(minter.clone(), config.mint.batch_size),
        MintExecutionEngine::new(
            minter,
            store.clone(),
            Duration::from_millis(config.mint.batch_delay_ms),
        ),
        config.destination_chain_id,
        config.destination_collection.clone(),
        Duration::from_millis(config.mint.interval_ms),
    ))
}

pub async fn execute(config: MigrationConfig) -> Result<()> {
    let minting_loop = build_loop(&config).await?;
    run_until_interrupted(Arc::new(minting_loop).spawn()).await
}

pub async fn execute_once(config: MigrationConfig) -> Result<()> {
    let minting_loop = build_loop(&config).await?;
    let summary = minting_loop.tick().await.context("Minting pass failed")?;

    println!("Minting pass complete");
    println!("  Pending records:   {}", summary.records);
    println!("  Batches:           {}", summary.batches);
    println!("  Succeeded:         {}", summary.succeeded);
    println!("  Failed:            {}", summary.failed);
    println!("  Tokens minted:     {}", summary.minted);
    Ok(())
}
