//! YAML pipeline description plus secrets from the environment.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use nft_migration_client::{
    ConfigError, Credentials, CursorWatcherConfig, EndpointConfig, MigrationConfig,
    MigrationConfigBuilder, MintConfig, MonitorConfig, RateLimitConfig, ScanConfig,
};
use serde::Deserialize;

const DEFAULT_DATABASE_URL: &str = "sqlite://nft-migration.db";

/// On-disk pipeline description. Secrets never live here.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub origin_chain_id: u64,
    pub origin_collection: String,
    pub destination_chain_id: u64,
    pub destination_collection: String,
    #[serde(default)]
    pub burn_address: Option<String>,
    #[serde(default)]
    pub token_id_offset: u64,
    #[serde(default)]
    pub address_mapping: bool,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub watcher: CursorWatcherConfig,
    #[serde(default)]
    pub mint: MintConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
}

impl FileConfig {
    /// Overlay environment values and build the validated config.
    ///
    /// `DATABASE_URL` and `DESTINATION_RPC_URL` override the file.
    pub fn into_config(
        self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<MigrationConfig, ConfigError> {
        let database_url = env("DATABASE_URL")
            .or(self.database_url)
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let mut endpoints = self.endpoints;
        if let Some(rpc_url) = env("DESTINATION_RPC_URL") {
            endpoints.destination_rpc_url = Some(rpc_url);
        }

        let credentials = Credentials {
            chain_data_api_key: env("MORALIS_API_KEY"),
            minting_api_key: env("IMX_API_KEY"),
            minter_private_key: env("MINTER_PRIVATE_KEY"),
        };

        let mut builder = MigrationConfigBuilder::new()
            .origin(self.origin_chain_id, self.origin_collection)
            .destination(self.destination_chain_id, self.destination_collection)
            .token_id_offset(self.token_id_offset)
            .address_mapping(self.address_mapping)
            .database_url(database_url)
            .scan(self.scan)
            .monitor(self.monitor)
            .watcher(self.watcher)
            .mint(self.mint)
            .rate_limit(self.rate_limit)
            .endpoints(endpoints)
            .credentials(credentials);
        if let Some(burn_address) = self.burn_address {
            builder = builder.burn_address(burn_address);
        }
        builder.build()
    }
}

pub fn load(path: &Path) -> Result<MigrationConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let file: FileConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    file.into_config(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .with_context(|| format!("Invalid config in {:?}", path))
}
