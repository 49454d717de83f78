//! Configuration types for the migration pipeline.
//!
//! This module provides configuration structs for rate limiting, retries,
//! scanning, monitoring, minting, and the main pipeline configuration.

use nft_migration_core::{
    is_offchain_protocol_chain, normalize_address, MigrationTarget, MAX_PROVIDER_BLOCK_RANGE,
    NULL_ADDRESS,
};
use serde::{Deserialize, Serialize};

/// Rate limiting configuration for provider requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum requests per second
    pub max_rps: u32,
    /// Burst capacity for token bucket
    pub burst_size: u32,
    /// Whether to queue requests when rate limited
    pub queue_on_limit: bool,
    /// Maximum queue depth before rejecting
    pub max_queue_depth: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_rps: 10,
            burst_size: 20,
            queue_on_limit: true,
            max_queue_depth: 100,
        }
    }
}

/// Retry configuration for failed provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts; `None` retries until success
    pub max_retries: Option<u32>,
    /// Initial delay between retries in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add 0-25% jitter to every delay
    pub jitter: bool,
}

impl RetryConfig {
    /// Retry forever with a constant delay and no jitter.
    pub fn fixed(delay_ms: u64) -> Self {
        Self {
            max_retries: None,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Bounded exponential backoff with jitter.
    pub fn exponential(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries: Some(max_retries),
            initial_delay_ms,
            max_delay_ms,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::fixed(1_000)
    }
}

/// Burn scanner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Widest block range a single provider query may cover
    pub max_block_range: u64,
    /// Retry policy for provider calls during a scan
    pub retry: RetryConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_block_range: MAX_PROVIDER_BLOCK_RANGE,
            retry: RetryConfig::default(),
        }
    }
}

/// Backfill/monitor loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Window size in blocks; a window is processed once the head is this far ahead
    pub polling_interval_blocks: u64,
    /// Sleep while idle-polling, in milliseconds
    pub idle_delay_ms: u64,
    /// Sleep after a failed iteration, in milliseconds
    pub error_delay_ms: u64,
    /// Blocks behind the head that are never scanned
    pub reorg_safety_depth: u64,
    /// Forced first block to scan; overrides the persisted watermark
    pub start_block: Option<u64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            polling_interval_blocks: 1_000,
            idle_delay_ms: 1_000,
            error_delay_ms: 1_000,
            reorg_safety_depth: 0,
            start_block: None,
        }
    }
}

impl MonitorConfig {
    /// Create a new monitor configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the window size in blocks.
    pub fn with_polling_interval_blocks(mut self, blocks: u64) -> Self {
        self.polling_interval_blocks = blocks;
        self
    }

    /// Set the idle delay.
    pub fn with_idle_delay_ms(mut self, delay: u64) -> Self {
        self.idle_delay_ms = delay;
        self
    }

    /// Set the delay applied after a failed iteration.
    pub fn with_error_delay_ms(mut self, delay: u64) -> Self {
        self.error_delay_ms = delay;
        self
    }

    /// Set the reorg safety depth.
    pub fn with_reorg_safety_depth(mut self, depth: u64) -> Self {
        self.reorg_safety_depth = depth;
        self
    }

    /// Force the first block to scan.
    pub fn with_start_block(mut self, block: u64) -> Self {
        self.start_block = Some(block);
        self
    }
}

/// Cursor-based watcher configuration for the off-chain protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorWatcherConfig {
    /// Page size requested from the transfers endpoint
    pub page_size: u32,
    /// Delay between polls once the feed is drained, in milliseconds
    pub poll_delay_ms: u64,
    /// Ignore transfers younger than this many seconds
    pub settle_delay_secs: Option<i64>,
    /// On a fresh start, ignore transfers older than this many seconds
    pub lookback_secs: Option<i64>,
    /// Flush buffered burns once this many are pending
    pub flush_threshold: usize,
    /// Flush buffered burns after this many polls regardless of count
    pub flush_after_polls: u32,
}

impl Default for CursorWatcherConfig {
    fn default() -> Self {
        Self {
            page_size: 200,
            poll_delay_ms: 3_000,
            settle_delay_secs: None,
            lookback_secs: None,
            flush_threshold: 1_000,
            flush_after_polls: 10,
        }
    }
}

/// Bounded confirmation polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Delay between status polls in milliseconds
    pub poll_interval_ms: u64,
    /// Polls before giving up and reporting the mint unconfirmed
    pub max_attempts: u32,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3_000,
            max_attempts: 100,
        }
    }
}

impl ConfirmationConfig {
    /// Upper bound on the time spent waiting, in milliseconds.
    pub fn max_wait_ms(&self) -> u64 {
        self.poll_interval_ms
            .saturating_mul(u64::from(self.max_attempts))
    }
}

/// Minting backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MintBackend {
    /// `safeMint` transactions signed with the minter key
    OnChain,
    /// Mint requests submitted to the managed minting API
    ManagedApi,
}

impl std::fmt::Display for MintBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MintBackend::OnChain => write!(f, "on_chain"),
            MintBackend::ManagedApi => write!(f, "managed_api"),
        }
    }
}

/// Minting loop and backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MintConfig {
    /// Minting backend
    pub backend: MintBackend,
    /// Maximum tokens per mint batch
    pub batch_size: usize,
    /// Delay after every batch, in milliseconds
    pub batch_delay_ms: u64,
    /// Delay between minting loop iterations, in milliseconds
    pub interval_ms: u64,
    /// Gas price for on-chain mints, in gwei
    pub gas_price_gwei: u64,
    /// Gas limit for on-chain mints
    pub gas_limit: u64,
    /// IPFS CID used to build `ipfs://<cid>/<token id>` blueprints
    pub ipfs_cid: Option<String>,
    /// Only mint to recipients registered on the destination
    pub require_registration: bool,
    /// Confirmation polling bounds
    pub confirmation: ConfirmationConfig,
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            backend: MintBackend::OnChain,
            batch_size: 200,
            batch_delay_ms: 0,
            interval_ms: 5_000,
            gas_price_gwei: 50,
            gas_limit: 300_000,
            ipfs_cid: None,
            require_registration: false,
            confirmation: ConfirmationConfig::default(),
        }
    }
}

/// Provider endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Moralis-compatible chain-data API base URL
    pub chain_data_url: String,
    /// Off-chain protocol public API base URL
    pub imx_api_url: String,
    /// Managed minting API base URL
    pub minting_api_url: String,
    /// Chain name used in managed minting API paths
    pub minting_chain_name: String,
    /// JSON-RPC endpoint of the destination chain, for on-chain minting
    pub destination_rpc_url: Option<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            chain_data_url: "https://deep-index.moralis.io/api/v2.2".to_string(),
            imx_api_url: "https://api.sandbox.x.immutable.com".to_string(),
            minting_api_url: "https://api.sandbox.immutable.com".to_string(),
            minting_chain_name: "imtbl-zkevm-testnet".to_string(),
            destination_rpc_url: None,
        }
    }
}

/// Secrets, loaded from the environment and never serialized.
#[derive(Clone, Default)]
pub struct Credentials {
    pub chain_data_api_key: Option<String>,
    pub minting_api_key: Option<String>,
    pub minter_private_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(value: &Option<String>) -> &'static str {
            if value.is_some() {
                "<set>"
            } else {
                "<unset>"
            }
        }
        f.debug_struct("Credentials")
            .field("chain_data_api_key", &redact(&self.chain_data_api_key))
            .field("minting_api_key", &redact(&self.minting_api_key))
            .field("minter_private_key", &redact(&self.minter_private_key))
            .finish()
    }
}

/// Main configuration for a migration pipeline.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Chain the collection is burned on
    pub origin_chain_id: u64,
    /// Origin collection address, lower-case
    pub origin_collection: String,
    /// Chain the collection is minted on
    pub destination_chain_id: u64,
    /// Destination collection address, lower-case
    pub destination_collection: String,
    /// Address burned tokens are sent to, lower-case
    pub burn_address: String,
    /// Added to the origin token id to form the destination token id
    pub token_id_offset: u64,
    /// Consult the address mapping table when writing records
    pub address_mapping_enabled: bool,
    /// Store connection URL
    pub database_url: String,
    pub scan: ScanConfig,
    pub monitor: MonitorConfig,
    pub watcher: CursorWatcherConfig,
    pub mint: MintConfig,
    pub rate_limit: RateLimitConfig,
    pub endpoints: EndpointConfig,
    pub credentials: Credentials,
}

impl MigrationConfig {
    /// Destination parameters used when building records.
    pub fn migration_target(&self) -> MigrationTarget {
        MigrationTarget {
            destination_chain_id: self.destination_chain_id,
            destination_token_address: self.destination_collection.clone(),
            token_id_offset: self.token_id_offset,
        }
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.origin_chain_id == 0 || self.destination_chain_id == 0 {
            return Err(ConfigError::Invalid("chain ids must be non-zero".into()));
        }
        if self.mint.batch_size == 0 {
            return Err(ConfigError::Invalid("mint.batch_size must be positive".into()));
        }
        if self.monitor.polling_interval_blocks == 0 {
            return Err(ConfigError::Invalid(
                "monitor.polling_interval_blocks must be positive".into(),
            ));
        }
        if self.scan.max_block_range == 0 {
            return Err(ConfigError::Invalid("scan.max_block_range must be positive".into()));
        }
        if self.mint.confirmation.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "mint.confirmation.max_attempts must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Whether the origin is watched through the cursor feed instead of block scans.
    pub fn origin_is_cursor_based(&self) -> bool {
        is_offchain_protocol_chain(self.origin_chain_id)
    }

    /// Check the secrets needed to watch the origin are present.
    pub fn require_scan_credentials(&self) -> Result<(), ConfigError> {
        if !self.origin_is_cursor_based() && self.credentials.chain_data_api_key.is_none() {
            return Err(ConfigError::MissingField("chain_data_api_key"));
        }
        Ok(())
    }

    /// Check the secrets and endpoints the selected mint backend needs are present.
    pub fn require_mint_credentials(&self) -> Result<(), ConfigError> {
        match self.mint.backend {
            MintBackend::OnChain => {
                if self.credentials.minter_private_key.is_none() {
                    return Err(ConfigError::MissingField("minter_private_key"));
                }
                if self.endpoints.destination_rpc_url.is_none() {
                    return Err(ConfigError::MissingField("destination_rpc_url"));
                }
            }
            MintBackend::ManagedApi => {
                if self.credentials.minting_api_key.is_none() {
                    return Err(ConfigError::MissingField("minting_api_key"));
                }
            }
        }
        Ok(())
    }
}

/// Builder for MigrationConfig.
#[derive(Default)]
pub struct MigrationConfigBuilder {
    origin_chain_id: Option<u64>,
    origin_collection: Option<String>,
    destination_chain_id: Option<u64>,
    destination_collection: Option<String>,
    burn_address: Option<String>,
    token_id_offset: u64,
    address_mapping_enabled: bool,
    database_url: Option<String>,
    scan: Option<ScanConfig>,
    monitor: Option<MonitorConfig>,
    watcher: Option<CursorWatcherConfig>,
    mint: Option<MintConfig>,
    rate_limit: Option<RateLimitConfig>,
    endpoints: Option<EndpointConfig>,
    credentials: Credentials,
}

impl MigrationConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the origin chain and collection.
    pub fn origin(mut self, chain_id: u64, collection: impl Into<String>) -> Self {
        self.origin_chain_id = Some(chain_id);
        self.origin_collection = Some(collection.into());
        self
    }

    /// Set the destination chain and collection.
    pub fn destination(mut self, chain_id: u64, collection: impl Into<String>) -> Self {
        self.destination_chain_id = Some(chain_id);
        self.destination_collection = Some(collection.into());
        self
    }

    /// Set the burn address. Defaults to the null address.
    pub fn burn_address(mut self, address: impl Into<String>) -> Self {
        self.burn_address = Some(address.into());
        self
    }

    /// Set the destination token id offset.
    pub fn token_id_offset(mut self, offset: u64) -> Self {
        self.token_id_offset = offset;
        self
    }

    /// Enable or disable address remapping.
    pub fn address_mapping(mut self, enabled: bool) -> Self {
        self.address_mapping_enabled = enabled;
        self
    }

    /// Set the store URL.
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Set the scan configuration.
    pub fn scan(mut self, config: ScanConfig) -> Self {
        self.scan = Some(config);
        self
    }

    /// Set the monitor configuration.
    pub fn monitor(mut self, config: MonitorConfig) -> Self {
        self.monitor = Some(config);
        self
    }

    /// Set the cursor watcher configuration.
    pub fn watcher(mut self, config: CursorWatcherConfig) -> Self {
        self.watcher = Some(config);
        self
    }

    /// Set the mint configuration.
    pub fn mint(mut self, config: MintConfig) -> Self {
        self.mint = Some(config);
        self
    }

    /// Set the rate limiting configuration.
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = Some(config);
        self
    }

    /// Set the provider endpoints.
    pub fn endpoints(mut self, config: EndpointConfig) -> Self {
        self.endpoints = Some(config);
        self
    }

    /// Set the credentials.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Build the configuration.
    ///
    /// Returns an error if required fields are missing, an address is
    /// malformed, or a cross-field invariant does not hold.
    pub fn build(self) -> Result<MigrationConfig, ConfigError> {
        let origin_chain_id = self
            .origin_chain_id
            .ok_or(ConfigError::MissingField("origin_chain_id"))?;
        let origin_collection = self
            .origin_collection
            .ok_or(ConfigError::MissingField("origin_collection"))?;
        let destination_chain_id = self
            .destination_chain_id
            .ok_or(ConfigError::MissingField("destination_chain_id"))?;
        let destination_collection = self
            .destination_collection
            .ok_or(ConfigError::MissingField("destination_collection"))?;
        let database_url = self
            .database_url
            .ok_or(ConfigError::MissingField("database_url"))?;
        let burn_address = self
            .burn_address
            .unwrap_or_else(|| NULL_ADDRESS.to_string());

        let config = MigrationConfig {
            origin_chain_id,
            origin_collection: parse_address("origin_collection", &origin_collection)?,
            destination_chain_id,
            destination_collection: parse_address(
                "destination_collection",
                &destination_collection,
            )?,
            burn_address: parse_address("burn_address", &burn_address)?,
            token_id_offset: self.token_id_offset,
            address_mapping_enabled: self.address_mapping_enabled,
            database_url,
            scan: self.scan.unwrap_or_default(),
            monitor: self.monitor.unwrap_or_default(),
            watcher: self.watcher.unwrap_or_default(),
            mint: self.mint.unwrap_or_default(),
            rate_limit: self.rate_limit.unwrap_or_default(),
            endpoints: self.endpoints.unwrap_or_default(),
            credentials: self.credentials,
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_address(field: &'static str, value: &str) -> Result<String, ConfigError> {
    normalize_address(value).map_err(|_| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

/// Error type for configuration issues.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid address for {field}: {value}")]
    InvalidAddress { field: &'static str, value: String },
}
