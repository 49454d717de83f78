//! NFT Migration Client
//!
//! Moves an NFT collection from an origin chain to a destination chain by
//! burn-to-mint: owners burn on the origin, the pipeline records each burn
//! and mints the matching token to the owner on the destination.
//!
//! # Features
//!
//! - **Burn scanning**: block-windowed scans of a chain-data provider, or a
//!   cursor-paged watcher for the off-chain protocol
//! - **Persistent progress**: burns, address mappings and scan watermarks
//!   live in SQLite
//! - **Rate Limiting**: token bucket rate limiting for every provider request
//! - **Retry Logic**: bounded or unbounded retry with backoff for transient failures
//! - **Two mint backends**: signed `safeMint` transactions or the managed minting API
//!
//! # Example
//!
//! ```ignore
//! use nft_migration_client::{
//!     BackfillMonitor, BurnRecordWriter, BurnScanner, MoralisClient, ProviderRateLimiter,
//!     SqliteStore, WatchTarget,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(SqliteStore::connect("sqlite://migration.db").await?);
//!     let limiter = Arc::new(ProviderRateLimiter::new(config.rate_limit.clone()));
//!     let source = Arc::new(MoralisClient::new(&config.endpoints.chain_data_url, api_key, limiter));
//!     let scanner = BurnScanner::new(source, &config.scan);
//!     let writer = BurnRecordWriter::new(store.clone(), config.migration_target(), false);
//!
//!     let monitor = Arc::new(BackfillMonitor::new(scanner, writer, store, target, config.monitor));
//!     let mut handle = monitor.spawn();
//!     tokio::signal::ctrl_c().await?;
//!     handle.join().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod mint;
pub mod mint_loop;
pub mod monitor;
pub mod rpc;
pub mod scanner;
pub mod source;
pub mod store;
pub mod watcher;
pub mod writer;

pub use config::{
    ConfigError, ConfirmationConfig, Credentials, CursorWatcherConfig, EndpointConfig,
    MigrationConfig, MigrationConfigBuilder, MintBackend, MintConfig, MonitorConfig,
    RateLimitConfig, RetryConfig, ScanConfig,
};
pub use errors::{ErrorCategory, MigrationError, MigrationResult};
pub use mint::{
    AlloyTransactor, ConfirmedMint, ManagedApiConfig, ManagedApiMinter, MintBatcher,
    MintExecutionEngine, MintOutcome, MintResult, MintStatus, MintTransactor, MintTx, Minter,
    OnChainMintRequest, OnChainMinter,
};
pub use mint_loop::{MintTickSummary, MintingLoop};
pub use monitor::{
    BackfillMonitor, BackfillSummary, MonitorHandle, MonitorState, TickOutcome, WatchTarget,
};
pub use rpc::{ProviderRateLimiter, RateLimitGuard, RetryExecutor, RetryExecutorBuilder};
pub use scanner::{BurnScanner, ScanOutcome, ScanRequest};
pub use source::{
    ImxClient, ImxTransferPage, ImxTransferQuery, MoralisClient, RecipientRegistry,
    TransactionStatus, TransactionStatusSource, TransferPage, TransferQuery, TransferSource,
};
pub use store::{
    InsertOutcome, MigrationStats, MigrationStore, SqliteStore, Watermark,
};
pub use watcher::{ImxBurnWatcher, PollOutcome, WatcherState};
pub use writer::{BurnRecordWriter, LoadSummary};

pub use nft_migration_core as core;
