//! Mint execution against the destination collection.
//!
//! A [`Minter`] mints one batch and reports which tokens it confirmed.
//! Two backends exist: signed `safeMint` transactions
//! ([`OnChainMinter`]) and the managed minting API ([`ManagedApiMinter`]).

pub mod batcher;
pub mod engine;
pub mod evm;
pub mod managed;
pub mod onchain;

pub use batcher::MintBatcher;
pub use engine::MintExecutionEngine;
pub use evm::AlloyTransactor;
pub use managed::{ManagedApiConfig, ManagedApiMinter};
pub use onchain::{MintTransactor, OnChainMintRequest, OnChainMinter};

pub use crate::store::{ConfirmedMint, MintTx};

use crate::config::MintBackend;
use crate::errors::MigrationError;
use async_trait::async_trait;
use nft_migration_core::MintBatch;

/// What a backend achieved for one batch.
///
/// `confirmed` may be non-empty even when `error` is set: tokens
/// confirmed before the failure are still recorded as minted.
#[derive(Debug, Default)]
pub struct MintOutcome {
    pub confirmed: Vec<ConfirmedMint>,
    pub error: Option<MigrationError>,
}

impl MintOutcome {
    pub fn failed(confirmed: Vec<ConfirmedMint>, error: MigrationError) -> Self {
        Self {
            confirmed,
            error: Some(error),
        }
    }
}

/// Mints batches into the destination collection.
#[async_trait]
pub trait Minter: Send + Sync {
    fn backend(&self) -> MintBackend;

    /// Whether `recipient` can receive mints on the destination.
    async fn is_eligible(&self, _recipient: &str) -> Result<bool, MigrationError> {
        Ok(true)
    }

    /// Mint every token of `batch` and wait for confirmation.
    async fn mint(&self, batch: &MintBatch) -> MintOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintStatus {
    Success,
    Error,
}

/// Per-batch result reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintResult {
    pub status: MintStatus,
    pub recipient: String,
    pub token_range: String,
    /// Identifiers of confirmed mint transactions, in mint order
    pub tx_identifiers: Vec<String>,
    /// Tokens recorded as minted
    pub minted: usize,
    pub error_message: Option<String>,
}

impl MintResult {
    pub fn is_success(&self) -> bool {
        self.status == MintStatus::Success
    }
}
