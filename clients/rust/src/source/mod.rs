//! Chain-data provider adapters.
//!
//! Each adapter normalizes its provider's transfer shape into
//! [`Transfer`]. The scanner and the on-chain minter only see the traits
//! defined here, so tests drive them with in-memory fakes.

pub(crate) mod http;
pub mod imx;
pub mod moralis;

pub use imx::{ImxClient, ImxTransferPage, ImxTransferQuery};
pub use moralis::MoralisClient;

use crate::errors::MigrationError;
use async_trait::async_trait;
use nft_migration_core::Transfer;

/// One paged transfer query over an inclusive block range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferQuery {
    pub chain_id: u64,
    pub collection_address: String,
    pub from_block: u64,
    pub to_block: u64,
}

/// A page of transfers and the opaque cursor of the next page.
#[derive(Debug, Clone, Default)]
pub struct TransferPage {
    pub transfers: Vec<Transfer>,
    /// `None` when this was the last page
    pub cursor: Option<String>,
}

/// Status of a submitted transaction as seen by a chain-data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Not yet included (or not yet indexed)
    Pending,
    Succeeded,
    Failed,
}

impl TransactionStatus {
    pub fn is_confirmed(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

/// Paged NFT transfer history for EVM-style chains.
#[async_trait]
pub trait TransferSource: Send + Sync {
    /// Latest block number of `chain_id`.
    async fn current_block(&self, chain_id: u64) -> Result<u64, MigrationError>;

    /// One page of transfers for `query`, continuing from `cursor`.
    async fn transfers(
        &self,
        query: &TransferQuery,
        cursor: Option<&str>,
    ) -> Result<TransferPage, MigrationError>;
}

/// Transaction receipt lookups.
#[async_trait]
pub trait TransactionStatusSource: Send + Sync {
    async fn transaction_status(
        &self,
        tx_hash: &str,
        chain_id: u64,
    ) -> Result<TransactionStatus, MigrationError>;
}

/// Recipient registration on the destination protocol.
#[async_trait]
pub trait RecipientRegistry: Send + Sync {
    async fn is_registered(&self, address: &str) -> Result<bool, MigrationError>;
}
