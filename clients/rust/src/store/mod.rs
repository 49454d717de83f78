//! Persistent migration store.
//!
//! Holds migration records, wallet remappings and scan watermarks. The
//! store enforces the two uniqueness rules every writer relies on: one
//! record per origin token, and one origin token per destination token id.

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::errors::MigrationError;
use async_trait::async_trait;
use nft_migration_core::{AddressMapping, MigrationRecord, NewMigrationRecord};
use serde::{Deserialize, Serialize};

/// Result of inserting a new migration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored under this row id
    Inserted(i64),
    /// The origin token already has a record
    Duplicate,
    /// The destination token id belongs to a different origin token
    DestinationCollision,
}

/// Identifier of the transaction that minted a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MintTx {
    /// EVM transaction hash
    Hash(String),
    /// Off-chain protocol or managed API identifier
    Id(String),
    /// Token found already owned by the recipient; the original transaction is unknown
    AlreadyOwned,
}

impl std::fmt::Display for MintTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MintTx::Hash(hash) => write!(f, "{hash}"),
            MintTx::Id(id) => write!(f, "{id}"),
            MintTx::AlreadyOwned => write!(f, "already-owned"),
        }
    }
}

/// A destination token whose mint has been confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedMint {
    pub destination_token_id: u64,
    pub tx: MintTx,
}

/// Scan progress for one origin collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub chain_id: u64,
    pub collection_address: String,
    /// Last block fully scanned (block-based chains)
    pub last_polled_block: Option<u64>,
    /// Resume cursor (cursor-based chains)
    pub cursor: Option<String>,
}

/// Record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStats {
    pub total: u64,
    pub minted: u64,
    pub pending: u64,
}

/// Storage for migration records, address mappings and watermarks.
#[async_trait]
pub trait MigrationStore: Send + Sync {
    /// Insert a record created burned and unminted.
    async fn insert_record(&self, record: &NewMigrationRecord) -> Result<InsertOutcome, MigrationError>;

    /// Records still waiting to be minted into the destination collection, oldest first.
    async fn unminted_records(
        &self,
        destination_chain_id: u64,
        destination_token_address: &str,
    ) -> Result<Vec<MigrationRecord>, MigrationError>;

    /// Flip `minted` for every confirmed token in one transaction.
    ///
    /// Tokens already minted are left untouched. Returns the number of
    /// records updated.
    async fn mark_minted(&self, mints: &[ConfirmedMint]) -> Result<u64, MigrationError>;

    /// Look up the destination wallet for an origin wallet.
    async fn find_address_mapping(
        &self,
        origin_chain_id: u64,
        destination_chain_id: u64,
        origin_wallet: &str,
    ) -> Result<Option<AddressMapping>, MigrationError>;

    /// Create or replace an address mapping.
    async fn upsert_address_mapping(&self, mapping: &AddressMapping) -> Result<(), MigrationError>;

    async fn load_watermark(
        &self,
        chain_id: u64,
        collection_address: &str,
    ) -> Result<Option<Watermark>, MigrationError>;

    async fn save_watermark(&self, watermark: &Watermark) -> Result<(), MigrationError>;

    async fn migration_stats(&self) -> Result<MigrationStats, MigrationError>;
}
