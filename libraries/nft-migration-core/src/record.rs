//! Persisted migration records and address mappings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::transfer::Transfer;

/// Compute the destination token id for a burned origin token.
pub fn destination_token_id(origin_token_id: u64, offset: u64) -> Result<u64, CoreError> {
    origin_token_id
        .checked_add(offset)
        .ok_or(CoreError::TokenIdOverflow {
            token_id: origin_token_id,
            offset,
        })
}

/// Where migrated tokens are minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationTarget {
    pub destination_chain_id: u64,
    pub destination_token_address: String,
    pub token_id_offset: u64,
}

/// A migration record ready to be inserted (burned, not yet minted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMigrationRecord {
    pub destination_token_id: u64,
    pub origin_chain_id: u64,
    pub origin_block_number: Option<u64>,
    pub burn_timestamp: DateTime<Utc>,
    pub burn_transaction_hash: Option<String>,
    pub burn_transaction_id: Option<u64>,
    pub origin_token_address: String,
    pub origin_token_id: u64,
    pub from_origin_wallet: String,
    pub to_origin_wallet: String,
    pub destination_chain_id: u64,
    pub destination_token_address: String,
    pub to_destination_wallet: String,
}

impl NewMigrationRecord {
    /// Build the record for a burn.
    ///
    /// `destination_wallet` is the remapped recipient when an address
    /// mapping applies; `None` mints back to the wallet that burned.
    pub fn from_burn(
        burn: &Transfer,
        target: &MigrationTarget,
        destination_wallet: Option<String>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            destination_token_id: destination_token_id(burn.token_id, target.token_id_offset)?,
            origin_chain_id: burn.chain_id,
            origin_block_number: burn.block_number,
            burn_timestamp: burn.block_timestamp,
            burn_transaction_hash: burn.tx.hash().map(str::to_string),
            burn_transaction_id: burn.tx.id(),
            origin_token_address: burn.token_address.clone(),
            origin_token_id: burn.token_id,
            from_origin_wallet: burn.from_address.clone(),
            to_origin_wallet: burn.to_address.clone(),
            destination_chain_id: target.destination_chain_id,
            destination_token_address: target.destination_token_address.clone(),
            to_destination_wallet: destination_wallet.unwrap_or_else(|| burn.from_address.clone()),
        })
    }
}

/// A stored migration record ("Token" entity).
///
/// Created burned and unminted; `minted` flips to true exactly once,
/// together with the mint transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Store row id, increasing in insertion order
    pub id: i64,
    pub destination_token_id: u64,
    pub burned: bool,
    pub origin_chain_id: u64,
    pub origin_block_number: Option<u64>,
    pub burn_timestamp: DateTime<Utc>,
    pub burn_transaction_hash: Option<String>,
    pub burn_transaction_id: Option<u64>,
    pub origin_token_address: String,
    pub origin_token_id: u64,
    pub from_origin_wallet: String,
    pub to_origin_wallet: String,
    pub minted: bool,
    pub destination_chain_id: u64,
    pub destination_token_address: String,
    pub to_destination_wallet: String,
    /// Set for EVM destinations
    pub mint_transaction_hash: Option<String>,
    /// Set for off-chain protocol destinations
    pub mint_transaction_id: Option<String>,
}

/// Operator override redirecting migrated assets to another wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMapping {
    pub origin_chain_id: u64,
    pub destination_chain_id: u64,
    pub origin_wallet: String,
    pub destination_wallet: String,
}
