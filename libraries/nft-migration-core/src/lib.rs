//! Core types for burn-to-mint NFT migration.
//!
//! Everything in this crate is free of I/O: the canonical transfer shape
//! produced by chain-data adapters, the persisted migration record, block
//! window arithmetic for the scanner, and the batching rules used by the
//! minting side.

pub mod address;
pub mod batch;
pub mod error;
pub mod record;
pub mod transfer;
pub mod window;

pub use address::{addresses_match, normalize_address, NULL_ADDRESS};
pub use batch::{build_batches, group_by_recipient, split_group, MintBatch, RecipientGroup};
pub use error::CoreError;
pub use record::{
    destination_token_id, AddressMapping, MigrationRecord, MigrationTarget, NewMigrationRecord,
};
pub use transfer::{Transfer, TransferTx};
pub use window::{clamp_scan_range, partition_windows, BlockWindow, MAX_PROVIDER_BLOCK_RANGE};

/// Chain ids served by the off-chain batched minting protocol (mainnet, sandbox).
pub const IMX_MAINNET_CHAIN_ID: u64 = 5000;
pub const IMX_SANDBOX_CHAIN_ID: u64 = 5001;

/// Returns true when `chain_id` identifies the off-chain protocol rather than an EVM chain.
pub fn is_offchain_protocol_chain(chain_id: u64) -> bool {
    chain_id == IMX_MAINNET_CHAIN_ID || chain_id == IMX_SANDBOX_CHAIN_ID
}
