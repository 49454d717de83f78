//! Canonical token transfer produced by chain-data adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::addresses_match;

/// Identifier of the transaction that carried a transfer.
///
/// EVM providers report a transaction hash; the off-chain protocol reports
/// a numeric transaction id and no block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferTx {
    Hash(String),
    Id(u64),
}

impl TransferTx {
    pub fn hash(&self) -> Option<&str> {
        match self {
            TransferTx::Hash(hash) => Some(hash),
            TransferTx::Id(_) => None,
        }
    }

    pub fn id(&self) -> Option<u64> {
        match self {
            TransferTx::Hash(_) => None,
            TransferTx::Id(id) => Some(*id),
        }
    }
}

impl std::fmt::Display for TransferTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferTx::Hash(hash) => write!(f, "{}", hash),
            TransferTx::Id(id) => write!(f, "#{}", id),
        }
    }
}

/// A single NFT transfer, normalised across providers.
///
/// `token_address` and addresses are lower-case hex. Together
/// `token_address` and `token_id` identify one asset instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Origin chain id
    pub chain_id: u64,
    /// Collection contract address
    pub token_address: String,
    pub token_id: u64,
    /// Sender wallet
    pub from_address: String,
    /// Recipient wallet (the burn address for burns)
    pub to_address: String,
    /// Block number, absent for off-chain protocol transfers
    pub block_number: Option<u64>,
    pub block_timestamp: DateTime<Utc>,
    pub tx: TransferTx,
}

impl Transfer {
    /// True when this transfer sends the token to `burn_address`.
    pub fn is_burn(&self, burn_address: &str) -> bool {
        addresses_match(&self.to_address, burn_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer_to(to: &str) -> Transfer {
        Transfer {
            chain_id: 137,
            token_address: "0x0551b1c0b01928ab22a565b58427ff0176de883c".to_string(),
            token_id: 42,
            from_address: "0x1111111111111111111111111111111111111111".to_string(),
            to_address: to.to_string(),
            block_number: Some(1000),
            block_timestamp: Utc::now(),
            tx: TransferTx::Hash("0xabc".to_string()),
        }
    }

    #[test]
    fn test_is_burn_case_insensitive() {
        let transfer = transfer_to("0x000000000000000000000000000000000000DEAD");
        assert!(transfer.is_burn("0x000000000000000000000000000000000000dead"));
        assert!(!transfer.is_burn(crate::NULL_ADDRESS));
    }

    #[test]
    fn test_transfer_tx_accessors() {
        let hash = TransferTx::Hash("0xabc".to_string());
        assert_eq!(hash.hash(), Some("0xabc"));
        assert_eq!(hash.id(), None);

        let id = TransferTx::Id(7);
        assert_eq!(id.id(), Some(7));
        assert_eq!(id.to_string(), "#7");
    }

    #[test]
    fn test_transfer_tx_serde_shape() {
        let json = serde_json::to_string(&TransferTx::Id(9)).unwrap();
        assert_eq!(json, r#"{"id":9}"#);
    }
}
