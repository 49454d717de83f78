//! EVM JSON-RPC transport for on-chain minting.

use super::onchain::{MintTransactor, OnChainMintRequest};
use crate::errors::MigrationError;
use crate::source::{TransactionStatus, TransactionStatusSource};
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use async_trait::async_trait;
use std::str::FromStr;

const WEI_PER_GWEI: u128 = 1_000_000_000;

sol! {
    #[sol(rpc)]
    interface IMigratedCollection {
        function safeMint(address to, uint256 tokenId) external;
        function ownerOf(uint256 tokenId) external view returns (address);
    }
}

/// Submits `safeMint` transactions and reads receipts over JSON-RPC.
pub struct AlloyTransactor<P> {
    provider: P,
}

impl AlloyTransactor<DynProvider> {
    /// Provider for `rpc_url` signing with `private_key` (hex).
    pub fn connect(rpc_url: &str, private_key: &str) -> Result<Self, MigrationError> {
        let signer = PrivateKeySigner::from_str(private_key.trim())
            .map_err(|e| MigrationError::Signer(e.to_string()))?;
        let url = reqwest::Url::parse(rpc_url)
            .map_err(|e| MigrationError::invalid_config(format!("destination RPC URL {rpc_url:?}: {e}")))?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();
        Ok(Self::new(provider))
    }
}

impl<P: Provider> AlloyTransactor<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address, MigrationError> {
    Address::from_str(value).map_err(|e| MigrationError::InvalidInput(format!("{field} {value:?}: {e}")))
}

#[async_trait]
impl<P: Provider> MintTransactor for AlloyTransactor<P> {
    async fn submit_mint(&self, request: &OnChainMintRequest) -> Result<String, MigrationError> {
        let contract = IMigratedCollection::new(
            parse_address("contract", &request.contract_address)?,
            &self.provider,
        );
        let recipient = parse_address("recipient", &request.recipient)?;

        let pending = contract
            .safeMint(recipient, U256::from(request.token_id))
            .gas_price(u128::from(request.gas_price_gwei) * WEI_PER_GWEI)
            .gas(request.gas_limit)
            .send()
            .await?;

        Ok(pending.tx_hash().to_string())
    }

    async fn owner_of(
        &self,
        contract_address: &str,
        token_id: u64,
    ) -> Result<Option<String>, MigrationError> {
        let contract = IMigratedCollection::new(parse_address("contract", contract_address)?, &self.provider);

        match contract.ownerOf(U256::from(token_id)).call().await {
            Ok(owner) if owner == Address::ZERO => Ok(None),
            Ok(owner) => Ok(Some(owner.to_string())),
            Err(e) if is_revert(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// `ownerOf` reverts for tokens that were never minted.
fn is_revert(error: &alloy::contract::Error) -> bool {
    match error {
        alloy::contract::Error::TransportError(e) => e.as_error_resp().is_some_and(|payload| {
            payload.as_revert_data().is_some() || payload.message.contains("execution reverted")
        }),
        _ => false,
    }
}

#[async_trait]
impl<P: Provider> TransactionStatusSource for AlloyTransactor<P> {
    async fn transaction_status(
        &self,
        tx_hash: &str,
        _chain_id: u64,
    ) -> Result<TransactionStatus, MigrationError> {
        let hash = B256::from_str(tx_hash)
            .map_err(|e| MigrationError::InvalidInput(format!("transaction hash {tx_hash:?}: {e}")))?;

        Ok(match self.provider.get_transaction_receipt(hash).await? {
            None => TransactionStatus::Pending,
            Some(receipt) if receipt.status() => TransactionStatus::Succeeded,
            Some(_) => TransactionStatus::Failed,
        })
    }
}
