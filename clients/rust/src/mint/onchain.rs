//! `safeMint` backend: one signed transaction per token.

use super::{ConfirmedMint, MintOutcome, MintTx, Minter};
use crate::config::{ConfirmationConfig, MintBackend};
use crate::errors::MigrationError;
use crate::source::{TransactionStatus, TransactionStatusSource};
use async_trait::async_trait;
use nft_migration_core::{addresses_match, MintBatch};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

/// A single `safeMint(to, tokenId)` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnChainMintRequest {
    pub contract_address: String,
    pub recipient: String,
    pub token_id: u64,
    pub gas_price_gwei: u64,
    pub gas_limit: u64,
}

/// Signs and broadcasts mint transactions.
#[async_trait]
pub trait MintTransactor: Send + Sync {
    /// Submit the transaction and return its hash without waiting for inclusion.
    async fn submit_mint(&self, request: &OnChainMintRequest) -> Result<String, MigrationError>;

    /// Current owner of `token_id`, or `None` if it has not been minted.
    async fn owner_of(
        &self,
        contract_address: &str,
        token_id: u64,
    ) -> Result<Option<String>, MigrationError>;
}

pub struct OnChainMinter {
    transactor: Arc<dyn MintTransactor>,
    receipts: Arc<dyn TransactionStatusSource>,
    chain_id: u64,
    gas_price_gwei: u64,
    gas_limit: u64,
    confirmation: ConfirmationConfig,
}

impl OnChainMinter {
    pub fn new(
        transactor: Arc<dyn MintTransactor>,
        receipts: Arc<dyn TransactionStatusSource>,
        chain_id: u64,
        gas_price_gwei: u64,
        gas_limit: u64,
        confirmation: ConfirmationConfig,
    ) -> Self {
        Self {
            transactor,
            receipts,
            chain_id,
            gas_price_gwei,
            gas_limit,
            confirmation,
        }
    }

    /// Poll until `tx_hash` is confirmed, at most `max_attempts` times.
    ///
    /// Lookup errors count as "not yet"; only the attempt bound ends the wait.
    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<(), MigrationError> {
        let interval = Duration::from_millis(self.confirmation.poll_interval_ms);

        for attempt in 1..=self.confirmation.max_attempts {
            match self.receipts.transaction_status(tx_hash, self.chain_id).await {
                Ok(TransactionStatus::Succeeded) => return Ok(()),
                Ok(TransactionStatus::Failed) => {
                    return Err(MigrationError::TransactionReverted {
                        tx: tx_hash.to_string(),
                    })
                }
                Ok(TransactionStatus::Pending) => {}
                Err(e) => warn!(tx = tx_hash, attempt, error = %e, "Receipt lookup failed"),
            }
            if attempt < self.confirmation.max_attempts {
                sleep(interval).await;
            }
        }

        Err(MigrationError::TransactionUnconfirmed {
            tx: tx_hash.to_string(),
            waited_ms: self.confirmation.max_wait_ms(),
        })
    }
}

#[async_trait]
impl Minter for OnChainMinter {
    fn backend(&self) -> MintBackend {
        MintBackend::OnChain
    }

    /// Mints tokens in order and stops at the first failure.
    ///
    /// A token the recipient already owns is confirmed without a new
    /// submission; one owned by anyone else fails the batch.
    async fn mint(&self, batch: &MintBatch) -> MintOutcome {
        let mut confirmed = Vec::with_capacity(batch.len());

        for &token_id in &batch.token_ids {
            match self.transactor.owner_of(&batch.contract_address, token_id).await {
                Ok(None) => {}
                Ok(Some(owner)) if addresses_match(&owner, &batch.recipient) => {
                    info!(token_id, recipient = %batch.recipient, "Token already minted to recipient");
                    confirmed.push(ConfirmedMint {
                        destination_token_id: token_id,
                        tx: MintTx::AlreadyOwned,
                    });
                    continue;
                }
                Ok(Some(owner)) => {
                    let reason = format!("token {token_id} already owned by {owner}");
                    return MintOutcome::failed(confirmed, MigrationError::MintRejected { reason });
                }
                Err(e) => return MintOutcome::failed(confirmed, e),
            }

            let request = OnChainMintRequest {
                contract_address: batch.contract_address.clone(),
                recipient: batch.recipient.clone(),
                token_id,
                gas_price_gwei: self.gas_price_gwei,
                gas_limit: self.gas_limit,
            };

            let tx_hash = match self.transactor.submit_mint(&request).await {
                Ok(tx_hash) => tx_hash,
                Err(e) => return MintOutcome::failed(confirmed, e),
            };
            info!(token_id, recipient = %batch.recipient, tx = %tx_hash, "Submitted mint");

            if let Err(e) = self.wait_for_confirmation(&tx_hash).await {
                return MintOutcome::failed(confirmed, e);
            }
            confirmed.push(ConfirmedMint {
                destination_token_id: token_id,
                tx: MintTx::Hash(tx_hash),
            });
        }

        MintOutcome {
            confirmed,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Assigns `0x<token id>` hashes; the receipt map decides each outcome.
    struct FakeChain {
        submitted: Mutex<Vec<OnChainMintRequest>>,
        statuses: HashMap<String, TransactionStatus>,
        owners: HashMap<u64, String>,
        reject_token: Option<u64>,
    }

    #[async_trait]
    impl MintTransactor for FakeChain {
        async fn submit_mint(&self, request: &OnChainMintRequest) -> Result<String, MigrationError> {
            if self.reject_token == Some(request.token_id) {
                return Err(MigrationError::Signer("nonce too low".to_string()));
            }
            self.submitted.lock().unwrap().push(request.clone());
            Ok(format!("0x{}", request.token_id))
        }

        async fn owner_of(&self, _contract_address: &str, token_id: u64) -> Result<Option<String>, MigrationError> {
            Ok(self.owners.get(&token_id).cloned())
        }
    }

    #[async_trait]
    impl TransactionStatusSource for FakeChain {
        async fn transaction_status(&self, tx_hash: &str, _chain_id: u64) -> Result<TransactionStatus, MigrationError> {
            Ok(self
                .statuses
                .get(tx_hash)
                .copied()
                .unwrap_or(TransactionStatus::Succeeded))
        }
    }

    fn minter(chain: Arc<FakeChain>) -> OnChainMinter {
        OnChainMinter::new(
            chain.clone(),
            chain,
            13_473,
            40,
            250_000,
            ConfirmationConfig {
                poll_interval_ms: 1,
                max_attempts: 3,
            },
        )
    }

    fn batch(token_ids: Vec<u64>) -> MintBatch {
        MintBatch {
            recipient: "0xalice".to_string(),
            contract_address: "0xdestination".to_string(),
            token_ids,
        }
    }

    fn chain(statuses: &[(&str, TransactionStatus)], reject_token: Option<u64>) -> Arc<FakeChain> {
        Arc::new(FakeChain {
            submitted: Mutex::new(Vec::new()),
            statuses: statuses.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            owners: HashMap::new(),
            reject_token,
        })
    }

    fn chain_with_owners(owners: &[(u64, &str)]) -> Arc<FakeChain> {
        Arc::new(FakeChain {
            submitted: Mutex::new(Vec::new()),
            statuses: HashMap::new(),
            owners: owners.iter().map(|(id, owner)| (*id, owner.to_string())).collect(),
            reject_token: None,
        })
    }

    #[tokio::test]
    async fn test_mints_every_token_with_gas_settings() {
        let chain = chain(&[], None);
        let outcome = minter(chain.clone()).mint(&batch(vec![7, 8])).await;

        assert!(outcome.error.is_none());
        assert_eq!(
            outcome.confirmed,
            vec![
                ConfirmedMint {
                    destination_token_id: 7,
                    tx: MintTx::Hash("0x7".to_string())
                },
                ConfirmedMint {
                    destination_token_id: 8,
                    tx: MintTx::Hash("0x8".to_string())
                },
            ]
        );
        let submitted = chain.submitted.lock().unwrap();
        assert_eq!(submitted[0].gas_price_gwei, 40);
        assert_eq!(submitted[0].gas_limit, 250_000);
        assert_eq!(submitted[0].recipient, "0xalice");
    }

    #[tokio::test]
    async fn test_revert_stops_batch() {
        let chain = chain(&[("0x8", TransactionStatus::Failed)], None);
        let outcome = minter(chain.clone()).mint(&batch(vec![7, 8, 9])).await;

        assert_eq!(outcome.confirmed.len(), 1);
        assert!(matches!(outcome.error, Some(MigrationError::TransactionReverted { .. })));
        assert_eq!(chain.submitted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_confirmation_wait_is_bounded() {
        let chain = chain(&[("0x7", TransactionStatus::Pending)], None);
        let outcome = minter(chain).mint(&batch(vec![7])).await;

        assert!(outcome.confirmed.is_empty());
        assert!(matches!(
            outcome.error,
            Some(MigrationError::TransactionUnconfirmed { waited_ms: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_submission_failure_keeps_earlier_confirmations() {
        let chain = chain(&[], Some(8));
        let outcome = minter(chain).mint(&batch(vec![7, 8])).await;

        assert_eq!(outcome.confirmed.len(), 1);
        assert!(matches!(outcome.error, Some(MigrationError::Signer(_))));
    }

    #[tokio::test]
    async fn test_token_owned_by_recipient_is_confirmed_without_submission() {
        let chain = chain_with_owners(&[(7, "0xALICE")]);
        let outcome = minter(chain.clone()).mint(&batch(vec![7, 8])).await;

        assert!(outcome.error.is_none());
        assert_eq!(
            outcome.confirmed,
            vec![
                ConfirmedMint {
                    destination_token_id: 7,
                    tx: MintTx::AlreadyOwned
                },
                ConfirmedMint {
                    destination_token_id: 8,
                    tx: MintTx::Hash("0x8".to_string())
                },
            ]
        );
        let submitted: Vec<u64> = chain.submitted.lock().unwrap().iter().map(|r| r.token_id).collect();
        assert_eq!(submitted, vec![8]);
    }

    #[tokio::test]
    async fn test_token_owned_by_someone_else_is_rejected() {
        let chain = chain_with_owners(&[(8, "0xmallory")]);
        let outcome = minter(chain.clone()).mint(&batch(vec![7, 8, 9])).await;

        assert_eq!(outcome.confirmed.len(), 1);
        assert!(matches!(outcome.error, Some(MigrationError::MintRejected { .. })));
        assert_eq!(chain.submitted.lock().unwrap().len(), 1);
    }
}
