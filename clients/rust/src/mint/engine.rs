use super::{MintResult, MintStatus, Minter};
use crate::store::MigrationStore;
use nft_migration_core::MintBatch;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

/// Executes batches one at a time and records confirmed mints.
///
/// Failures never escape: they become [`MintStatus::Error`] results and the
/// affected records stay unminted for the next pass.
pub struct MintExecutionEngine {
    minter: Arc<dyn Minter>,
    store: Arc<dyn MigrationStore>,
    batch_delay: Duration,
}

impl MintExecutionEngine {
    pub fn new(minter: Arc<dyn Minter>, store: Arc<dyn MigrationStore>, batch_delay: Duration) -> Self {
        Self {
            minter,
            store,
            batch_delay,
        }
    }

    pub fn minter(&self) -> &Arc<dyn Minter> {
        &self.minter
    }

    /// Mint one batch and mark the confirmed tokens as minted.
    pub async fn mint_batch(&self, batch: &MintBatch) -> MintResult {
        let token_range = batch.token_range();
        let outcome = self.minter.mint(batch).await;

        let tx_identifiers: Vec<String> = outcome.confirmed.iter().map(|m| m.tx.to_string()).collect();
        let mut error_message = None;
        let mut minted = 0;

        if !outcome.confirmed.is_empty() {
            match self.store.mark_minted(&outcome.confirmed).await {
                Ok(updated) => minted = updated as usize,
                Err(e) => {
                    error!(
                        recipient = %batch.recipient,
                        tokens = %token_range,
                        category = %e.category(),
                        error = %e,
                        "Failed to record confirmed mints"
                    );
                    error_message = Some(e.to_string());
                }
            }
        }

        if let Some(e) = outcome.error {
            error!(
                backend = %self.minter.backend(),
                recipient = %batch.recipient,
                tokens = %token_range,
                confirmed = outcome.confirmed.len(),
                category = %e.category(),
                error = %e,
                "Mint batch failed"
            );
            error_message = Some(match error_message {
                Some(store_error) => format!("{e}; {store_error}"),
                None => e.to_string(),
            });
        }

        let status = if error_message.is_none() {
            info!(
                recipient = %batch.recipient,
                tokens = %token_range,
                minted,
                "Mint batch complete"
            );
            MintStatus::Success
        } else {
            MintStatus::Error
        };

        MintResult {
            status,
            recipient: batch.recipient.clone(),
            token_range,
            tx_identifiers,
            minted,
            error_message,
        }
    }

    /// Mint `batches` strictly in order, pausing after each one.
    pub async fn execute_all(&self, batches: &[MintBatch]) -> Vec<MintResult> {
        let mut results = Vec::with_capacity(batches.len());
        for batch in batches {
            results.push(self.mint_batch(batch).await);
            if !self.batch_delay.is_zero() {
                sleep(self.batch_delay).await;
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MintBackend;
    use crate::errors::MigrationError;
    use crate::mint::{ConfirmedMint, MintOutcome, MintTx};
    use crate::store::SqliteStore;
    use chrono::Utc;
    use nft_migration_core::{MigrationTarget, NewMigrationRecord, Transfer, TransferTx, NULL_ADDRESS};
    use std::sync::Mutex;

    /// Confirms every token except `fail_on`, which stops the batch.
    struct ScriptedMinter {
        fail_on: Option<u64>,
        calls: Mutex<Vec<Vec<u64>>>,
    }

    #[async_trait::async_trait]
    impl Minter for ScriptedMinter {
        fn backend(&self) -> MintBackend {
            MintBackend::OnChain
        }

        async fn mint(&self, batch: &MintBatch) -> MintOutcome {
            self.calls.lock().unwrap().push(batch.token_ids.clone());
            let mut confirmed = Vec::new();
            for &token_id in &batch.token_ids {
                if Some(token_id) == self.fail_on {
                    return MintOutcome::failed(
                        confirmed,
                        MigrationError::TransactionReverted {
                            tx: format!("0xmint{token_id}"),
                        },
                    );
                }
                confirmed.push(ConfirmedMint {
                    destination_token_id: token_id,
                    tx: MintTx::Hash(format!("0xmint{token_id}")),
                });
            }
            MintOutcome {
                confirmed,
                error: None,
            }
        }
    }

    async fn seeded_store(token_ids: &[u64]) -> Arc<SqliteStore> {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let target = MigrationTarget {
            destination_chain_id: 13_473,
            destination_token_address: "0xdestination".to_string(),
            token_id_offset: 0,
        };
        for &token_id in token_ids {
            let burn = Transfer {
                chain_id: 137,
                token_address: "0xorigin".to_string(),
                token_id,
                from_address: "0xalice".to_string(),
                to_address: NULL_ADDRESS.to_string(),
                block_number: Some(10),
                block_timestamp: Utc::now(),
                tx: TransferTx::Hash(format!("0xburn{token_id}")),
            };
            let record = NewMigrationRecord::from_burn(&burn, &target, None).unwrap();
            store.insert_record(&record).await.unwrap();
        }
        store
    }

    fn batch(token_ids: Vec<u64>) -> MintBatch {
        MintBatch {
            recipient: "0xalice".to_string(),
            contract_address: "0xdestination".to_string(),
            token_ids,
        }
    }

    fn engine(minter: Arc<ScriptedMinter>, store: Arc<SqliteStore>) -> MintExecutionEngine {
        MintExecutionEngine::new(minter, store, Duration::ZERO)
    }

    async fn unminted(store: &SqliteStore) -> Vec<u64> {
        store
            .unminted_records(13_473, "0xdestination")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.destination_token_id)
            .collect()
    }

    #[tokio::test]
    async fn test_successful_batch_marks_every_token() {
        let store = seeded_store(&[1, 2, 3]).await;
        let minter = Arc::new(ScriptedMinter {
            fail_on: None,
            calls: Mutex::new(Vec::new()),
        });

        let result = engine(minter, store.clone()).mint_batch(&batch(vec![1, 2, 3])).await;

        assert!(result.is_success());
        assert_eq!(result.minted, 3);
        assert_eq!(result.token_range, "1..3");
        assert_eq!(result.tx_identifiers, vec!["0xmint1", "0xmint2", "0xmint3"]);
        assert!(unminted(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_keeps_unconfirmed_tokens_pending() {
        let store = seeded_store(&[1, 2, 3]).await;
        let minter = Arc::new(ScriptedMinter {
            fail_on: Some(2),
            calls: Mutex::new(Vec::new()),
        });

        let result = engine(minter, store.clone()).mint_batch(&batch(vec![1, 2, 3])).await;

        assert_eq!(result.status, MintStatus::Error);
        assert_eq!(result.minted, 1);
        assert!(result.error_message.unwrap().contains("0xmint2"));
        assert_eq!(unminted(&store).await, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_execute_all_runs_every_batch_after_failure() {
        let store = seeded_store(&[1, 2, 3, 4]).await;
        let minter = Arc::new(ScriptedMinter {
            fail_on: Some(1),
            calls: Mutex::new(Vec::new()),
        });
        let engine = MintExecutionEngine::new(minter.clone(), store.clone(), Duration::from_millis(1));

        let results = engine.execute_all(&[batch(vec![1, 2]), batch(vec![3, 4])]).await;

        assert_eq!(results.len(), 2);
        assert!(!results[0].is_success());
        assert!(results[1].is_success());
        assert_eq!(*minter.calls.lock().unwrap(), vec![vec![1, 2], vec![3, 4]]);
        assert_eq!(unminted(&store).await, vec![1, 2]);
    }
}
