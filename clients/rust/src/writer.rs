//! Turns detected burns into persisted migration records.

use crate::errors::{ErrorCategory, MigrationError};
use crate::store::{InsertOutcome, MigrationStore};
use nft_migration_core::{MigrationTarget, NewMigrationRecord, Transfer};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Counts from one [`BurnRecordWriter::load`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub collisions: usize,
    pub skipped: usize,
}

impl LoadSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.duplicates + self.collisions + self.skipped
    }
}

/// Writes one migration record per burn.
///
/// Per-record data problems (duplicates, destination id collisions,
/// offset overflow, constraint failures) are logged and skipped. A store
/// failure aborts the load so the caller can retry the whole window.
pub struct BurnRecordWriter {
    store: Arc<dyn MigrationStore>,
    target: MigrationTarget,
    address_mapping_enabled: bool,
}

impl BurnRecordWriter {
    pub fn new(store: Arc<dyn MigrationStore>, target: MigrationTarget, address_mapping_enabled: bool) -> Self {
        Self {
            store,
            target,
            address_mapping_enabled,
        }
    }

    pub fn target(&self) -> &MigrationTarget {
        &self.target
    }

    async fn destination_wallet(&self, burn: &Transfer) -> Result<Option<String>, MigrationError> {
        if !self.address_mapping_enabled {
            return Ok(None);
        }
        let mapping = self
            .store
            .find_address_mapping(
                burn.chain_id,
                self.target.destination_chain_id,
                &burn.from_address,
            )
            .await?;
        Ok(mapping.map(|m| m.destination_wallet))
    }

    /// Persist every burn in `burns`.
    pub async fn load(&self, burns: &[Transfer]) -> Result<LoadSummary, MigrationError> {
        let mut summary = LoadSummary::default();
        if burns.is_empty() {
            return Ok(summary);
        }
        info!(count = burns.len(), "Loading burn records");

        for burn in burns {
            let destination_wallet = self.destination_wallet(burn).await?;
            let record = match NewMigrationRecord::from_burn(burn, &self.target, destination_wallet) {
                Ok(record) => record,
                Err(e) => {
                    error!(token_id = burn.token_id, tx = %burn.tx, error = %e, "Cannot build migration record");
                    summary.skipped += 1;
                    continue;
                }
            };

            match self.store.insert_record(&record).await {
                Ok(InsertOutcome::Inserted(id)) => {
                    debug!(
                        id,
                        origin_token_id = record.origin_token_id,
                        destination_token_id = record.destination_token_id,
                        recipient = %record.to_destination_wallet,
                        "Recorded burn"
                    );
                    summary.inserted += 1;
                }
                Ok(InsertOutcome::Duplicate) => {
                    debug!(origin_token_id = record.origin_token_id, "Burn already recorded");
                    summary.duplicates += 1;
                }
                Ok(InsertOutcome::DestinationCollision) => {
                    error!(
                        origin_token_id = record.origin_token_id,
                        destination_token_id = record.destination_token_id,
                        "Destination token id already assigned to another origin token"
                    );
                    summary.collisions += 1;
                }
                Err(e) if e.category() == ErrorCategory::Data => {
                    warn!(origin_token_id = record.origin_token_id, error = %e, "Skipping burn record");
                    summary.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            collisions = summary.collisions,
            skipped = summary.skipped,
            "Loaded burn records"
        );
        Ok(summary)
    }
}
