use super::Minter;
use crate::errors::MigrationError;
use nft_migration_core::{group_by_recipient, split_group, MigrationRecord, MintBatch};
use std::sync::Arc;
use tracing::{debug, warn};

/// Groups unminted records into per-recipient batches.
///
/// Recipients the minter reports as ineligible are skipped for this pass;
/// their records stay unminted and are picked up again later.
pub struct MintBatcher {
    minter: Arc<dyn Minter>,
    batch_size: usize,
}

impl MintBatcher {
    pub fn new(minter: Arc<dyn Minter>, batch_size: usize) -> Self {
        Self { minter, batch_size }
    }

    pub async fn build(&self, records: &[MigrationRecord]) -> Result<Vec<MintBatch>, MigrationError> {
        let mut batches = Vec::new();

        for group in group_by_recipient(records) {
            match self.minter.is_eligible(&group.recipient).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(
                        recipient = %group.recipient,
                        tokens = group.token_ids.len(),
                        "Recipient not eligible, skipping"
                    );
                    continue;
                }
                Err(e) => {
                    warn!(
                        recipient = %group.recipient,
                        category = %e.category(),
                        error = %e,
                        "Eligibility check failed, skipping"
                    );
                    continue;
                }
            }

            let split = split_group(&group, self.batch_size)?;
            debug!(recipient = %group.recipient, batches = split.len(), "Batched recipient");
            batches.extend(split);
        }

        Ok(batches)
    }
}
