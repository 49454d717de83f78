//! Minting loop: drains unminted records into the destination collection.

use crate::errors::MigrationError;
use crate::mint::{MintBatcher, MintExecutionEngine, MintResult};
use crate::monitor::MonitorHandle;
use crate::store::MigrationStore;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

/// Counts for one minting pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MintTickSummary {
    /// Unminted records found at the start of the pass
    pub records: usize,
    pub batches: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records flipped to minted during the pass
    pub minted: usize,
}

impl MintTickSummary {
    fn from_results(records: usize, results: &[MintResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            records,
            batches: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            minted: results.iter().map(|r| r.minted).sum(),
        }
    }
}

pub struct MintingLoop {
    store: Arc<dyn MigrationStore>,
    batcher: MintBatcher,
    engine: MintExecutionEngine,
    destination_chain_id: u64,
    destination_collection: String,
    interval: Duration,
}

impl MintingLoop {
    pub fn new(
        store: Arc<dyn MigrationStore>,
        batcher: MintBatcher,
        engine: MintExecutionEngine,
        destination_chain_id: u64,
        destination_collection: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            batcher,
            engine,
            destination_chain_id,
            destination_collection: destination_collection.into(),
            interval,
        }
    }

    /// Fetch, batch and mint everything currently pending.
    pub async fn tick(&self) -> Result<MintTickSummary, MigrationError> {
        let records = self
            .store
            .unminted_records(self.destination_chain_id, &self.destination_collection)
            .await?;
        if records.is_empty() {
            debug!("No records waiting to be minted");
            return Ok(MintTickSummary::default());
        }

        let batches = self.batcher.build(&records).await?;
        let results = self.engine.execute_all(&batches).await;
        let summary = MintTickSummary::from_results(records.len(), &results);

        info!(
            records = summary.records,
            batches = summary.batches,
            succeeded = summary.succeeded,
            failed = summary.failed,
            minted = summary.minted,
            "Minting pass complete"
        );
        Ok(summary)
    }

    /// Run passes every `interval` until `stop` fires.
    ///
    /// A pass in progress is allowed to finish its current batch before
    /// the stop is observed, so no confirmed mint goes unrecorded.
    pub async fn run(&self, mut stop: oneshot::Receiver<()>) {
        info!(
            backend = %self.engine.minter().backend(),
            destination_chain_id = self.destination_chain_id,
            collection = %self.destination_collection,
            interval_ms = self.interval.as_millis() as u64,
            "Minting loop started"
        );

        loop {
            if let Err(e) = self.tick().await {
                error!(category = %e.category(), error = %e, "Minting pass failed");
            }

            tokio::select! {
                _ = &mut stop => break,
                _ = sleep(self.interval) => {}
            }
        }

        info!("Minting loop stopped");
    }

    pub fn spawn(self: Arc<Self>) -> MonitorHandle {
        MonitorHandle::spawn(move |stop| async move { self.run(stop).await })
    }
}
