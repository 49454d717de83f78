//! Backfill/monitor loop for block-based origin chains.
//!
//! The monitor keeps a watermark (the last fully scanned block). While the
//! chain head is at least one polling interval ahead it backfills in
//! fixed-size windows, persisting the watermark after every window; once
//! caught up it idles until another full interval has been produced.
//!
//! [`MonitorHandle`] is shared by every long-running loop in this crate.

use crate::config::MonitorConfig;
use crate::errors::MigrationError;
use crate::scanner::{BurnScanner, ScanRequest};
use crate::store::{MigrationStore, Watermark};
use crate::writer::{BurnRecordWriter, LoadSummary};
use nft_migration_core::{partition_windows, BlockWindow};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// Collection being watched for burns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub chain_id: u64,
    pub collection_address: String,
    pub burn_address: String,
}

/// Monitor state for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// At least one full window was available and processed
    Backfilling,
    /// Less than one polling interval behind the head
    IdlePolling,
}

/// Result of one monitor iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub state: MonitorState,
    pub watermark: u64,
    pub windows: usize,
    pub load: LoadSummary,
}

/// Totals for a multi-window backfill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub windows: usize,
    /// Last block covered, `None` if nothing was scanned
    pub last_block: Option<u64>,
    pub load: LoadSummary,
}

impl BackfillSummary {
    fn absorb(&mut self, load: LoadSummary) {
        self.load.inserted += load.inserted;
        self.load.duplicates += load.duplicates;
        self.load.collisions += load.collisions;
        self.load.skipped += load.skipped;
    }
}

/// Scans an origin collection for burns and records them.
pub struct BackfillMonitor {
    scanner: BurnScanner,
    writer: BurnRecordWriter,
    store: Arc<dyn MigrationStore>,
    target: WatchTarget,
    config: MonitorConfig,
}

impl BackfillMonitor {
    pub fn new(
        scanner: BurnScanner,
        writer: BurnRecordWriter,
        store: Arc<dyn MigrationStore>,
        target: WatchTarget,
        config: MonitorConfig,
    ) -> Self {
        Self {
            scanner,
            writer,
            store,
            target,
            config,
        }
    }

    /// Starting watermark: a forced start block wins, then the persisted
    /// watermark, then the current head (watch only new burns).
    pub async fn resolve_watermark(&self) -> Result<u64, MigrationError> {
        if let Some(start_block) = self.config.start_block {
            return Ok(start_block.saturating_sub(1));
        }

        let persisted = self
            .store
            .load_watermark(self.target.chain_id, &self.target.collection_address)
            .await?;
        if let Some(last_polled_block) = persisted.and_then(|w| w.last_polled_block) {
            return Ok(last_polled_block);
        }

        self.safe_head().await
    }

    /// Chain head minus the reorg safety depth.
    pub async fn safe_head(&self) -> Result<u64, MigrationError> {
        let head = self.scanner.current_block(self.target.chain_id).await?;
        Ok(head.saturating_sub(self.config.reorg_safety_depth))
    }

    /// Scan and record one window.
    ///
    /// Returns the last block actually covered, which is short of
    /// `window.to_block` only if the head moved backwards underneath us.
    async fn process_window(&self, window: BlockWindow) -> Result<(Option<u64>, LoadSummary), MigrationError> {
        let mut from_block = window.from_block;
        let mut covered = None;
        let mut totals = BackfillSummary::default();

        loop {
            let outcome = self
                .scanner
                .scan(&ScanRequest {
                    chain_id: self.target.chain_id,
                    collection_address: self.target.collection_address.clone(),
                    burn_address: self.target.burn_address.clone(),
                    from_block,
                    to_block: window.to_block,
                })
                .await?;
            totals.absorb(self.writer.load(&outcome.burns).await?);

            let Some(scanned) = outcome.window else {
                warn!(%window, from_block, "Window not reachable from the current head");
                break;
            };
            covered = Some(scanned.to_block);
            if scanned.to_block >= window.to_block {
                break;
            }
            from_block = scanned.to_block + 1;
        }

        Ok((covered, totals.load))
    }

    async fn run_windows(
        &self,
        from_block: u64,
        to_block: u64,
        persist: bool,
        watermark: &mut u64,
    ) -> Result<BackfillSummary, MigrationError> {
        let mut summary = BackfillSummary::default();

        for window in partition_windows(from_block, to_block, self.config.polling_interval_blocks)? {
            info!(%window, "Backfilling window");
            let (covered, load) = self.process_window(window).await?;
            summary.absorb(load);
            summary.windows += 1;

            let Some(covered) = covered else { break };
            *watermark = covered;
            summary.last_block = Some(covered);
            if persist {
                self.store
                    .save_watermark(&Watermark {
                        chain_id: self.target.chain_id,
                        collection_address: self.target.collection_address.clone(),
                        last_polled_block: Some(covered),
                        cursor: None,
                    })
                    .await?;
            }
            if covered < window.to_block {
                break;
            }
        }

        Ok(summary)
    }

    /// One-shot backfill of `[from_block, to_block]`; the live watermark is left alone.
    pub async fn backfill_range(&self, from_block: u64, to_block: u64) -> Result<BackfillSummary, MigrationError> {
        let mut progress = from_block.saturating_sub(1);
        self.run_windows(from_block, to_block, false, &mut progress).await
    }

    /// One monitor iteration starting after `watermark`.
    ///
    /// `watermark` advances window by window, so progress made before an
    /// error is kept.
    pub async fn tick(&self, watermark: &mut u64) -> Result<TickOutcome, MigrationError> {
        let head = self.safe_head().await?;

        if head.saturating_sub(*watermark) < self.config.polling_interval_blocks {
            return Ok(TickOutcome {
                state: MonitorState::IdlePolling,
                watermark: *watermark,
                windows: 0,
                load: LoadSummary::default(),
            });
        }

        let from_block = *watermark + 1;
        let summary = self.run_windows(from_block, head, true, watermark).await?;
        Ok(TickOutcome {
            state: MonitorState::Backfilling,
            watermark: *watermark,
            windows: summary.windows,
            load: summary.load,
        })
    }

    /// Run until `stop` fires. Every error is logged and the loop continues.
    pub async fn run(&self, mut stop: oneshot::Receiver<()>) {
        let idle_delay = Duration::from_millis(self.config.idle_delay_ms);
        let error_delay = Duration::from_millis(self.config.error_delay_ms);
        let mut watermark: Option<u64> = None;

        info!(
            chain_id = self.target.chain_id,
            collection = %self.target.collection_address,
            burn_address = %self.target.burn_address,
            polling_interval_blocks = self.config.polling_interval_blocks,
            "Burn monitor started"
        );

        loop {
            let delay = tokio::select! {
                _ = &mut stop => break,
                result = self.iterate(&mut watermark) => match result {
                    Ok(MonitorState::Backfilling) => Duration::ZERO,
                    Ok(MonitorState::IdlePolling) => idle_delay,
                    Err(e) => {
                        error!(category = %e.category(), error = %e, "Monitor iteration failed");
                        error_delay
                    }
                },
            };

            if !delay.is_zero() {
                tokio::select! {
                    _ = &mut stop => break,
                    _ = sleep(delay) => {}
                }
            }
        }

        info!(watermark = ?watermark, "Burn monitor stopped");
    }

    async fn iterate(&self, watermark: &mut Option<u64>) -> Result<MonitorState, MigrationError> {
        let current = match *watermark {
            Some(current) => current,
            None => {
                let resolved = self.resolve_watermark().await?;
                info!(watermark = resolved, "Resolved starting watermark");
                resolved
            }
        };
        let mut current = current;
        let result = self.tick(&mut current).await;
        *watermark = Some(current);

        let outcome = result?;
        if outcome.state == MonitorState::Backfilling {
            info!(
                watermark = outcome.watermark,
                windows = outcome.windows,
                inserted = outcome.load.inserted,
                "Backfill pass complete"
            );
        }
        Ok(outcome.state)
    }

    /// Spawn the monitor on the runtime.
    pub fn spawn(self: Arc<Self>) -> MonitorHandle {
        MonitorHandle::spawn(move |stop| async move { self.run(stop).await })
    }
}

/// Handle to a running loop.
pub struct MonitorHandle {
    stop_sender: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl MonitorHandle {
    /// Spawn `body` with a stop signal.
    pub fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (stop_sender, stop_receiver) = oneshot::channel();
        let handle = tokio::spawn(body(stop_receiver));
        Self {
            stop_sender: Some(stop_sender),
            handle: Some(handle),
        }
    }

    /// Stop the loop.
    pub fn stop(&mut self) {
        if let Some(sender) = self.stop_sender.take() {
            let _ = sender.send(());
        }
    }

    /// Wait for the loop to finish (also stops if still running).
    pub async fn join(&mut self) -> Result<(), tokio::task::JoinError> {
        self.stop();
        if let Some(handle) = self.handle.take() {
            handle.await
        } else {
            Ok(())
        }
    }

    /// Stop and forget the handle without waiting.
    pub fn abort(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetryConfig, ScanConfig};
    use crate::source::{TransferPage, TransferQuery, TransferSource};
    use crate::store::SqliteStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use nft_migration_core::{MigrationTarget, Transfer, TransferTx, NULL_ADDRESS};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Chain with a movable head and one burn per listed block.
    struct FakeChain {
        head: AtomicU64,
        burn_blocks: Vec<u64>,
        queries: Mutex<Vec<(u64, u64)>>,
    }

    #[async_trait]
    impl TransferSource for FakeChain {
        async fn current_block(&self, _chain_id: u64) -> Result<u64, MigrationError> {
            Ok(self.head.load(Ordering::SeqCst))
        }

        async fn transfers(
            &self,
            query: &TransferQuery,
            _cursor: Option<&str>,
        ) -> Result<TransferPage, MigrationError> {
            self.queries
                .lock()
                .unwrap()
                .push((query.from_block, query.to_block));
            let transfers = self
                .burn_blocks
                .iter()
                .filter(|b| (query.from_block..=query.to_block).contains(*b))
                .map(|&block| Transfer {
                    chain_id: 137,
                    token_address: "0xorigin".to_string(),
                    token_id: block,
                    from_address: "0xholder".to_string(),
                    to_address: NULL_ADDRESS.to_string(),
                    block_number: Some(block),
                    block_timestamp: Utc::now(),
                    tx: TransferTx::Hash(format!("0x{block:x}")),
                })
                .collect();
            Ok(TransferPage { transfers, cursor: None })
        }
    }

    async fn monitor(
        chain: Arc<FakeChain>,
        config: MonitorConfig,
        max_block_range: u64,
    ) -> (BackfillMonitor, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let scanner = BurnScanner::new(
            chain,
            &ScanConfig {
                max_block_range,
                retry: RetryConfig::fixed(1),
            },
        );
        let writer = BurnRecordWriter::new(
            store.clone(),
            MigrationTarget {
                destination_chain_id: 13_473,
                destination_token_address: "0xdestination".to_string(),
                token_id_offset: 0,
            },
            false,
        );
        let target = WatchTarget {
            chain_id: 137,
            collection_address: "0xorigin".to_string(),
            burn_address: NULL_ADDRESS.to_string(),
        };
        (BackfillMonitor::new(scanner, writer, store.clone(), target, config), store)
    }

    fn chain(head: u64, burn_blocks: Vec<u64>) -> Arc<FakeChain> {
        Arc::new(FakeChain {
            head: AtomicU64::new(head),
            burn_blocks,
            queries: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_tick_backfills_windows_and_persists_watermark() {
        let chain = chain(10_500, vec![10_001, 10_900, 11_200]);
        let config = MonitorConfig::new().with_polling_interval_blocks(200);
        let (monitor, store) = monitor(chain.clone(), config, 1_000_000).await;

        let mut watermark = 10_000;
        let outcome = monitor.tick(&mut watermark).await.unwrap();

        assert_eq!(outcome.state, MonitorState::Backfilling);
        assert_eq!(outcome.windows, 3);
        assert_eq!(watermark, 10_500);
        assert_eq!(outcome.load.inserted, 1);
        assert_eq!(
            *chain.queries.lock().unwrap(),
            vec![(10_001, 10_200), (10_201, 10_400), (10_401, 10_500)]
        );
        let persisted = store.load_watermark(137, "0xorigin").await.unwrap().unwrap();
        assert_eq!(persisted.last_polled_block, Some(10_500));
    }

    #[tokio::test]
    async fn test_tick_idles_until_a_full_interval_is_available() {
        let chain = chain(10_150, vec![]);
        let config = MonitorConfig::new().with_polling_interval_blocks(200);
        let (monitor, _) = monitor(chain.clone(), config, 1_000_000).await;

        let mut watermark = 10_000;
        let outcome = monitor.tick(&mut watermark).await.unwrap();
        assert_eq!(outcome.state, MonitorState::IdlePolling);
        assert_eq!(watermark, 10_000);
        assert!(chain.queries.lock().unwrap().is_empty());

        chain.head.store(10_200, Ordering::SeqCst);
        let outcome = monitor.tick(&mut watermark).await.unwrap();
        assert_eq!(outcome.state, MonitorState::Backfilling);
        assert_eq!(watermark, 10_200);
    }

    #[tokio::test]
    async fn test_reorg_safety_depth_holds_back_the_head() {
        let chain = chain(10_300, vec![]);
        let config = MonitorConfig::new()
            .with_polling_interval_blocks(200)
            .with_reorg_safety_depth(50);
        let (monitor, _) = monitor(chain, config, 1_000_000).await;

        let mut watermark = 10_000;
        monitor.tick(&mut watermark).await.unwrap();
        assert_eq!(watermark, 10_250);
    }

    #[tokio::test]
    async fn test_window_wider_than_provider_cap_is_covered_in_pieces() {
        let chain = chain(5_000, vec![2_500]);
        let config = MonitorConfig::new().with_polling_interval_blocks(3_000);
        let (monitor, store) = monitor(chain.clone(), config, 999).await;

        let summary = monitor.backfill_range(1, 3_000).await.unwrap();

        assert_eq!(summary.windows, 1);
        assert_eq!(summary.last_block, Some(3_000));
        assert_eq!(summary.load.inserted, 1);
        assert_eq!(
            *chain.queries.lock().unwrap(),
            vec![(1, 1_000), (1_001, 2_000), (2_001, 3_000)]
        );
        // One-shot backfills leave the live watermark alone.
        assert!(store.load_watermark(137, "0xorigin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_watermark_precedence() {
        let chain = chain(9_999, vec![]);
        let (monitor, store) = monitor(chain.clone(), MonitorConfig::new(), 1_000_000).await;
        assert_eq!(monitor.resolve_watermark().await.unwrap(), 9_999);

        store
            .save_watermark(&Watermark {
                chain_id: 137,
                collection_address: "0xorigin".to_string(),
                last_polled_block: Some(4_000),
                cursor: None,
            })
            .await
            .unwrap();
        assert_eq!(monitor.resolve_watermark().await.unwrap(), 4_000);

        let (forced, _) = monitor_with_store(chain, store).await;
        assert_eq!(forced.resolve_watermark().await.unwrap(), 99);
    }

    async fn monitor_with_store(chain: Arc<FakeChain>, store: Arc<SqliteStore>) -> (BackfillMonitor, Arc<SqliteStore>) {
        let scanner = BurnScanner::new(chain, &ScanConfig::default());
        let writer = BurnRecordWriter::new(
            store.clone(),
            MigrationTarget {
                destination_chain_id: 13_473,
                destination_token_address: "0xdestination".to_string(),
                token_id_offset: 0,
            },
            false,
        );
        let target = WatchTarget {
            chain_id: 137,
            collection_address: "0xorigin".to_string(),
            burn_address: NULL_ADDRESS.to_string(),
        };
        let config = MonitorConfig::new().with_start_block(100);
        (BackfillMonitor::new(scanner, writer, store.clone(), target, config), store)
    }

    #[tokio::test]
    async fn test_spawned_monitor_stops_on_join() {
        let chain = chain(1_000, vec![950]);
        let config = MonitorConfig::new()
            .with_polling_interval_blocks(100)
            .with_idle_delay_ms(1)
            .with_start_block(901);
        let (monitor, store) = monitor(chain, config, 1_000_000).await;

        let mut handle = Arc::new(monitor).spawn();
        for _ in 0..200 {
            if store.migration_stats().await.unwrap().total == 1 {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        handle.join().await.unwrap();

        assert_eq!(store.migration_stats().await.unwrap().total, 1);
    }
}
