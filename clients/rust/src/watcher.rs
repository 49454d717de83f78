//! Burn watcher for cursor-paged origins (the off-chain protocol).
//!
//! Burns are buffered and written in bulk: once `flush_threshold` are
//! pending, or every `flush_after_polls` polls. The resume cursor is
//! persisted only together with a flush, so after a restart nothing
//! between the saved cursor and the crash is lost.

use crate::config::CursorWatcherConfig;
use crate::errors::MigrationError;
use crate::monitor::{MonitorHandle, WatchTarget};
use crate::source::{ImxClient, ImxTransferQuery};
use crate::store::{MigrationStore, Watermark};
use crate::writer::{BurnRecordWriter, LoadSummary};
use chrono::{Duration as ChronoDuration, Utc};
use nft_migration_core::Transfer;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

/// In-memory progress of a watcher.
#[derive(Debug, Default)]
pub struct WatcherState {
    pub cursor: Option<String>,
    pending: Vec<Transfer>,
    pending_ids: HashSet<u64>,
    polls_since_flush: u32,
}

impl WatcherState {
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Result of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub burns: usize,
    /// The feed has more results right now
    pub remaining: bool,
    /// Set when this poll triggered a flush
    pub flushed: Option<LoadSummary>,
}

pub struct ImxBurnWatcher {
    client: Arc<ImxClient>,
    writer: BurnRecordWriter,
    store: Arc<dyn MigrationStore>,
    target: WatchTarget,
    config: CursorWatcherConfig,
}

impl ImxBurnWatcher {
    pub fn new(
        client: Arc<ImxClient>,
        writer: BurnRecordWriter,
        store: Arc<dyn MigrationStore>,
        target: WatchTarget,
        config: CursorWatcherConfig,
    ) -> Self {
        Self {
            client,
            writer,
            store,
            target,
            config,
        }
    }

    /// State resumed from the persisted cursor, if any.
    pub async fn resume(&self) -> Result<WatcherState, MigrationError> {
        let watermark = self
            .store
            .load_watermark(self.target.chain_id, &self.target.collection_address)
            .await?;
        Ok(WatcherState {
            cursor: watermark.and_then(|w| w.cursor),
            ..WatcherState::default()
        })
    }

    fn query(&self, cursor: Option<String>) -> ImxTransferQuery {
        let now = Utc::now();
        let max_timestamp = self
            .config
            .settle_delay_secs
            .map(|secs| now - ChronoDuration::seconds(secs));
        // The lower bound only applies to a fresh crawl; a cursor already pins the position.
        let min_timestamp = match cursor {
            Some(_) => None,
            None => self
                .config
                .lookback_secs
                .map(|secs| now - ChronoDuration::seconds(secs)),
        };

        ImxTransferQuery {
            collection_address: self.target.collection_address.clone(),
            receiver: self.target.burn_address.clone(),
            page_size: self.config.page_size,
            cursor,
            max_timestamp,
            min_timestamp,
        }
    }

    /// Fetch one page, buffer its burns, and flush when due.
    pub async fn poll(&self, state: &mut WatcherState) -> Result<PollOutcome, MigrationError> {
        let page = self.client.transfers(&self.query(state.cursor.clone())).await?;

        let mut burns = 0;
        for transfer in page.transfers {
            if transfer.is_burn(&self.target.burn_address) && state.pending_ids.insert(transfer.token_id) {
                state.pending.push(transfer);
                burns += 1;
            }
        }
        if let Some(cursor) = page.cursor {
            state.cursor = Some(cursor);
        }
        state.polls_since_flush += 1;
        debug!(burns, pending = state.pending.len(), remaining = page.remaining, "Polled transfers");

        let due = state.pending.len() >= self.config.flush_threshold
            || state.polls_since_flush >= self.config.flush_after_polls;
        let flushed = if due { Some(self.flush(state).await?) } else { None };

        Ok(PollOutcome {
            burns,
            remaining: page.remaining,
            flushed,
        })
    }

    /// Write buffered burns, then persist the cursor.
    pub async fn flush(&self, state: &mut WatcherState) -> Result<LoadSummary, MigrationError> {
        let summary = self.writer.load(&state.pending).await?;
        self.store
            .save_watermark(&Watermark {
                chain_id: self.target.chain_id,
                collection_address: self.target.collection_address.clone(),
                last_polled_block: None,
                cursor: state.cursor.clone(),
            })
            .await?;

        state.pending.clear();
        state.pending_ids.clear();
        state.polls_since_flush = 0;
        Ok(summary)
    }

    /// Run until `stop` fires, flushing what is buffered on the way out.
    pub async fn run(&self, mut stop: oneshot::Receiver<()>) {
        let poll_delay = Duration::from_millis(self.config.poll_delay_ms);
        let mut state: Option<WatcherState> = None;

        info!(
            chain_id = self.target.chain_id,
            collection = %self.target.collection_address,
            "Cursor burn watcher started"
        );

        loop {
            let delay = tokio::select! {
                _ = &mut stop => break,
                result = self.iterate(&mut state) => match result {
                    Ok(true) => Duration::ZERO,
                    Ok(false) => poll_delay,
                    Err(e) => {
                        error!(category = %e.category(), error = %e, "Watcher iteration failed");
                        poll_delay
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

        if let Some(state) = state.as_mut().filter(|s| s.pending() > 0) {
            if let Err(e) = self.flush(state).await {
                error!(error = %e, "Final flush failed");
            }
        }
        info!("Cursor burn watcher stopped");
    }

    /// Returns whether more results are immediately available.
    async fn iterate(&self, state: &mut Option<WatcherState>) -> Result<bool, MigrationError> {
        if state.is_none() {
            *state = Some(self.resume().await?);
        }
        match state.as_mut() {
            Some(state) => Ok(self.poll(state).await?.remaining),
            None => Ok(false),
        }
    }

    pub fn spawn(self: Arc<Self>) -> MonitorHandle {
        MonitorHandle::spawn(move |stop| async move { self.run(stop).await })
    }
}
