//! Burn detection over a block range.

use crate::config::ScanConfig;
use crate::errors::{ErrorCategory, MigrationError};
use crate::rpc::RetryExecutor;
use crate::source::{TransferQuery, TransferSource};
use nft_migration_core::{addresses_match, clamp_scan_range, BlockWindow, Transfer};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One burn scan over `[from_block, to_block]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub chain_id: u64,
    pub collection_address: String,
    pub burn_address: String,
    pub from_block: u64,
    pub to_block: u64,
}

/// What a scan actually covered and found.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Range actually queried after clamping; `None` when nothing was scanned
    pub window: Option<BlockWindow>,
    /// Burns in provider order, one per token id
    pub burns: Vec<Transfer>,
    pub pages: usize,
}

/// Pages through a collection's transfers and keeps the burns.
///
/// Every provider failure, 4xx responses included, is retried according
/// to the scan retry policy (unbounded by default). Other errors end the scan.
pub struct BurnScanner {
    source: Arc<dyn TransferSource>,
    retry: RetryExecutor,
    max_block_range: u64,
}

impl BurnScanner {
    pub fn new(source: Arc<dyn TransferSource>, config: &ScanConfig) -> Self {
        Self {
            source,
            retry: RetryExecutor::new(config.retry.clone()),
            max_block_range: config.max_block_range,
        }
    }

    /// Current head of `chain_id`, retried like every other provider call.
    pub async fn current_block(&self, chain_id: u64) -> Result<u64, MigrationError> {
        self.retry
            .execute_if(is_provider_error, || self.source.current_block(chain_id))
            .await
    }

    /// Collect burns of the requested collection.
    ///
    /// `to_block` is clamped to the chain head and the span to the provider
    /// cap; callers continue from `outcome.window.to_block + 1` when the
    /// returned window is shorter than requested.
    pub async fn scan(&self, request: &ScanRequest) -> Result<ScanOutcome, MigrationError> {
        let head = self.current_block(request.chain_id).await?;

        let Some(window) = clamp_scan_range(
            request.from_block,
            request.to_block,
            head,
            self.max_block_range,
        ) else {
            warn!(
                from_block = request.from_block,
                to_block = request.to_block,
                head,
                "Scan range is empty after clamping"
            );
            return Ok(ScanOutcome::default());
        };
        if window.to_block < request.to_block {
            info!(
                requested_to_block = request.to_block,
                to_block = window.to_block,
                head,
                "Clamped scan range"
            );
        }

        let query = TransferQuery {
            chain_id: request.chain_id,
            collection_address: request.collection_address.clone(),
            from_block: window.from_block,
            to_block: window.to_block,
        };

        let mut seen = HashSet::new();
        let mut burns = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        loop {
            let page = self
                .retry
                .execute_if(is_provider_error, || self.source.transfers(&query, cursor.as_deref()))
                .await?;
            pages += 1;

            let page_len = page.transfers.len();
            for transfer in page.transfers {
                if addresses_match(&transfer.to_address, &request.burn_address)
                    && seen.insert(transfer.token_id)
                {
                    burns.push(transfer);
                }
            }
            debug!(%window, page = pages, transfers = page_len, burns = burns.len(), "Scanned page");

            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(%window, pages, burns = burns.len(), "Scan complete");
        Ok(ScanOutcome {
            window: Some(window),
            burns,
            pages,
        })
    }
}

fn is_provider_error(error: &MigrationError) -> bool {
    error.category() == ErrorCategory::Provider
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::source::TransferPage;
    use async_trait::async_trait;
    use chrono::Utc;
    use nft_migration_core::{TransferTx, NULL_ADDRESS};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn transfer(token_id: u64, to: &str) -> Transfer {
        Transfer {
            chain_id: 137,
            token_address: "0xorigin".to_string(),
            token_id,
            from_address: "0xholder".to_string(),
            to_address: to.to_string(),
            block_number: Some(10),
            block_timestamp: Utc::now(),
            tx: TransferTx::Hash(format!("0x{token_id}")),
        }
    }

    /// Serves fixed pages keyed by cursor and fails the first `failures` calls,
    /// with `failure_status` when set and a rate limit otherwise.
    struct PagedSource {
        head: u64,
        pages: Vec<TransferPage>,
        failures: AtomicU32,
        failure_status: Option<u16>,
        queries: Mutex<Vec<TransferQuery>>,
    }

    #[async_trait]
    impl TransferSource for PagedSource {
        async fn current_block(&self, _chain_id: u64) -> Result<u64, MigrationError> {
            Ok(self.head)
        }

        async fn transfers(
            &self,
            query: &TransferQuery,
            cursor: Option<&str>,
        ) -> Result<TransferPage, MigrationError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(match self.failure_status {
                    Some(status) => MigrationError::ProviderStatus {
                        status,
                        body: "not found".to_string(),
                    },
                    None => MigrationError::RateLimited { retry_after_ms: 1 },
                });
            }
            self.queries.lock().unwrap().push(query.clone());
            let index = cursor.map(|c| c.parse::<usize>().unwrap()).unwrap_or(0);
            Ok(self.pages[index].clone())
        }
    }

    fn scanner(source: PagedSource) -> (BurnScanner, Arc<PagedSource>) {
        let source = Arc::new(source);
        let config = ScanConfig {
            max_block_range: 1_000_000,
            retry: RetryConfig::fixed(1),
        };
        (BurnScanner::new(source.clone(), &config), source)
    }

    fn request(from_block: u64, to_block: u64) -> ScanRequest {
        ScanRequest {
            chain_id: 137,
            collection_address: "0xorigin".to_string(),
            burn_address: NULL_ADDRESS.to_string(),
            from_block,
            to_block,
        }
    }

    #[tokio::test]
    async fn test_scan_follows_cursor_and_keeps_burns() {
        let (scanner, _) = scanner(PagedSource {
            head: 5_000,
            pages: vec![
                TransferPage {
                    transfers: vec![transfer(1, NULL_ADDRESS), transfer(2, "0xsomeone")],
                    cursor: Some("1".to_string()),
                },
                TransferPage {
                    transfers: vec![transfer(3, NULL_ADDRESS)],
                    cursor: None,
                },
            ],
            failures: AtomicU32::new(0),
            failure_status: None,
            queries: Mutex::new(Vec::new()),
        });

        let outcome = scanner.scan(&request(100, 200)).await.unwrap();

        assert_eq!(outcome.pages, 2);
        let ids: Vec<u64> = outcome.burns.iter().map(|b| b.token_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(outcome.window, Some(BlockWindow::new(100, 200)));
    }

    #[tokio::test]
    async fn test_burn_address_match_ignores_case() {
        let (scanner, _) = scanner(PagedSource {
            head: 5_000,
            pages: vec![TransferPage {
                transfers: vec![transfer(5, "0x000000000000000000000000000000000000dEaD")],
                cursor: None,
            }],
            failures: AtomicU32::new(0),
            failure_status: None,
            queries: Mutex::new(Vec::new()),
        });

        let mut dead = request(1, 2);
        dead.burn_address = "0x000000000000000000000000000000000000DEAD".to_string();
        let outcome = scanner.scan(&dead).await.unwrap();
        assert_eq!(outcome.burns.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_dedups_token_ids() {
        let (scanner, _) = scanner(PagedSource {
            head: 5_000,
            pages: vec![
                TransferPage {
                    transfers: vec![transfer(9, NULL_ADDRESS)],
                    cursor: Some("1".to_string()),
                },
                TransferPage {
                    transfers: vec![transfer(9, NULL_ADDRESS)],
                    cursor: None,
                },
            ],
            failures: AtomicU32::new(0),
            failure_status: None,
            queries: Mutex::new(Vec::new()),
        });

        let outcome = scanner.scan(&request(1, 2)).await.unwrap();
        assert_eq!(outcome.burns.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_retries_provider_errors() {
        let (scanner, _) = scanner(PagedSource {
            head: 5_000,
            pages: vec![TransferPage {
                transfers: vec![transfer(4, NULL_ADDRESS)],
                cursor: None,
            }],
            failures: AtomicU32::new(5),
            failure_status: None,
            queries: Mutex::new(Vec::new()),
        });

        let outcome = scanner.scan(&request(1, 2)).await.unwrap();
        assert_eq!(outcome.burns.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_retries_client_error_statuses() {
        let (scanner, source) = scanner(PagedSource {
            head: 5_000,
            pages: vec![TransferPage {
                transfers: vec![transfer(4, NULL_ADDRESS)],
                cursor: None,
            }],
            failures: AtomicU32::new(1),
            failure_status: Some(404),
            queries: Mutex::new(Vec::new()),
        });

        let outcome = scanner.scan(&request(1, 2)).await.unwrap();

        assert_eq!(outcome.burns.len(), 1);
        assert_eq!(source.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scan_clamps_to_head() {
        let (scanner, source) = scanner(PagedSource {
            head: 150,
            pages: vec![TransferPage::default()],
            failures: AtomicU32::new(0),
            failure_status: None,
            queries: Mutex::new(Vec::new()),
        });

        let outcome = scanner.scan(&request(100, 10_000)).await.unwrap();

        assert_eq!(outcome.window, Some(BlockWindow::new(100, 150)));
        assert_eq!(source.queries.lock().unwrap()[0].to_block, 150);
    }

    #[tokio::test]
    async fn test_scan_beyond_head_is_empty() {
        let (scanner, source) = scanner(PagedSource {
            head: 50,
            pages: vec![TransferPage::default()],
            failures: AtomicU32::new(0),
            failure_status: None,
            queries: Mutex::new(Vec::new()),
        });

        let outcome = scanner.scan(&request(100, 200)).await.unwrap();

        assert!(outcome.window.is_none());
        assert!(outcome.burns.is_empty());
        assert!(source.queries.lock().unwrap().is_empty());
    }
}
