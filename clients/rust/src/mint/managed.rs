//! Managed minting API backend.
//!
//! One mint request per batch. Every asset carries a deterministic
//! reference id, so resubmitting a batch after a crash is answered with
//! 409. The request is then narrowed to the assets the API has never
//! seen and the rest are polled again. A reference that ended `failed`
//! can never be reused and is reported as such.

use super::{ConfirmedMint, MintOutcome, MintTx, Minter};
use crate::config::{ConfirmationConfig, MintBackend};
use crate::errors::MigrationError;
use crate::rpc::ProviderRateLimiter;
use crate::source::http::{read_json, status_error};
use crate::source::RecipientRegistry;
use async_trait::async_trait;
use nft_migration_core::MintBatch;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

const API_KEY_HEADER: &str = "x-immutable-api-key";

#[derive(Debug, Clone)]
pub struct ManagedApiConfig {
    pub base_url: String,
    /// Chain name used in request paths
    pub chain_name: String,
    pub api_key: String,
    /// Destination chain id, used in reference ids
    pub destination_chain_id: u64,
    pub ipfs_cid: Option<String>,
    pub require_registration: bool,
    pub confirmation: ConfirmationConfig,
}

pub struct ManagedApiMinter {
    http: reqwest::Client,
    config: ManagedApiConfig,
    limiter: Arc<ProviderRateLimiter>,
    registry: Option<Arc<dyn RecipientRegistry>>,
}

#[derive(Debug, Serialize)]
struct MintRequestBody<'a> {
    assets: Vec<MintAsset<'a>>,
}

#[derive(Debug, Serialize)]
struct MintAsset<'a> {
    reference_id: String,
    owner_address: &'a str,
    token_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<AssetMetadata>,
}

#[derive(Debug, Serialize)]
struct AssetMetadata {
    blueprint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Submission {
    Accepted,
    Conflict,
}

#[derive(Debug, Deserialize)]
struct MintStatusResponse {
    #[serde(default)]
    result: Vec<MintStatusEntry>,
}

#[derive(Debug, Deserialize)]
struct MintStatusEntry {
    status: String,
    #[serde(default)]
    transaction_hash: Option<String>,
    #[serde(default)]
    activity_id: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl ManagedApiMinter {
    pub fn new(config: ManagedApiConfig, limiter: Arc<ProviderRateLimiter>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config: ManagedApiConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
            limiter,
            registry: None,
        }
    }

    /// Check recipients against `registry` when registration is required.
    pub fn with_registry(mut self, registry: Arc<dyn RecipientRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    fn reference_id(&self, token_id: u64) -> String {
        format!("{}-{}", self.config.destination_chain_id, token_id)
    }

    fn requests_url(&self, contract_address: &str) -> String {
        format!(
            "{}/v1/chains/{}/collections/{}/nfts/mint-requests",
            self.config.base_url, self.config.chain_name, contract_address
        )
    }

    async fn post_assets(&self, batch: &MintBatch, token_ids: &[u64]) -> Result<Submission, MigrationError> {
        let assets = token_ids
            .iter()
            .map(|&token_id| MintAsset {
                reference_id: self.reference_id(token_id),
                owner_address: &batch.recipient,
                token_id: token_id.to_string(),
                metadata: self.config.ipfs_cid.as_ref().map(|cid| AssetMetadata {
                    blueprint: format!("ipfs://{cid}/{token_id}"),
                }),
            })
            .collect();

        let _guard = self.limiter.acquire().await?;
        let response = self
            .http
            .post(self.requests_url(&batch.contract_address))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&MintRequestBody { assets })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(Submission::Accepted),
            StatusCode::CONFLICT => Ok(Submission::Conflict),
            _ => Err(status_error(response).await),
        }
    }

    /// Request every token of `batch`, narrowing to unknown references on 409.
    async fn submit(&self, batch: &MintBatch) -> Result<(), MigrationError> {
        if self.post_assets(batch, &batch.token_ids).await? == Submission::Accepted {
            return Ok(());
        }

        let mut unknown = Vec::new();
        for &token_id in &batch.token_ids {
            let reference_id = self.reference_id(token_id);
            match self.status(&batch.contract_address, &reference_id).await {
                Ok(None) => unknown.push(token_id),
                Ok(Some(_)) => {}
                Err(e) => warn!(reference_id = %reference_id, error = %e, "Mint status lookup failed"),
            }
        }

        if unknown.is_empty() || unknown.len() == batch.token_ids.len() {
            info!(recipient = %batch.recipient, tokens = %batch.token_range(), "Mint request already submitted");
            return Ok(());
        }

        info!(
            recipient = %batch.recipient,
            requested = unknown.len(),
            known = batch.token_ids.len() - unknown.len(),
            "Resubmitting tokens missing from an earlier mint request"
        );
        if self.post_assets(batch, &unknown).await? == Submission::Conflict {
            warn!(recipient = %batch.recipient, "Narrowed mint request also conflicted");
        }
        Ok(())
    }

    async fn status(&self, contract_address: &str, reference_id: &str) -> Result<Option<MintStatusEntry>, MigrationError> {
        let _guard = self.limiter.acquire().await?;
        let response = self
            .http
            .get(format!("{}/{}", self.requests_url(contract_address), reference_id))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: MintStatusResponse = read_json(response).await?;
        Ok(body.result.into_iter().next())
    }
}

#[async_trait]
impl Minter for ManagedApiMinter {
    fn backend(&self) -> MintBackend {
        MintBackend::ManagedApi
    }

    async fn is_eligible(&self, recipient: &str) -> Result<bool, MigrationError> {
        match (&self.registry, self.config.require_registration) {
            (Some(registry), true) => registry.is_registered(recipient).await,
            _ => Ok(true),
        }
    }

    async fn mint(&self, batch: &MintBatch) -> MintOutcome {
        if let Err(e) = self.submit(batch).await {
            return MintOutcome::failed(Vec::new(), e);
        }
        info!(recipient = %batch.recipient, tokens = %batch.token_range(), "Submitted mint request");

        let interval = Duration::from_millis(self.config.confirmation.poll_interval_ms);
        let max_attempts = self.config.confirmation.max_attempts;
        let mut pending: Vec<(u64, String)> = batch
            .token_ids
            .iter()
            .map(|&token_id| (token_id, self.reference_id(token_id)))
            .collect();
        let mut confirmed = Vec::with_capacity(pending.len());
        let mut failures = Vec::new();

        for attempt in 1..=max_attempts {
            let mut still_pending = Vec::with_capacity(pending.len());

            for (token_id, reference_id) in pending {
                match self.status(&batch.contract_address, &reference_id).await {
                    Ok(Some(entry)) if entry.status == "succeeded" => {
                        let id = entry
                            .transaction_hash
                            .or(entry.activity_id)
                            .unwrap_or_else(|| reference_id.clone());
                        confirmed.push(ConfirmedMint {
                            destination_token_id: token_id,
                            tx: MintTx::Id(id),
                        });
                    }
                    Ok(Some(entry)) if entry.status == "failed" => {
                        let reason = entry.error.map(|e| e.to_string()).unwrap_or_default();
                        error!(
                            reference_id = %reference_id,
                            token_id,
                            reason = %reason,
                            "Mint request permanently failed"
                        );
                        failures.push(format!("{reference_id}: {reason}"));
                    }
                    Ok(_) => still_pending.push((token_id, reference_id)),
                    Err(e) => {
                        warn!(reference_id = %reference_id, attempt, error = %e, "Mint status lookup failed");
                        still_pending.push((token_id, reference_id));
                    }
                }
            }

            pending = still_pending;
            if pending.is_empty() {
                break;
            }
            if attempt < max_attempts {
                sleep(interval).await;
            }
        }

        let error = if !failures.is_empty() {
            Some(MigrationError::MintRequestFailed {
                references: failures.join("; "),
            })
        } else if !pending.is_empty() {
            let references: Vec<&str> = pending.iter().map(|(_, r)| r.as_str()).collect();
            Some(MigrationError::TransactionUnconfirmed {
                tx: references.join(","),
                waited_ms: self.config.confirmation.max_wait_ms(),
            })
        } else {
            None
        };

        MintOutcome { confirmed, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    const REQUESTS: &str = "/v1/chains/imtbl-zkevm-testnet/collections/0xdestination/nfts/mint-requests";

    fn minter(server: &MockServer, ipfs_cid: Option<&str>) -> ManagedApiMinter {
        ManagedApiMinter::new(
            ManagedApiConfig {
                base_url: server.base_url(),
                chain_name: "imtbl-zkevm-testnet".to_string(),
                api_key: "sk-test".to_string(),
                destination_chain_id: 13_473,
                ipfs_cid: ipfs_cid.map(str::to_string),
                require_registration: false,
                confirmation: ConfirmationConfig {
                    poll_interval_ms: 1,
                    max_attempts: 2,
                },
            },
            Arc::new(ProviderRateLimiter::unlimited()),
        )
    }

    fn batch(token_ids: Vec<u64>) -> MintBatch {
        MintBatch {
            recipient: "0xalice".to_string(),
            contract_address: "0xdestination".to_string(),
            token_ids,
        }
    }

    async fn status_mock<'a>(server: &'a MockServer, token_id: u64, status: &str) -> httpmock::Mock<'a> {
        let error = if status == "failed" {
            json!({ "message": "duplicate token" })
        } else {
            json!(null)
        };
        server.mock_async(|when, then| {
            when.method(GET).path(format!("{REQUESTS}/13473-{token_id}"));
            then.status(200).json_body(json!({
                "result": [{
                    "reference_id": format!("13473-{token_id}"),
                    "status": status,
                    "transaction_hash": format!("0xmint{token_id}"),
                    "error": error
                }]
            }));
        }).await
    }

    #[tokio::test]
    async fn test_submits_assets_with_blueprint_and_confirms() {
        let server = MockServer::start_async().await;
        let submit = server.mock_async(|when, then| {
            when.method(POST)
                .path(REQUESTS)
                .header("x-immutable-api-key", "sk-test")
                .json_body(json!({
                    "assets": [
                        {
                            "reference_id": "13473-5",
                            "owner_address": "0xalice",
                            "token_id": "5",
                            "metadata": { "blueprint": "ipfs://QmCid/5" }
                        },
                        {
                            "reference_id": "13473-6",
                            "owner_address": "0xalice",
                            "token_id": "6",
                            "metadata": { "blueprint": "ipfs://QmCid/6" }
                        }
                    ]
                }));
            then.status(202).json_body(json!({ "imx_mint_requests_limit": "2000" }));
        }).await;
        status_mock(&server, 5, "succeeded").await;
        status_mock(&server, 6, "succeeded").await;

        let outcome = minter(&server, Some("QmCid")).mint(&batch(vec![5, 6])).await;

        submit.assert_async().await;
        assert!(outcome.error.is_none());
        assert_eq!(
            outcome.confirmed,
            vec![
                ConfirmedMint {
                    destination_token_id: 5,
                    tx: MintTx::Id("0xmint5".to_string())
                },
                ConfirmedMint {
                    destination_token_id: 6,
                    tx: MintTx::Id("0xmint6".to_string())
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_conflict_counts_as_submitted() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path(REQUESTS);
            then.status(409).json_body(json!({ "code": "CONFLICT_ERROR" }));
        }).await;
        status_mock(&server, 7, "succeeded").await;

        let outcome = minter(&server, None).mint(&batch(vec![7])).await;

        assert!(outcome.error.is_none());
        assert_eq!(outcome.confirmed.len(), 1);
    }

    #[tokio::test]
    async fn test_conflict_resubmits_only_unknown_assets() {
        let server = MockServer::start_async().await;
        let narrowed = server.mock_async(|when, then| {
            when.method(POST).path(REQUESTS).json_body(json!({
                "assets": [{
                    "reference_id": "13473-8",
                    "owner_address": "0xalice",
                    "token_id": "8"
                }]
            }));
            then.status(202);
        }).await;
        let full = server.mock_async(|when, then| {
            when.method(POST).path(REQUESTS);
            then.status(409).json_body(json!({ "code": "CONFLICT_ERROR" }));
        }).await;
        status_mock(&server, 7, "succeeded").await;
        let unknown = server.mock_async(|when, then| {
            when.method(GET).path(format!("{REQUESTS}/13473-8"));
            then.status(404);
        }).await;

        let outcome = minter(&server, None).mint(&batch(vec![7, 8])).await;

        full.assert_hits_async(1).await;
        narrowed.assert_hits_async(1).await;
        assert!(unknown.hits_async().await >= 1);
        assert_eq!(outcome.confirmed.len(), 1);
        assert_eq!(outcome.confirmed[0].destination_token_id, 7);
        assert!(matches!(
            outcome.error,
            Some(MigrationError::TransactionUnconfirmed { ref tx, .. }) if tx == "13473-8"
        ));
    }

    #[tokio::test]
    async fn test_partial_failure_reports_confirmed_subset() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path(REQUESTS);
            then.status(202);
        }).await;
        status_mock(&server, 1, "succeeded").await;
        status_mock(&server, 2, "failed").await;
        status_mock(&server, 3, "pending").await;

        let outcome = minter(&server, None).mint(&batch(vec![1, 2, 3])).await;

        assert_eq!(outcome.confirmed.len(), 1);
        assert_eq!(outcome.confirmed[0].destination_token_id, 1);
        match outcome.error {
            Some(MigrationError::MintRequestFailed { references }) => assert!(references.contains("13473-2")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unconfirmed_after_attempt_budget() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path(REQUESTS);
            then.status(202);
        }).await;
        let status = status_mock(&server, 9, "pending").await;

        let outcome = minter(&server, None).mint(&batch(vec![9])).await;

        status.assert_hits_async(2).await;
        assert!(outcome.confirmed.is_empty());
        assert!(matches!(
            outcome.error,
            Some(MigrationError::TransactionUnconfirmed { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejected_submission_mints_nothing() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path(REQUESTS);
            then.status(400).json_body(json!({ "message": "invalid owner" }));
        }).await;

        let outcome = minter(&server, None).mint(&batch(vec![1])).await;

        assert!(outcome.confirmed.is_empty());
        assert!(matches!(
            outcome.error,
            Some(MigrationError::ProviderStatus { status: 400, .. })
        ));
    }
}
