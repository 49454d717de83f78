//! Off-chain protocol (Immutable X v1) public API adapter.
//!
//! The off-chain protocol has no block numbers; transfers are paged with a
//! cursor and filtered by timestamp instead.

use super::http::{read_json, status_error};
use super::RecipientRegistry;
use crate::errors::MigrationError;
use crate::rpc::ProviderRateLimiter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nft_migration_core::{Transfer, TransferTx};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;

/// Query for transfers received by `receiver` in one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImxTransferQuery {
    pub collection_address: String,
    pub receiver: String,
    pub page_size: u32,
    pub cursor: Option<String>,
    /// Exclusive upper bound on the transfer timestamp
    pub max_timestamp: Option<DateTime<Utc>>,
    /// Inclusive lower bound on the transfer timestamp
    pub min_timestamp: Option<DateTime<Utc>>,
}

/// A page of normalized transfers.
#[derive(Debug, Clone, Default)]
pub struct ImxTransferPage {
    pub transfers: Vec<Transfer>,
    /// Position after this page, to resume from later
    pub cursor: Option<String>,
    /// More results are available right now
    pub remaining: bool,
}

/// Client for the off-chain protocol's public REST API.
pub struct ImxClient {
    http: reqwest::Client,
    base_url: String,
    chain_id: u64,
    limiter: Arc<ProviderRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct ListTransfersResponse {
    #[serde(default)]
    result: Vec<ImxTransfer>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    remaining: u8,
}

#[derive(Debug, Deserialize)]
struct ImxTransfer {
    transaction_id: u64,
    status: String,
    user: String,
    receiver: String,
    token: ImxToken,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ImxToken {
    data: ImxTokenData,
}

#[derive(Debug, Deserialize)]
struct ImxTokenData {
    #[serde(default)]
    token_id: Option<String>,
    #[serde(default)]
    token_address: Option<String>,
}

impl ImxTransfer {
    /// `None` for transfers that did not settle or carry no ERC-721 token.
    fn into_transfer(self, chain_id: u64) -> Result<Option<Transfer>, MigrationError> {
        if self.status != "success" {
            return Ok(None);
        }
        let (Some(token_id), Some(token_address)) = (self.token.data.token_id, self.token.data.token_address)
        else {
            return Ok(None);
        };
        let token_id = token_id
            .parse::<u64>()
            .map_err(|_| MigrationError::malformed(format!("token_id {token_id:?} is not a u64")))?;

        Ok(Some(Transfer {
            chain_id,
            token_address: token_address.to_lowercase(),
            token_id,
            from_address: self.user.to_lowercase(),
            to_address: self.receiver.to_lowercase(),
            block_number: None,
            block_timestamp: self.timestamp,
            tx: TransferTx::Id(self.transaction_id),
        }))
    }
}

impl ImxClient {
    /// `chain_id` is the id stamped on normalized transfers.
    pub fn new(base_url: impl Into<String>, chain_id: u64, limiter: Arc<ProviderRateLimiter>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chain_id,
            limiter,
        }
    }

    /// One ascending page of transfers received by `query.receiver`.
    pub async fn transfers(&self, query: &ImxTransferQuery) -> Result<ImxTransferPage, MigrationError> {
        let mut params = vec![
            ("direction", "asc".to_string()),
            ("order_by", "transaction_id".to_string()),
            ("token_address", query.collection_address.clone()),
            ("receiver", query.receiver.clone()),
            ("page_size", query.page_size.to_string()),
        ];
        if let Some(cursor) = &query.cursor {
            params.push(("cursor", cursor.clone()));
        }
        if let Some(max) = query.max_timestamp {
            params.push(("max_timestamp", max.to_rfc3339()));
        }
        if let Some(min) = query.min_timestamp {
            params.push(("min_timestamp", min.to_rfc3339()));
        }

        let _guard = self.limiter.acquire().await?;
        let response = self
            .http
            .get(format!("{}/v1/transfers", self.base_url))
            .query(&params)
            .send()
            .await?;
        let body: ListTransfersResponse = read_json(response).await?;

        let mut transfers = Vec::with_capacity(body.result.len());
        for transfer in body.result {
            if let Some(transfer) = transfer.into_transfer(self.chain_id)? {
                transfers.push(transfer);
            }
        }

        Ok(ImxTransferPage {
            transfers,
            cursor: body.cursor.filter(|c| !c.is_empty()),
            remaining: body.remaining > 0,
        })
    }
}

#[async_trait]
impl RecipientRegistry for ImxClient {
    async fn is_registered(&self, address: &str) -> Result<bool, MigrationError> {
        let _guard = self.limiter.acquire().await?;
        let response = self
            .http
            .get(format!("{}/v1/users/{}", self.base_url, address))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(response).await),
        }
    }
}
