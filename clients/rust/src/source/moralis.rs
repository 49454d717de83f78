//! Moralis-compatible chain-data REST adapter.

use super::http::read_json;
use super::{TransferPage, TransferQuery, TransferSource};
use crate::errors::MigrationError;
use crate::rpc::ProviderRateLimiter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nft_migration_core::{Transfer, TransferTx, NULL_ADDRESS};
use serde::Deserialize;
use std::sync::Arc;

const API_KEY_HEADER: &str = "X-API-Key";

/// Chain-data client for the Moralis EVM API.
pub struct MoralisClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    limiter: Arc<ProviderRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct DateToBlockResponse {
    block: u64,
}

#[derive(Debug, Deserialize)]
struct TransfersResponse {
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    result: Vec<NftTransfer>,
}

#[derive(Debug, Deserialize)]
struct NftTransfer {
    token_address: String,
    token_id: String,
    #[serde(default)]
    from_address: Option<String>,
    to_address: String,
    block_number: String,
    block_timestamp: DateTime<Utc>,
    transaction_hash: String,
}

impl NftTransfer {
    fn into_transfer(self, chain_id: u64) -> Result<Transfer, MigrationError> {
        let token_id = self.token_id.parse::<u64>().map_err(|_| {
            MigrationError::malformed(format!("token_id {:?} is not a u64", self.token_id))
        })?;
        let block_number = self.block_number.parse::<u64>().map_err(|_| {
            MigrationError::malformed(format!("block_number {:?} is not a u64", self.block_number))
        })?;

        Ok(Transfer {
            chain_id,
            token_address: self.token_address.to_lowercase(),
            token_id,
            from_address: self
                .from_address
                .map(|a| a.to_lowercase())
                .unwrap_or_else(|| NULL_ADDRESS.to_string()),
            to_address: self.to_address.to_lowercase(),
            block_number: Some(block_number),
            block_timestamp: self.block_timestamp,
            tx: TransferTx::Hash(self.transaction_hash.to_lowercase()),
        })
    }
}

fn chain_param(chain_id: u64) -> String {
    format!("{chain_id:#x}")
}

impl MoralisClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        limiter: Arc<ProviderRateLimiter>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            limiter,
        }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response, MigrationError> {
        let _guard = self.limiter.acquire().await?;
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header(API_KEY_HEADER, &self.api_key)
            .query(query)
            .send()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl TransferSource for MoralisClient {
    async fn current_block(&self, chain_id: u64) -> Result<u64, MigrationError> {
        let response = self
            .get(
                "/dateToBlock",
                &[
                    ("chain", chain_param(chain_id)),
                    ("date", Utc::now().to_rfc3339()),
                ],
            )
            .await?;
        let body: DateToBlockResponse = read_json(response).await?;
        Ok(body.block)
    }

    async fn transfers(
        &self,
        query: &TransferQuery,
        cursor: Option<&str>,
    ) -> Result<TransferPage, MigrationError> {
        let mut params = vec![
            ("chain", chain_param(query.chain_id)),
            ("format", "decimal".to_string()),
            ("from_block", query.from_block.to_string()),
            ("to_block", query.to_block.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }

        let path = format!("/nft/{}/transfers", query.collection_address);
        let response = self.get(&path, &params).await?;
        let body: TransfersResponse = read_json(response).await?;

        let transfers = body
            .result
            .into_iter()
            .map(|t| t.into_transfer(query.chain_id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TransferPage {
            transfers,
            cursor: body.cursor.filter(|c| !c.is_empty()),
        })
    }
}
