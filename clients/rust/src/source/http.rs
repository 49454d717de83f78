use crate::errors::MigrationError;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

/// Default back-off when a provider answers 429 without a `Retry-After` header.
const DEFAULT_RETRY_AFTER_MS: u64 = 1_000;

/// Map a non-success response to a `MigrationError`.
pub(crate) async fn status_error(response: Response) -> MigrationError {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .map(|secs| secs.saturating_mul(1_000))
            .unwrap_or(DEFAULT_RETRY_AFTER_MS);
        return MigrationError::RateLimited { retry_after_ms };
    }

    let body = response.text().await.unwrap_or_default();
    MigrationError::ProviderStatus {
        status: status.as_u16(),
        body,
    }
}

/// Decode a successful JSON body, or map the failure status.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, MigrationError> {
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }

    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| MigrationError::malformed(e.to_string()))
}
