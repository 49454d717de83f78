//! Error types for the migration client.
//!
//! Provides rich error types with retry hints and categorization
//! so the scanning loops can decide what to retry and every failure
//! is logged under a stable category.

use nft_migration_core::CoreError;
use thiserror::Error;

/// Main error type for migration pipeline operations.
#[derive(Error, Debug)]
pub enum MigrationError {
    // Provider Errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned HTTP {status}: {body}")]
    ProviderStatus { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("RPC transport error: {0}")]
    Transport(#[from] alloy::transports::RpcError<alloy::transports::TransportErrorKind>),

    // Store Errors
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Store migration error: {0}")]
    StoreMigration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    // Transaction Errors
    #[error("Contract call failed: {0}")]
    Contract(#[from] alloy::contract::Error),

    #[error("Transaction reverted: {tx}")]
    TransactionReverted { tx: String },

    #[error("Transaction {tx} unconfirmed after {waited_ms}ms")]
    TransactionUnconfirmed { tx: String, waited_ms: u64 },

    #[error("Mint request rejected: {reason}")]
    MintRejected { reason: String },

    #[error("Mint requests permanently failed: {references}")]
    MintRequestFailed { references: String },

    // Eligibility Errors
    #[error("Recipient {recipient} is not registered on the destination")]
    IneligibleRecipient { recipient: String },

    // Data Errors
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Configuration Errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Signer error: {0}")]
    Signer(String),

    // Internal Errors
    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl MigrationError {
    /// Check if this error is retryable.
    ///
    /// Retryable errors are transient provider failures (network, rate
    /// limiting, unparseable responses, 5xx) that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            MigrationError::Http(_)
            | MigrationError::RateLimited { .. }
            | MigrationError::MalformedResponse(_)
            | MigrationError::Transport(_) => true,
            MigrationError::ProviderStatus { status, .. } => *status >= 500 || *status == 408,
            _ => false,
        }
    }

    /// Get a retry hint in milliseconds, if available.
    pub fn retry_hint_ms(&self) -> Option<u64> {
        match self {
            MigrationError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }

    /// Categorize the error for logging.
    pub fn category(&self) -> ErrorCategory {
        match self {
            MigrationError::Http(_)
            | MigrationError::ProviderStatus { .. }
            | MigrationError::RateLimited { .. }
            | MigrationError::MalformedResponse(_)
            | MigrationError::Transport(_) => ErrorCategory::Provider,

            MigrationError::Store(_) | MigrationError::StoreMigration(_) => ErrorCategory::Store,

            MigrationError::Contract(_)
            | MigrationError::TransactionReverted { .. }
            | MigrationError::TransactionUnconfirmed { .. }
            | MigrationError::MintRejected { .. }
            | MigrationError::MintRequestFailed { .. } => ErrorCategory::Transaction,

            MigrationError::IneligibleRecipient { .. } => ErrorCategory::Eligibility,

            MigrationError::InvalidRecord(_)
            | MigrationError::Core(_)
            | MigrationError::InvalidInput(_) => ErrorCategory::Data,

            MigrationError::InvalidConfig { .. } | MigrationError::Signer(_) => {
                ErrorCategory::Config
            }

            MigrationError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Create a malformed response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        MigrationError::MalformedResponse(message.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        MigrationError::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Error category for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Chain-data or minting provider failures (network, rate limiting, parsing)
    Provider,
    /// Persistent store unavailable or failing
    Store,
    /// Mint submission or confirmation failures
    Transaction,
    /// Recipient not registered on the destination
    Eligibility,
    /// Malformed or conflicting records
    Data,
    /// Configuration errors
    Config,
    /// Internal errors (unexpected failures)
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Provider => write!(f, "provider"),
            ErrorCategory::Store => write!(f, "store"),
            ErrorCategory::Transaction => write!(f, "transaction"),
            ErrorCategory::Eligibility => write!(f, "eligibility"),
            ErrorCategory::Data => write!(f, "data"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Internal => write!(f, "internal"),
        }
    }
}

/// Result type alias for migration operations.
pub type MigrationResult<T> = Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(MigrationError::RateLimited { retry_after_ms: 100 }.is_retryable());
        assert!(MigrationError::malformed("bad json").is_retryable());
        assert!(MigrationError::ProviderStatus {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!MigrationError::ProviderStatus {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!MigrationError::InvalidInput("test".to_string()).is_retryable());
        assert!(!MigrationError::TransactionReverted {
            tx: "0x01".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_retry_hints() {
        assert_eq!(
            MigrationError::RateLimited { retry_after_ms: 500 }.retry_hint_ms(),
            Some(500)
        );
        assert_eq!(MigrationError::malformed("x").retry_hint_ms(), None);
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            MigrationError::RateLimited { retry_after_ms: 1 }.category(),
            ErrorCategory::Provider
        );
        assert_eq!(
            MigrationError::Core(CoreError::ZeroBatchSize).category(),
            ErrorCategory::Data
        );
        assert_eq!(
            MigrationError::TransactionUnconfirmed {
                tx: "0x01".to_string(),
                waited_ms: 10
            }
            .category(),
            ErrorCategory::Transaction
        );
        assert_eq!(
            MigrationError::IneligibleRecipient {
                recipient: "0x01".to_string()
            }
            .category(),
            ErrorCategory::Eligibility
        );
        assert_eq!(ErrorCategory::Store.to_string(), "store");
    }
}
