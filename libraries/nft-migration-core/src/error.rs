//! Error types

use thiserror::Error;

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum CoreError {
    #[error("Malformed address: {0}")]
    MalformedAddress(String),

    #[error("Malformed token id: {0}")]
    MalformedTokenId(String),

    #[error("Token id {token_id} + offset {offset} overflows")]
    TokenIdOverflow { token_id: u64, offset: u64 },

    #[error("Batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("Window size must be greater than zero")]
    ZeroWindowSize,
}
