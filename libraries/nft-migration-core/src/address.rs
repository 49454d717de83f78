//! Wallet and contract address helpers.
//!
//! Providers disagree on casing (checksummed vs lower-case), so every
//! address that enters the pipeline is normalised to lower-case hex.

use crate::error::CoreError;

/// The conventional burn destination.
pub const NULL_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Normalise a 0x-prefixed, 20-byte hex address to lower case.
pub fn normalize_address(address: &str) -> Result<String, CoreError> {
    let trimmed = address.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| CoreError::MalformedAddress(address.to_string()))?;

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::MalformedAddress(address.to_string()));
    }

    Ok(format!("0x{}", hex_part.to_ascii_lowercase()))
}

/// Case-insensitive address comparison.
pub fn addresses_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
