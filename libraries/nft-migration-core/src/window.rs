//! Block range arithmetic for scanning.
//!
//! All ranges are inclusive on both ends, matching the `from_block` /
//! `to_block` query parameters of chain-data providers.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Largest span a provider accepts in a single transfers query.
pub const MAX_PROVIDER_BLOCK_RANGE: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockWindow {
    pub from_block: u64,
    pub to_block: u64,
}

impl BlockWindow {
    pub fn new(from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block,
        }
    }

    /// Number of blocks covered.
    pub fn len(&self) -> u64 {
        self.to_block.saturating_sub(self.from_block) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.from_block > self.to_block
    }
}

impl std::fmt::Display for BlockWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.from_block, self.to_block)
    }
}

/// Clamp a requested scan range against the chain head and the provider cap.
///
/// `to_block` is lowered to `head`; a span wider than `max_range` is cut
/// to `[from_block, from_block + max_range]`. Returns `None` when
/// `from_block` lies beyond the clamped `to_block`, i.e. nothing to scan.
pub fn clamp_scan_range(
    from_block: u64,
    to_block: u64,
    head: u64,
    max_range: u64,
) -> Option<BlockWindow> {
    let to_block = to_block.min(head);
    if from_block > to_block {
        return None;
    }

    let to_block = if to_block - from_block > max_range {
        from_block + max_range
    } else {
        to_block
    };

    Some(BlockWindow::new(from_block, to_block))
}

/// Split `[from_block, to_block]` into consecutive windows of at most `size` blocks.
///
/// The last window is truncated at `to_block`. An empty range yields no windows.
pub fn partition_windows(
    from_block: u64,
    to_block: u64,
    size: u64,
) -> Result<Vec<BlockWindow>, CoreError> {
    if size == 0 {
        return Err(CoreError::ZeroWindowSize);
    }

    let mut windows = Vec::new();
    let mut start = from_block;
    while start <= to_block {
        let end = start.saturating_add(size - 1).min(to_block);
        windows.push(BlockWindow::new(start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }

    Ok(windows)
}
