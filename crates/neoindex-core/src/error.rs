//! Error types for the NeoIndex sync pipeline.

use thiserror::Error;

/// Errors that can occur while reconciling blocks or extracting assets.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Block {index} already committed")]
    DuplicateBlock { index: u64 },

    #[error("Block {index} is out of order at height {height}")]
    OutOfOrder { index: u64, height: i64 },

    #[error("Fork at height {height} exceeds the maximum depth of {max_depth} blocks")]
    UnresolvableFork { height: i64, max_depth: u64 },

    #[error("Projection has no committed block at index {index}")]
    MissingBlock { index: u64 },

    #[error("Invalid decimal value: {0:?}")]
    BadDecimal(String),

    #[error("Fee aggregation overflowed at block {index}")]
    FeeOverflow { index: u64 },

    #[error("Updater '{updater}' failed: {reason}")]
    Updater { updater: String, reason: String },
}

impl SyncError {
    /// Returns `true` for a uniqueness violation on a block insert.
    ///
    /// The engine recovers from these locally (insert-or-fetch); every other
    /// variant aborts the current block.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateBlock { .. })
    }
}
