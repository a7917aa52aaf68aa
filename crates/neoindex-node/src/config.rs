//! Sync configuration and fluent builder.

use serde::{Deserialize, Serialize};

/// Configuration for one sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Node JSON-RPC endpoint.
    pub rpc_endpoint: String,
    /// Optional stop height; `None` = keep following the chain.
    pub to_block: Option<u64>,
    /// Poll interval while waiting at the chain tip (milliseconds).
    pub poll_interval_ms: u64,
    /// Deepest fork resolved before giving up.
    pub max_fork_depth: u64,
    /// Contract hashes excluded from token classification.
    pub blacklist: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: "http://localhost:10332".into(),
            to_block: None,
            poll_interval_ms: 15_000,
            max_fork_depth: neoindex_core::DEFAULT_MAX_FORK_DEPTH,
            blacklist: vec![],
        }
    }
}

/// Fluent builder for [`SyncConfig`].
///
/// ```rust
/// use neoindex_node::SyncBuilder;
///
/// let config = SyncBuilder::new()
///     .rpc_endpoint("http://seed1.neo.org:10332")
///     .poll_interval_ms(5_000)
///     .blacklist_contract("0xspam")
///     .build_config();
/// ```
#[derive(Default)]
pub struct SyncBuilder {
    config: SyncConfig,
}

impl SyncBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rpc_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.rpc_endpoint = endpoint.into();
        self
    }

    /// Stop after committing this height (for bounded backfill).
    pub fn to_block(mut self, block: u64) -> Self {
        self.config.to_block = Some(block);
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn max_fork_depth(mut self, depth: u64) -> Self {
        self.config.max_fork_depth = depth;
        self
    }

    /// Exclude a contract hash from token classification.
    pub fn blacklist_contract(mut self, hash: impl Into<String>) -> Self {
        self.config.blacklist.push(hash.into());
        self
    }

    pub fn build_config(self) -> SyncConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = SyncBuilder::new().build_config();
        assert_eq!(config.rpc_endpoint, "http://localhost:10332");
        assert_eq!(config.poll_interval_ms, 15_000);
        assert!(config.to_block.is_none());
        assert!(config.blacklist.is_empty());
    }

    #[test]
    fn builder_custom() {
        let config = SyncBuilder::new()
            .rpc_endpoint("http://seed1.neo.org:10332")
            .to_block(2_000_000)
            .max_fork_depth(10)
            .blacklist_contract("0xspam")
            .build_config();

        assert_eq!(config.rpc_endpoint, "http://seed1.neo.org:10332");
        assert_eq!(config.to_block, Some(2_000_000));
        assert_eq!(config.max_fork_depth, 10);
        assert_eq!(config.blacklist, vec!["0xspam"]);
    }
}
