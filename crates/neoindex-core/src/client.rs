//! Node-client seam.
//!
//! The sync core consumes the chain through this trait; `neoindex-node`
//! provides the JSON-RPC implementation, tests use in-process mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::fixed8::Fixed8;
use crate::types::Block;

/// A live binding to a classified token contract.
///
/// Handles are cheap values cached in the [`Context`](crate::context::Context)
/// between blocks; metadata queries go back through the [`NodeClient`] that
/// bound them. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHandle {
    pub contract_hash: String,
}

impl TokenHandle {
    pub fn new(contract_hash: impl Into<String>) -> Self {
        Self {
            contract_hash: contract_hash.into(),
        }
    }
}

/// Trait for talking to the blockchain node.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Number of blocks the node knows about (head index + 1).
    async fn block_count(&self) -> Result<u64, SyncError>;

    /// Fetch the canonical block at `index` with its full transaction list.
    async fn get_block(&self, index: u64) -> Result<Block, SyncError>;

    /// Invoke `name()` on a bound token contract.
    async fn token_name(&self, token: &TokenHandle) -> Result<String, SyncError>;

    /// Invoke `symbol()` on a bound token contract.
    async fn token_symbol(&self, token: &TokenHandle) -> Result<String, SyncError>;

    /// Invoke `decimals()` on a bound token contract.
    async fn token_decimals(&self, token: &TokenHandle) -> Result<u8, SyncError>;

    /// Invoke `totalSupply()` on a bound token contract.
    ///
    /// Callers on the extraction path tolerate failure here and fall back to
    /// zero; supply is refined continuously elsewhere.
    async fn token_total_supply(&self, token: &TokenHandle) -> Result<Fixed8, SyncError>;

    /// Bind a handle for a contract identifier.
    fn bind_token(&self, contract_hash: &str) -> TokenHandle {
        TokenHandle::new(contract_hash)
    }
}
