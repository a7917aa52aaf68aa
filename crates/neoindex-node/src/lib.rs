//! neoindex-node — NEO JSON-RPC client and sync loop for NeoIndex.
//!
//! [`NeoRpcClient`] implements the core [`neoindex_core::NodeClient`] seam
//! over a node's JSON-RPC endpoint (`getblockcount`, `getblock`,
//! `invokefunction`). [`SyncLoop`] drives a
//! [`neoindex_core::SyncEngine`] from it, feeding blocks in index order and
//! polling at the chain tip.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use neoindex_core::{MemoryStore, Updaters};
//! use neoindex_node::{NeoRpcClient, SyncBuilder, SyncLoop};
//!
//! # async fn run() -> Result<(), neoindex_core::SyncError> {
//! let client = Arc::new(NeoRpcClient::new("http://seed1.neo.org:10332"));
//! let store = Arc::new(MemoryStore::new());
//! let config = SyncBuilder::new().to_block(1_000).build_config();
//!
//! SyncLoop::new(store, client, Updaters::in_memory(), config)
//!     .run()
//!     .await
//! # }
//! ```

pub mod config;
pub mod rpc;
pub mod sync;

pub use config::{SyncBuilder, SyncConfig};
pub use rpc::NeoRpcClient;
pub use sync::SyncLoop;
