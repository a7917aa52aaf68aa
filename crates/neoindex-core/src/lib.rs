//! neoindex-core — block reconciliation and asset extraction for NeoIndex.
//!
//! # Architecture
//!
//! ```text
//! SyncEngine (save / revert)
//!     ├── Context          (height, previous block, token-handle cache)
//!     ├── Store            (projection tables; memory / SQLite backend)
//!     ├── NodeClient       (canonical blocks + token metadata RPCs)
//!     ├── Updaters         (address / transaction / prev-pointer / cursor)
//!     └── Extractor        (asset rows, contract rows, NEP5 classification)
//! ```
//!
//! Blocks are fed strictly in order; the engine appends, no-ops on stale
//! duplicates, or resolves forks by reverting committed rows and replaying
//! the canonical chain. Sub-updater and extraction work for one block fans
//! out concurrently; the projection rows then land in one atomic storage
//! scope before the block counts as committed.

pub mod classify;
pub mod client;
pub mod context;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fixed8;
pub mod projection;
pub mod store;
pub mod types;
pub mod updater;

pub use classify::{is_token_contract, NEP5_METHODS};
pub use client::{NodeClient, TokenHandle};
pub use context::Context;
pub use engine::{SyncEngine, DEFAULT_MAX_FORK_DEPTH};
pub use error::SyncError;
pub use extract::{Extraction, Extractor};
pub use fixed8::Fixed8;
pub use projection::{AssetRow, BlockRow, ContractRow, ContractTag};
pub use store::{MemoryStore, Store};
pub use types::{AssetDescriptor, AssetType, Block, ContractDescriptor, Transaction, TxKind};
pub use updater::{ProcessedIndexStore, Updaters};
