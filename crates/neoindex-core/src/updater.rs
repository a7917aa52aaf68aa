//! Sub-updater contracts and their in-memory reference implementations.
//!
//! Each updater owns one slice of block-scoped bookkeeping. The engine fans
//! out to all of them inside one block's append (or revert) and joins before
//! the block counts as committed; `revert` must undo exactly what the matching
//! `save` did.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use crate::context::Context;
use crate::error::SyncError;
use crate::projection::BlockRow;
use crate::types::Block;

// ─── Traits ───────────────────────────────────────────────────────────────────

/// Address ledger: tracks first-seen coordinates of validator addresses.
#[async_trait]
pub trait AddressUpdater: Send + Sync {
    async fn save(&self, ctx: &Context, block: &Block) -> Result<(), SyncError>;
    async fn revert(&self, ctx: &Context, row: &BlockRow) -> Result<(), SyncError>;
}

/// Transaction ledger: ingests a block's transactions.
#[async_trait]
pub trait TransactionUpdater: Send + Sync {
    async fn save(&self, ctx: &Context, block: &Block) -> Result<(), SyncError>;
    async fn revert(&self, ctx: &Context, row: &BlockRow) -> Result<(), SyncError>;
}

/// Previous-block pointer chain: maintains validator succession.
#[async_trait]
pub trait PrevPointerUpdater: Send + Sync {
    async fn save(&self, ctx: &Context, block: &Block) -> Result<(), SyncError>;
    async fn revert(&self, ctx: &Context, row: &BlockRow) -> Result<(), SyncError>;
}

/// Durable cursor of the highest fully-applied block index.
///
/// The driving loop reads it on startup to resume after a crash.
#[async_trait]
pub trait ProcessedIndexStore: Send + Sync {
    /// Last fully-applied index, `None` when nothing is applied.
    async fn load(&self) -> Result<Option<u64>, SyncError>;

    /// Advance the cursor to `index` after a successful append.
    async fn advance(&self, index: u64) -> Result<(), SyncError>;

    /// Roll the cursor back after a revert; `None` clears it.
    async fn rollback(&self, index: Option<u64>) -> Result<(), SyncError>;
}

/// Bundle of the sub-updaters the engine fans out to.
#[derive(Clone)]
pub struct Updaters {
    pub addresses: Arc<dyn AddressUpdater>,
    pub transactions: Arc<dyn TransactionUpdater>,
    pub prev_pointer: Arc<dyn PrevPointerUpdater>,
    pub processed: Arc<dyn ProcessedIndexStore>,
}

impl Updaters {
    /// All-in-memory reference wiring.
    pub fn in_memory() -> Self {
        Self {
            addresses: Arc::new(MemoryAddressUpdater::default()),
            transactions: Arc::new(MemoryTransactionUpdater::default()),
            prev_pointer: Arc::new(MemoryPrevPointerUpdater::default()),
            processed: Arc::new(MemoryProcessedIndex::default()),
        }
    }
}

// ─── In-memory reference implementations ──────────────────────────────────────

/// Per-address bookkeeping entry.
#[derive(Debug, Clone)]
pub struct AddressEntry {
    /// Block where the address was first observed.
    pub first_seen_block: u64,
    /// Number of distinct committed blocks this address validated.
    pub blocks_validated: u64,
}

/// In-memory validator address ledger.
///
/// Keeps the set of contributing block indices per address rather than a
/// counter, so a retried append (same block saved again) counts once and a
/// later revert removes exactly that block's contribution.
#[derive(Default)]
pub struct MemoryAddressUpdater {
    entries: Mutex<HashMap<String, BTreeSet<u64>>>,
}

impl MemoryAddressUpdater {
    pub fn entry(&self, address: &str) -> Option<AddressEntry> {
        let entries = self.entries.lock().unwrap();
        let blocks = entries.get(address)?;
        Some(AddressEntry {
            first_seen_block: *blocks.first()?,
            blocks_validated: blocks.len() as u64,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl AddressUpdater for MemoryAddressUpdater {
    async fn save(&self, _ctx: &Context, block: &Block) -> Result<(), SyncError> {
        self.entries
            .lock()
            .unwrap()
            .entry(block.next_consensus.clone())
            .or_default()
            .insert(block.index);
        Ok(())
    }

    async fn revert(&self, _ctx: &Context, row: &BlockRow) -> Result<(), SyncError> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(blocks) = entries.get_mut(&row.next_consensus) {
            blocks.remove(&row.index);
            if blocks.is_empty() {
                entries.remove(&row.next_consensus);
            }
        }
        Ok(())
    }
}

/// In-memory transaction ledger, keyed by block index.
#[derive(Default)]
pub struct MemoryTransactionUpdater {
    by_block: Mutex<BTreeMap<u64, Vec<String>>>,
}

impl MemoryTransactionUpdater {
    pub fn tx_count(&self) -> usize {
        self.by_block.lock().unwrap().values().map(Vec::len).sum()
    }

    pub fn hashes_at(&self, index: u64) -> Vec<String> {
        self.by_block
            .lock()
            .unwrap()
            .get(&index)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TransactionUpdater for MemoryTransactionUpdater {
    async fn save(&self, _ctx: &Context, block: &Block) -> Result<(), SyncError> {
        let hashes = block
            .transactions
            .iter()
            .map(|tx| tx.hash.clone())
            .collect();
        // overwrite: a retried append rewrites the same list
        self.by_block.lock().unwrap().insert(block.index, hashes);
        Ok(())
    }

    async fn revert(&self, _ctx: &Context, row: &BlockRow) -> Result<(), SyncError> {
        self.by_block.lock().unwrap().remove(&row.index);
        Ok(())
    }
}

/// In-memory validator-succession chain: block index → (validator, prev hash).
#[derive(Default)]
pub struct MemoryPrevPointerUpdater {
    chain: Mutex<BTreeMap<u64, (String, String)>>,
}

impl MemoryPrevPointerUpdater {
    pub fn link_at(&self, index: u64) -> Option<(String, String)> {
        self.chain.lock().unwrap().get(&index).cloned()
    }
}

#[async_trait]
impl PrevPointerUpdater for MemoryPrevPointerUpdater {
    async fn save(&self, _ctx: &Context, block: &Block) -> Result<(), SyncError> {
        self.chain.lock().unwrap().insert(
            block.index,
            (
                block.next_consensus.clone(),
                block.previous_block_hash.clone(),
            ),
        );
        Ok(())
    }

    async fn revert(&self, _ctx: &Context, row: &BlockRow) -> Result<(), SyncError> {
        self.chain.lock().unwrap().remove(&row.index);
        Ok(())
    }
}

/// In-memory processed-index cursor; records when it last moved.
#[derive(Default)]
pub struct MemoryProcessedIndex {
    cell: Mutex<Option<(u64, i64)>>,
}

#[async_trait]
impl ProcessedIndexStore for MemoryProcessedIndex {
    async fn load(&self) -> Result<Option<u64>, SyncError> {
        Ok(self.cell.lock().unwrap().map(|(index, _)| index))
    }

    async fn advance(&self, index: u64) -> Result<(), SyncError> {
        *self.cell.lock().unwrap() = Some((index, chrono::Utc::now().timestamp()));
        Ok(())
    }

    async fn rollback(&self, index: Option<u64>) -> Result<(), SyncError> {
        *self.cell.lock().unwrap() = index.map(|i| (i, chrono::Utc::now().timestamp()));
        Ok(())
    }
}
