//! Storage seam and the in-memory reference store.
//!
//! One block's projection writes (the block row, its fee-ledger entry, and
//! the asset/contract rows extracted from it) commit through a single atomic
//! scope, `commit_block`; a half-applied block must never be observable.
//! Implementations must signal a uniqueness violation on the block row as
//! [`SyncError::DuplicateBlock`], distinguishable from every other storage
//! error and leaving nothing written, so the engine can resolve duplicate
//! writes with insert-or-fetch.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::error::SyncError;
use crate::fixed8::Fixed8;
use crate::projection::{AssetRow, BlockRow, ContractRow};

/// Relational storage for the projection tables.
#[async_trait]
pub trait Store: Send + Sync {
    /// Commit all of one block's projection writes atomically: the block row,
    /// the fee-ledger entry recording `row.index` → `row.total_sys_fee`, and
    /// the asset/contract rows (skipping identifiers already present; those
    /// rows are created once at first observation and never updated here).
    ///
    /// Must fail with [`SyncError::DuplicateBlock`], writing nothing, if a
    /// block row with the same index already exists.
    async fn commit_block(
        &self,
        row: &BlockRow,
        assets: &[AssetRow],
        contracts: &[ContractRow],
    ) -> Result<(), SyncError>;

    /// Atomically delete a block row and its fee-ledger entry.
    async fn revert_block(&self, index: u64) -> Result<(), SyncError>;

    async fn get_block(&self, index: u64) -> Result<Option<BlockRow>, SyncError>;

    /// Highest committed block index, -1 when empty. Used for crash recovery.
    async fn block_height(&self) -> Result<i64, SyncError>;

    /// Aggregated system fee recorded at `index`.
    async fn get_sys_fee(&self, index: u64) -> Result<Option<Fixed8>, SyncError>;
}

// ─── In-memory store ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Tables {
    blocks: BTreeMap<u64, BlockRow>,
    assets: HashMap<String, AssetRow>,
    contracts: HashMap<String, ContractRow>,
    sys_fees: BTreeMap<u64, Fixed8>,
}

/// In-memory reference store for tests and embedded use.
///
/// All tables live under one lock, so each commit or revert scope is atomic;
/// all data is lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an asset row (test helper).
    pub fn asset(&self, asset_id: &str) -> Option<AssetRow> {
        self.tables.lock().unwrap().assets.get(asset_id).cloned()
    }

    /// Look up a contract row (test helper).
    pub fn contract(&self, hash: &str) -> Option<ContractRow> {
        self.tables.lock().unwrap().contracts.get(hash).cloned()
    }

    pub fn block_count(&self) -> usize {
        self.tables.lock().unwrap().blocks.len()
    }

    pub fn asset_count(&self) -> usize {
        self.tables.lock().unwrap().assets.len()
    }

    pub fn contract_count(&self) -> usize {
        self.tables.lock().unwrap().contracts.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn commit_block(
        &self,
        row: &BlockRow,
        assets: &[AssetRow],
        contracts: &[ContractRow],
    ) -> Result<(), SyncError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.blocks.contains_key(&row.index) {
            return Err(SyncError::DuplicateBlock { index: row.index });
        }
        tables.blocks.insert(row.index, row.clone());
        tables.sys_fees.insert(row.index, row.total_sys_fee);
        for asset in assets {
            tables
                .assets
                .entry(asset.asset_id.clone())
                .or_insert_with(|| asset.clone());
        }
        for contract in contracts {
            tables
                .contracts
                .entry(contract.hash.clone())
                .or_insert_with(|| contract.clone());
        }
        Ok(())
    }

    async fn revert_block(&self, index: u64) -> Result<(), SyncError> {
        let mut tables = self.tables.lock().unwrap();
        tables.blocks.remove(&index);
        tables.sys_fees.remove(&index);
        Ok(())
    }

    async fn get_block(&self, index: u64) -> Result<Option<BlockRow>, SyncError> {
        Ok(self.tables.lock().unwrap().blocks.get(&index).cloned())
    }

    async fn block_height(&self) -> Result<i64, SyncError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .blocks
            .keys()
            .next_back()
            .map(|index| *index as i64)
            .unwrap_or(-1))
    }

    async fn get_sys_fee(&self, index: u64) -> Result<Option<Fixed8>, SyncError> {
        Ok(self.tables.lock().unwrap().sys_fees.get(&index).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: u64) -> BlockRow {
        BlockRow {
            index,
            hash: format!("0x{index}"),
            previous_block_hash: if index == 0 {
                "0x0".into()
            } else {
                format!("0x{}", index - 1)
            },
            next_consensus: "AddrV".into(),
            sys_fee: Fixed8::ZERO,
            net_fee: Fixed8::ZERO,
            total_sys_fee: "1.25".parse().unwrap(),
            time: 0,
            tx_count: 0,
        }
    }

    fn asset(id: &str, name: &str) -> AssetRow {
        AssetRow::for_token(id, name.into(), "TKN".into(), 8, Fixed8::ZERO, 0)
    }

    #[tokio::test]
    async fn commit_writes_row_and_fee_together() {
        let store = MemoryStore::new();
        store.commit_block(&row(3), &[], &[]).await.unwrap();

        assert!(store.get_block(3).await.unwrap().is_some());
        assert_eq!(
            store.get_sys_fee(3).await.unwrap().unwrap().to_string(),
            "1.25"
        );
    }

    #[tokio::test]
    async fn duplicate_commit_writes_nothing() {
        let store = MemoryStore::new();
        store
            .commit_block(&row(5), &[asset("0xa", "Original")], &[])
            .await
            .unwrap();

        let err = store
            .commit_block(&row(5), &[asset("0xb", "Straggler")], &[])
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
        // The losing batch is rolled back whole, asset row included.
        assert!(store.asset("0xb").is_none());
        assert_eq!(store.asset_count(), 1);
    }

    #[tokio::test]
    async fn revert_removes_row_and_fee() {
        let store = MemoryStore::new();
        store.commit_block(&row(1), &[], &[]).await.unwrap();
        store.revert_block(1).await.unwrap();

        assert!(store.get_block(1).await.unwrap().is_none());
        assert!(store.get_sys_fee(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn height_tracks_max_index() {
        let store = MemoryStore::new();
        assert_eq!(store.block_height().await.unwrap(), -1);
        store.commit_block(&row(0), &[], &[]).await.unwrap();
        store.commit_block(&row(1), &[], &[]).await.unwrap();
        assert_eq!(store.block_height().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn asset_insert_is_first_observation_only() {
        let store = MemoryStore::new();
        store
            .commit_block(&row(0), &[asset("0xa", "Original")], &[])
            .await
            .unwrap();
        store
            .commit_block(&row(1), &[asset("0xa", "Imposter")], &[])
            .await
            .unwrap();

        assert_eq!(store.asset("0xa").unwrap().name, "Original");
    }
}
