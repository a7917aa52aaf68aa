//! SQLite storage backend for NeoIndex.
//!
//! Persists the block, asset, contract, and fee-ledger projections plus the
//! processed-index cursor to a single SQLite file. Uses `sqlx` with WAL mode
//! for concurrent read performance. Each block commit or revert runs inside
//! one `sqlx` transaction, so a failure rolls the whole batch back.
//!
//! # Usage
//! ```rust,no_run
//! use neoindex_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./neoindex.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use neoindex_core::projection::{AssetRow, BlockRow, ContractRow};
use neoindex_core::updater::ProcessedIndexStore;
use neoindex_core::{Fixed8, Store, SyncError};

/// SQLite-backed projection store and processed-index cursor.
pub struct SqliteStorage {
    pool: SqlitePool,
}

fn storage_err(err: sqlx::Error) -> SyncError {
    SyncError::Storage(err.to_string())
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./neoindex.db"`) or a full
    /// SQLite URL (`"sqlite:./neoindex.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, SyncError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;
        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// All data is lost when the pool is dropped. Ideal for tests.
    pub async fn in_memory() -> Result<Self, SyncError> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;
        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), SyncError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS blocks (
                block_index         INTEGER PRIMARY KEY,
                hash                TEXT    NOT NULL,
                previous_block_hash TEXT    NOT NULL,
                next_consensus      TEXT    NOT NULL,
                sys_fee             TEXT    NOT NULL,
                net_fee             TEXT    NOT NULL,
                total_sys_fee       TEXT    NOT NULL,
                time                INTEGER NOT NULL,
                tx_count            INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS assets (
                asset_id          TEXT    PRIMARY KEY,
                asset_type        TEXT    NOT NULL,
                name              TEXT    NOT NULL,
                symbol            TEXT,
                amount            TEXT    NOT NULL,
                precision         INTEGER NOT NULL,
                owner             TEXT,
                admin             TEXT,
                block_time        INTEGER NOT NULL,
                issued            TEXT    NOT NULL,
                address_count     INTEGER NOT NULL,
                transfer_count    INTEGER NOT NULL,
                transaction_count INTEGER NOT NULL,
                aggregate_block_id INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS contracts (
                hash          TEXT    PRIMARY KEY,
                script        BLOB    NOT NULL,
                parameters    TEXT    NOT NULL,
                return_type   TEXT    NOT NULL,
                needs_storage INTEGER NOT NULL,
                name          TEXT    NOT NULL,
                version       TEXT    NOT NULL,
                author        TEXT    NOT NULL,
                email         TEXT    NOT NULL,
                description   TEXT    NOT NULL,
                tag           TEXT    NOT NULL,
                block_index   INTEGER NOT NULL,
                tx_hash       TEXT    NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sys_fee_ledger (
                block_index INTEGER PRIMARY KEY,
                total       TEXT    NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS processed_index (
                id          INTEGER PRIMARY KEY CHECK (id = 0),
                block_index INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_contracts_block ON contracts (block_index);")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }
}

fn block_from_row(row: &SqliteRow) -> Result<BlockRow, SyncError> {
    Ok(BlockRow {
        index: row.get::<i64, _>("block_index") as u64,
        hash: row.get("hash"),
        previous_block_hash: row.get("previous_block_hash"),
        next_consensus: row.get("next_consensus"),
        sys_fee: row.get::<String, _>("sys_fee").parse()?,
        net_fee: row.get::<String, _>("net_fee").parse()?,
        total_sys_fee: row.get::<String, _>("total_sys_fee").parse()?,
        time: row.get("time"),
        tx_count: row.get::<i64, _>("tx_count") as u32,
    })
}

#[async_trait]
impl Store for SqliteStorage {
    async fn commit_block(
        &self,
        row: &BlockRow,
        assets: &[AssetRow],
        contracts: &[ContractRow],
    ) -> Result<(), SyncError> {
        // One enclosing transaction for the whole batch; dropping it on any
        // error path rolls every write back.
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let inserted = sqlx::query(
            "INSERT INTO blocks
             (block_index, hash, previous_block_hash, next_consensus,
              sys_fee, net_fee, total_sys_fee, time, tx_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(row.index as i64)
        .bind(&row.hash)
        .bind(&row.previous_block_hash)
        .bind(&row.next_consensus)
        .bind(row.sys_fee.to_string())
        .bind(row.net_fee.to_string())
        .bind(row.total_sys_fee.to_string())
        .bind(row.time)
        .bind(row.tx_count as i64)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(SyncError::DuplicateBlock { index: row.index });
            }
            Err(err) => return Err(storage_err(err)),
        }

        sqlx::query("INSERT OR REPLACE INTO sys_fee_ledger (block_index, total) VALUES (?, ?)")
            .bind(row.index as i64)
            .bind(row.total_sys_fee.to_string())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        for asset in assets {
            sqlx::query(
                "INSERT OR IGNORE INTO assets
                 (asset_id, asset_type, name, symbol, amount, precision, owner,
                  admin, block_time, issued, address_count, transfer_count,
                  transaction_count, aggregate_block_id)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&asset.asset_id)
            .bind(asset.asset_type.as_str())
            .bind(&asset.name)
            .bind(&asset.symbol)
            .bind(asset.amount.to_string())
            .bind(asset.precision as i64)
            .bind(&asset.owner)
            .bind(&asset.admin)
            .bind(asset.block_time)
            .bind(asset.issued.to_string())
            .bind(asset.address_count as i64)
            .bind(asset.transfer_count as i64)
            .bind(asset.transaction_count as i64)
            .bind(asset.aggregate_block_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        for contract in contracts {
            sqlx::query(
                "INSERT OR IGNORE INTO contracts
                 (hash, script, parameters, return_type, needs_storage, name,
                  version, author, email, description, tag, block_index, tx_hash)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&contract.hash)
            .bind(&contract.script)
            .bind(&contract.parameters)
            .bind(&contract.return_type)
            .bind(contract.needs_storage)
            .bind(&contract.name)
            .bind(&contract.version)
            .bind(&contract.author)
            .bind(&contract.email)
            .bind(&contract.description)
            .bind(contract.tag.as_str())
            .bind(contract.block_index as i64)
            .bind(&contract.tx_hash)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        debug!(
            index = row.index,
            hash = %row.hash,
            assets = assets.len(),
            contracts = contracts.len(),
            "block committed"
        );
        Ok(())
    }

    async fn revert_block(&self, index: u64) -> Result<(), SyncError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        sqlx::query("DELETE FROM blocks WHERE block_index = ?")
            .bind(index as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        sqlx::query("DELETE FROM sys_fee_ledger WHERE block_index = ?")
            .bind(index as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    async fn get_block(&self, index: u64) -> Result<Option<BlockRow>, SyncError> {
        let row = sqlx::query("SELECT * FROM blocks WHERE block_index = ?")
            .bind(index as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(block_from_row).transpose()
    }

    async fn block_height(&self) -> Result<i64, SyncError> {
        let row = sqlx::query("SELECT MAX(block_index) AS height FROM blocks")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.get::<Option<i64>, _>("height").unwrap_or(-1))
    }

    async fn get_sys_fee(&self, index: u64) -> Result<Option<Fixed8>, SyncError> {
        let row = sqlx::query("SELECT total FROM sys_fee_ledger WHERE block_index = ?")
            .bind(index as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.map(|r| r.get::<String, _>("total").parse()).transpose()
    }
}

#[async_trait]
impl ProcessedIndexStore for SqliteStorage {
    async fn load(&self) -> Result<Option<u64>, SyncError> {
        let row = sqlx::query("SELECT block_index FROM processed_index WHERE id = 0")
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.map(|r| r.get::<i64, _>("block_index") as u64))
    }

    async fn advance(&self, index: u64) -> Result<(), SyncError> {
        sqlx::query(
            "INSERT OR REPLACE INTO processed_index (id, block_index, updated_at)
             VALUES (0, ?, ?)",
        )
        .bind(index as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        debug!(index, "processed index advanced");
        Ok(())
    }

    async fn rollback(&self, index: Option<u64>) -> Result<(), SyncError> {
        match index {
            Some(index) => self.advance(index).await,
            None => {
                sqlx::query("DELETE FROM processed_index WHERE id = 0")
                    .execute(&self.pool)
                    .await
                    .map_err(storage_err)?;
                Ok(())
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use neoindex_core::projection::ContractTag;
    use neoindex_core::types::AssetType;

    fn sample_block(index: u64) -> BlockRow {
        BlockRow {
            index,
            hash: format!("0x{index:064x}"),
            previous_block_hash: if index == 0 {
                "0xgenesis".into()
            } else {
                format!("0x{:064x}", index - 1)
            },
            next_consensus: "APyEx5f4Zm4oCHwFWiSTaph1fPBxZacYVR".into(),
            sys_fee: "0.1".parse().unwrap(),
            net_fee: "0".parse().unwrap(),
            total_sys_fee: Fixed8::from_raw((index as i64 + 1) * 10_000_000),
            time: 1_468_595_301 + index as i64 * 15,
            tx_count: 1,
        }
    }

    fn sample_asset(id: &str) -> AssetRow {
        AssetRow {
            asset_id: id.into(),
            asset_type: AssetType::Token,
            name: "Red Pulse Token".into(),
            symbol: Some("RPX".into()),
            amount: Fixed8::from_whole(1_000_000),
            precision: 8,
            owner: None,
            admin: None,
            block_time: 1_500_000_000,
            issued: Fixed8::ZERO,
            address_count: 0,
            transfer_count: 0,
            transaction_count: 0,
            aggregate_block_id: -1,
        }
    }

    fn sample_contract(hash: &str) -> ContractRow {
        ContractRow {
            hash: hash.into(),
            script: vec![0x51, 0xc5, 0x6b],
            parameters: "0710".into(),
            return_type: "05".into(),
            needs_storage: true,
            name: "RPX Sale".into(),
            version: "1".into(),
            author: "Red Pulse".into(),
            email: "dev@red-pulse.com".into(),
            description: "".into(),
            tag: ContractTag::Nep5,
            block_index: 12,
            tx_hash: "0xtx".into(),
        }
    }

    // ── Blocks ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn block_roundtrip() {
        let store = SqliteStorage::in_memory().await.unwrap();
        let row = sample_block(100);
        store.commit_block(&row, &[], &[]).await.unwrap();

        let loaded = store.get_block(100).await.unwrap().unwrap();
        assert_eq!(loaded, row);
        assert_eq!(
            store.get_sys_fee(100).await.unwrap().unwrap(),
            row.total_sys_fee
        );
    }

    #[tokio::test]
    async fn duplicate_commit_maps_to_duplicate_error() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store
            .commit_block(&sample_block(7), &[], &[])
            .await
            .unwrap();

        let err = store
            .commit_block(&sample_block(7), &[], &[])
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn duplicate_commit_rolls_back_the_whole_batch() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store
            .commit_block(&sample_block(7), &[], &[sample_contract("0xfirst")])
            .await
            .unwrap();

        // The losing writer's asset and contract rows must not land.
        let err = store
            .commit_block(
                &sample_block(7),
                &[sample_asset("0xstraggler")],
                &[sample_contract("0xstraggler")],
            )
            .await
            .unwrap_err();
        assert!(err.is_duplicate());

        let assets = sqlx::query("SELECT COUNT(*) AS n FROM assets")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(assets.get::<i64, _>("n"), 0);
        let contracts = sqlx::query("SELECT COUNT(*) AS n FROM contracts")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(contracts.get::<i64, _>("n"), 1);
    }

    #[tokio::test]
    async fn revert_removes_row_and_fee() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store
            .commit_block(&sample_block(3), &[], &[])
            .await
            .unwrap();
        store.revert_block(3).await.unwrap();
        assert!(store.get_block(3).await.unwrap().is_none());
        assert!(store.get_sys_fee(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn block_height_tracks_max() {
        let store = SqliteStorage::in_memory().await.unwrap();
        assert_eq!(store.block_height().await.unwrap(), -1);
        for index in 0..=4 {
            store
                .commit_block(&sample_block(index), &[], &[])
                .await
                .unwrap();
        }
        assert_eq!(store.block_height().await.unwrap(), 4);
    }

    // ── Assets / contracts ────────────────────────────────────────────────────

    #[tokio::test]
    async fn asset_insert_is_first_observation_only() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store
            .commit_block(&sample_block(0), &[sample_asset("0xrpx")], &[])
            .await
            .unwrap();

        // A later block carrying the same identifier must not overwrite.
        let mut changed = sample_asset("0xrpx");
        changed.name = "Imposter".into();
        store
            .commit_block(&sample_block(1), &[changed], &[])
            .await
            .unwrap();

        let row = sqlx::query("SELECT name FROM assets WHERE asset_id = ?")
            .bind("0xrpx")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("name"), "Red Pulse Token");
    }

    #[tokio::test]
    async fn contract_roundtrip_fields() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store
            .commit_block(&sample_block(12), &[], &[sample_contract("0xrpx")])
            .await
            .unwrap();

        let row = sqlx::query("SELECT * FROM contracts WHERE hash = ?")
            .bind("0xrpx")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("tag"), "nep5");
        assert_eq!(row.get::<Vec<u8>, _>("script"), vec![0x51, 0xc5, 0x6b]);
        assert!(row.get::<bool, _>("needs_storage"));
    }

    // ── Processed index ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn processed_index_cursor_roundtrip() {
        let store = SqliteStorage::in_memory().await.unwrap();
        assert!(ProcessedIndexStore::load(&store).await.unwrap().is_none());

        store.advance(42).await.unwrap();
        assert_eq!(ProcessedIndexStore::load(&store).await.unwrap(), Some(42));

        store.rollback(Some(41)).await.unwrap();
        assert_eq!(ProcessedIndexStore::load(&store).await.unwrap(), Some(41));

        store.rollback(None).await.unwrap();
        assert!(ProcessedIndexStore::load(&store).await.unwrap().is_none());
    }
}
