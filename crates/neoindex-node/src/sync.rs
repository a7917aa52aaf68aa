//! The sync loop — feeds blocks from the node into the reconciliation engine.
//!
//! On startup the loop recovers its position from the processed-index cursor,
//! the durable marker of the highest block the engine fully applied. Block
//! rows above the cursor (committed, but interrupted before the cursor
//! advanced) are fed through the engine again; the duplicate commit resolves
//! by insert-or-fetch, so the replay is idempotent. The loop then requests
//! blocks in index order and hands each one to [`SyncEngine::save`]. Fork
//! handling lives entirely inside the engine; the loop only keeps the feed
//! ordered. At the chain tip it polls on `poll_interval_ms`; with `to_block`
//! set it stops once that height commits.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use neoindex_core::{
    Context, NodeClient, ProcessedIndexStore, Store, SyncEngine, SyncError, Updaters,
};

use crate::config::SyncConfig;

/// Drives a [`SyncEngine`] from a live node.
pub struct SyncLoop {
    engine: SyncEngine,
    client: Arc<dyn NodeClient>,
    store: Arc<dyn Store>,
    processed: Arc<dyn ProcessedIndexStore>,
    config: SyncConfig,
}

impl SyncLoop {
    pub fn new(
        store: Arc<dyn Store>,
        client: Arc<dyn NodeClient>,
        updaters: Updaters,
        config: SyncConfig,
    ) -> Self {
        let processed = updaters.processed.clone();
        let engine = SyncEngine::new(store.clone(), client.clone(), updaters)
            .with_max_fork_depth(config.max_fork_depth);
        Self {
            engine,
            client,
            store,
            processed,
            config,
        }
    }

    /// Rebuild the context from the processed-index cursor.
    async fn resume(&self) -> Result<Context, SyncError> {
        let mut anchor = self.processed.load().await?;
        let mut ctx = loop {
            match anchor {
                None => break Context::empty(),
                Some(index) => match self.store.get_block(index).await? {
                    Some(row) => break Context::resuming_at(row),
                    // An interrupted revert can leave the cursor ahead of
                    // the store; walk back to a row that is committed.
                    None => anchor = index.checked_sub(1),
                },
            }
        };
        ctx.blacklist = self.config.blacklist.iter().cloned().collect();
        Ok(ctx)
    }

    /// Run until `to_block` commits, or forever when unbounded.
    pub async fn run(&self) -> Result<(), SyncError> {
        let mut ctx = self.resume().await?;
        info!(height = ctx.height, "starting sync");

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if let Some(to) = self.config.to_block {
                if ctx.height >= to as i64 {
                    info!(height = ctx.height, "reached target block, stopping");
                    return Ok(());
                }
            }

            let count = self.client.block_count().await?;
            let next = (ctx.height + 1) as u64;

            if next >= count {
                debug!(height = ctx.height, "at chain tip, polling");
                tokio::time::sleep(poll_interval).await;
                continue;
            }

            let block = self.client.get_block(next).await?;
            ctx = self.engine.save(ctx, block).await?;

            if ctx.height % 1_000 == 0 {
                info!(height = ctx.height, chain = count - 1, "sync progress");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SyncBuilder;

    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use neoindex_core::{
        Block, Fixed8, MemoryStore, SyncError, TokenHandle, Transaction, TxKind,
    };

    struct FakeNode {
        chain: Mutex<HashMap<u64, Block>>,
    }

    impl FakeNode {
        fn with_chain(blocks: Vec<Block>) -> Self {
            Self {
                chain: Mutex::new(blocks.into_iter().map(|b| (b.index, b)).collect()),
            }
        }
    }

    #[async_trait]
    impl NodeClient for FakeNode {
        async fn block_count(&self) -> Result<u64, SyncError> {
            Ok(self.chain.lock().unwrap().len() as u64)
        }

        async fn get_block(&self, index: u64) -> Result<Block, SyncError> {
            self.chain
                .lock()
                .unwrap()
                .get(&index)
                .cloned()
                .ok_or(SyncError::MissingBlock { index })
        }

        async fn token_name(&self, _: &TokenHandle) -> Result<String, SyncError> {
            Ok("Token".into())
        }

        async fn token_symbol(&self, _: &TokenHandle) -> Result<String, SyncError> {
            Ok("TKN".into())
        }

        async fn token_decimals(&self, _: &TokenHandle) -> Result<u8, SyncError> {
            Ok(8)
        }

        async fn token_total_supply(&self, _: &TokenHandle) -> Result<Fixed8, SyncError> {
            Ok(Fixed8::ZERO)
        }
    }

    fn chain(len: u64) -> Vec<Block> {
        (0..len)
            .map(|i| Block {
                index: i,
                hash: format!("0xh{i}"),
                previous_block_hash: if i == 0 {
                    "0x0".into()
                } else {
                    format!("0xh{}", i - 1)
                },
                merkle_root: "0xm".into(),
                time: 1_468_595_301 + i as i64 * 15,
                nonce: "0".into(),
                next_consensus: "AddrV".into(),
                size: 686,
                version: 0,
                transactions: vec![Transaction {
                    hash: format!("0xtx{i}"),
                    sys_fee: Fixed8::from_whole(1),
                    net_fee: Fixed8::ZERO,
                    kind: TxKind::Other,
                }],
            })
            .collect()
    }

    #[tokio::test]
    async fn bounded_run_syncs_to_target() {
        let store = Arc::new(MemoryStore::new());
        let node = Arc::new(FakeNode::with_chain(chain(6)));
        let config = SyncBuilder::new().to_block(5).build_config();

        let sync = SyncLoop::new(
            store.clone(),
            node,
            Updaters::in_memory(),
            config,
        );
        sync.run().await.unwrap();

        assert_eq!(store.block_height().await.unwrap(), 5);
        assert_eq!(
            store.get_sys_fee(5).await.unwrap().unwrap(),
            Fixed8::from_whole(6)
        );
    }

    #[tokio::test]
    async fn resume_continues_from_cursor() {
        let store = Arc::new(MemoryStore::new());
        let node = Arc::new(FakeNode::with_chain(chain(4)));
        let updaters = Updaters::in_memory();

        let first = SyncLoop::new(
            store.clone(),
            node.clone(),
            updaters.clone(),
            SyncBuilder::new().to_block(1).build_config(),
        );
        first.run().await.unwrap();
        assert_eq!(store.block_height().await.unwrap(), 1);
        assert_eq!(updaters.processed.load().await.unwrap(), Some(1));

        // Fresh loop over the same store and cursor picks up at block 2.
        let second = SyncLoop::new(
            store.clone(),
            node,
            updaters.clone(),
            SyncBuilder::new().to_block(3).build_config(),
        );
        let ctx = second.resume().await.unwrap();
        assert_eq!(ctx.height, 1);

        second.run().await.unwrap();
        assert_eq!(store.block_height().await.unwrap(), 3);
        assert_eq!(store.block_count(), 4);
        assert_eq!(updaters.processed.load().await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn resume_replays_rows_above_the_cursor() {
        let store = Arc::new(MemoryStore::new());
        let node = Arc::new(FakeNode::with_chain(chain(4)));
        let updaters = Updaters::in_memory();

        let first = SyncLoop::new(
            store.clone(),
            node.clone(),
            updaters.clone(),
            SyncBuilder::new().to_block(2).build_config(),
        );
        first.run().await.unwrap();

        // A crash between the projection commit and the cursor advance
        // leaves a committed row above the cursor.
        updaters.processed.rollback(Some(1)).await.unwrap();

        let second = SyncLoop::new(
            store.clone(),
            node,
            updaters.clone(),
            SyncBuilder::new().to_block(3).build_config(),
        );
        let ctx = second.resume().await.unwrap();
        assert_eq!(ctx.height, 1);

        // Block 2 is re-fed; the duplicate commit resolves idempotently.
        second.run().await.unwrap();
        assert_eq!(store.block_height().await.unwrap(), 3);
        assert_eq!(store.block_count(), 4);
        assert_eq!(
            store.get_sys_fee(2).await.unwrap().unwrap(),
            Fixed8::from_whole(3)
        );
        assert_eq!(updaters.processed.load().await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn resume_walks_back_over_a_missing_row() {
        let store = Arc::new(MemoryStore::new());
        let node = Arc::new(FakeNode::with_chain(chain(3)));
        let updaters = Updaters::in_memory();

        let first = SyncLoop::new(
            store.clone(),
            node.clone(),
            updaters.clone(),
            SyncBuilder::new().to_block(2).build_config(),
        );
        first.run().await.unwrap();

        // A revert interrupted before its cursor rollback leaves the cursor
        // pointing at a deleted row.
        store.revert_block(2).await.unwrap();
        assert_eq!(updaters.processed.load().await.unwrap(), Some(2));

        let second = SyncLoop::new(store.clone(), node, updaters, SyncBuilder::new().build_config());
        let ctx = second.resume().await.unwrap();
        assert_eq!(ctx.height, 1);
    }

    #[tokio::test]
    async fn resume_carries_blacklist() {
        let store = Arc::new(MemoryStore::new());
        let node = Arc::new(FakeNode::with_chain(chain(1)));
        let config = SyncBuilder::new()
            .to_block(0)
            .blacklist_contract("0xspam")
            .build_config();

        let sync = SyncLoop::new(store, node, Updaters::in_memory(), config);
        let ctx = sync.resume().await.unwrap();
        assert!(ctx.blacklist.contains("0xspam"));
    }
}
