//! Block reconciliation engine.
//!
//! For each incoming block the engine decides among append, no-op, and fork
//! resolution, keyed on the relation between the block index and the current
//! projection height:
//!
//! - `index == height + 1`, hashes link: append.
//! - `index == height + 1`, hashes disagree: the chain diverged at `height` —
//!   fetch the canonical block there, revert the local one, retry.
//! - `index == height`, same hash: idempotent replay, no-op.
//! - `index == height`, different hash: revert local `height`, then append the
//!   fed block.
//! - anything else: out-of-order input, rejected.
//!
//! Fork resolution runs as a loop rather than recursion. Every iteration
//! either reverts one block (the divergence height strictly decreases, bounded
//! by `max_fork_depth`) or applies one block off the pending stack, so the
//! loop terminates and the fed block commits in the same call.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::NodeClient;
use crate::context::Context;
use crate::error::SyncError;
use crate::extract::Extractor;
use crate::fixed8::Fixed8;
use crate::projection::BlockRow;
use crate::store::Store;
use crate::types::Block;
use crate::updater::Updaters;

/// Deepest fork the engine resolves before giving up.
pub const DEFAULT_MAX_FORK_DEPTH: u64 = 100;

/// Orchestrates block appends, reverts, and fork resolution.
pub struct SyncEngine {
    store: Arc<dyn Store>,
    client: Arc<dyn NodeClient>,
    updaters: Updaters,
    extractor: Extractor,
    max_fork_depth: u64,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn Store>, client: Arc<dyn NodeClient>, updaters: Updaters) -> Self {
        Self {
            store,
            extractor: Extractor::new(client.clone()),
            client,
            updaters,
            max_fork_depth: DEFAULT_MAX_FORK_DEPTH,
        }
    }

    /// Cap on how many blocks a single `save` may revert while resolving a
    /// fork; beyond it the call fails with [`SyncError::UnresolvableFork`].
    pub fn with_max_fork_depth(mut self, depth: u64) -> Self {
        self.max_fork_depth = depth;
        self
    }

    /// Reconcile one incoming block and return the updated context.
    pub async fn save(&self, ctx: Context, block: Block) -> Result<Context, SyncError> {
        let mut ctx = ctx;
        let mut block = block;
        // Blocks displaced while rewinding; re-applied once histories agree.
        let mut pending: Vec<Block> = Vec::new();
        let mut reverted: u64 = 0;

        loop {
            let height = ctx.height;
            let index = block.index as i64;

            if index == height + 1 {
                let linked = match &ctx.prev_block {
                    None => true,
                    Some(prev) => block.links_to(&prev.hash),
                };
                if linked {
                    ctx = self.apply(ctx, &block).await?;
                    match pending.pop() {
                        Some(next) => {
                            block = next;
                            continue;
                        }
                        None => return Ok(ctx),
                    }
                }
                // Diverged at `height`: local history there is not canonical.
                reverted += 1;
                if reverted > self.max_fork_depth {
                    return Err(SyncError::UnresolvableFork {
                        height,
                        max_depth: self.max_fork_depth,
                    });
                }
                warn!(height, incoming = block.index, "fork detected, rewinding");
                let canonical = self.client.get_block(height as u64).await?;
                let row = ctx.prev_block.clone().ok_or(SyncError::MissingBlock {
                    index: height as u64,
                })?;
                ctx = self.revert(ctx, row).await?;
                pending.push(std::mem::replace(&mut block, canonical));
            } else if index == height {
                let committed = ctx.prev_block.as_ref().ok_or(SyncError::MissingBlock {
                    index: block.index,
                })?;
                if committed.hash == block.hash {
                    debug!(index = block.index, "stale duplicate, no-op");
                    match pending.pop() {
                        Some(next) => {
                            block = next;
                            continue;
                        }
                        None => return Ok(ctx),
                    }
                }
                // Same height, different content: the fed block replaces it.
                reverted += 1;
                if reverted > self.max_fork_depth {
                    return Err(SyncError::UnresolvableFork {
                        height,
                        max_depth: self.max_fork_depth,
                    });
                }
                warn!(height, incoming = %block.hash, "stale hash mismatch, rewinding");
                let row = committed.clone();
                ctx = self.revert(ctx, row).await?;
            } else {
                return Err(SyncError::OutOfOrder {
                    index: block.index,
                    height,
                });
            }
        }
    }

    /// Append one block that is known to extend the committed chain.
    async fn apply(&self, ctx: Context, block: &Block) -> Result<Context, SyncError> {
        let sys_fee = Fixed8::sum(block.transactions.iter().map(|tx| tx.sys_fee))
            .ok_or(SyncError::FeeOverflow { index: block.index })?;
        let net_fee = Fixed8::sum(block.transactions.iter().map(|tx| tx.net_fee))
            .ok_or(SyncError::FeeOverflow { index: block.index })?;
        let total_sys_fee = ctx
            .total_sys_fee()
            .checked_add(sys_fee)
            .ok_or(SyncError::FeeOverflow { index: block.index })?;

        let row = BlockRow {
            index: block.index,
            hash: block.hash.clone(),
            previous_block_hash: block.previous_block_hash.clone(),
            next_consensus: block.next_consensus.clone(),
            sys_fee,
            net_fee,
            total_sys_fee,
            time: block.time,
            tx_count: block.transactions.len() as u32,
        };

        // Sub-updater and extraction work fans out first; all of it tolerates
        // replay, so a failed block is retried from scratch.
        let (_, _, _, extraction) = tokio::try_join!(
            self.updaters.transactions.save(&ctx, block),
            self.updaters.addresses.save(&ctx, block),
            self.updaters.prev_pointer.save(&ctx, block),
            self.extractor.scan_block(&ctx, block),
        )?;

        // The projection rows land in one atomic scope. Insert-or-fetch: a
        // duplicate means a concurrent or retried writer already committed
        // the whole batch for this index; its row is the committed value.
        let committed = match self
            .store
            .commit_block(&row, &extraction.assets, &extraction.contracts)
            .await
        {
            Ok(()) => row,
            Err(err) if err.is_duplicate() => {
                debug!(index = block.index, "duplicate commit, fetching committed row");
                self.store
                    .get_block(block.index)
                    .await?
                    .ok_or(SyncError::MissingBlock { index: block.index })?
            }
            Err(err) => return Err(err),
        };
        self.updaters.processed.advance(block.index).await?;

        info!(
            index = block.index,
            hash = %committed.hash,
            txs = committed.tx_count,
            total_sys_fee = %committed.total_sys_fee,
            "block committed"
        );

        let mut ctx = ctx.advanced(committed);
        ctx.merge_tokens(extraction.tokens);
        Ok(ctx)
    }

    /// Undo exactly the effects of the matching append.
    pub async fn revert(&self, ctx: Context, row: BlockRow) -> Result<Context, SyncError> {
        tokio::try_join!(
            self.updaters.addresses.revert(&ctx, &row),
            self.updaters.transactions.revert(&ctx, &row),
            self.updaters.prev_pointer.revert(&ctx, &row),
        )?;
        self.store.revert_block(row.index).await?;

        let prev = if row.index == 0 {
            None
        } else {
            self.store.get_block(row.index - 1).await?
        };
        self.updaters
            .processed
            .rollback(prev.as_ref().map(|p| p.index))
            .await?;

        warn!(
            index = row.index,
            new_height = prev.as_ref().map(|p| p.index as i64).unwrap_or(-1),
            "block reverted"
        );
        Ok(ctx.rewound(prev))
    }
}
