//! Asset and contract extraction.
//!
//! Runs once per block over its full transaction list and produces the new
//! asset rows, the new contract rows, and the token handles to merge into the
//! context cache. Output order follows transaction input order.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future;
use tracing::{debug, warn};

use crate::client::{NodeClient, TokenHandle};
use crate::classify::is_token_contract;
use crate::context::Context;
use crate::error::SyncError;
use crate::fixed8::Fixed8;
use crate::projection::{AssetRow, ContractRow, ContractTag};
use crate::types::{Block, ContractDescriptor, Transaction, TxKind};

/// Everything one block's extraction produced.
#[derive(Debug, Default)]
pub struct Extraction {
    pub assets: Vec<AssetRow>,
    pub contracts: Vec<ContractRow>,
    /// Freshly bound token handles, keyed by contract hash.
    pub tokens: HashMap<String, TokenHandle>,
}

/// Scans a block's transactions for asset registrations and contract
/// publications, classifying token contracts along the way.
pub struct Extractor {
    client: Arc<dyn NodeClient>,
}

impl Extractor {
    pub fn new(client: Arc<dyn NodeClient>) -> Self {
        Self { client }
    }

    /// Extract rows for one block.
    pub async fn scan_block(&self, ctx: &Context, block: &Block) -> Result<Extraction, SyncError> {
        let mut out = Extraction::default();
        for tx in &block.transactions {
            match &tx.kind {
                TxKind::Register(descriptor) => {
                    out.assets.push(AssetRow::from_descriptor(descriptor, block.time));
                }
                TxKind::Publish { contracts } => {
                    self.scan_contracts(ctx, block, tx, contracts, &mut out).await?;
                }
                TxKind::Invocation { asset, contracts } => {
                    if let Some(descriptor) = asset {
                        out.assets.push(AssetRow::from_descriptor(descriptor, block.time));
                    }
                    self.scan_contracts(ctx, block, tx, contracts, &mut out).await?;
                }
                TxKind::Other => {}
            }
        }
        if !out.assets.is_empty() || !out.contracts.is_empty() {
            debug!(
                block = block.index,
                assets = out.assets.len(),
                contracts = out.contracts.len(),
                tokens = out.tokens.len(),
                "extraction complete"
            );
        }
        Ok(out)
    }

    async fn scan_contracts(
        &self,
        ctx: &Context,
        block: &Block,
        tx: &Transaction,
        contracts: &[ContractDescriptor],
        out: &mut Extraction,
    ) -> Result<(), SyncError> {
        for descriptor in contracts {
            let nep5 = is_token_contract(&descriptor.script, &descriptor.hash, &ctx.blacklist);
            let tag = if nep5 {
                ContractTag::Nep5
            } else {
                ContractTag::Unknown
            };
            out.contracts.push(ContractRow::from_descriptor(
                descriptor, tag, block.index, &tx.hash,
            ));
            if nep5 {
                let handle = self.client.bind_token(&descriptor.hash);
                let row = self.token_asset(&handle, block.time).await?;
                out.assets.push(row);
                out.tokens.insert(descriptor.hash.clone(), handle);
            }
        }
        Ok(())
    }

    /// Query metadata for a newly classified token and build its asset row.
    ///
    /// The four calls fan out concurrently; `totalSupply` alone is tolerated
    /// to fail and defaults to zero.
    async fn token_asset(&self, token: &TokenHandle, block_time: i64) -> Result<AssetRow, SyncError> {
        let metadata = future::try_join3(
            self.client.token_name(token),
            self.client.token_symbol(token),
            self.client.token_decimals(token),
        );
        let supply = async {
            match self.client.token_total_supply(token).await {
                Ok(value) => value,
                Err(err) => {
                    warn!(
                        contract = %token.contract_hash,
                        error = %err,
                        "totalSupply query failed, defaulting to zero"
                    );
                    Fixed8::ZERO
                }
            }
        };
        let (metadata, total_supply) = tokio::join!(metadata, supply);
        let (name, symbol, decimals) = metadata?;

        Ok(AssetRow::for_token(
            &token.contract_hash,
            name,
            symbol,
            decimals,
            total_supply,
            block_time,
        ))
    }
}
