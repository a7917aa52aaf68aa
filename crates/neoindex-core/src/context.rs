//! Per-call sync context.
//!
//! The context is an explicit value: every engine operation takes one and
//! returns the updated one. No hidden globals, which keeps the fork-resolution
//! state flow auditable and forbids cross-call aliasing.

use std::collections::{HashMap, HashSet};

use crate::client::TokenHandle;
use crate::fixed8::Fixed8;
use crate::projection::BlockRow;

/// State threaded through every `save`/`revert` call.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Current projection height; -1 when the projection is empty.
    pub height: i64,
    /// The committed block row at `height`, if any.
    pub prev_block: Option<BlockRow>,
    /// Token-contract handles discovered so far, keyed by contract hash.
    /// Grows monotonically within a run; never evicted.
    pub tokens: HashMap<String, TokenHandle>,
    /// Contract identifiers excluded from token classification.
    pub blacklist: HashSet<String>,
}

impl Context {
    /// Context over an empty projection.
    pub fn empty() -> Self {
        Self {
            height: -1,
            ..Default::default()
        }
    }

    /// Empty-projection context with a classification blacklist.
    pub fn with_blacklist<I, S>(blacklist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blacklist: blacklist.into_iter().map(Into::into).collect(),
            ..Self::empty()
        }
    }

    /// Context resuming at a committed block row.
    pub fn resuming_at(row: BlockRow) -> Self {
        Self {
            height: row.index as i64,
            prev_block: Some(row),
            ..Default::default()
        }
    }

    /// Aggregated system fee of the committed prefix (zero when empty).
    pub fn total_sys_fee(&self) -> Fixed8 {
        self.prev_block
            .as_ref()
            .map(|row| row.total_sys_fee)
            .unwrap_or(Fixed8::ZERO)
    }

    /// Context after committing `row` as the new chain head.
    pub(crate) fn advanced(mut self, row: BlockRow) -> Self {
        self.height = row.index as i64;
        self.prev_block = Some(row);
        self
    }

    /// Context after reverting the head; `prev` is the row at the new height.
    pub(crate) fn rewound(mut self, prev: Option<BlockRow>) -> Self {
        self.height = prev.as_ref().map(|row| row.index as i64).unwrap_or(-1);
        self.prev_block = prev;
        self
    }

    /// Merge freshly bound token handles; new entries win on collision.
    pub(crate) fn merge_tokens(&mut self, handles: HashMap<String, TokenHandle>) {
        self.tokens.extend(handles);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed8::Fixed8;

    fn row(index: u64, total: &str) -> BlockRow {
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
            total_sys_fee: total.parse().unwrap(),
            time: 0,
            tx_count: 0,
        }
    }

    #[test]
    fn empty_context_is_height_minus_one() {
        let ctx = Context::empty();
        assert_eq!(ctx.height, -1);
        assert!(ctx.prev_block.is_none());
        assert_eq!(ctx.total_sys_fee(), Fixed8::ZERO);
    }

    #[test]
    fn advance_and_rewind() {
        let ctx = Context::empty().advanced(row(0, "1.5"));
        assert_eq!(ctx.height, 0);
        assert_eq!(ctx.total_sys_fee().to_string(), "1.5");

        let ctx = ctx.rewound(None);
        assert_eq!(ctx.height, -1);
        assert!(ctx.prev_block.is_none());
    }

    #[test]
    fn token_merge_keeps_old_entries() {
        let mut ctx = Context::empty();
        ctx.tokens
            .insert("0xa".into(), TokenHandle::new("0xa"));
        ctx.merge_tokens(HashMap::from([(
            "0xb".to_string(),
            TokenHandle::new("0xb"),
        )]));
        assert_eq!(ctx.tokens.len(), 2);
    }
}
