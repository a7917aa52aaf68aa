//! Persisted projection rows owned by the sync core.
//!
//! Lifecycle: `BlockRow`s are created only by a successful append and deleted
//! only by a revert. `AssetRow`s and `ContractRow`s are created once at first
//! observation and are immutable from this core's perspective; their counters
//! are advanced by downstream aggregation jobs.

use serde::{Deserialize, Serialize};

use crate::fixed8::Fixed8;
use crate::types::{AssetDescriptor, AssetType, ContractDescriptor};

// ─── BlockRow ─────────────────────────────────────────────────────────────────

/// Committed block projection. Primary key is the block index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRow {
    pub index: u64,
    pub hash: String,
    pub previous_block_hash: String,
    /// Validator address for the next block.
    pub next_consensus: String,
    /// Sum of this block's transaction system fees.
    pub sys_fee: Fixed8,
    /// Sum of this block's transaction network fees.
    pub net_fee: Fixed8,
    /// Running sum of system fees over the chain prefix ending here:
    /// `total(n) == total(n-1) + sys_fee(n)`, with `total(-1) == 0`.
    pub total_sys_fee: Fixed8,
    pub time: i64,
    pub tx_count: u32,
}

// ─── AssetRow ─────────────────────────────────────────────────────────────────

/// Sentinel for the aggregation cursor of a freshly created asset row.
pub const UNAGGREGATED: i64 = -1;

/// Asset projection, keyed by asset/contract identifier.
///
/// Counters are created zeroed here and owned by aggregation logic elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRow {
    pub asset_id: String,
    pub asset_type: AssetType,
    pub name: String,
    pub symbol: Option<String>,
    /// Total supply.
    pub amount: Fixed8,
    pub precision: u8,
    pub owner: Option<String>,
    pub admin: Option<String>,
    pub block_time: i64,
    pub issued: Fixed8,
    pub address_count: u64,
    pub transfer_count: u64,
    pub transaction_count: u64,
    pub aggregate_block_id: i64,
}

impl AssetRow {
    /// Row for a natively registered asset.
    pub fn from_descriptor(descriptor: &AssetDescriptor, block_time: i64) -> Self {
        Self {
            asset_id: descriptor.asset_id.clone(),
            asset_type: descriptor.asset_type,
            name: descriptor.name.clone(),
            symbol: None,
            amount: descriptor.amount,
            precision: descriptor.precision,
            owner: descriptor.owner.clone(),
            admin: descriptor.admin.clone(),
            block_time,
            issued: Fixed8::ZERO,
            address_count: 0,
            transfer_count: 0,
            transaction_count: 0,
            aggregate_block_id: UNAGGREGATED,
        }
    }

    /// Row for a classified NEP5 token, from queried contract metadata.
    /// Owner and admin are unknown on this path and stay unset.
    pub fn for_token(
        contract_hash: &str,
        name: String,
        symbol: String,
        decimals: u8,
        total_supply: Fixed8,
        block_time: i64,
    ) -> Self {
        Self {
            asset_id: contract_hash.to_string(),
            asset_type: AssetType::Token,
            name,
            symbol: Some(symbol),
            amount: total_supply,
            precision: decimals,
            owner: None,
            admin: None,
            block_time,
            issued: Fixed8::ZERO,
            address_count: 0,
            transfer_count: 0,
            transaction_count: 0,
            aggregate_block_id: UNAGGREGATED,
        }
    }
}

// ─── ContractRow ──────────────────────────────────────────────────────────────

/// Classification tag for a published contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractTag {
    /// Fungible token implementing the standard interface.
    Nep5,
    Unknown,
}

impl ContractTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nep5 => "nep5",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "nep5" => Self::Nep5,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ContractTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract projection, keyed by script hash, pinned to its first appearance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRow {
    pub hash: String,
    pub script: Vec<u8>,
    pub parameters: String,
    pub return_type: String,
    pub needs_storage: bool,
    pub name: String,
    pub version: String,
    pub author: String,
    pub email: String,
    pub description: String,
    pub tag: ContractTag,
    /// Block where the contract was first observed.
    pub block_index: u64,
    /// Transaction that carried it.
    pub tx_hash: String,
}

impl ContractRow {
    pub fn from_descriptor(
        descriptor: &ContractDescriptor,
        tag: ContractTag,
        block_index: u64,
        tx_hash: &str,
    ) -> Self {
        Self {
            hash: descriptor.hash.clone(),
            script: descriptor.script.clone(),
            parameters: descriptor.parameters.clone(),
            return_type: descriptor.return_type.clone(),
            needs_storage: descriptor.needs_storage,
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            author: descriptor.author.clone(),
            email: descriptor.email.clone(),
            description: descriptor.description.clone(),
            tag,
            block_index,
            tx_hash: tx_hash.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_row_counters_start_zeroed() {
        let descriptor = AssetDescriptor {
            asset_id: "0xasset".into(),
            asset_type: AssetType::Governing,
            name: "[{\"lang\":\"en\",\"name\":\"AntShare\"}]".into(),
            amount: Fixed8::from_whole(100_000_000),
            precision: 0,
            owner: Some("00".into()),
            admin: Some("AdminAddr".into()),
        };
        let row = AssetRow::from_descriptor(&descriptor, 1_468_595_301);
        assert_eq!(row.issued, Fixed8::ZERO);
        assert_eq!(row.address_count, 0);
        assert_eq!(row.transfer_count, 0);
        assert_eq!(row.transaction_count, 0);
        assert_eq!(row.aggregate_block_id, UNAGGREGATED);
        assert_eq!(row.owner.as_deref(), Some("00"));
    }

    #[test]
    fn token_row_has_no_owner() {
        let row = AssetRow::for_token(
            "0xtoken",
            "Red Pulse Token".into(),
            "RPX".into(),
            8,
            Fixed8::from_whole(1_000_000),
            0,
        );
        assert_eq!(row.asset_type, AssetType::Token);
        assert_eq!(row.symbol.as_deref(), Some("RPX"));
        assert!(row.owner.is_none());
        assert!(row.admin.is_none());
    }

    #[test]
    fn contract_tag_roundtrip() {
        assert_eq!(ContractTag::parse("nep5"), ContractTag::Nep5);
        assert_eq!(ContractTag::parse("other"), ContractTag::Unknown);
        assert_eq!(ContractTag::Nep5.to_string(), "nep5");
    }
}
