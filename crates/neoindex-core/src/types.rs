//! Chain-facing input types for the sync pipeline.

use serde::{Deserialize, Serialize};

use crate::fixed8::Fixed8;

// ─── Block ────────────────────────────────────────────────────────────────────

/// One block as delivered by the node, with its full transaction list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block index; strictly defines chain position.
    pub index: u64,
    /// Block hash (`0x…`).
    pub hash: String,
    /// Hash of the previous block.
    pub previous_block_hash: String,
    /// Merkle root of the transaction list.
    pub merkle_root: String,
    /// Unix timestamp of the block (seconds since epoch).
    pub time: i64,
    /// Consensus nonce.
    pub nonce: String,
    /// Address of the validator that will sign the next block.
    pub next_consensus: String,
    /// Serialized size in bytes.
    pub size: u32,
    /// Block format version.
    pub version: u32,
    /// Ordered transactions.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Returns `true` if this block's previous-hash pointer matches `hash`.
    pub fn links_to(&self, hash: &str) -> bool {
        self.previous_block_hash == hash
    }
}

// ─── Transaction ──────────────────────────────────────────────────────────────

/// One transaction, with only the fields the projection cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash.
    pub hash: String,
    /// Declared system fee.
    pub sys_fee: Fixed8,
    /// Declared network fee.
    pub net_fee: Fixed8,
    /// What the transaction does, as far as extraction is concerned.
    pub kind: TxKind,
}

/// Closed set of transaction kinds relevant to asset/contract extraction.
///
/// Everything the extraction subsystem matches on is carried here; transaction
/// kinds with no asset or contract payload collapse into [`TxKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    /// Native asset registration.
    Register(AssetDescriptor),
    /// Contract publication.
    Publish { contracts: Vec<ContractDescriptor> },
    /// Contract invocation; its execution may have produced asset-creation
    /// or contract-creation data.
    Invocation {
        asset: Option<AssetDescriptor>,
        contracts: Vec<ContractDescriptor>,
    },
    /// Anything else (claims, transfers, miner transactions, …).
    Other,
}

// ─── Descriptors ──────────────────────────────────────────────────────────────

/// On-chain descriptor of a registered native asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    /// Asset identifier (transaction hash for register transactions).
    pub asset_id: String,
    pub asset_type: AssetType,
    /// Raw asset name, JSON-escaped as delivered by the node.
    pub name: String,
    /// Issuing amount.
    pub amount: Fixed8,
    pub precision: u8,
    pub owner: Option<String>,
    pub admin: Option<String>,
}

/// On-chain descriptor of a published contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDescriptor {
    /// Contract script hash.
    pub hash: String,
    /// Raw bytecode.
    pub script: Vec<u8>,
    /// Parameter type signature.
    pub parameters: String,
    pub return_type: String,
    pub needs_storage: bool,
    pub name: String,
    pub version: String,
    pub author: String,
    pub email: String,
    pub description: String,
}

/// Native asset kinds plus the tag for NEP5 tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetType {
    Governing,
    Utility,
    Share,
    Deposit,
    Token,
    Unknown,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Governing => "governing",
            Self::Utility => "utility",
            Self::Share => "share",
            Self::Deposit => "deposit",
            Self::Token => "token",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "governing" => Self::Governing,
            "utility" => Self::Utility,
            "share" => Self::Share,
            "deposit" => Self::Deposit,
            "token" => Self::Token,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_links_to_parent() {
        let block = Block {
            index: 101,
            hash: "0xbbb".into(),
            previous_block_hash: "0xaaa".into(),
            merkle_root: "0x0".into(),
            time: 1_468_595_301,
            nonce: "0".into(),
            next_consensus: "AddrV".into(),
            size: 686,
            version: 0,
            transactions: vec![],
        };
        assert!(block.links_to("0xaaa"));
        assert!(!block.links_to("0xccc"));
    }

    #[test]
    fn asset_type_roundtrip() {
        for t in [
            AssetType::Governing,
            AssetType::Utility,
            AssetType::Share,
            AssetType::Deposit,
            AssetType::Token,
        ] {
            assert_eq!(AssetType::parse(t.as_str()), t);
        }
        assert_eq!(AssetType::parse("whatever"), AssetType::Unknown);
    }
}
