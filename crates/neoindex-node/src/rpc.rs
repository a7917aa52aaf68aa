//! NEO JSON-RPC node client.
//!
//! Implements [`NodeClient`] over the node's HTTP endpoint: `getblockcount`
//! and `getblock` (verbose) for chain data, `invokefunction` for token
//! metadata. Response parsing lives in free functions so it stays testable
//! without a node.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};

use neoindex_core::types::{AssetDescriptor, AssetType, ContractDescriptor, TxKind};
use neoindex_core::{Block, Fixed8, NodeClient, SyncError, TokenHandle, Transaction};

/// JSON-RPC client for a NEO node.
pub struct NeoRpcClient {
    http: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

fn rpc_err(err: impl std::fmt::Display) -> SyncError {
    SyncError::Rpc(err.to_string())
}

impl NeoRpcClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, SyncError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
        });
        let response: Value = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(rpc_err)?
            .json()
            .await
            .map_err(rpc_err)?;

        if let Some(err) = response.get("error").filter(|e| !e.is_null()) {
            return Err(SyncError::Rpc(format!("{method}: {err}")));
        }
        response
            .get("result")
            .cloned()
            .ok_or_else(|| SyncError::Rpc(format!("{method}: missing result")))
    }

    /// Invoke a read-only contract method and return the top stack item.
    async fn invoke(&self, contract: &str, operation: &str) -> Result<Value, SyncError> {
        let result = self
            .call("invokefunction", json!([contract, operation, []]))
            .await?;
        let state = result["state"].as_str().unwrap_or("");
        if !state.starts_with("HALT") {
            return Err(SyncError::Rpc(format!(
                "{operation} on {contract} faulted: {state}"
            )));
        }
        result["stack"]
            .as_array()
            .and_then(|stack| stack.last().cloned())
            .ok_or_else(|| SyncError::Rpc(format!("{operation} on {contract}: empty stack")))
    }
}

#[async_trait]
impl NodeClient for NeoRpcClient {
    async fn block_count(&self) -> Result<u64, SyncError> {
        let result = self.call("getblockcount", json!([])).await?;
        result
            .as_u64()
            .ok_or_else(|| SyncError::Rpc("getblockcount: not a number".into()))
    }

    async fn get_block(&self, index: u64) -> Result<Block, SyncError> {
        // verbosity 1 yields the decoded block with its transaction list
        let result = self.call("getblock", json!([index, 1])).await?;
        parse_block(&result)
    }

    async fn token_name(&self, token: &TokenHandle) -> Result<String, SyncError> {
        let item = self.invoke(&token.contract_hash, "name").await?;
        parse_stack_string(&item)
    }

    async fn token_symbol(&self, token: &TokenHandle) -> Result<String, SyncError> {
        let item = self.invoke(&token.contract_hash, "symbol").await?;
        parse_stack_string(&item)
    }

    async fn token_decimals(&self, token: &TokenHandle) -> Result<u8, SyncError> {
        let item = self.invoke(&token.contract_hash, "decimals").await?;
        Ok(parse_stack_integer(&item)? as u8)
    }

    async fn token_total_supply(&self, token: &TokenHandle) -> Result<Fixed8, SyncError> {
        let item = self.invoke(&token.contract_hash, "totalSupply").await?;
        // NEP5 supply comes back in base units, which line up with fixed8
        // raw units for the standard eight-decimal tokens
        Ok(Fixed8::from_raw(parse_stack_integer(&item)?))
    }
}

// ─── Response parsing ─────────────────────────────────────────────────────────

fn str_field(value: &Value, field: &str) -> Result<String, SyncError> {
    value[field]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SyncError::Rpc(format!("missing field {field:?}")))
}

fn fee_field(value: &Value, field: &str) -> Result<Fixed8, SyncError> {
    str_field(value, field)?.parse()
}

/// Decode a verbose `getblock` response.
pub fn parse_block(value: &Value) -> Result<Block, SyncError> {
    let transactions = value["tx"]
        .as_array()
        .map(|txs| txs.iter().map(parse_transaction).collect())
        .transpose()?
        .unwrap_or_default();

    Ok(Block {
        index: value["index"]
            .as_u64()
            .ok_or_else(|| SyncError::Rpc("missing field \"index\"".into()))?,
        hash: str_field(value, "hash")?,
        previous_block_hash: str_field(value, "previousblockhash")?,
        merkle_root: str_field(value, "merkleroot")?,
        time: value["time"].as_i64().unwrap_or(0),
        nonce: str_field(value, "nonce")?,
        next_consensus: str_field(value, "nextconsensus")?,
        size: value["size"].as_u64().unwrap_or(0) as u32,
        version: value["version"].as_u64().unwrap_or(0) as u32,
        transactions,
    })
}

/// Decode one transaction from a verbose block.
pub fn parse_transaction(value: &Value) -> Result<Transaction, SyncError> {
    let kind = match value["type"].as_str().unwrap_or("") {
        "RegisterTransaction" => TxKind::Register(parse_asset(&value["asset"])?),
        "PublishTransaction" => TxKind::Publish {
            contracts: vec![parse_contract(&value["contract"])?],
        },
        "InvocationTransaction" => TxKind::Invocation {
            asset: match &value["asset"] {
                Value::Null => None,
                descriptor => Some(parse_asset(descriptor)?),
            },
            contracts: value["contracts"]
                .as_array()
                .map(|list| list.iter().map(parse_contract).collect())
                .transpose()?
                .unwrap_or_default(),
        },
        _ => TxKind::Other,
    };

    Ok(Transaction {
        hash: str_field(value, "txid")?,
        sys_fee: fee_field(value, "sys_fee")?,
        net_fee: fee_field(value, "net_fee")?,
        kind,
    })
}

fn parse_asset(value: &Value) -> Result<AssetDescriptor, SyncError> {
    Ok(AssetDescriptor {
        asset_id: str_field(value, "assetid").or_else(|_| str_field(value, "txid"))?,
        asset_type: asset_type_from_rpc(value["type"].as_str().unwrap_or("")),
        name: value["name"].to_string(),
        amount: fee_field(value, "amount")?,
        precision: value["precision"].as_u64().unwrap_or(0) as u8,
        owner: value["owner"].as_str().map(str::to_string),
        admin: value["admin"].as_str().map(str::to_string),
    })
}

fn parse_contract(value: &Value) -> Result<ContractDescriptor, SyncError> {
    let code = &value["code"];
    let script_hex = str_field(code, "script")?;
    let script = hex::decode(&script_hex)
        .map_err(|_| SyncError::Rpc(format!("contract script is not hex: {script_hex:.16}")))?;

    Ok(ContractDescriptor {
        hash: str_field(code, "hash")?,
        script,
        parameters: code["parameters"].to_string(),
        return_type: code["returntype"].to_string(),
        needs_storage: value["needstorage"].as_bool().unwrap_or(false),
        name: value["name"].as_str().unwrap_or("").to_string(),
        version: value["version"].to_string(),
        author: value["author"].as_str().unwrap_or("").to_string(),
        email: value["email"].as_str().unwrap_or("").to_string(),
        description: value["description"].as_str().unwrap_or("").to_string(),
    })
}

fn asset_type_from_rpc(tag: &str) -> AssetType {
    match tag {
        "GoverningToken" => AssetType::Governing,
        "UtilityToken" => AssetType::Utility,
        "Share" => AssetType::Share,
        "Deposit" => AssetType::Deposit,
        "Token" => AssetType::Token,
        _ => AssetType::Unknown,
    }
}

/// Decode a VM stack item carrying a string (`ByteArray` hex or `String`).
pub fn parse_stack_string(item: &Value) -> Result<String, SyncError> {
    let value = item["value"]
        .as_str()
        .ok_or_else(|| SyncError::Rpc("stack item has no value".into()))?;
    match item["type"].as_str().unwrap_or("") {
        "ByteArray" => {
            let bytes =
                hex::decode(value).map_err(|_| SyncError::Rpc("stack value is not hex".into()))?;
            String::from_utf8(bytes).map_err(|_| SyncError::Rpc("stack value is not utf-8".into()))
        }
        "String" => Ok(value.to_string()),
        other => Err(SyncError::Rpc(format!("unexpected stack type {other:?}"))),
    }
}

/// Decode a VM stack item carrying an integer (`Integer` decimal or
/// little-endian `ByteArray`).
pub fn parse_stack_integer(item: &Value) -> Result<i64, SyncError> {
    let value = item["value"]
        .as_str()
        .ok_or_else(|| SyncError::Rpc("stack item has no value".into()))?;
    match item["type"].as_str().unwrap_or("") {
        "Integer" => value
            .parse()
            .map_err(|_| SyncError::Rpc(format!("stack integer {value:?} is malformed"))),
        "ByteArray" => {
            let bytes =
                hex::decode(value).map_err(|_| SyncError::Rpc("stack value is not hex".into()))?;
            if bytes.len() > 8 {
                return Err(SyncError::Rpc("stack integer wider than 64 bits".into()));
            }
            let mut buf = [0u8; 8];
            buf[..bytes.len()].copy_from_slice(&bytes);
            Ok(i64::from_le_bytes(buf))
        }
        other => Err(SyncError::Rpc(format!("unexpected stack type {other:?}"))),
    }
}
