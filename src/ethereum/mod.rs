pub mod abi;
pub mod artifact;
pub mod contract;
pub mod instance;
pub mod manager;
pub mod network;
pub mod params;
pub mod provider;
pub mod tracker;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use alloy::primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

/// Confirmation record for a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// Set when the transaction created a contract.
    pub contract_address: Option<Address>,
    pub status: bool,
}

/// A submitted transaction together with the receipt that confirmed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub transaction_hash: B256,
    pub receipt: Receipt,
}

/// Raw log as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInfo {
    pub address: String,
    pub event: Option<String>,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: u64,
    pub transaction_hash: String,
    pub log_index: u64,
    pub decoded: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResult {
    pub success: bool,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub gas_used: Option<u64>,
    pub transaction_hash: Option<String>,
}

impl CallResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            gas_used: None,
            transaction_hash: None,
        }
    }
}
