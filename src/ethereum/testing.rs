//! In-memory transport and fixtures for unit tests.

use alloy::{
    primitives::{Address, Bytes, B256},
    rpc::types::Filter,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{
    provider::{Transport, TxRequest},
    LogEntry, Receipt,
};

pub const TOKEN_ABI: &str = r#"[{"constant":true,"inputs":[{"name":"_owner","type":"address"}],"name":"balanceOf","outputs":[{"name":"balance","type":"uint256"}],"type":"function"},{"constant":false,"inputs":[{"name":"_to","type":"address"},{"name":"_amount","type":"uint256"}],"name":"transfer","outputs":[{"name":"success","type":"bool"}],"type":"function"},{"inputs":[{"name":"_supply","type":"uint256"}],"type":"constructor"},{"anonymous":false,"inputs":[{"indexed":true,"name":"_from","type":"address"},{"indexed":true,"name":"_to","type":"address"},{"indexed":false,"name":"_amount","type":"uint256"}],"name":"Transfer","type":"event"}]"#;

pub const SENDER: &str = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";

pub fn receipt(tx_hash: B256) -> Receipt {
    Receipt {
        transaction_hash: tx_hash,
        block_number: Some(7),
        gas_used: 21_000,
        contract_address: None,
        status: true,
    }
}

/// Artifact JSON with one entry per `(network id, address, bytecode)`.
pub fn artifact_json(networks: &[(&str, Option<&str>, &str)]) -> String {
    let entries: Vec<String> = networks
        .iter()
        .map(|(id, address, binary)| {
            let address = address
                .map(|a| format!(",\n      \"address\": \"{}\"", a))
                .unwrap_or_default();
            format!(
                "    \"{}\": {{\n      \"abi\": {},\n      \"unlinked_binary\": \"{}\",\n      \"updated_at\": 1469506604050,\n      \"links\": {{}}{}\n    }}",
                id, TOKEN_ABI, binary, address
            )
        })
        .collect();
    format!(
        "{{\n  \"contract_name\": \"DynamicToken\",\n  \"networks\": {{\n{}\n  }},\n  \"generated_with\": \"3.1.2\"\n}}",
        entries.join(",\n")
    )
}

#[derive(Debug, Default)]
struct MockState {
    network_queries: usize,
    receipt_queries: usize,
    receipts: VecDeque<Option<Receipt>>,
    receipt_error: Option<String>,
    send_error: Option<String>,
    call_result: Bytes,
    gas_estimate: u64,
    deployed_address: Option<Address>,
    logs: Vec<LogEntry>,
    calls: Vec<TxRequest>,
    sent: Vec<TxRequest>,
    estimated: Vec<TxRequest>,
    deployed: Vec<TxRequest>,
}

#[derive(Debug)]
pub struct MockTransport {
    network_id: String,
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new(network_id: &str) -> Self {
        Self {
            network_id: network_id.to_string(),
            state: Mutex::new(MockState {
                gas_estimate: 90_000,
                ..Default::default()
            }),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn queue_receipts(&self, receipts: Vec<Option<Receipt>>) {
        self.with_state(|s| s.receipts.extend(receipts));
    }

    pub fn fail_receipts(&self, message: &str) {
        self.with_state(|s| s.receipt_error = Some(message.to_string()));
    }

    pub fn fail_sends(&self, message: &str) {
        self.with_state(|s| s.send_error = Some(message.to_string()));
    }

    pub fn set_call_result(&self, result: Vec<u8>) {
        self.with_state(|s| s.call_result = result.into());
    }

    pub fn set_deployed_address(&self, address: Option<Address>) {
        self.with_state(|s| s.deployed_address = address);
    }

    pub fn set_logs(&self, logs: Vec<LogEntry>) {
        self.with_state(|s| s.logs = logs);
    }

    pub fn network_queries(&self) -> usize {
        self.with_state(|s| s.network_queries)
    }

    pub fn receipt_queries(&self) -> usize {
        self.with_state(|s| s.receipt_queries)
    }

    pub fn calls(&self) -> Vec<TxRequest> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn sent(&self) -> Vec<TxRequest> {
        self.with_state(|s| s.sent.clone())
    }

    pub fn estimated(&self) -> Vec<TxRequest> {
        self.with_state(|s| s.estimated.clone())
    }

    pub fn deployed(&self) -> Vec<TxRequest> {
        self.with_state(|s| s.deployed.clone())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn network_id(&self) -> Result<String> {
        self.with_state(|s| s.network_queries += 1);
        Ok(self.network_id.clone())
    }

    async fn call(&self, tx: &TxRequest) -> Result<Bytes> {
        self.with_state(|s| {
            s.calls.push(tx.clone());
            Ok(s.call_result.clone())
        })
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<B256> {
        self.with_state(|s| {
            if let Some(message) = &s.send_error {
                return Err(anyhow!("{}", message));
            }
            s.sent.push(tx);
            Ok(B256::left_padding_from(&[s.sent.len() as u8]))
        })
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64> {
        self.with_state(|s| {
            s.estimated.push(tx.clone());
            Ok(s.gas_estimate)
        })
    }

    async fn transaction_receipt(&self, _tx_hash: B256) -> Result<Option<Receipt>> {
        self.with_state(|s| {
            s.receipt_queries += 1;
            if let Some(message) = &s.receipt_error {
                return Err(anyhow!("{}", message));
            }
            Ok(s.receipts.pop_front().flatten())
        })
    }

    async fn deploy(&self, tx: TxRequest) -> Result<Receipt> {
        self.with_state(|s| {
            if let Some(message) = &s.send_error {
                return Err(anyhow!("{}", message));
            }
            s.deployed.push(tx);
            let tx_hash = B256::left_padding_from(&[0xde, s.deployed.len() as u8]);
            Ok(Receipt {
                contract_address: s.deployed_address,
                ..receipt(tx_hash)
            })
        })
    }

    async fn logs(&self, _filter: &Filter) -> Result<Vec<LogEntry>> {
        Ok(self.with_state(|s| s.logs.clone()))
    }
}
