//! A contract bound to an address.
//!
//! The name -> operation map is built once from the interface when the
//! instance is created. Each function offers the default dispatch plus
//! explicit `call`, `send_transaction`, `estimate_gas` and `request`.

use alloy::{
    json_abi::{Event, Function},
    primitives::{Address, B256},
    rpc::types::{Filter, TransactionRequest},
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{
    abi::{self, AbiEntry, InterfaceDescriptor},
    params::{self, CallArg, CallOptions},
    provider::{Transport, TxRequest},
    tracker::{ConfirmationTracker, TrackerConfig},
    utils, Confirmation, EventInfo, LogEntry,
};
use crate::error::{BindingError, BindingResult};

#[derive(Debug, Clone)]
struct Operation {
    entry: AbiEntry,
    function: Function,
}

/// Outcome of the default dispatch for a function.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// Decoded return value of a read-only function.
    Value(Value),
    /// Mined state-changing transaction.
    Confirmed(Confirmation),
}

#[derive(Debug, Clone)]
pub struct ContractInstance {
    contract_name: String,
    address: Address,
    transport: Arc<dyn Transport>,
    defaults: CallOptions,
    tracker: TrackerConfig,
    operations: BTreeMap<String, Operation>,
    events: BTreeMap<String, Event>,
    transaction_hash: Option<B256>,
}

impl ContractInstance {
    pub fn new(
        contract_name: impl Into<String>,
        address: Address,
        interface: &InterfaceDescriptor,
        transport: Arc<dyn Transport>,
        defaults: CallOptions,
        tracker: TrackerConfig,
    ) -> BindingResult<Self> {
        let contract_name = contract_name.into();

        let mut operations = BTreeMap::new();
        for entry in interface.functions() {
            let function = entry
                .to_function()
                .map_err(|e| BindingError::abi(&contract_name, &entry.name, e.to_string()))?;
            operations.insert(
                entry.name.clone(),
                Operation {
                    entry: entry.clone(),
                    function,
                },
            );
        }

        let mut events = BTreeMap::new();
        for entry in interface.events() {
            let event = entry
                .to_event()
                .map_err(|e| BindingError::abi(&contract_name, &entry.name, e.to_string()))?;
            events.insert(entry.name.clone(), event);
        }

        Ok(Self {
            contract_name,
            address,
            transport,
            defaults,
            tracker,
            operations,
            events,
            transaction_hash: None,
        })
    }

    pub(crate) fn with_transaction_hash(mut self, tx_hash: B256) -> Self {
        self.transaction_hash = Some(tx_hash);
        self
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Hash of the deployment transaction, when this instance was deployed
    /// rather than attached.
    pub fn transaction_hash(&self) -> Option<B256> {
        self.transaction_hash
    }

    pub fn defaults(&self) -> &CallOptions {
        &self.defaults
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.operations.keys().map(String::as_str).collect()
    }

    pub fn event_names(&self) -> Vec<&str> {
        self.events.keys().map(String::as_str).collect()
    }

    pub fn function(&self, name: &str) -> BindingResult<BoundFunction<'_>> {
        let operation = self.operations.get(name).ok_or_else(|| {
            let available = self.function_names();
            let message = if available.is_empty() {
                "function not found, the interface contains no functions".to_string()
            } else {
                format!(
                    "function not found. Available functions: {}",
                    available.join(", ")
                )
            };
            BindingError::abi(&self.contract_name, name, message)
        })?;

        Ok(BoundFunction {
            instance: self,
            operation,
        })
    }

    pub fn event(&self, name: &str) -> BindingResult<EventHandle<'_>> {
        let event = self.events.get(name).ok_or_else(|| {
            BindingError::abi(
                &self.contract_name,
                name,
                format!(
                    "event not found. Available events: {}",
                    self.event_names().join(", ")
                ),
            )
        })?;

        Ok(EventHandle {
            instance: self,
            event,
        })
    }

    /// Every log emitted by this address in the block range, decoded where
    /// the first topic matches a known event.
    pub async fn all_events(
        &self,
        from_block: Option<u64>,
        to_block: Option<u64>,
    ) -> BindingResult<Vec<EventInfo>> {
        let filter = self.block_filter(from_block, to_block, "allEvents")?;
        let logs = self.fetch_logs(&filter, "allEvents").await?;

        Ok(logs
            .iter()
            .map(|log| {
                let event = log.topics.first().and_then(|topic0| {
                    self.events
                        .values()
                        .find(|e| !e.anonymous && e.selector() == *topic0)
                });
                self.event_info(log, event)
            })
            .collect())
    }

    fn block_filter(
        &self,
        from_block: Option<u64>,
        to_block: Option<u64>,
        operation: &str,
    ) -> BindingResult<Filter> {
        let (from_block, to_block) = utils::validate_block_range(from_block, to_block)
            .map_err(|e| BindingError::abi(&self.contract_name, operation, e.to_string()))?;

        let filter = Filter::new().address(self.address).from_block(from_block);
        Ok(match to_block {
            Some(to_block) => filter.to_block(to_block),
            None => filter,
        })
    }

    async fn fetch_logs(&self, filter: &Filter, operation: &str) -> BindingResult<Vec<LogEntry>> {
        self.transport
            .logs(filter)
            .await
            .map_err(|e| BindingError::transport(&self.contract_name, operation, e))
    }

    fn event_info(&self, log: &LogEntry, event: Option<&Event>) -> EventInfo {
        let decoded = event.and_then(|event| {
            abi::decode_event(event, &log.topics, &log.data)
                .map_err(|e| debug!("Could not decode {} log: {}", event.name, e))
                .ok()
        });

        EventInfo {
            address: format!("0x{:x}", log.address),
            event: event.map(|e| e.name.clone()),
            topics: log.topics.iter().map(|t| format!("0x{:x}", t)).collect(),
            data: format!("0x{}", hex::encode(&log.data)),
            block_number: log.block_number.unwrap_or_default(),
            transaction_hash: format!("0x{:x}", log.transaction_hash.unwrap_or_default()),
            log_index: log.log_index.unwrap_or_default(),
            decoded,
        }
    }
}

/// One ABI function bound to an instance.
#[derive(Debug, Clone, Copy)]
pub struct BoundFunction<'a> {
    instance: &'a ContractInstance,
    operation: &'a Operation,
}

impl<'a> BoundFunction<'a> {
    pub fn name(&self) -> &str {
        &self.operation.entry.name
    }

    pub fn is_read_only(&self) -> bool {
        self.operation.entry.read_only
    }

    fn abi_error(&self, message: impl Into<String>) -> BindingError {
        BindingError::abi(&self.instance.contract_name, self.name(), message)
    }

    fn transport_error(&self, mode: &str, source: anyhow::Error) -> BindingError {
        BindingError::transport(
            &self.instance.contract_name,
            format!("{}.{}", self.name(), mode),
            source,
        )
    }

    /// Builds the transaction request without sending it.
    pub fn request(&self, args: Vec<CallArg>) -> BindingResult<TxRequest> {
        let resolved = params::resolve(args, &self.instance.defaults);
        let values = abi::encode_args(&self.operation.entry.inputs, &resolved.args, self.name())
            .map_err(|e| self.abi_error(e.to_string()))?;
        let calldata = abi::encode_function_call(&self.operation.function, &values)
            .map_err(|e| self.abi_error(e.to_string()))?;

        let tx = TransactionRequest::default()
            .to(self.instance.address)
            .input(calldata.into());
        Ok(resolved.options.apply(tx))
    }

    /// Read path: `eth_call` and decode.
    pub async fn call(&self, args: Vec<CallArg>) -> BindingResult<Value> {
        let tx = self.request(args)?;
        let output = self
            .instance
            .transport
            .call(&tx)
            .await
            .map_err(|e| self.transport_error("call", e))?;

        abi::decode_function_result(&self.operation.function, &output)
            .map_err(|e| self.abi_error(e.to_string()))
    }

    /// Submits without waiting for confirmation.
    pub async fn send_transaction(&self, args: Vec<CallArg>) -> BindingResult<B256> {
        let tx = self.request(args)?;
        self.instance
            .transport
            .send_transaction(tx)
            .await
            .map_err(|e| self.transport_error("sendTransaction", e))
    }

    /// Write path: submit and wait for the receipt.
    pub async fn transact(&self, args: Vec<CallArg>) -> BindingResult<Confirmation> {
        let tx_hash = self.send_transaction(args).await?;
        debug!(
            "{}.{} submitted as 0x{:x}",
            self.instance.contract_name,
            self.name(),
            tx_hash
        );

        ConfirmationTracker::new(
            &self.instance.contract_name,
            self.instance.transport.clone(),
            self.instance.tracker,
        )
        .wait(tx_hash)
        .await
    }

    pub async fn estimate_gas(&self, args: Vec<CallArg>) -> BindingResult<u64> {
        let tx = self.request(args)?;
        self.instance
            .transport
            .estimate_gas(&tx)
            .await
            .map_err(|e| self.transport_error("estimateGas", e))
    }

    /// Read-only functions are called, all others are sent and confirmed.
    pub async fn invoke(&self, args: Vec<CallArg>) -> BindingResult<Invocation> {
        if self.is_read_only() {
            self.call(args).await.map(Invocation::Value)
        } else {
            self.transact(args).await.map(Invocation::Confirmed)
        }
    }
}

/// Log filter and decoder for one ABI event.
#[derive(Debug, Clone, Copy)]
pub struct EventHandle<'a> {
    instance: &'a ContractInstance,
    event: &'a Event,
}

impl<'a> EventHandle<'a> {
    pub fn name(&self) -> &str {
        &self.event.name
    }

    /// Filter on this address and, unless anonymous, the event topic.
    pub fn filter(&self, from_block: Option<u64>, to_block: Option<u64>) -> BindingResult<Filter> {
        let filter = self
            .instance
            .block_filter(from_block, to_block, &self.event.name)?;
        Ok(if self.event.anonymous {
            filter
        } else {
            filter.event_signature(self.event.selector())
        })
    }

    pub async fn get(
        &self,
        from_block: Option<u64>,
        to_block: Option<u64>,
    ) -> BindingResult<Vec<EventInfo>> {
        let filter = self.filter(from_block, to_block)?;
        let logs = self.instance.fetch_logs(&filter, &self.event.name).await?;

        Ok(logs
            .iter()
            .map(|log| self.instance.event_info(log, Some(self.event)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethereum::testing::{receipt, MockTransport, SENDER, TOKEN_ABI};
    use alloy::primitives::{Bytes, U256};

    const TOKEN: &str = "0x1000000000000000000000000000000000000001";

    fn instance(mock: &Arc<MockTransport>, defaults: CallOptions) -> ContractInstance {
        let interface = InterfaceDescriptor::from_json_str(TOKEN_ABI).unwrap();
        ContractInstance::new(
            "DynamicToken",
            utils::validate_address(TOKEN).unwrap(),
            &interface,
            mock.clone(),
            defaults,
            TrackerConfig::default(),
        )
        .unwrap()
    }

    fn sender() -> Address {
        utils::validate_address(SENDER).unwrap()
    }

    #[tokio::test]
    async fn test_read_only_function_uses_call() {
        let mock = Arc::new(MockTransport::new("1"));
        let mut word = [0u8; 32];
        word[31] = 42;
        mock.set_call_result(word.to_vec());
        let token = instance(&mock, CallOptions::default().with_from(sender()));

        let result = token
            .function("balanceOf")
            .unwrap()
            .invoke(vec![CallArg::from(sender())])
            .await
            .unwrap();

        assert_eq!(result, Invocation::Value(Value::String("42".to_string())));
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].from, Some(sender()));
        assert!(mock.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_function_waits_for_receipt() {
        let mock = Arc::new(MockTransport::new("1"));
        let tx_hash = B256::left_padding_from(&[1]);
        mock.queue_receipts(vec![None, Some(receipt(tx_hash))]);
        let token = instance(&mock, CallOptions::default().with_gas(100));

        let result = token
            .function("transfer")
            .unwrap()
            .invoke(vec![
                CallArg::from(TOKEN),
                CallArg::from(5u64),
                CallArg::from(CallOptions::default().with_gas(200)),
            ])
            .await
            .unwrap();

        match result {
            Invocation::Confirmed(confirmation) => {
                assert_eq!(confirmation.transaction_hash, tx_hash)
            }
            other => panic!("expected confirmation, got {:?}", other),
        }
        assert_eq!(mock.sent()[0].gas, Some(200));
        assert_eq!(mock.receipt_queries(), 2);
    }

    #[tokio::test]
    async fn test_modes_merge_options_independently() {
        let mock = Arc::new(MockTransport::new("1"));
        let token = instance(&mock, CallOptions::default().with_gas(100));
        let transfer = token.function("transfer").unwrap();

        let mut explicit = CallOptions::default().with_gas(300);
        explicit
            .extra
            .insert("privateFor".to_string(), Value::String("node-a".to_string()));
        transfer
            .estimate_gas(vec![
                CallArg::from(TOKEN),
                CallArg::from(1u64),
                CallArg::from(explicit),
            ])
            .await
            .unwrap();
        transfer
            .send_transaction(vec![CallArg::from(TOKEN), CallArg::from(1u64)])
            .await
            .unwrap();

        assert_eq!(mock.estimated()[0].gas, Some(300));
        let estimated = serde_json::to_value(&mock.estimated()[0]).unwrap();
        assert_eq!(estimated["privateFor"], Value::String("node-a".to_string()));
        assert_eq!(mock.sent()[0].gas, Some(100));
        assert!(serde_json::to_value(&mock.sent()[0]).unwrap()["privateFor"].is_null());
        assert_eq!(mock.receipt_queries(), 0);
    }

    #[test]
    fn test_request_encodes_calldata() {
        let mock = Arc::new(MockTransport::new("1"));
        let token = instance(&mock, CallOptions::default());

        let tx = token
            .function("transfer")
            .unwrap()
            .request(vec![CallArg::from(TOKEN), CallArg::from(U256::from(1))])
            .unwrap();

        let input = tx.input.input().cloned().unwrap_or_default();
        assert_eq!(hex::encode(&input[..4]), "a9059cbb");
        assert_eq!(input.len(), 4 + 64);
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_unknown_function_lists_available() {
        let mock = Arc::new(MockTransport::new("1"));
        let token = instance(&mock, CallOptions::default());

        let err = token.function("mint").unwrap_err();
        assert!(matches!(err, BindingError::Abi { .. }));
        assert!(err.to_string().contains("balanceOf, transfer"));
    }

    #[tokio::test]
    async fn test_send_failure_is_transport_error() {
        let mock = Arc::new(MockTransport::new("1"));
        mock.fail_sends("insufficient funds");
        let token = instance(&mock, CallOptions::default());

        let err = token
            .function("transfer")
            .unwrap()
            .transact(vec![CallArg::from(TOKEN), CallArg::from(1u64)])
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "DynamicToken.transfer.sendTransaction failed: insufficient funds"
        );
    }

    #[tokio::test]
    async fn test_event_handle_decodes_logs() {
        let mock = Arc::new(MockTransport::new("1"));
        let token = instance(&mock, CallOptions::default());
        let transfer = token.event("Transfer").unwrap();
        let selector = transfer.event.selector();
        mock.set_logs(vec![
            LogEntry {
                address: token.address(),
                topics: vec![
                    selector,
                    B256::left_padding_from(&[1]),
                    B256::left_padding_from(&[2]),
                ],
                data: Bytes::from(B256::left_padding_from(&[9]).to_vec()),
                block_number: Some(12),
                transaction_hash: Some(B256::left_padding_from(&[3])),
                log_index: Some(0),
            },
            LogEntry {
                address: token.address(),
                topics: vec![B256::left_padding_from(&[0xff])],
                data: Bytes::new(),
                block_number: Some(13),
                transaction_hash: None,
                log_index: Some(1),
            },
        ]);

        let events = transfer.get(Some(10), None).await.unwrap();
        assert_eq!(events[0].event.as_deref(), Some("Transfer"));
        assert_eq!(events[0].decoded.as_ref().unwrap()["_amount"], "9");

        let all = token.all_events(None, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].event.as_deref(), Some("Transfer"));
        assert_eq!(all[1].event, None);
        assert!(all[1].decoded.is_none());
    }
}
