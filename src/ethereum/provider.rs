use crate::config::{Config, NetworkConfig};
use alloy::{
    network::{AnyNetwork, Network, ReceiptResponse},
    primitives::{Bytes, B256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::{Filter, TransactionRequest},
    serde::WithOtherFields,
    transports::http::{Client, Http},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{params::CallOptions, tracker::TrackerConfig, utils, LogEntry, Receipt};

/// Transaction request plus transport-specific fields sent alongside it.
pub type TxRequest = WithOtherFields<TransactionRequest>;

/// Request/response channel to a node.
///
/// Implementations decide how concurrent outstanding requests are handled.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Live network identifier (`net_version`).
    async fn network_id(&self) -> Result<String>;

    async fn call(&self, tx: &TxRequest) -> Result<Bytes>;

    /// Submits through the node's account management (`eth_sendTransaction`).
    async fn send_transaction(&self, tx: TxRequest) -> Result<B256>;

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64>;

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>>;

    /// Submits a contract creation and resolves with its mined receipt.
    async fn deploy(&self, tx: TxRequest) -> Result<Receipt>;

    async fn logs(&self, filter: &Filter) -> Result<Vec<LogEntry>>;
}

/// HTTP JSON-RPC transport backed by an alloy provider.
pub struct AlloyTransport {
    provider: RootProvider<Http<Client>, AnyNetwork>,
    rpc_url: String,
}

impl fmt::Debug for AlloyTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlloyTransport")
            .field("rpc_url", &self.rpc_url)
            .finish()
    }
}

impl AlloyTransport {
    pub fn connect(rpc_url: &str) -> Result<Self> {
        let url = rpc_url
            .parse()
            .map_err(|e| anyhow!("Invalid RPC URL '{}': {}", rpc_url, e))?;
        let provider = ProviderBuilder::new().network::<AnyNetwork>().on_http(url);

        Ok(Self {
            provider,
            rpc_url: rpc_url.to_string(),
        })
    }

    fn rpc_error(&self, method: &str, error: impl fmt::Display) -> anyhow::Error {
        anyhow!(
            "{} via {}: {}",
            method,
            self.rpc_url,
            utils::interpret_rpc_error(&error.to_string())
        )
    }
}

fn convert_receipt(receipt: &<AnyNetwork as Network>::ReceiptResponse) -> Receipt {
    Receipt {
        transaction_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        gas_used: receipt.gas_used as u64,
        contract_address: receipt.contract_address,
        status: receipt.status(),
    }
}

#[async_trait]
impl Transport for AlloyTransport {
    async fn network_id(&self) -> Result<String> {
        let version = self
            .provider
            .get_net_version()
            .await
            .map_err(|e| self.rpc_error("net_version", e))?;
        Ok(version.to_string())
    }

    async fn call(&self, tx: &TxRequest) -> Result<Bytes> {
        self.provider
            .call(tx)
            .await
            .map_err(|e| self.rpc_error("eth_call", e))
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<B256> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| self.rpc_error("eth_sendTransaction", e))?;
        Ok(*pending.tx_hash())
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64> {
        self.provider
            .estimate_gas(tx)
            .await
            .map_err(|e| self.rpc_error("eth_estimateGas", e))
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| self.rpc_error("eth_getTransactionReceipt", e))?;
        Ok(receipt.as_ref().map(convert_receipt))
    }

    async fn deploy(&self, tx: TxRequest) -> Result<Receipt> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| self.rpc_error("eth_sendTransaction", e))?;
        let tx_hash = *pending.tx_hash();
        tracing::debug!("Deployment submitted: 0x{:x}", tx_hash);

        let receipt = pending.get_receipt().await.map_err(|e| {
            anyhow!(
                "Deployment 0x{:x} was sent but confirmation failed: {}",
                tx_hash,
                e
            )
        })?;
        Ok(convert_receipt(&receipt))
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<LogEntry>> {
        let logs = self
            .provider
            .get_logs(filter)
            .await
            .map_err(|e| self.rpc_error("eth_getLogs", e))?;

        Ok(logs
            .into_iter()
            .map(|log| LogEntry {
                address: log.address(),
                topics: log.topics().to_vec(),
                data: log.data().data.clone(),
                block_number: log.block_number,
                transaction_hash: log.transaction_hash,
                log_index: log.log_index,
            })
            .collect())
    }
}

/// Everything a binding needs to talk to one network.
///
/// Created once per network at startup and handed to factories explicitly.
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub network_name: String,
    pub transport: Arc<dyn Transport>,
    /// Network-level defaults such as the configured sender account.
    pub defaults: CallOptions,
    pub tracker: TrackerConfig,
}

impl ClientContext {
    pub fn new(network_name: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            network_name: network_name.into(),
            transport,
            defaults: CallOptions::default(),
            tracker: TrackerConfig::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: CallOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_tracker(mut self, tracker: TrackerConfig) -> Self {
        self.tracker = tracker;
        self
    }
}

#[derive(Debug)]
pub struct ProviderManager {
    transports: BTreeMap<String, Arc<dyn Transport>>,
    config: Config,
}

impl ProviderManager {
    pub fn new(config: Config) -> Result<Self> {
        let mut transports: BTreeMap<String, Arc<dyn Transport>> = BTreeMap::new();

        for (network_name, network_config) in &config.networks {
            let transport = Self::create_transport(network_config)
                .map_err(|e| anyhow!("Network '{}': {}", network_name, e))?;
            transports.insert(network_name.clone(), transport);
        }

        Ok(Self { transports, config })
    }

    /// Builds a manager over prepared transports, bypassing HTTP setup.
    pub fn with_transports(config: Config, transports: BTreeMap<String, Arc<dyn Transport>>) -> Self {
        Self { transports, config }
    }

    fn create_transport(network_config: &NetworkConfig) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(AlloyTransport::connect(&network_config.rpc_url)?))
    }

    fn network_name<'a>(&'a self, network: Option<&'a str>) -> &'a str {
        network.unwrap_or(&self.config.default_network)
    }

    pub fn get_transport(&self, network: Option<&str>) -> Result<Arc<dyn Transport>> {
        let network_name = self.network_name(network);
        self.transports
            .get(network_name)
            .cloned()
            .ok_or_else(|| anyhow!("Network '{}' not found", network_name))
    }

    pub fn get_network_config(&self, network: Option<&str>) -> Result<&NetworkConfig> {
        let network_name = self.network_name(network);
        self.config
            .networks
            .get(network_name)
            .ok_or_else(|| anyhow!("Network '{}' not configured", network_name))
    }

    pub fn default_network(&self) -> &str {
        &self.config.default_network
    }

    pub fn get_available_networks(&self) -> Vec<String> {
        self.config.networks.keys().cloned().collect()
    }

    /// Client context for a configured network, carrying its default sender and gas.
    pub fn context(&self, network: Option<&str>) -> Result<ClientContext> {
        let network_name = self.network_name(network).to_string();
        let transport = self.get_transport(Some(&network_name))?;
        let network_config = self.get_network_config(Some(&network_name))?;
        let defaults = network_config.call_defaults()?;

        Ok(ClientContext::new(network_name, transport)
            .with_defaults(defaults)
            .with_tracker(self.config.tracker))
    }

    /// Validates network connectivity with detailed error information
    pub async fn validate_network_connection(&self, network: Option<&str>) -> Result<String> {
        let network_name = self.network_name(network);
        let transport = self
            .get_transport(network)
            .map_err(|e| anyhow!("Network '{}' is not configured: {}", network_name, e))?;

        transport.network_id().await.map_err(|e| {
            anyhow!(
                "Cannot connect to network '{}': {}. Please check your RPC endpoint configuration and network connectivity.",
                network_name,
                e
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethereum::testing::MockTransport;

    #[test]
    fn test_manager_builds_transports_for_every_network() {
        let manager = ProviderManager::new(Config::default()).unwrap();
        let mut networks = manager.get_available_networks();
        networks.sort();
        assert_eq!(networks, vec!["development", "live", "staging", "testnet"]);
        assert!(manager.get_transport(None).is_ok());
        assert!(manager.get_transport(Some("nowhere")).is_err());
    }

    #[test]
    fn test_context_carries_network_defaults() {
        let manager = ProviderManager::new(Config::default()).unwrap();
        let context = manager.context(Some("live")).unwrap();
        assert_eq!(context.network_name, "live");
        assert_eq!(
            context.defaults.from,
            Some(utils::validate_address("0x03b3536e825a484f796b094e63011027620bc2a7").unwrap())
        );
    }

    #[tokio::test]
    async fn test_validate_network_connection_reports_network_id() {
        let mock: Arc<dyn Transport> = Arc::new(MockTransport::new("1337"));
        let mut transports = BTreeMap::new();
        transports.insert("development".to_string(), mock);
        let manager = ProviderManager::with_transports(Config::default(), transports);

        assert_eq!(
            manager.validate_network_connection(None).await.unwrap(),
            "1337"
        );
        assert!(manager
            .validate_network_connection(Some("live"))
            .await
            .is_err());
    }
}
