use anyhow::Result;
use rmcp::{
    model::{ServerCapabilities, ServerInfo},
    tool,
    transport::stdio,
    ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    config::Config,
    ethereum::{manager::ContractManager, provider::ProviderManager},
};

#[derive(Debug, Clone)]
pub struct BindingMcpServer {
    contract_manager: Arc<tokio::sync::Mutex<ContractManager>>,
    config: Arc<Config>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct NetworkRequest {
    network: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct FunctionRequest {
    /// Contract name as recorded in its artifact
    contract: String,
    /// Instance address; the recorded deployment is used when omitted
    address: Option<String>,
    function_name: String,
    /// Positional arguments; a trailing object is read as call options
    #[serde(default)]
    parameters: Vec<Value>,
    network: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct SendTransactionRequest {
    contract: String,
    address: Option<String>,
    function_name: String,
    #[serde(default)]
    parameters: Vec<Value>,
    /// Wait for the receipt (default true)
    wait: Option<bool>,
    network: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct DeployRequest {
    contract: String,
    /// Constructor arguments; a trailing object is read as call options
    #[serde(default)]
    parameters: Vec<Value>,
    network: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct LinkLibraryRequest {
    contract: String,
    library: String,
    address: String,
    network: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct ContractEventsRequest {
    contract: String,
    address: Option<String>,
    /// Event name; every log of the address when omitted
    event: Option<String>,
    from_block: Option<u64>,
    to_block: Option<u64>,
    network: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct SetDefaultsRequest {
    contract: String,
    /// Call options such as from, gas, gasPrice, value
    options: Map<String, Value>,
}

fn to_json<T: Serialize>(value: &T, what: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| format!("Failed to serialize {}", what))
}

impl BindingMcpServer {
    pub async fn new(config: Config) -> Result<Self> {
        let provider_manager = ProviderManager::new(config.clone())?;
        let mut contract_manager = ContractManager::new(provider_manager);
        contract_manager.load_artifacts(&config.artifacts.dir).await?;

        Ok(Self {
            contract_manager: Arc::new(tokio::sync::Mutex::new(contract_manager)),
            config: Arc::new(config),
        })
    }

    pub async fn run(&self) -> Result<()> {
        info!("Starting binding MCP server");

        let service = self.clone().serve(stdio()).await?;

        info!("Binding MCP server started successfully");
        let _ = service.waiting().await;
        Ok(())
    }

    fn writes_disabled(&self) -> Option<String> {
        (!self.config.security.allow_write_operations).then(|| {
            "Error: Write operations are disabled. Use --allow-writes flag to enable transaction sending.".to_string()
        })
    }
}

#[tool(tool_box)]
impl BindingMcpServer {
    #[tool(description = "List loaded contract artifacts with their networks, functions and events")]
    async fn list_contracts(&self) -> String {
        let manager = self.contract_manager.lock().await;

        match manager.list_contracts() {
            Ok(contracts) => to_json(&contracts, "contracts"),
            Err(e) => {
                error!("Failed to list contracts: {}", e);
                format!("Error: {}", e)
            }
        }
    }

    #[tool(description = "List configured networks, or check connectivity of one network")]
    async fn list_networks(&self, #[tool(aggr)] request: NetworkRequest) -> String {
        let manager = self.contract_manager.lock().await;

        if let Some(network) = request.network.as_deref() {
            return match manager.network_id(network).await {
                Ok(network_id) => format!("Network '{}' reports id {}", network, network_id),
                Err(e) => format!("Error: {}", e),
            };
        }

        match manager.list_networks() {
            Ok(networks) => to_json(&networks, "networks"),
            Err(e) => format!("Error: {}", e),
        }
    }

    #[tool(description = "Call a contract function with eth_call and decode the result")]
    async fn call_function(&self, #[tool(aggr)] request: FunctionRequest) -> String {
        let manager = self.contract_manager.lock().await;

        match manager
            .call_function(
                &request.contract,
                request.address.as_deref(),
                &request.function_name,
                &request.parameters,
                request.network.as_deref(),
            )
            .await
        {
            Ok(result) => to_json(&result, "result"),
            Err(e) => {
                error!("Failed to call function: {}", e);
                format!("Error: {}", e)
            }
        }
    }

    #[tool(description = "Estimate gas for a contract function call")]
    async fn estimate_gas(&self, #[tool(aggr)] request: FunctionRequest) -> String {
        let manager = self.contract_manager.lock().await;

        match manager
            .estimate_gas(
                &request.contract,
                request.address.as_deref(),
                &request.function_name,
                &request.parameters,
                request.network.as_deref(),
            )
            .await
        {
            Ok(gas_estimate) => format!("Estimated gas: {} units", gas_estimate),
            Err(e) => {
                error!("Failed to estimate gas: {}", e);
                format!("Error: {}", e)
            }
        }
    }

    #[tool(description = "Send a transaction for a contract function from the network's default account")]
    async fn send_transaction(&self, #[tool(aggr)] request: SendTransactionRequest) -> String {
        if let Some(disabled) = self.writes_disabled() {
            return disabled;
        }

        let manager = self.contract_manager.lock().await;

        match manager
            .send_transaction(
                &request.contract,
                request.address.as_deref(),
                &request.function_name,
                &request.parameters,
                request.wait.unwrap_or(true),
                request.network.as_deref(),
            )
            .await
        {
            Ok(result) => to_json(&result, "result"),
            Err(e) => {
                error!("Failed to send transaction: {}", e);
                format!("Error: {}", e)
            }
        }
    }

    #[tool(description = "Deploy a new contract instance and record its address in the artifact")]
    async fn deploy_contract(&self, #[tool(aggr)] request: DeployRequest) -> String {
        if let Some(disabled) = self.writes_disabled() {
            return disabled;
        }

        let mut manager = self.contract_manager.lock().await;

        match manager
            .deploy(
                &request.contract,
                &request.parameters,
                request.network.as_deref(),
            )
            .await
        {
            Ok(result) => to_json(&result, "deployment"),
            Err(e) => {
                error!("Failed to deploy contract: {}", e);
                format!("Error: {}", e)
            }
        }
    }

    #[tool(description = "Record a deployed library address for linking a contract's bytecode")]
    async fn link_library(&self, #[tool(aggr)] request: LinkLibraryRequest) -> String {
        let mut manager = self.contract_manager.lock().await;

        match manager
            .link_library(
                &request.contract,
                &request.library,
                &request.address,
                request.network.as_deref(),
            )
            .await
        {
            Ok(links) => to_json(&links, "links"),
            Err(e) => {
                error!("Failed to link library: {}", e);
                format!("Error: {}", e)
            }
        }
    }

    #[tool(description = "Get events emitted by a contract instance, decoded against its ABI")]
    async fn get_contract_events(&self, #[tool(aggr)] request: ContractEventsRequest) -> String {
        let manager = self.contract_manager.lock().await;

        match manager
            .get_contract_events(
                &request.contract,
                request.address.as_deref(),
                request.event.as_deref(),
                request.from_block,
                request.to_block,
                request.network.as_deref(),
            )
            .await
        {
            Ok(events) => to_json(&events, "events"),
            Err(e) => {
                error!("Failed to get contract events: {}", e);
                format!("Error: {}", e)
            }
        }
    }

    #[tool(description = "Merge default call options into a contract's defaults")]
    async fn set_defaults(&self, #[tool(aggr)] request: SetDefaultsRequest) -> String {
        let mut manager = self.contract_manager.lock().await;

        match manager.set_defaults(&request.contract, &request.options) {
            Ok(defaults) => to_json(&defaults, "defaults"),
            Err(e) => format!("Error: {}", e),
        }
    }
}

#[tool(tool_box)]
impl ServerHandler for BindingMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("MCP server exposing contract bindings built from deployment artifacts. Supports listing contracts and networks, calls, transactions, gas estimation, deployment, library linking and event retrieval.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
