//! Registry of loaded artifacts, bound per request to a configured network.
//!
//! The artifact is the source of truth: every request builds a fresh
//! factory from it, and operations that change it (deploy, link) write it
//! back to disk.

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{
    artifact::{self, ContractArtifact},
    contract::Contract,
    instance::ContractInstance,
    params::{self, CallOptions},
    provider::ProviderManager,
    utils, CallResult, EventInfo,
};

#[derive(Debug, Clone)]
struct ManagedArtifact {
    path: PathBuf,
    artifact: ContractArtifact,
    defaults: CallOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractSummary {
    pub name: String,
    pub path: String,
    pub networks: Vec<String>,
    pub functions: Vec<String>,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkSummary {
    pub name: String,
    pub network_id: Option<String>,
    pub rpc_url: String,
    pub from: Option<String>,
    pub default: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployResult {
    pub contract: String,
    pub network_id: Option<String>,
    pub address: String,
    pub transaction_hash: Option<String>,
}

#[derive(Debug)]
pub struct ContractManager {
    provider_manager: ProviderManager,
    contracts: BTreeMap<String, ManagedArtifact>,
}

impl ContractManager {
    pub fn new(provider_manager: ProviderManager) -> Self {
        Self {
            provider_manager,
            contracts: BTreeMap::new(),
        }
    }

    /// Loads every artifact in `dir`. A missing directory is not an error.
    pub async fn load_artifacts<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        if !dir.exists() {
            info!("Artifact directory {:?} does not exist yet", dir);
            return Ok(0);
        }

        let loaded = artifact::load_dir(dir).await?;
        let count = loaded.len();
        for (path, artifact) in loaded {
            self.register(path, artifact);
        }
        info!("Loaded {} contract artifacts from {:?}", count, dir);
        Ok(count)
    }

    pub fn register(&mut self, path: PathBuf, artifact: ContractArtifact) {
        debug!("Registering {} from {:?}", artifact.contract_name, path);
        self.contracts.insert(
            artifact.contract_name.clone(),
            ManagedArtifact {
                path,
                artifact,
                defaults: CallOptions::default(),
            },
        );
    }

    fn not_found(&self, contract_name: &str) -> anyhow::Error {
        let available: Vec<&str> = self.contracts.keys().map(String::as_str).collect();
        anyhow!(
            "Contract '{}' not found. Available contracts: {}",
            contract_name,
            if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            }
        )
    }

    fn managed(&self, contract_name: &str) -> Result<&ManagedArtifact> {
        self.contracts
            .get(contract_name)
            .ok_or_else(|| self.not_found(contract_name))
    }

    fn managed_mut(&mut self, contract_name: &str) -> Result<&mut ManagedArtifact> {
        let err = self.not_found(contract_name);
        self.contracts.get_mut(contract_name).ok_or(err)
    }

    pub fn list_contracts(&self) -> Result<Vec<ContractSummary>> {
        self.contracts
            .values()
            .map(|managed| {
                let contract = Contract::new(&managed.artifact)?;
                let interface = contract.snapshot().interface.clone();
                Ok(ContractSummary {
                    name: managed.artifact.contract_name.clone(),
                    path: managed.path.display().to_string(),
                    networks: contract.networks(),
                    functions: interface.functions().map(|f| f.signature()).collect(),
                    events: interface.events().map(|e| e.signature()).collect(),
                })
            })
            .collect()
    }

    pub fn list_networks(&self) -> Result<Vec<NetworkSummary>> {
        let default_network = self.provider_manager.default_network();
        let mut networks = Vec::new();
        for name in self.provider_manager.get_available_networks() {
            let config = self.provider_manager.get_network_config(Some(&name))?;
            networks.push(NetworkSummary {
                default: name == default_network,
                name,
                network_id: config.network_id.clone(),
                rpc_url: config.rpc_url.clone(),
                from: config.from.clone(),
            });
        }
        networks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(networks)
    }

    /// Live network id reported by a configured network's node.
    pub async fn network_id(&self, network: &str) -> Result<String> {
        utils::validate_network(network, &self.provider_manager.get_available_networks())?;
        self.provider_manager
            .validate_network_connection(Some(network))
            .await
    }

    /// Factory for `contract_name` bound to a configured network and pinned
    /// to its artifact entry.
    pub async fn bind(&self, contract_name: &str, network: Option<&str>) -> Result<Contract> {
        if let Some(net) = network {
            utils::validate_network(net, &self.provider_manager.get_available_networks())?;
        }

        let managed = self.managed(contract_name)?;
        let context = self.provider_manager.context(network)?;
        let network_config = self.provider_manager.get_network_config(network)?;

        let mut contract = Contract::new(&managed.artifact)?.with_context(context);
        contract.defaults(managed.defaults.clone());
        match &network_config.network_id {
            Some(network_id) => contract.set_network(network_id),
            None => {
                contract.resolve_network().await?;
            }
        }
        Ok(contract)
    }

    async fn instance(
        &self,
        contract_name: &str,
        address: Option<&str>,
        network: Option<&str>,
    ) -> Result<ContractInstance> {
        let contract = self.bind(contract_name, network).await?;
        Ok(match address {
            Some(address) => contract.at(address)?,
            None => contract.deployed()?,
        })
    }

    async fn persist(&mut self, contract_name: &str, artifact: ContractArtifact) -> Result<()> {
        let managed = self.managed_mut(contract_name)?;
        artifact.save_to_file(&managed.path).await?;
        debug!("Saved {} to {:?}", contract_name, managed.path);
        managed.artifact = artifact;
        Ok(())
    }

    /// Runs the function through `eth_call` regardless of its mutability.
    pub async fn call_function(
        &self,
        contract_name: &str,
        address: Option<&str>,
        function_name: &str,
        parameters: &[Value],
        network: Option<&str>,
    ) -> Result<CallResult> {
        utils::validate_function_name(function_name)?;
        let instance = self.instance(contract_name, address, network).await?;
        let function = instance.function(function_name)?;
        let args = params::args_from_json(parameters)?;

        match function.call(args).await {
            Ok(result) => Ok(CallResult {
                success: true,
                result: Some(result),
                error: None,
                gas_used: None,
                transaction_hash: None,
            }),
            Err(e) => Ok(CallResult::failure(e.to_string())),
        }
    }

    /// Submits the function as a transaction, optionally waiting for the
    /// receipt.
    pub async fn send_transaction(
        &self,
        contract_name: &str,
        address: Option<&str>,
        function_name: &str,
        parameters: &[Value],
        wait: bool,
        network: Option<&str>,
    ) -> Result<CallResult> {
        utils::validate_function_name(function_name)?;
        let instance = self.instance(contract_name, address, network).await?;
        let function = instance.function(function_name)?;
        let args = params::args_from_json(parameters)?;

        if !wait {
            let tx_hash = function.send_transaction(args).await?;
            return Ok(CallResult {
                success: true,
                result: None,
                error: None,
                gas_used: None,
                transaction_hash: Some(format!("0x{:x}", tx_hash)),
            });
        }

        let confirmation = function.transact(args).await?;
        Ok(CallResult {
            success: confirmation.receipt.status,
            result: Some(serde_json::to_value(&confirmation.receipt)?),
            error: (!confirmation.receipt.status).then(|| "Transaction reverted".to_string()),
            gas_used: Some(confirmation.receipt.gas_used),
            transaction_hash: Some(format!("0x{:x}", confirmation.transaction_hash)),
        })
    }

    pub async fn estimate_gas(
        &self,
        contract_name: &str,
        address: Option<&str>,
        function_name: &str,
        parameters: &[Value],
        network: Option<&str>,
    ) -> Result<u64> {
        utils::validate_function_name(function_name)?;
        let instance = self.instance(contract_name, address, network).await?;
        let args = params::args_from_json(parameters)?;
        Ok(instance.function(function_name)?.estimate_gas(args).await?)
    }

    /// Deploys a new instance and records its address in the artifact file.
    pub async fn deploy(
        &mut self,
        contract_name: &str,
        parameters: &[Value],
        network: Option<&str>,
    ) -> Result<DeployResult> {
        let mut contract = self.bind(contract_name, network).await?;
        let args = params::args_from_json(parameters)?;
        let instance = contract.deploy(args).await?;

        self.persist(contract_name, contract.artifact()).await?;

        Ok(DeployResult {
            contract: contract_name.to_string(),
            network_id: contract.network_id().map(str::to_string),
            address: format!("0x{:x}", instance.address()),
            transaction_hash: instance.transaction_hash().map(|h| format!("0x{:x}", h)),
        })
    }

    /// Links a library address into the artifact entry of the network.
    pub async fn link_library(
        &mut self,
        contract_name: &str,
        library: &str,
        address: &str,
        network: Option<&str>,
    ) -> Result<BTreeMap<String, String>> {
        let mut contract = self.bind(contract_name, network).await?;
        contract.link(library, address)?;
        let links = contract.snapshot().links.clone();

        self.persist(contract_name, contract.artifact()).await?;
        Ok(links)
    }

    pub async fn get_contract_events(
        &self,
        contract_name: &str,
        address: Option<&str>,
        event_name: Option<&str>,
        from_block: Option<u64>,
        to_block: Option<u64>,
        network: Option<&str>,
    ) -> Result<Vec<EventInfo>> {
        let instance = self.instance(contract_name, address, network).await?;
        let events = match event_name {
            Some(name) => instance.event(name)?.get(from_block, to_block).await?,
            None => instance.all_events(from_block, to_block).await?,
        };
        Ok(events)
    }

    /// Merges options into the contract's class defaults.
    pub fn set_defaults(
        &mut self,
        contract_name: &str,
        options: &Map<String, Value>,
    ) -> Result<CallOptions> {
        let options = CallOptions::from_json(options)?;
        let managed = self.managed_mut(contract_name)?;
        managed.defaults = options.merged_over(&managed.defaults);
        Ok(managed.defaults.clone())
    }
}
