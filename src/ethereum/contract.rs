//! Contract factory: deployment, attachment and network selection for one
//! artifact.

use alloy::{network::TransactionBuilder, rpc::types::TransactionRequest};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use super::{
    abi,
    artifact::{self, ContractArtifact},
    instance::ContractInstance,
    network::{NetworkSelector, NetworkSnapshot},
    params::{self, CallArg, CallOptions},
    provider::ClientContext,
    utils,
};
use crate::error::{BindingError, BindingResult};

#[derive(Debug, Clone)]
pub struct Contract {
    selector: NetworkSelector,
    generated_with: Option<String>,
    class_defaults: CallOptions,
    context: Option<ClientContext>,
}

impl Contract {
    pub fn new(artifact: &ContractArtifact) -> BindingResult<Self> {
        Ok(Self {
            selector: NetworkSelector::new(artifact)?,
            generated_with: artifact.generated_with.clone(),
            class_defaults: CallOptions::default(),
            context: None,
        })
    }

    pub fn with_context(mut self, context: ClientContext) -> Self {
        self.set_provider(context);
        self
    }

    pub fn set_provider(&mut self, context: ClientContext) {
        debug!(
            "{} bound to network '{}'",
            self.name(),
            context.network_name
        );
        self.context = Some(context);
    }

    /// A copy of this factory pinned to `network_id`.
    pub fn for_network(&self, network_id: &str) -> Self {
        let mut contract = self.clone();
        contract.set_network(network_id);
        contract
    }

    pub fn name(&self) -> &str {
        self.selector.contract_name()
    }

    /// Merges `options` into the class defaults and returns the result.
    pub fn defaults(&mut self, options: CallOptions) -> CallOptions {
        self.class_defaults = options.merged_over(&self.class_defaults);
        self.class_defaults.clone()
    }

    /// Class defaults layered over the provider's network defaults.
    pub fn effective_defaults(&self) -> CallOptions {
        match &self.context {
            Some(context) => self.class_defaults.merged_over(&context.defaults),
            None => self.class_defaults.clone(),
        }
    }

    pub fn networks(&self) -> Vec<String> {
        self.selector.networks()
    }

    pub fn network_id(&self) -> Option<&str> {
        self.selector.network_id()
    }

    pub fn set_network(&mut self, network_id: &str) {
        self.selector.set_network(network_id);
    }

    pub async fn resolve_network(&mut self) -> BindingResult<String> {
        let context = self.require_context("resolve_network()")?;
        let transport = context.transport.clone();
        self.selector.resolve(transport.as_ref()).await
    }

    pub fn link(&mut self, name: &str, address: &str) -> BindingResult<()> {
        self.selector.link(name, address)
    }

    pub fn link_all(&mut self, links: &BTreeMap<String, String>) -> BindingResult<()> {
        self.selector.link_all(links)
    }

    pub fn snapshot(&self) -> Arc<NetworkSnapshot> {
        self.selector.snapshot()
    }

    pub fn address(&self) -> Option<String> {
        self.snapshot().address.clone()
    }

    /// Bytecode with every linked library substituted.
    pub fn binary(&self) -> Option<String> {
        let snapshot = self.snapshot();
        snapshot
            .unlinked_binary
            .as_deref()
            .map(|binary| artifact::link_bytecode(binary, &snapshot.links))
    }

    pub fn artifact(&self) -> ContractArtifact {
        self.selector.to_artifact(self.generated_with.clone())
    }

    fn require_context(&self, operation: &str) -> BindingResult<&ClientContext> {
        self.context.as_ref().ok_or_else(|| {
            BindingError::configuration(
                self.name(),
                format!(
                    "Please call set_provider() first before calling {}.",
                    operation
                ),
            )
        })
    }

    /// Deploys a new instance. A trailing options argument overrides the
    /// defaults; constructor arguments are appended to the bytecode.
    pub async fn deploy(&mut self, args: Vec<CallArg>) -> BindingResult<ContractInstance> {
        let context = self.require_context("deploy()")?.clone();
        let snapshot = self.snapshot();

        let binary = self.binary().ok_or_else(|| {
            BindingError::configuration(
                self.name(),
                "contract binary not set. Can't deploy new instance.",
            )
        })?;

        let libraries = artifact::unresolved_libraries(&binary);
        if !libraries.is_empty() {
            return Err(BindingError::Link {
                contract: self.name().to_string(),
                libraries,
            });
        }

        let resolved = params::resolve(args, &self.effective_defaults());
        let constructor = snapshot.interface.constructor();
        let inputs = constructor.map(|c| c.inputs.as_slice()).unwrap_or_default();
        let values = abi::encode_args(inputs, &resolved.args, "constructor")
            .map_err(|e| BindingError::abi(self.name(), "constructor", e.to_string()))?;

        let mut data = match &resolved.options.data {
            Some(data) => data.to_vec(),
            None => hex::decode(binary.trim_start_matches("0x")).map_err(|e| {
                BindingError::configuration(
                    self.name(),
                    format!("contract binary is not valid hex: {}", e),
                )
            })?,
        };
        if let Some(constructor) = constructor {
            let encoded = constructor
                .to_constructor()
                .and_then(|c| abi::encode_constructor_args(&c, &values))
                .map_err(|e| BindingError::abi(self.name(), "constructor", e.to_string()))?;
            data.extend_from_slice(&encoded);
        }

        let tx = resolved
            .options
            .apply(TransactionRequest::default().with_deploy_code(data));

        let receipt = context
            .transport
            .deploy(tx)
            .await
            .map_err(|e| BindingError::transport(self.name(), "deploy", e))?;

        let address = receipt.contract_address.ok_or_else(|| {
            BindingError::transport(
                self.name(),
                "deploy",
                anyhow::anyhow!(
                    "receipt for 0x{:x} carries no contract address",
                    receipt.transaction_hash
                ),
            )
        })?;

        let address_text = format!("0x{:x}", address);
        info!(
            "{} deployed at {} (tx 0x{:x})",
            self.name(),
            address_text,
            receipt.transaction_hash
        );
        self.selector.record_deployment(&address_text, now_millis());

        Ok(ContractInstance::new(
            self.name(),
            address,
            &snapshot.interface,
            context.transport.clone(),
            self.effective_defaults(),
            context.tracker,
        )?
        .with_transaction_hash(receipt.transaction_hash))
    }

    /// Binds to an existing address without touching the network.
    pub fn at(&self, address: &str) -> BindingResult<ContractInstance> {
        let invalid = || BindingError::Validation {
            contract: self.name().to_string(),
            address: address.to_string(),
        };
        if address.len() != utils::ADDRESS_TEXT_LEN {
            return Err(invalid());
        }
        let parsed = utils::validate_address(address).map_err(|_| invalid())?;

        let context = self.require_context("at()")?;
        ContractInstance::new(
            self.name(),
            parsed,
            &self.snapshot().interface,
            context.transport.clone(),
            self.effective_defaults(),
            context.tracker,
        )
    }

    /// Instance at the address recorded for the active network.
    pub fn deployed(&self) -> BindingResult<ContractInstance> {
        let address = self.address().ok_or_else(|| {
            BindingError::configuration(
                self.name(),
                format!(
                    "Cannot find deployed address: {} not deployed or address not set.",
                    self.name()
                ),
            )
        })?;
        self.at(&address)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
