//! Active-network selection for a contract factory.
//!
//! All per-network data the factory reads lives in one immutable
//! [`NetworkSnapshot`]; switching networks swaps the whole snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    abi::InterfaceDescriptor,
    artifact::{ContractArtifact, NetworkArtifact},
    provider::Transport,
    utils,
};
use crate::error::{BindingError, BindingResult};

/// Aliases tried in order when the node reports the main network.
pub const MAINNET_ALIASES: [&str; 3] = ["1", "live", "default"];
pub const DEFAULT_NETWORK_ID: &str = "default";

#[derive(Debug, Clone, Default)]
pub struct NetworkSnapshot {
    /// Pinned id; `None` until resolved or set.
    pub network_id: Option<String>,
    pub interface: Arc<InterfaceDescriptor>,
    pub unlinked_binary: Option<String>,
    pub address: Option<String>,
    pub updated_at: Option<u64>,
    pub links: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct NetworkEntry {
    artifact: NetworkArtifact,
    interface: Arc<InterfaceDescriptor>,
}

#[derive(Debug, Clone)]
pub struct NetworkSelector {
    contract_name: String,
    networks: BTreeMap<String, NetworkEntry>,
    active: Arc<NetworkSnapshot>,
}

impl NetworkSelector {
    /// Parses every network's interface and activates `"default"` without
    /// pinning it, so the id is still detected on first use.
    pub fn new(artifact: &ContractArtifact) -> BindingResult<Self> {
        let mut networks = BTreeMap::new();
        for (network_id, network) in &artifact.networks {
            let interface = network.interface().map_err(|e| {
                BindingError::abi(
                    &artifact.contract_name,
                    "abi",
                    format!("network '{}': {}", network_id, e),
                )
            })?;
            networks.insert(
                network_id.clone(),
                NetworkEntry {
                    artifact: network.clone(),
                    interface: Arc::new(interface),
                },
            );
        }

        let mut selector = Self {
            contract_name: artifact.contract_name.clone(),
            networks,
            active: Arc::default(),
        };
        selector.set_network(DEFAULT_NETWORK_ID);
        selector.unpin();
        Ok(selector)
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    pub fn snapshot(&self) -> Arc<NetworkSnapshot> {
        self.active.clone()
    }

    pub fn network_id(&self) -> Option<&str> {
        self.active.network_id.as_deref()
    }

    pub fn networks(&self) -> Vec<String> {
        self.networks.keys().cloned().collect()
    }

    /// Activates `network_id`. Unknown ids yield an empty snapshot.
    pub fn set_network(&mut self, network_id: &str) {
        let snapshot = match self.networks.get(network_id) {
            Some(entry) => NetworkSnapshot {
                network_id: Some(network_id.to_string()),
                interface: entry.interface.clone(),
                unlinked_binary: entry.artifact.bytecode().map(str::to_string),
                address: entry.artifact.address.clone(),
                updated_at: entry.artifact.updated_at,
                links: entry.artifact.links.clone(),
            },
            None => NetworkSnapshot {
                network_id: Some(network_id.to_string()),
                ..Default::default()
            },
        };
        self.active = Arc::new(snapshot);
    }

    fn unpin(&mut self) {
        let mut snapshot = (*self.active).clone();
        snapshot.network_id = None;
        self.active = Arc::new(snapshot);
    }

    /// Pins the active network to the one the transport is connected to.
    ///
    /// Returns immediately once an id is pinned.
    pub async fn resolve(&mut self, transport: &dyn Transport) -> BindingResult<String> {
        if let Some(network_id) = self.network_id() {
            return Ok(network_id.to_string());
        }

        let live_id = transport
            .network_id()
            .await
            .map_err(|e| BindingError::transport(&self.contract_name, "resolve_network", e))?;

        let network_id = if live_id == "1" {
            MAINNET_ALIASES
                .iter()
                .find(|id| self.networks.contains_key(**id))
                .map(|id| id.to_string())
                .unwrap_or(live_id)
        } else {
            live_id
        };

        if !self.networks.contains_key(&network_id) {
            return Err(BindingError::UnknownNetwork {
                contract: self.contract_name.clone(),
                network_id,
            });
        }

        info!("{} resolved to network '{}'", self.contract_name, network_id);
        self.set_network(&network_id);
        Ok(network_id)
    }

    /// Records a library address used when linking bytecode.
    pub fn link(&mut self, name: &str, address: &str) -> BindingResult<()> {
        utils::validate_address(address).map_err(|e| {
            BindingError::configuration(
                &self.contract_name,
                format!("invalid address for library {}: {}", name, e),
            )
        })?;

        let mut snapshot = (*self.active).clone();
        snapshot.links.insert(name.to_string(), address.to_string());
        if let Some(entry) = self.backing_entry(&snapshot) {
            entry.artifact.links = snapshot.links.clone();
        }
        debug!("{} linked {} at {}", self.contract_name, name, address);
        self.active = Arc::new(snapshot);
        Ok(())
    }

    pub fn link_all(&mut self, links: &BTreeMap<String, String>) -> BindingResult<()> {
        for (name, address) in links {
            self.link(name, address)?;
        }
        Ok(())
    }

    /// Stores a new deployment address for the active network.
    pub fn record_deployment(&mut self, address: &str, updated_at: u64) {
        let mut snapshot = (*self.active).clone();
        snapshot.address = Some(address.to_string());
        snapshot.updated_at = Some(updated_at);
        if let Some(entry) = self.backing_entry(&snapshot) {
            entry.artifact.address = snapshot.address.clone();
            entry.artifact.updated_at = snapshot.updated_at;
        }
        self.active = Arc::new(snapshot);
    }

    /// Artifact entry the snapshot was built from. Before an id is pinned
    /// that is the bootstrap `"default"` entry.
    fn backing_entry(&mut self, snapshot: &NetworkSnapshot) -> Option<&mut NetworkEntry> {
        let network_id = snapshot
            .network_id
            .as_deref()
            .unwrap_or(DEFAULT_NETWORK_ID);
        self.networks.get_mut(network_id)
    }

    /// Current state as a persistable artifact.
    pub fn to_artifact(&self, generated_with: Option<String>) -> ContractArtifact {
        ContractArtifact {
            contract_name: self.contract_name.clone(),
            networks: self
                .networks
                .iter()
                .map(|(id, entry)| (id.clone(), entry.artifact.clone()))
                .collect(),
            generated_with,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethereum::testing::{artifact_json, MockTransport};

    const DEFAULT_ADDRESS: &str = "0xd7d31f306fbefac7abb38a7486a5c37c6e0655b8";
    const LIVE_ADDRESS: &str = "0x2222222222222222222222222222222222222222";

    fn selector(networks: &[(&str, Option<&str>, &str)]) -> NetworkSelector {
        let artifact = ContractArtifact::from_json_str(&artifact_json(networks)).unwrap();
        NetworkSelector::new(&artifact).unwrap()
    }

    #[test]
    fn test_bootstrap_exposes_default_data_unpinned() {
        let selector = selector(&[("default", Some(DEFAULT_ADDRESS), "0x60")]);
        let snapshot = selector.snapshot();
        assert_eq!(snapshot.network_id, None);
        assert_eq!(snapshot.address.as_deref(), Some(DEFAULT_ADDRESS));
        assert_eq!(snapshot.interface.functions().count(), 2);
    }

    #[tokio::test]
    async fn test_mainnet_resolves_to_live_alias() {
        let mut selector = selector(&[
            ("default", Some(DEFAULT_ADDRESS), "0x60"),
            ("live", Some(LIVE_ADDRESS), "0x60"),
        ]);
        let transport = MockTransport::new("1");

        assert_eq!(selector.resolve(&transport).await.unwrap(), "live");
        assert_eq!(selector.snapshot().address.as_deref(), Some(LIVE_ADDRESS));
    }

    #[tokio::test]
    async fn test_mainnet_falls_back_to_default() {
        let mut selector = selector(&[("default", Some(DEFAULT_ADDRESS), "0x60")]);
        let transport = MockTransport::new("1");

        assert_eq!(selector.resolve(&transport).await.unwrap(), "default");
    }

    #[tokio::test]
    async fn test_resolve_queries_transport_once() {
        let mut selector = selector(&[("default", None, "0x60"), ("1337", None, "0x60")]);
        let transport = MockTransport::new("1337");

        selector.resolve(&transport).await.unwrap();
        selector.resolve(&transport).await.unwrap();
        assert_eq!(transport.network_queries(), 1);
        assert_eq!(selector.network_id(), Some("1337"));
    }

    #[tokio::test]
    async fn test_unknown_network_leaves_snapshot_alone() {
        let mut selector = selector(&[("default", Some(DEFAULT_ADDRESS), "0x60")]);
        let transport = MockTransport::new("42");

        let err = selector.resolve(&transport).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "DynamicToken error: Can't find artifacts for network id '42'"
        );
        assert_eq!(selector.network_id(), None);
        assert_eq!(selector.snapshot().address.as_deref(), Some(DEFAULT_ADDRESS));
    }

    #[test]
    fn test_set_network_is_unconditional() {
        let mut selector = selector(&[("default", Some(DEFAULT_ADDRESS), "0x60")]);
        selector.set_network("99");
        let snapshot = selector.snapshot();
        assert_eq!(snapshot.network_id.as_deref(), Some("99"));
        assert_eq!(snapshot.address, None);
        assert_eq!(snapshot.interface.entries().len(), 0);
    }

    #[test]
    fn test_link_survives_switching_back() {
        let mut selector = selector(&[("default", None, "0x60"), ("live", None, "0x60")]);
        selector.set_network("default");
        selector
            .link("Foo", "0x1111111111111111111111111111111111111111")
            .unwrap();
        selector.set_network("live");
        assert!(selector.snapshot().links.is_empty());
        selector.set_network("default");
        assert_eq!(selector.snapshot().links.len(), 1);
        assert!(selector.link("Bar", "0x12").is_err());
    }

    #[tokio::test]
    async fn test_unpinned_link_and_deployment_survive_resolve() {
        let mut selector = selector(&[("default", None, "0x60")]);
        selector
            .link("Foo", "0x1111111111111111111111111111111111111111")
            .unwrap();
        selector.record_deployment(DEFAULT_ADDRESS, 1_700_000_000_000);

        let transport = MockTransport::new("1");
        assert_eq!(selector.resolve(&transport).await.unwrap(), "default");

        let snapshot = selector.snapshot();
        assert_eq!(snapshot.links.len(), 1);
        assert_eq!(snapshot.address.as_deref(), Some(DEFAULT_ADDRESS));
        let saved = selector.to_artifact(None);
        assert_eq!(saved.networks["default"].links.len(), 1);
    }
}
