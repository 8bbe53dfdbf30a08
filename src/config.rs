use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::ethereum::{params::CallOptions, tracker::TrackerConfig, utils};

pub const RPC_URL_ENV: &str = "BINDING_MCP_RPC_URL";
pub const FROM_ENV: &str = "BINDING_MCP_FROM";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub networks: HashMap<String, NetworkConfig>,
    pub default_network: String,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Artifact network id to pin; detected from the node when absent.
    #[serde(
        default,
        deserialize_with = "network_id_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub network_id: Option<String>,
    pub rpc_url: String,
    /// Default sender for every transaction on this network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    pub dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("build/contracts"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub allow_write_operations: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NetworkIdValue {
    Number(u64),
    Text(String),
}

/// Network ids may be written as integers (`1`) or strings (`"default"`).
fn network_id_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<NetworkIdValue>::deserialize(deserializer)?.map(|id| match id {
            NetworkIdValue::Number(n) => n.to_string(),
            NetworkIdValue::Text(s) => s,
        }),
    )
}

impl NetworkConfig {
    fn local(network_id: &str, port: u16, from: Option<&str>) -> Self {
        Self {
            network_id: Some(network_id.to_string()),
            rpc_url: format!("http://localhost:{}", port),
            from: from.map(str::to_string),
            gas: None,
            gas_price: None,
        }
    }

    /// Call options every binding on this network starts from.
    pub fn call_defaults(&self) -> Result<CallOptions> {
        let mut defaults = CallOptions::default();
        if let Some(from) = &self.from {
            defaults = defaults.with_from(
                utils::validate_address(from)
                    .map_err(|e| anyhow!("Invalid 'from' address: {}", e))?,
            );
        }
        if let Some(gas) = self.gas {
            defaults = defaults.with_gas(gas);
        }
        if let Some(gas_price) = self.gas_price {
            defaults = defaults.with_gas_price(gas_price as u128);
        }
        Ok(defaults)
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut networks = HashMap::new();

        networks.insert(
            "development".to_string(),
            NetworkConfig::local(
                "default",
                7777,
                Some("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"),
            ),
        );
        networks.insert(
            "live".to_string(),
            NetworkConfig::local(
                "1",
                9999,
                Some("0x03b3536e825a484f796b094e63011027620bc2a7"),
            ),
        );
        networks.insert(
            "testnet".to_string(),
            NetworkConfig::local(
                "2",
                8888,
                Some("0x5edb0f31d5d8c3146ea6f5c31c7f571c0aeb8fc2"),
            ),
        );
        networks.insert(
            "staging".to_string(),
            NetworkConfig::local("1337", 8545, None),
        );

        Self {
            networks,
            default_network: "development".to_string(),
            artifacts: ArtifactsConfig::default(),
            tracker: TrackerConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    anyhow!("Failed to create config directory {:?}: {}", parent, e)
                })?;
            }
        }

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {:?}: {}", path, e))?;

        Ok(())
    }

    /// Load configuration with fallback to default
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Self {
        let mut config = match path {
            Some(path) => match Self::load_from_file(path).await {
                Ok(config) => {
                    tracing::info!("Loaded configuration from file");
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load config file, using defaults: {}", e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Overrides the default network's endpoint and sender from the
    /// environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_network = self.default_network.clone();
        let Some(network_config) = self.networks.get_mut(&default_network) else {
            return;
        };

        if let Some(rpc_url) = lookup(RPC_URL_ENV) {
            tracing::info!("Using {} for network '{}'", RPC_URL_ENV, default_network);
            network_config.rpc_url = rpc_url;
        }
        if let Some(from) = lookup(FROM_ENV) {
            tracing::debug!("Using {} as default sender", FROM_ENV);
            network_config.from = Some(from);
        }
    }

    /// Checks that the default network exists and every sender parses.
    pub fn validate(&self) -> Result<()> {
        if !self.networks.contains_key(&self.default_network) {
            return Err(anyhow!(
                "Default network '{}' is not configured",
                self.default_network
            ));
        }
        for (name, network) in &self.networks {
            network
                .call_defaults()
                .map_err(|e| anyhow!("Network '{}': {}", name, e))?;
        }
        Ok(())
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("binding-mcp").join("config.toml"))
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let sample_config = r#"# binding-mcp configuration
# Networks, artifact location, receipt polling and write access.

# Network used when a request names none
default_network = "development"

# network_id selects the artifact entry; leave it out to detect it from the node
[networks.development]
network_id = "default"
rpc_url = "http://localhost:7777"
from = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"

[networks.live]
network_id = 1
rpc_url = "http://localhost:9999"
from = "0x03b3536e825a484f796b094e63011027620bc2a7"

[networks.testnet]
network_id = 2
rpc_url = "http://localhost:8888"
from = "0x5edb0f31d5d8c3146ea6f5c31c7f571c0aeb8fc2"

[networks.staging]
network_id = 1337
rpc_url = "http://localhost:8545"
# gas = 4712388
# gas_price = 100000000000

# Directory of contract artifacts (*.json)
[artifacts]
dir = "build/contracts"

# Receipt polling; timeout_ms = 0 waits forever
[tracker]
timeout_ms = 240000
poll_interval_ms = 1000

[security]
allow_write_operations = false

# Environment variables that can be used:
# BINDING_MCP_RPC_URL - RPC endpoint for the default network
# BINDING_MCP_FROM - default sender for the default network
"#;
        sample_config.to_string()
    }
}
