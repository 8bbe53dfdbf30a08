//! Persisted contract artifacts.
//!
//! An artifact holds one record per network id. The `abi` field is kept as
//! the raw JSON text it was read from so saving writes it back unchanged.

use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use tracing::{debug, warn};

use super::abi::InterfaceDescriptor;
use crate::error::{BindingError, BindingResult};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__[^_]+_+").expect("valid regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkArtifact {
    pub abi: Box<RawValue>,
    #[serde(default)]
    pub unlinked_binary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,
    #[serde(default)]
    pub links: BTreeMap<String, String>,
}

impl NetworkArtifact {
    pub fn interface(&self) -> anyhow::Result<InterfaceDescriptor> {
        InterfaceDescriptor::from_json_str(self.abi.get())
    }

    /// Bytecode, or `None` when the record carries no deployable code.
    pub fn bytecode(&self) -> Option<&str> {
        match self.unlinked_binary.as_str() {
            "" | "0x" => None,
            binary => Some(binary),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractArtifact {
    pub contract_name: String,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_with: Option<String>,
}

impl ContractArtifact {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> BindingResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| BindingError::artifact(path.display().to_string(), e.to_string()))?;

        Self::from_json_str(&content)
            .map_err(|e| BindingError::artifact(path.display().to_string(), e.to_string()))
    }

    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> BindingResult<()> {
        let path = path.as_ref();
        let content = self
            .to_json_string()
            .map_err(|e| BindingError::artifact(path.display().to_string(), e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    BindingError::artifact(path.display().to_string(), e.to_string())
                })?;
            }
        }

        fs::write(path, content)
            .await
            .map_err(|e| BindingError::artifact(path.display().to_string(), e.to_string()))
    }
}

/// Loads every `*.json` artifact in a directory, sorted by file name.
///
/// Files that fail to parse are skipped with a warning.
pub async fn load_dir<P: AsRef<Path>>(dir: P) -> BindingResult<Vec<(PathBuf, ContractArtifact)>> {
    let dir = dir.as_ref();
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| BindingError::artifact(dir.display().to_string(), e.to_string()))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| BindingError::artifact(dir.display().to_string(), e.to_string()))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut artifacts = Vec::with_capacity(paths.len());
    for path in paths {
        match ContractArtifact::load_from_file(&path).await {
            Ok(artifact) => {
                debug!("Loaded artifact {} from {:?}", artifact.contract_name, path);
                artifacts.push((path, artifact));
            }
            Err(e) => warn!("Skipping {}", e),
        }
    }
    Ok(artifacts)
}

/// Library names still referenced by `__Name____` placeholders, sorted and
/// deduplicated.
pub fn unresolved_libraries(binary: &str) -> Vec<String> {
    PLACEHOLDER
        .find_iter(binary)
        .map(|m| m.as_str().trim_matches('_').to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Substitutes each linked library's placeholder with its address.
///
/// The name must be followed by padding, so `__Foo` never matches inside
/// `__FooBar__`.
pub fn link_bytecode(binary: &str, links: &BTreeMap<String, String>) -> String {
    links.iter().fold(binary.to_string(), |linked, (name, address)| {
        let address = address.strip_prefix("0x").unwrap_or(address);
        match Regex::new(&format!("__{}_+", regex::escape(name))) {
            Ok(placeholder) => placeholder
                .replace_all(&linked, NoExpand(address))
                .into_owned(),
            Err(e) => {
                warn!("Cannot link library {}: {}", name, e);
                linked
            }
        }
    })
}
