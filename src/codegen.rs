//! Rust source generator for contract artifacts.
//!
//! Renders one wrapper type per artifact around [`ContractInstance`], with
//! a method per ABI function and a log query per ABI event.

use convert_case::{Case, Casing};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{BindingError, BindingResult};
use crate::ethereum::{
    abi::{AbiEntry, InterfaceDescriptor},
    artifact::ContractArtifact,
    network::DEFAULT_NETWORK_ID,
};

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "static", "struct", "super", "trait", "true", "type",
    "unsafe", "use", "where", "while",
];

/// Names the wrapper itself defines.
const RESERVED_METHODS: &[&str] = &["new", "instance", "all_events"];

#[derive(Debug)]
pub struct BindingGenerator {
    contract_name: String,
    interface: InterfaceDescriptor,
}

impl BindingGenerator {
    /// Uses the `"default"` network's interface, or the first network's.
    pub fn new(artifact: &ContractArtifact) -> BindingResult<Self> {
        let network = artifact
            .networks
            .get(DEFAULT_NETWORK_ID)
            .or_else(|| artifact.networks.values().next())
            .ok_or_else(|| {
                BindingError::artifact(&artifact.contract_name, "artifact has no networks")
            })?;

        let interface = network.interface().map_err(|e| {
            BindingError::abi(&artifact.contract_name, "abi", e.to_string())
        })?;

        Ok(Self {
            contract_name: artifact.contract_name.clone(),
            interface,
        })
    }

    pub fn type_name(&self) -> String {
        let name = self.contract_name.to_case(Case::Pascal);
        if name.is_empty() {
            "Contract".to_string()
        } else {
            name
        }
    }

    pub fn module_name(&self) -> String {
        identifier(&self.contract_name, "contract")
    }

    pub fn render(&self) -> String {
        let type_name = self.type_name();
        let mut code = format!(
            r#"//! Generated binding for contract: {name}

#[allow(unused_imports)]
use binding_mcp::alloy::primitives::{{Address, I256, U256}};
use binding_mcp::error::BindingResult;
use binding_mcp::ethereum::{{
    instance::{{ContractInstance, Invocation}},
    params::{{CallArg, CallOptions}},
    EventInfo,
}};

#[derive(Debug, Clone)]
pub struct {ty} {{
    inner: ContractInstance,
}}

impl {ty} {{
    pub const CONTRACT_NAME: &'static str = "{name}";

    pub fn new(inner: ContractInstance) -> Self {{
        Self {{ inner }}
    }}

    pub fn instance(&self) -> &ContractInstance {{
        &self.inner
    }}

    fn args(mut args: Vec<CallArg>, options: Option<CallOptions>) -> Vec<CallArg> {{
        args.extend(options.map(CallArg::from));
        args
    }}
"#,
            name = self.contract_name,
            ty = type_name,
        );

        let mut used = RESERVED_METHODS
            .iter()
            .map(|s| s.to_string())
            .collect::<BTreeSet<_>>();

        // Overloads resolve to the last entry, so render one method per name
        let mut seen = BTreeSet::new();
        let functions: Vec<&AbiEntry> = self
            .interface
            .functions()
            .filter_map(|f| self.interface.function(&f.name))
            .filter(|f| seen.insert(f.name.clone()))
            .collect();

        for function in functions {
            let method = unique(identifier(&function.name, "function"), &mut used);
            code.push_str(&render_function(function, &method));
        }

        let mut seen = BTreeSet::new();
        for event in self.interface.events().filter(|e| seen.insert(e.name.clone())) {
            let method = unique(
                format!("{}_events", identifier(&event.name, "event")),
                &mut used,
            );
            code.push_str(&format!(
                r#"
    /// Logs of `{signature}`.
    pub async fn {method}(
        &self,
        from_block: Option<u64>,
        to_block: Option<u64>,
    ) -> BindingResult<Vec<EventInfo>> {{
        self.inner.event("{name}")?.get(from_block, to_block).await
    }}
"#,
                signature = event.signature(),
                method = method,
                name = event.name,
            ));
        }

        code.push_str(
            r#"
    pub async fn all_events(
        &self,
        from_block: Option<u64>,
        to_block: Option<u64>,
    ) -> BindingResult<Vec<EventInfo>> {
        self.inner.all_events(from_block, to_block).await
    }
}
"#,
        );
        code
    }

    /// Writes `<module_name>.rs` into `dir`.
    pub async fn write_to(&self, dir: &Path) -> BindingResult<PathBuf> {
        let path = dir.join(format!("{}.rs", self.module_name()));
        let to_error = |e: std::io::Error| BindingError::artifact(path.display().to_string(), e.to_string());

        tokio::fs::create_dir_all(dir).await.map_err(to_error)?;
        tokio::fs::write(&path, self.render()).await.map_err(to_error)?;

        info!("Generated binding for {} at {:?}", self.contract_name, path);
        Ok(path)
    }
}

fn render_function(function: &AbiEntry, method: &str) -> String {
    let mut params = Vec::new();
    let mut used = BTreeSet::from(["options".to_string()]);
    for (i, input) in function.inputs.iter().enumerate() {
        let name = if input.name.is_empty() {
            format!("arg{}", i)
        } else {
            identifier(&input.name, &format!("arg{}", i))
        };
        params.push((unique(name, &mut used), input.ty.as_str()));
    }

    let signature_params: String = params
        .iter()
        .map(|(name, ty)| {
            let rust = rust_type(ty).unwrap_or_else(|| "CallArg".to_string());
            format!("\n        {}: {},", name, rust)
        })
        .collect();
    let args: Vec<String> = params
        .iter()
        .map(|(name, ty)| to_call_arg(ty, name))
        .collect();
    let mode = if function.read_only {
        "read-only, called with `eth_call`"
    } else {
        "sent as a transaction and confirmed"
    };

    format!(
        r#"
    /// `{signature}`, {mode}.
    pub async fn {method}(
        &self,{params}
        options: Option<CallOptions>,
    ) -> BindingResult<Invocation> {{
        self.inner
            .function("{name}")?
            .invoke(Self::args(vec![{args}], options))
            .await
    }}
"#,
        signature = function.signature(),
        mode = mode,
        method = method,
        params = signature_params,
        name = function.name,
        args = args.join(", "),
    )
}

/// Splits `T[]` / `T[N]` into its element type.
fn array_element(ty: &str) -> Option<&str> {
    ty.strip_suffix(']')
        .and_then(|rest| rest.rfind('[').map(|open| &rest[..open]))
}

/// Rust parameter type for a Solidity type; `None` for tuples.
fn rust_type(ty: &str) -> Option<String> {
    if let Some(element) = array_element(ty) {
        return rust_type(element).map(|inner| format!("Vec<{}>", inner));
    }
    let rust = match ty {
        "address" => "Address",
        "bool" => "bool",
        "string" => "String",
        t if t.starts_with("uint") => "U256",
        t if t.starts_with("int") => "I256",
        t if t.starts_with("bytes") => "Vec<u8>",
        _ => return None,
    };
    Some(rust.to_string())
}

/// Expression converting a typed parameter into a `CallArg`.
fn to_call_arg(ty: &str, expr: &str) -> String {
    match array_element(ty) {
        Some(element) if rust_type(ty).is_some() => format!(
            "CallArg::Array({}.into_iter().map(|v| {}).collect())",
            expr,
            to_call_arg(element, "v")
        ),
        _ => format!("CallArg::from({})", expr),
    }
}

/// Snake-case identifier; keywords get a trailing underscore.
fn identifier(raw: &str, fallback: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let mut name = cleaned.trim_matches('_').to_case(Case::Snake);
    if name.is_empty() {
        name = fallback.to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name = format!("_{}", name);
    }
    if RUST_KEYWORDS.contains(&name.as_str()) {
        name.push('_');
    }
    name
}

fn unique(name: String, used: &mut BTreeSet<String>) -> String {
    let mut candidate = name.clone();
    let mut n = 2;
    while used.contains(&candidate) {
        candidate = format!("{}_{}", name, n);
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethereum::testing::artifact_json;

    fn generator() -> BindingGenerator {
        let artifact =
            ContractArtifact::from_json_str(&artifact_json(&[("default", None, "0x60")])).unwrap();
        BindingGenerator::new(&artifact).unwrap()
    }

    #[test]
    fn test_renders_method_per_function_and_event() {
        let code = generator().render();

        assert!(code.contains("pub struct DynamicToken {"));
        assert!(code.contains("pub async fn balance_of("));
        assert!(code.contains("        owner: Address,\n        options: Option<CallOptions>,"));
        assert!(code.contains("        to: Address,\n        amount: U256,"));
        assert!(code.contains(".function(\"balanceOf\")?"));
        assert!(code.contains("vec![CallArg::from(to), CallArg::from(amount)]"));
        assert!(!code.contains("impl Into<CallArg>"));
        assert!(code.contains("pub async fn transfer_events("));
        assert!(code.contains("`transfer(address,uint256)`, sent as a transaction"));
    }

    #[test]
    fn test_identifiers_avoid_keywords_and_collisions() {
        assert_eq!(identifier("_owner", "arg0"), "owner");
        assert_eq!(identifier("type", "arg0"), "type_");
        assert_eq!(identifier("", "arg3"), "arg3");
        assert_eq!(identifier("9", "arg0"), "_9");

        let mut used = BTreeSet::from(["new".to_string()]);
        assert_eq!(unique("new".to_string(), &mut used), "new_2");
        assert_eq!(unique("new".to_string(), &mut used), "new_3");
    }

    #[test]
    fn test_solidity_types_map_to_rust_types() {
        assert_eq!(rust_type("address").as_deref(), Some("Address"));
        assert_eq!(rust_type("uint8").as_deref(), Some("U256"));
        assert_eq!(rust_type("int128").as_deref(), Some("I256"));
        assert_eq!(rust_type("bytes32").as_deref(), Some("Vec<u8>"));
        assert_eq!(rust_type("string").as_deref(), Some("String"));
        assert_eq!(rust_type("bool[2][]").as_deref(), Some("Vec<Vec<bool>>"));
        assert_eq!(rust_type("tuple"), None);
        assert_eq!(rust_type("tuple[]"), None);

        assert_eq!(
            to_call_arg("address[]", "owners"),
            "CallArg::Array(owners.into_iter().map(|v| CallArg::from(v)).collect())"
        );
        assert_eq!(to_call_arg("tuple[]", "orders"), "CallArg::from(orders)");
    }

    #[test]
    fn test_renders_array_and_tuple_parameters() {
        let abi = r#"[{"constant":false,"inputs":[{"name":"owners","type":"address[]"},{"name":"order","type":"tuple","components":[{"name":"id","type":"uint256"}]}],"name":"batch","outputs":[],"type":"function"}]"#;
        let json = format!(
            r#"{{"contract_name":"Batcher","networks":{{"default":{{"abi":{},"unlinked_binary":"0x"}}}}}}"#,
            abi
        );
        let artifact = ContractArtifact::from_json_str(&json).unwrap();
        let code = BindingGenerator::new(&artifact).unwrap().render();

        assert!(code.contains("        owners: Vec<Address>,\n        order: CallArg,"));
        assert!(code.contains(
            "vec![CallArg::Array(owners.into_iter().map(|v| CallArg::from(v)).collect()), CallArg::from(order)]"
        ));
    }

    #[test]
    fn test_artifact_without_networks_is_rejected() {
        let artifact = ContractArtifact::from_json_str(r#"{"contract_name":"Empty","networks":{}}"#)
            .unwrap();
        assert!(matches!(
            BindingGenerator::new(&artifact),
            Err(BindingError::Artifact { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_to_uses_module_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = generator().write_to(dir.path()).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "dynamic_token.rs");
        assert!(tokio::fs::read_to_string(&path).await.unwrap().contains("DynamicToken"));
    }
}
