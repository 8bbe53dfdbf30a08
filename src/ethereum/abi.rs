//! Interface descriptors and the ABI codec.
//!
//! The descriptor keeps entries in source order. Encoding and decoding go
//! through `alloy::dyn_abi`, with entries converted to `alloy::json_abi`
//! items on demand.

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, EventExt, FunctionExt, JsonAbiExt, Specifier, Word},
    json_abi::{Constructor, Event, Function},
    primitives::{Bytes, I256},
};
use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use super::params::CallArg;
use super::utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Function,
    Event,
    Constructor,
    Fallback,
    Receive,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub components: Vec<AbiParam>,
}

impl AbiParam {
    fn to_json(&self, with_indexed: bool) -> Value {
        let mut param = json!({
            "name": self.name,
            "type": self.ty,
            "components": self
                .components
                .iter()
                .map(|c| c.to_json(false))
                .collect::<Vec<_>>(),
        });
        if with_indexed {
            param["indexed"] = Value::Bool(self.indexed);
        }
        param
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiEntry {
    pub kind: EntryKind,
    /// Empty for constructors, fallback and receive entries.
    pub name: String,
    pub inputs: Vec<AbiParam>,
    pub outputs: Vec<AbiParam>,
    pub read_only: bool,
    pub payable: bool,
    pub anonymous: bool,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "type", default = "default_entry_type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<AbiParam>,
    #[serde(default)]
    outputs: Vec<AbiParam>,
    #[serde(default)]
    constant: Option<bool>,
    #[serde(default)]
    payable: Option<bool>,
    #[serde(rename = "stateMutability", default)]
    state_mutability: Option<String>,
    #[serde(default)]
    anonymous: bool,
}

fn default_entry_type() -> String {
    "function".to_string()
}

impl TryFrom<RawEntry> for AbiEntry {
    type Error = anyhow::Error;

    fn try_from(raw: RawEntry) -> Result<Self> {
        let kind = match raw.kind.as_str() {
            "function" => EntryKind::Function,
            "event" => EntryKind::Event,
            "constructor" => EntryKind::Constructor,
            "fallback" => EntryKind::Fallback,
            "receive" => EntryKind::Receive,
            other => return Err(anyhow!("Unknown ABI entry type '{}'", other)),
        };

        // Legacy compilers only emit `constant`/`payable`
        let read_only = match raw.state_mutability.as_deref() {
            Some(m) => m == "view" || m == "pure",
            None => raw.constant.unwrap_or(false),
        };
        let payable = match raw.state_mutability.as_deref() {
            Some(m) => m == "payable",
            None => raw.payable.unwrap_or(false),
        };

        Ok(Self {
            kind,
            name: raw.name,
            inputs: raw.inputs,
            outputs: raw.outputs,
            read_only,
            payable,
            anonymous: raw.anonymous,
        })
    }
}

impl AbiEntry {
    fn state_mutability(&self) -> &'static str {
        if self.read_only {
            "view"
        } else if self.payable {
            "payable"
        } else {
            "nonpayable"
        }
    }

    fn params_json(params: &[AbiParam]) -> Vec<Value> {
        params.iter().map(|p| p.to_json(false)).collect()
    }

    /// Canonical signature such as `transfer(address,uint256)`.
    pub fn signature(&self) -> String {
        let types: Vec<String> = self.inputs.iter().map(canonical_type).collect();
        format!("{}({})", self.name, types.join(","))
    }

    pub fn to_function(&self) -> Result<Function> {
        let value = json!({
            "type": "function",
            "name": self.name,
            "inputs": Self::params_json(&self.inputs),
            "outputs": Self::params_json(&self.outputs),
            "stateMutability": self.state_mutability(),
        });
        serde_json::from_value(value)
            .map_err(|e| anyhow!("Invalid function entry '{}': {}", self.name, e))
    }

    pub fn to_event(&self) -> Result<Event> {
        let value = json!({
            "type": "event",
            "name": self.name,
            "inputs": self.inputs.iter().map(|p| p.to_json(true)).collect::<Vec<_>>(),
            "anonymous": self.anonymous,
        });
        serde_json::from_value(value)
            .map_err(|e| anyhow!("Invalid event entry '{}': {}", self.name, e))
    }

    pub fn to_constructor(&self) -> Result<Constructor> {
        let value = json!({
            "type": "constructor",
            "inputs": Self::params_json(&self.inputs),
            "stateMutability": if self.payable { "payable" } else { "nonpayable" },
        });
        serde_json::from_value(value).map_err(|e| anyhow!("Invalid constructor entry: {}", e))
    }
}

fn canonical_type(param: &AbiParam) -> String {
    match param.ty.strip_prefix("tuple") {
        Some(suffix) => {
            let inner: Vec<String> = param.components.iter().map(canonical_type).collect();
            format!("({}){}", inner.join(","), suffix)
        }
        None => param.ty.clone(),
    }
}

/// Ordered interface of a contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    entries: Vec<AbiEntry>,
}

impl InterfaceDescriptor {
    pub fn from_json_str(abi: &str) -> Result<Self> {
        let raw: Vec<RawEntry> =
            serde_json::from_str(abi).map_err(|e| anyhow!("Failed to parse ABI JSON: {}", e))?;
        let entries = raw
            .into_iter()
            .map(AbiEntry::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[AbiEntry] {
        &self.entries
    }

    pub fn functions(&self) -> impl Iterator<Item = &AbiEntry> {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::Function)
    }

    pub fn events(&self) -> impl Iterator<Item = &AbiEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::Event)
    }

    pub fn constructor(&self) -> Option<&AbiEntry> {
        self.entries
            .iter()
            .find(|e| e.kind == EntryKind::Constructor)
    }

    /// Looks up a function by name. With overloads the last entry wins.
    pub fn function(&self, name: &str) -> Option<&AbiEntry> {
        self.functions().filter(|f| f.name == name).last()
    }

    pub fn event(&self, name: &str) -> Option<&AbiEntry> {
        self.events().filter(|e| e.name == name).last()
    }
}

/// Encodes positional arguments against a parameter list.
pub fn encode_args(params: &[AbiParam], args: &[CallArg], owner: &str) -> Result<Vec<DynSolValue>> {
    if params.len() != args.len() {
        let expected: Vec<String> = params
            .iter()
            .map(|p| format!("{} {}", p.ty, p.name))
            .collect();
        return Err(anyhow!(
            "Parameter count mismatch for '{}': expected {} parameters, got {}. Expected parameters: [{}]",
            owner,
            params.len(),
            args.len(),
            expected.join(", ")
        ));
    }

    params
        .iter()
        .zip(args)
        .enumerate()
        .map(|(i, (param, arg))| {
            let ty = resolve_type(param)?;
            coerce(arg, &ty).map_err(|e| {
                anyhow!(
                    "Invalid parameter #{} ('{}' of type '{}'): {}",
                    i + 1,
                    param.name,
                    param.ty,
                    e
                )
            })
        })
        .collect()
}

fn resolve_type(param: &AbiParam) -> Result<DynSolType> {
    if param.components.is_empty() {
        return DynSolType::parse(&param.ty)
            .map_err(|e| anyhow!("Unsupported Solidity type '{}': {}", param.ty, e));
    }
    let json_param: alloy::json_abi::Param = serde_json::from_value(param.to_json(false))
        .map_err(|e| anyhow!("Invalid tuple parameter '{}': {}", param.name, e))?;
    json_param
        .resolve()
        .map_err(|e| anyhow!("Unsupported Solidity type '{}': {}", param.ty, e))
}

/// Converts a call argument into a value of the expected Solidity type.
pub fn coerce(arg: &CallArg, ty: &DynSolType) -> Result<DynSolValue> {
    match (ty, arg) {
        (DynSolType::Address, CallArg::Address(address)) => Ok(DynSolValue::Address(*address)),
        (DynSolType::Address, CallArg::Str(s)) => {
            Ok(DynSolValue::Address(utils::validate_address(s)?))
        }
        (DynSolType::Uint(bits), CallArg::Numeric(n)) => Ok(DynSolValue::Uint(*n, *bits)),
        (DynSolType::Uint(bits), CallArg::Str(s)) => {
            Ok(DynSolValue::Uint(utils::validate_hex_value(s)?, *bits))
        }
        (DynSolType::Int(bits), CallArg::Signed(n)) => Ok(DynSolValue::Int(*n, *bits)),
        (DynSolType::Int(bits), CallArg::Numeric(n)) => {
            let signed = I256::try_from(*n).map_err(|_| anyhow!("Value {} overflows int{}", n, bits))?;
            Ok(DynSolValue::Int(signed, *bits))
        }
        (DynSolType::Int(bits), CallArg::Str(s)) => {
            let signed = I256::from_dec_str(s.trim())
                .map_err(|_| anyhow!("Invalid int string: {}", s))?;
            Ok(DynSolValue::Int(signed, *bits))
        }
        (DynSolType::Bool, CallArg::Bool(b)) => Ok(DynSolValue::Bool(*b)),
        (DynSolType::String, CallArg::Str(s)) => Ok(DynSolValue::String(s.clone())),
        (DynSolType::Bytes, CallArg::Bytes(bytes)) => Ok(DynSolValue::Bytes(bytes.clone())),
        (DynSolType::Bytes, CallArg::Str(s)) => Ok(DynSolValue::Bytes(decode_hex(s)?)),
        (DynSolType::FixedBytes(size), CallArg::Bytes(bytes)) => fixed_bytes(bytes, *size),
        (DynSolType::FixedBytes(size), CallArg::Str(s)) => fixed_bytes(&decode_hex(s)?, *size),
        (DynSolType::Array(inner), CallArg::Array(items)) => Ok(DynSolValue::Array(
            items
                .iter()
                .map(|item| coerce(item, inner))
                .collect::<Result<_>>()?,
        )),
        (DynSolType::FixedArray(inner, len), CallArg::Array(items)) => {
            if items.len() != *len {
                return Err(anyhow!(
                    "Expected array of length {}, got {}",
                    len,
                    items.len()
                ));
            }
            Ok(DynSolValue::FixedArray(
                items
                    .iter()
                    .map(|item| coerce(item, inner))
                    .collect::<Result<_>>()?,
            ))
        }
        (DynSolType::Tuple(types), CallArg::Array(items)) => {
            if items.len() != types.len() {
                return Err(anyhow!(
                    "Expected tuple of {} members, got {}",
                    types.len(),
                    items.len()
                ));
            }
            Ok(DynSolValue::Tuple(
                types
                    .iter()
                    .zip(items)
                    .map(|(ty, item)| coerce(item, ty))
                    .collect::<Result<_>>()?,
            ))
        }
        (_, CallArg::Options(_)) => Err(anyhow!(
            "Options record is only allowed as the last argument"
        )),
        (ty, arg) => Err(anyhow!(
            "Cannot use {} as {}",
            arg.kind(),
            ty.sol_type_name()
        )),
    }
}

fn fixed_bytes(bytes: &[u8], size: usize) -> Result<DynSolValue> {
    if bytes.len() > size {
        return Err(anyhow!(
            "Expected at most {} bytes, got {}",
            size,
            bytes.len()
        ));
    }
    let mut word = [0u8; 32];
    word[..bytes.len()].copy_from_slice(bytes);
    Ok(DynSolValue::FixedBytes(Word::from(word), size))
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s.trim().trim_start_matches("0x")).map_err(|_| anyhow!("Invalid hex string: {}", s))
}

pub fn encode_function_call(function: &Function, values: &[DynSolValue]) -> Result<Bytes> {
    let encoded = function
        .abi_encode_input(values)
        .map_err(|e| anyhow!("Failed to encode function inputs: {}", e))?;
    Ok(encoded.into())
}

pub fn encode_constructor_args(constructor: &Constructor, values: &[DynSolValue]) -> Result<Vec<u8>> {
    constructor
        .abi_encode_input(values)
        .map_err(|e| anyhow!("Failed to encode constructor arguments: {}", e))
}

/// Decodes return data. Empty data decodes to `null`.
pub fn decode_function_result(function: &Function, result_bytes: &[u8]) -> Result<Value> {
    if result_bytes.is_empty() {
        return Ok(Value::Null);
    }

    let decoded = function
        .abi_decode_output(result_bytes, false)
        .map_err(|e| anyhow!("Failed to decode output: {}", e))?;

    dyn_sol_values_to_json(&decoded)
}

/// Decodes a log into a JSON object keyed by input name (or position).
pub fn decode_event(event: &Event, topics: &[Word], data: &[u8]) -> Result<Value> {
    let decoded = event
        .decode_log_parts(topics.iter().copied(), data, false)
        .map_err(|e| anyhow!("Failed to decode event '{}': {}", event.name, e))?;

    let mut indexed = decoded.indexed.iter();
    let mut body = decoded.body.iter();
    let mut fields = serde_json::Map::new();
    for (i, input) in event.inputs.iter().enumerate() {
        let value = if input.indexed {
            indexed.next()
        } else {
            body.next()
        }
        .ok_or_else(|| anyhow!("Event '{}' is missing field #{}", event.name, i))?;
        let key = if input.name.is_empty() {
            i.to_string()
        } else {
            input.name.clone()
        };
        fields.insert(key, dyn_sol_value_to_json(value)?);
    }
    Ok(Value::Object(fields))
}

fn dyn_sol_values_to_json(values: &[DynSolValue]) -> Result<Value> {
    if values.len() == 1 {
        dyn_sol_value_to_json(&values[0])
    } else {
        Ok(Value::Array(
            values
                .iter()
                .map(dyn_sol_value_to_json)
                .collect::<Result<_>>()?,
        ))
    }
}

fn dyn_sol_value_to_json(value: &DynSolValue) -> Result<Value> {
    match value {
        DynSolValue::Address(addr) => Ok(Value::String(format!("0x{:x}", addr))),
        DynSolValue::Uint(num, _) => Ok(Value::String(num.to_string())),
        DynSolValue::Int(num, _) => Ok(Value::String(num.to_string())),
        DynSolValue::Bool(b) => Ok(Value::Bool(*b)),
        DynSolValue::String(s) => Ok(Value::String(s.clone())),
        DynSolValue::Bytes(bytes) => Ok(Value::String(format!("0x{}", hex::encode(bytes)))),
        DynSolValue::FixedBytes(bytes, size) => Ok(Value::String(format!(
            "0x{}",
            hex::encode(&bytes[..*size])
        ))),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Ok(Value::Array(
                items
                    .iter()
                    .map(dyn_sol_value_to_json)
                    .collect::<Result<_>>()?,
            ))
        }
        _ => Err(anyhow!("Unsupported DynSolValue type: {:?}", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    const LEGACY_ABI: &str = r#"[
        {"constant":true,"inputs":[{"name":"_owner","type":"address"}],"name":"balanceOf","outputs":[{"name":"balance","type":"uint256"}],"type":"function"},
        {"constant":false,"inputs":[{"name":"_to","type":"address"},{"name":"_amount","type":"uint256"}],"name":"transfer","outputs":[{"name":"success","type":"bool"}],"type":"function"},
        {"inputs":[],"type":"constructor"},
        {"anonymous":false,"inputs":[{"indexed":true,"name":"_from","type":"address"},{"indexed":true,"name":"_to","type":"address"},{"indexed":false,"name":"_amount","type":"uint256"}],"name":"Transfer","type":"event"}
    ]"#;

    #[test]
    fn test_descriptor_preserves_source_order() {
        let abi = InterfaceDescriptor::from_json_str(LEGACY_ABI).unwrap();
        let kinds: Vec<EntryKind> = abi.entries().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EntryKind::Function,
                EntryKind::Function,
                EntryKind::Constructor,
                EntryKind::Event
            ]
        );
        assert!(abi.function("balanceOf").unwrap().read_only);
        assert!(!abi.function("transfer").unwrap().read_only);
        assert!(abi.constructor().is_some());
        assert_eq!(abi.events().count(), 1);
    }

    #[test]
    fn test_state_mutability_field_wins_over_constant() {
        let abi = InterfaceDescriptor::from_json_str(
            r#"[{"name":"peek","inputs":[],"outputs":[],"stateMutability":"pure","type":"function"},
                {"name":"pay","inputs":[],"outputs":[],"stateMutability":"payable","constant":true}]"#,
        )
        .unwrap();
        assert!(abi.function("peek").unwrap().read_only);
        let pay = abi.function("pay").unwrap();
        assert!(!pay.read_only);
        assert!(pay.payable);
    }

    #[test]
    fn test_signature_and_selector() {
        let abi = InterfaceDescriptor::from_json_str(LEGACY_ABI).unwrap();
        let transfer = abi.function("transfer").unwrap();
        assert_eq!(transfer.signature(), "transfer(address,uint256)");
        let function = transfer.to_function().unwrap();
        assert_eq!(hex::encode(function.selector()), "a9059cbb");
    }

    #[test]
    fn test_encode_args_checks_count_and_types() {
        let abi = InterfaceDescriptor::from_json_str(LEGACY_ABI).unwrap();
        let transfer = abi.function("transfer").unwrap();

        let err = encode_args(&transfer.inputs, &[CallArg::from(5u64)], "transfer").unwrap_err();
        assert!(err.to_string().contains("expected 2 parameters, got 1"));

        let err = encode_args(
            &transfer.inputs,
            &[CallArg::from(true), CallArg::from(5u64)],
            "transfer",
        )
        .unwrap_err();
        assert!(err.to_string().contains("'_to' of type 'address'"));

        let values = encode_args(
            &transfer.inputs,
            &[
                CallArg::from("0x0000000000000000000000000000000000000001"),
                CallArg::from("0x10"),
            ],
            "transfer",
        )
        .unwrap();
        assert_eq!(values[1], DynSolValue::Uint(U256::from(16), 256));
    }

    #[test]
    fn test_decode_function_result() {
        let abi = InterfaceDescriptor::from_json_str(LEGACY_ABI).unwrap();
        let function = abi.function("balanceOf").unwrap().to_function().unwrap();
        let mut word = [0u8; 32];
        word[31] = 42;
        assert_eq!(
            decode_function_result(&function, &word).unwrap(),
            Value::String("42".to_string())
        );
        assert_eq!(decode_function_result(&function, &[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_decode_event_by_field_name() {
        let abi = InterfaceDescriptor::from_json_str(LEGACY_ABI).unwrap();
        let event = abi.event("Transfer").unwrap().to_event().unwrap();
        let from = Word::left_padding_from(&[1]);
        let to = Word::left_padding_from(&[2]);
        let data = Word::left_padding_from(&[7]);

        let decoded = decode_event(&event, &[event.selector(), from, to], data.as_slice()).unwrap();
        assert_eq!(decoded["_amount"], "7");
        assert_eq!(
            decoded["_to"],
            "0x0000000000000000000000000000000000000002"
        );
    }
}
