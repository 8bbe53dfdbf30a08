//! Call arguments and call options.
//!
//! Arguments are a tagged union, so whether the trailing argument is an
//! options record is decided by its variant. The JSON entry points (MCP
//! tools, CLI) still receive untyped values; there a trailing object is first
//! read as a numeric quantity and only otherwise as options.

use alloy::{
    primitives::{Address, Bytes, I256, U256},
    rpc::types::{TransactionInput, TransactionRequest},
    serde::{OtherFields, WithOtherFields},
};
use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use super::{provider::TxRequest, utils};

/// A positional argument to a contract function.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArg {
    Numeric(U256),
    Signed(I256),
    Address(Address),
    Str(String),
    Bool(bool),
    Bytes(Vec<u8>),
    /// Arrays and tuples.
    Array(Vec<CallArg>),
    Options(CallOptions),
}

impl CallArg {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Numeric(_) => "number",
            Self::Signed(_) => "signed number",
            Self::Address(_) => "address",
            Self::Str(_) => "string",
            Self::Bool(_) => "bool",
            Self::Bytes(_) => "bytes",
            Self::Array(_) => "array",
            Self::Options(_) => "options record",
        }
    }

    /// Converts an untyped JSON value. Objects become options unless they
    /// read as a numeric quantity.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Ok(Self::Numeric(U256::from(u)))
                } else if let Some(i) = n.as_i64() {
                    Ok(Self::Signed(I256::try_from(i).map_err(|_| anyhow!("Invalid integer {}", i))?))
                } else {
                    Err(anyhow!("Fractional numbers are not valid arguments: {}", n))
                }
            }
            Value::String(s) => Ok(Self::Str(s.clone())),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Array(items) => Ok(Self::Array(
                items.iter().map(Self::from_json).collect::<Result<_>>()?,
            )),
            Value::Object(map) => match quantity_from_json(value) {
                Some(quantity) => Ok(Self::Numeric(quantity)),
                None => Ok(Self::Options(CallOptions::from_json(map)?)),
            },
            Value::Null => Err(anyhow!("null is not a valid argument")),
        }
    }
}

impl From<u64> for CallArg {
    fn from(value: u64) -> Self {
        Self::Numeric(U256::from(value))
    }
}

impl From<U256> for CallArg {
    fn from(value: U256) -> Self {
        Self::Numeric(value)
    }
}

impl From<I256> for CallArg {
    fn from(value: I256) -> Self {
        Self::Signed(value)
    }
}

impl From<Address> for CallArg {
    fn from(value: Address) -> Self {
        Self::Address(value)
    }
}

impl From<&str> for CallArg {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for CallArg {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for CallArg {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<u8>> for CallArg {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<CallArg>> for CallArg {
    fn from(value: Vec<CallArg>) -> Self {
        Self::Array(value)
    }
}

impl From<CallOptions> for CallArg {
    fn from(value: CallOptions) -> Self {
        Self::Options(value)
    }
}

/// Reads a JSON value as a numeric quantity.
///
/// Besides plain numbers and decimal/hex strings this accepts serialized
/// big-number objects (`{"_hex": ..}`, `{"hex": ..}`).
pub fn quantity_from_json(value: &Value) -> Option<U256> {
    match value {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) => utils::validate_hex_value(s).ok(),
        Value::Object(map) => map
            .get("_hex")
            .or_else(|| map.get("hex"))
            .and_then(Value::as_str)
            .and_then(|s| utils::validate_hex_value(s).ok()),
        _ => None,
    }
}

/// Transaction parameters shared by every call mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    /// Transport-specific fields passed through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CallOptions {
    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    /// Shallow merge: fields set on `self` win over `defaults`.
    pub fn merged_over(&self, defaults: &CallOptions) -> CallOptions {
        let mut extra = defaults.extra.clone();
        extra.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        CallOptions {
            from: self.from.or(defaults.from),
            gas: self.gas.or(defaults.gas),
            gas_price: self.gas_price.or(defaults.gas_price),
            value: self.value.or(defaults.value),
            nonce: self.nonce.or(defaults.nonce),
            data: self.data.clone().or_else(|| defaults.data.clone()),
            extra,
        }
    }

    pub fn from_json(map: &Map<String, Value>) -> Result<Self> {
        let mut options = CallOptions::default();
        for (key, value) in map {
            match key.as_str() {
                "from" => {
                    let from = value
                        .as_str()
                        .ok_or_else(|| anyhow!("Option 'from' must be an address string"))?;
                    options.from = Some(
                        utils::validate_address(from)
                            .map_err(|e| anyhow!("Invalid 'from' option: {}", e))?,
                    );
                }
                "gas" => options.gas = Some(narrow(key, value, u64::MAX as u128)? as u64),
                "gasPrice" | "gas_price" => {
                    options.gas_price = Some(narrow(key, value, u128::MAX)?)
                }
                "nonce" => options.nonce = Some(narrow(key, value, u64::MAX as u128)? as u64),
                "value" => {
                    options.value = Some(
                        quantity_from_json(value)
                            .ok_or_else(|| anyhow!("Option 'value' must be a quantity"))?,
                    )
                }
                "data" => {
                    let data = value
                        .as_str()
                        .ok_or_else(|| anyhow!("Option 'data' must be a hex string"))?;
                    let bytes = hex::decode(data.trim_start_matches("0x"))
                        .map_err(|_| anyhow!("Option 'data' is not valid hex: {}", data))?;
                    options.data = Some(bytes.into());
                }
                _ => {
                    options.extra.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(options)
    }

    /// Copies the options onto a transaction request. `data` only fills an
    /// empty input; encoded calldata is never replaced. Extra fields travel
    /// with the request as additional JSON-RPC keys.
    pub fn apply(&self, mut tx: TransactionRequest) -> TxRequest {
        if let Some(from) = self.from {
            tx.from = Some(from);
        }
        if let Some(gas) = self.gas {
            tx.gas = Some(gas);
        }
        if let Some(gas_price) = self.gas_price {
            tx.gas_price = Some(gas_price);
        }
        if let Some(value) = self.value {
            tx.value = Some(value);
        }
        if let Some(nonce) = self.nonce {
            tx.nonce = Some(nonce);
        }
        if let Some(data) = &self.data {
            if tx.input.input().is_none() {
                tx.input = TransactionInput::new(data.clone());
            }
        }
        if !self.extra.is_empty() {
            debug!(
                "Passing through transport-specific options: {:?}",
                self.extra.keys().collect::<Vec<_>>()
            );
        }

        WithOtherFields {
            inner: tx,
            other: OtherFields::new(self.extra.clone()),
        }
    }
}

fn narrow(key: &str, value: &Value, max: u128) -> Result<u128> {
    let quantity =
        quantity_from_json(value).ok_or_else(|| anyhow!("Option '{}' must be a quantity", key))?;
    if quantity > U256::from(max) {
        return Err(anyhow!("Option '{}' is out of range: {}", key, quantity));
    }
    Ok(quantity.to::<u128>())
}

/// Positional arguments with the options that apply to them.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArgs {
    pub args: Vec<CallArg>,
    pub options: CallOptions,
}

/// Pops a trailing options record and merges it over `defaults`.
pub fn resolve(mut args: Vec<CallArg>, defaults: &CallOptions) -> ResolvedArgs {
    let explicit = match args.last() {
        Some(CallArg::Options(_)) => match args.pop() {
            Some(CallArg::Options(options)) => options,
            _ => CallOptions::default(),
        },
        _ => CallOptions::default(),
    };

    ResolvedArgs {
        args,
        options: explicit.merged_over(defaults),
    }
}

/// Converts JSON positional arguments; a trailing options object stays in
/// place as `CallArg::Options` for `resolve` to pick up.
pub fn args_from_json(values: &[Value]) -> Result<Vec<CallArg>> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            CallArg::from_json(value).map_err(|e| anyhow!("Argument #{}: {}", i + 1, e))
        })
        .collect()
}
