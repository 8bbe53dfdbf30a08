use alloy::primitives::{Address, U256};
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Text length of a `0x`-prefixed account identifier.
pub const ADDRESS_TEXT_LEN: usize = 42;

/// Validates and normalizes an Ethereum address
pub fn validate_address(address: &str) -> Result<Address> {
    let address = address.trim();

    if address.is_empty() {
        return Err(anyhow!("Address cannot be empty"));
    }

    if address.len() != ADDRESS_TEXT_LEN {
        return Err(anyhow!(
            "Invalid address length: '{}'. Ethereum addresses must be exactly 42 characters (0x + 40 hex characters)",
            address
        ));
    }

    if !address.starts_with("0x") && !address.starts_with("0X") {
        return Err(anyhow!(
            "Invalid address format: '{}'. Ethereum addresses must start with '0x'",
            address
        ));
    }

    let hex_part = &address[2..];
    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(anyhow!(
            "Invalid address format: '{}'. Contains non-hexadecimal characters",
            address
        ));
    }

    // Mixed-case input is accepted without checksum enforcement, like the node does
    Address::from_str(&address.to_lowercase())
        .map_err(|e| anyhow!("Invalid Ethereum address: '{}'. Error: {}", address, e))
}

/// Validates network name
pub fn validate_network(network: &str, available_networks: &[String]) -> Result<()> {
    if network.is_empty() {
        return Err(anyhow!("Network name cannot be empty"));
    }

    if !available_networks.iter().any(|n| n == network) {
        return Err(anyhow!(
            "Unknown network: '{}'. Available networks: {}",
            network,
            available_networks.join(", ")
        ));
    }

    Ok(())
}

/// Validates function name
pub fn validate_function_name(function_name: &str) -> Result<()> {
    let Some(first) = function_name.chars().next() else {
        return Err(anyhow!("Function name cannot be empty"));
    };

    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(anyhow!(
            "Invalid function name: '{}'. Function names must start with a letter or underscore",
            function_name
        ));
    }

    if !function_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(anyhow!(
            "Invalid function name: '{}'. Function names can only contain letters, numbers, and underscores",
            function_name
        ));
    }

    Ok(())
}

/// Parses a quantity given as decimal or `0x`-prefixed hex text
pub fn validate_hex_value(value_str: &str) -> Result<U256> {
    let value_str = value_str.trim();
    if value_str.is_empty() {
        return Err(anyhow!("Value cannot be empty"));
    }

    let value = if let Some(hex) = value_str
        .strip_prefix("0x")
        .or_else(|| value_str.strip_prefix("0X"))
    {
        U256::from_str_radix(hex, 16)
            .map_err(|_| anyhow!("Invalid hexadecimal value: '{}'", value_str))?
    } else {
        U256::from_str_radix(value_str, 10).map_err(|_| {
            anyhow!(
                "Invalid numeric value: '{}'. Use decimal format or '0x' prefixed hex",
                value_str
            )
        })?
    };

    Ok(value)
}

/// Validates an optional block range, defaulting the start to genesis
pub fn validate_block_range(from: Option<u64>, to: Option<u64>) -> Result<(u64, Option<u64>)> {
    let from = from.unwrap_or(0);
    match to {
        Some(to) if to < from => Err(anyhow!(
            "Invalid block range: to_block {} is before from_block {}",
            to,
            from
        )),
        _ => Ok((from, to)),
    }
}

/// Creates user-friendly error messages for common RPC errors
pub fn interpret_rpc_error(error: &str) -> String {
    if error.contains("execution reverted") {
        "The contract function reverted execution. This usually means the function's requirements were not met or an assertion failed.".to_string()
    } else if error.contains("insufficient funds") {
        "Insufficient funds to cover gas costs. Make sure the sending account has enough ETH for gas fees.".to_string()
    } else if error.contains("gas required exceeds allowance") {
        "Gas limit too low. Try increasing the gas option for this transaction.".to_string()
    } else if error.contains("nonce too low") {
        "Nonce too low. Another transaction was already mined with this nonce.".to_string()
    } else if error.contains("unknown account") || error.contains("authentication needed") {
        "The node does not manage the sending account. Unlock it on the node or set a different 'from'.".to_string()
    } else if error.contains("connection refused") || error.contains("network unreachable") {
        "Cannot connect to RPC endpoint. Check the rpc_url of the selected network.".to_string()
    } else if error.contains("timeout") {
        "Request timed out. The RPC endpoint may be overloaded or unreachable.".to_string()
    } else if error.contains("method not found") {
        "The requested method is not supported by this RPC endpoint.".to_string()
    } else {
        format!("RPC error: {}", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        assert!(validate_address("0x742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_ok());
        assert!(validate_address("0x0000000000000000000000000000000000000000").is_ok());

        assert!(validate_address("").is_err());
        assert!(validate_address("not_an_address").is_err());
        assert!(validate_address("0x123").is_err());
        assert!(validate_address("742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_err());
        assert!(validate_address("0xgg2d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_err());
        // 41 characters
        assert!(validate_address("0x742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6").is_err());
    }

    #[test]
    fn test_validate_network() {
        let networks = vec!["live".to_string(), "development".to_string()];

        assert!(validate_network("live", &networks).is_ok());
        assert!(validate_network("development", &networks).is_ok());
        assert!(validate_network("invalid", &networks).is_err());
        assert!(validate_network("", &networks).is_err());
    }

    #[test]
    fn test_validate_function_name() {
        assert!(validate_function_name("transfer").is_ok());
        assert!(validate_function_name("_internal").is_ok());
        assert!(validate_function_name("getBalance123").is_ok());

        assert!(validate_function_name("").is_err());
        assert!(validate_function_name("123invalid").is_err());
        assert!(validate_function_name("invalid-name").is_err());
    }

    #[test]
    fn test_validate_hex_value() {
        assert_eq!(validate_hex_value("0xc8").unwrap(), U256::from(200));
        assert_eq!(validate_hex_value("200").unwrap(), U256::from(200));
        assert!(validate_hex_value("").is_err());
        assert!(validate_hex_value("twelve").is_err());
    }

    #[test]
    fn test_validate_block_range() {
        assert_eq!(validate_block_range(None, None).unwrap(), (0, None));
        assert_eq!(validate_block_range(Some(5), Some(9)).unwrap(), (5, Some(9)));
        assert!(validate_block_range(Some(9), Some(5)).is_err());
    }
}
