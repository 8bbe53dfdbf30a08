use thiserror::Error;

/// Errors surfaced by contract bindings.
///
/// Every variant names the contract, operation or identifier it concerns so
/// callers never see a bare code.
#[derive(Debug, Error)]
pub enum BindingError {
    /// Missing transport, missing bytecode or no recorded address.
    #[error("{contract} error: {message}")]
    Configuration { contract: String, message: String },

    /// Bytecode still contains library placeholders.
    #[error(
        "{contract} contains unresolved libraries. You must deploy and link the following libraries before you can deploy a new version of {contract}: {}",
        .libraries.join(", ")
    )]
    Link {
        contract: String,
        libraries: Vec<String>,
    },

    /// Malformed address passed to `at`.
    #[error("Invalid address passed to {contract}.at(): {address}")]
    Validation { contract: String, address: String },

    #[error("{contract}.{operation} failed: {source}")]
    Transport {
        contract: String,
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// Receipt polling ran past its budget.
    #[error("Transaction {tx_hash} wasn't processed in {seconds} seconds!")]
    Timeout { tx_hash: String, seconds: f64 },

    #[error("{contract} error: Can't find artifacts for network id '{network_id}'")]
    UnknownNetwork {
        contract: String,
        network_id: String,
    },

    /// Encoding, decoding or lookup against the interface failed.
    #[error("{contract}.{function}: {message}")]
    Abi {
        contract: String,
        function: String,
        message: String,
    },

    #[error("artifact {path}: {message}")]
    Artifact { path: String, message: String },
}

impl BindingError {
    pub fn configuration(contract: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            contract: contract.into(),
            message: message.into(),
        }
    }

    pub fn transport(
        contract: impl Into<String>,
        operation: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        Self::Transport {
            contract: contract.into(),
            operation: operation.into(),
            source,
        }
    }

    pub fn abi(
        contract: impl Into<String>,
        function: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Abi {
            contract: contract.into(),
            function: function.into(),
            message: message.into(),
        }
    }

    pub fn artifact(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Artifact {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Builds a timeout error from the configured budget in milliseconds.
    pub fn timeout(tx_hash: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            tx_hash: tx_hash.into(),
            seconds: timeout_ms as f64 / 1000.0,
        }
    }
}

pub type BindingResult<T> = Result<T, BindingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_error_lists_every_library() {
        let err = BindingError::Link {
            contract: "Token".to_string(),
            libraries: vec!["Bar".to_string(), "Foo".to_string()],
        };
        assert!(err.to_string().ends_with("of Token: Bar, Foo"));
    }

    #[test]
    fn test_timeout_seconds_formatting() {
        assert_eq!(
            BindingError::timeout("0xabc", 500).to_string(),
            "Transaction 0xabc wasn't processed in 0.5 seconds!"
        );
        assert_eq!(
            BindingError::timeout("0xabc", 240_000).to_string(),
            "Transaction 0xabc wasn't processed in 240 seconds!"
        );
    }

    #[test]
    fn test_transport_error_keeps_cause() {
        let err = BindingError::transport("Token", "balanceOf", anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "Token.balanceOf failed: boom");
        assert!(std::error::Error::source(&err).is_some());
    }
}
