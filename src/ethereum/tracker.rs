//! Receipt polling for submitted transactions.
//!
//! Each pending transaction moves SUBMITTED -> CONFIRMED | TIMED_OUT |
//! TRANSPORT_ERROR. The first receipt fetch happens immediately, later ones
//! after a fixed interval. Only a missing receipt is retried; a transport
//! error ends tracking at once. Timing out stops polling but leaves the
//! transaction itself alone.

use alloy::primitives::B256;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{provider::Transport, Confirmation, Receipt};
use crate::error::{BindingError, BindingResult};

pub const DEFAULT_TIMEOUT_MS: u64 = 240_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Wall-clock budget from submission; 0 waits forever.
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PendingTransaction {
    pub tx_hash: B256,
    pub submitted_at: Instant,
    pub timeout: Duration,
}

impl PendingTransaction {
    pub fn new(tx_hash: B256, timeout_ms: u64) -> Self {
        Self {
            tx_hash,
            submitted_at: Instant::now(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn expired(&self) -> bool {
        !self.timeout.is_zero() && self.submitted_at.elapsed() > self.timeout
    }
}

#[derive(Debug)]
pub enum TrackerState {
    Submitted,
    Pending { attempts: u32 },
    Confirmed(Receipt),
    TimedOut,
    TransportError(anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct ConfirmationTracker {
    contract: String,
    transport: Arc<dyn Transport>,
    config: TrackerConfig,
}

impl ConfirmationTracker {
    pub fn new(contract: impl Into<String>, transport: Arc<dyn Transport>, config: TrackerConfig) -> Self {
        Self {
            contract: contract.into(),
            transport,
            config,
        }
    }

    /// Runs one fetch and returns the next state.
    pub async fn step(&self, pending: &PendingTransaction, state: TrackerState) -> TrackerState {
        let attempts = match state {
            TrackerState::Submitted => 0,
            TrackerState::Pending { attempts } => attempts,
            terminal => return terminal,
        };

        match self.transport.transaction_receipt(pending.tx_hash).await {
            Err(e) => TrackerState::TransportError(e),
            Ok(Some(receipt)) => TrackerState::Confirmed(receipt),
            Ok(None) if pending.expired() => TrackerState::TimedOut,
            Ok(None) => TrackerState::Pending {
                attempts: attempts + 1,
            },
        }
    }

    /// Polls until the transaction is confirmed, times out or polling fails.
    pub async fn wait(&self, tx_hash: B256) -> BindingResult<Confirmation> {
        let pending = PendingTransaction::new(tx_hash, self.config.timeout_ms);
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut state = TrackerState::Submitted;

        loop {
            state = match self.step(&pending, state).await {
                TrackerState::Confirmed(receipt) => {
                    debug!(
                        "Transaction 0x{:x} confirmed in block {:?}",
                        tx_hash, receipt.block_number
                    );
                    return Ok(Confirmation {
                        transaction_hash: tx_hash,
                        receipt,
                    });
                }
                TrackerState::TimedOut => {
                    warn!(
                        "Gave up waiting for transaction 0x{:x} after {} ms",
                        tx_hash, self.config.timeout_ms
                    );
                    return Err(BindingError::timeout(
                        format!("0x{:x}", tx_hash),
                        self.config.timeout_ms,
                    ));
                }
                TrackerState::TransportError(e) => {
                    return Err(BindingError::transport(
                        &self.contract,
                        format!("getTransactionReceipt(0x{:x})", tx_hash),
                        e,
                    ));
                }
                TrackerState::Pending { attempts } => {
                    debug!("No receipt for 0x{:x} yet (attempt {})", tx_hash, attempts);
                    tokio::time::sleep(interval).await;
                    TrackerState::Pending { attempts }
                }
                TrackerState::Submitted => TrackerState::Submitted,
            };
        }
    }
}
