//! Contract bindings over persisted deployment artifacts.
//!
//! A [`ethereum::contract::Contract`] is built from an artifact and bound to
//! a node through a [`ethereum::provider::ClientContext`]; it deploys new
//! instances or attaches to existing ones, each exposing the artifact's ABI
//! functions and events.

pub mod codegen;
pub mod config;
pub mod error;
pub mod ethereum;
pub mod server;

pub use alloy;
