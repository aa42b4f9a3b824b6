//! # Bridge EVM Core
//!
//! Ethereum-compatible transaction execution embedded in a host ledger.
//!
//! The host ledger delivers messages: native token deposits, withdrawals,
//! encoded Ethereum transactions and administrative actions. Transactions are
//! decoded, priced, authenticated and executed against an account/storage
//! ledger. Every mutation is journaled so a failed step can be rolled back.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │     Message     │ ── Transfer, Withdraw, Raw, Call, Admin
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   EvmContract   │ ── Dispatch, deposits, linked accounts
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Processor    │ ── Decode, gas, sender, nonce, settle
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ ExecutionContext│ ── Journaled ledger access
//! │  + Interpreter  │    (revm)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Receipt     │ ── RCPT{{ json }}RCPT
//! └─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bridge_evm_core::prelude::*;
//!
//! let mut evm = EvmContract::new(EvmSettings::default())?;
//! let mut host = MemoryHost::new(1, 1_700_000_000);
//!
//! // Credit 1.0000 native tokens to an address
//! evm.dispatch(&mut host, Message::Transfer {
//!     from: "alice".into(),
//!     to: "eosio.evm".into(),
//!     quantity: 10_000,
//!     memo: hex::encode(address),
//! })?;
//!
//! // Execute a signed transaction
//! let receipt = evm.dispatch(&mut host, Message::Raw {
//!     ram_payer: "eosio.evm".into(),
//!     tx: signed_tx.into(),
//!     estimate_gas: false,
//!     sender: None,
//! })?;
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Core type definitions (Address, Hash, U256, NativeName)
//! - [`errors`] - Error types and Result alias
//! - [`config`] - Deployment settings
//! - [`codec`] - Transaction wire format
//! - [`gas`] - Intrinsic gas, price floor, SSTORE and RAM pricing
//! - [`signature`] - Sender recovery
//! - [`ledger`] - Account and storage tables
//! - [`journal`] - Reversible state modifications
//! - [`context`] - Journaled execution context
//! - [`evm`] - Interpreter seam and the revm adapter
//! - [`processor`] - Transaction pipeline
//! - [`contract`] - Persisted state and message dispatch

pub mod block;
pub mod codec;
pub mod config;
pub mod constants;
pub mod context;
pub mod contract;
pub mod errors;
pub mod evm;
pub mod gas;
pub mod hashing;
pub mod host;
pub mod input;
pub mod journal;
pub mod ledger;
pub mod message;
pub mod output;
pub mod processor;
pub mod receipt;
pub mod resources;
pub mod signature;
pub mod state;
pub mod trace;
pub mod transaction;
pub mod types;

// Re-exports for convenience
pub use block::BlockContext;
pub use codec::SignedTransaction;
pub use config::EvmSettings;
pub use context::ExecutionContext;
pub use contract::{ContractState, EvmContract};
pub use errors::{EvmError, Result};
pub use evm::{Interpreter, RevmInterpreter};
pub use hashing::{hash_struct, keccak256};
pub use host::{HostLedger, MemoryHost};
pub use input::CallRequest;
pub use ledger::{Account, Ledger};
pub use message::{AdminAction, Message};
pub use output::{ExecResult, ExecutionStatus, Log};
pub use processor::ExecutionMode;
pub use receipt::Receipt;
pub use resources::{Config, ResourceInit, Resources};
pub use transaction::EthereumTransaction;
pub use types::{Address, Bytes, Gas, Hash, NativeName, U256};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Address, AdminAction, BlockContext, Bytes, ContractState, EvmContract, EvmError,
        EvmSettings, ExecutionStatus, Gas, Hash, HostLedger, MemoryHost, Message, NativeName,
        Receipt, Result, SignedTransaction, U256,
    };
}
