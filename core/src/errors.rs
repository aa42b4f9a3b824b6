/*
Error types for the bridge EVM
Every failure a transaction, a deposit or an administrative action can hit.
*/

use crate::types::{Address, Hash, NativeName, RowIndex, U256};
use thiserror::Error;

/// Errors that can occur while validating, executing or settling
#[derive(Debug, Error)]
pub enum EvmError {
    /// Transaction bytes could not be decoded
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    /// Destination field present but not 20 bytes long
    #[error("invalid destination: expected 20 bytes, got {0}")]
    InvalidDestination(usize),

    /// Value field does not fit an unsigned 256-bit word
    #[error("invalid transaction: value cannot be negative")]
    NegativeValue,

    /// A host account must authorize this action
    #[error("missing authority of {0}")]
    AuthorizationRequired(NativeName),

    /// Declared gas limit below the intrinsic cost
    #[error("gas limit {limit} is too low for initialization, minimum {required} required")]
    GasLimitTooLow { limit: u64, required: u64 },

    /// Offered gas price below the configured floor
    #[error("transaction gas price {offered} is less than the current fixed gas price of {floor}")]
    GasPriceTooLow { offered: U256, floor: U256 },

    /// `v` does not encode a usable recovery id
    #[error("invalid recovery id: v = {0}")]
    InvalidRecoveryId(u64),

    /// EIP-155 chain id does not match this chain
    #[error("chain id mismatch: expected {expected}, got {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },

    /// Signature components are out of range or recovery failed
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Strict storage lookup missed
    #[error("storage key {key} not found for account {account}")]
    StorageKeyNotFound { account: RowIndex, key: Hash },

    /// Account cannot cover a debit
    #[error("insufficient balance for {address}: required {required}, available {available}")]
    InsufficientBalance {
        address: Address,
        required: U256,
        available: U256,
    },

    /// Transaction nonce does not match the sender account
    #[error("invalid nonce: expected {expected}, got {actual}")]
    InvalidNonce { expected: u64, actual: u64 },

    /// No account with this address
    #[error("account not found: {0}")]
    AccountNotFound(Address),

    /// An account with this address already exists
    #[error("account already exists: {0}")]
    AccountExists(Address),

    /// Host account has no linked EVM account
    #[error("host account {0} has no linked EVM account")]
    NativeAccountNotLinked(NativeName),

    /// Resources were already initialized
    #[error("contract is already initialized")]
    AlreadyInitialized,

    /// Rejected administrative or message argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Interpreter collaborator failed outside normal revert/halt semantics
    #[error("interpreter error: {0}")]
    Interpreter(String),

    /// A journal entry could not be inverted against the ledger
    #[error("journal inconsistency: {0}")]
    Journal(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for bridge EVM operations
pub type Result<T> = core::result::Result<T, EvmError>;

impl From<bincode::Error> for EvmError {
    fn from(err: bincode::Error) -> Self {
        EvmError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for EvmError {
    fn from(err: serde_json::Error) -> Self {
        EvmError::SerializationError(err.to_string())
    }
}

impl From<alloy_rlp::Error> for EvmError {
    fn from(err: alloy_rlp::Error) -> Self {
        EvmError::MalformedTransaction(err.to_string())
    }
}
