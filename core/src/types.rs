//! Core type definitions for the bridge EVM
//!
//! Ethereum-side values come from alloy-primitives; host-side values are
//! thin newtypes so the two ledgers never get mixed up.

use core::fmt;
use serde::{Deserialize, Serialize};

pub use alloy_primitives::{Address, B256, Bytes, U256};

/// 32-byte hash (Keccak256 output)
pub type Hash = B256;

/// Account nonce type
pub type Nonce = u64;

/// Gas amount type
pub type Gas = u64;

/// Block number
pub type BlockNumber = u64;

/// Timestamp (seconds since epoch)
pub type Timestamp = u64;

/// Dense primary key of a ledger row
pub type RowIndex = u64;

/// Amount of the host ledger's native token, in its smallest unit
pub type NativeAmount = i64;

/// Name of an account on the host ledger
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeName(String);

impl NativeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NativeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NativeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for NativeName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Convert a 256-bit word into a storage key
pub fn word_to_key(word: U256) -> B256 {
    B256::from(word)
}

/// Convert a storage key back into a 256-bit word
pub fn key_to_word(key: B256) -> U256 {
    U256::from_be_bytes(key.0)
}
