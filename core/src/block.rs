//! Synthesized block context
//!
//! The host ledger has no Ethereum blocks, so each transaction sees a block
//! built from the host's block counter and clock. Block hashes are a
//! deterministic stand-in, available for the last 256 blocks only.

use crate::constants::{BLOCK_HASH_WINDOW, DEFAULT_BLOCK_GAS_LIMIT};
use crate::hashing::keccak256;
use crate::host::HostLedger;
use crate::types::{Address, BlockNumber, Gas, Hash, Timestamp, U256};
use serde::{Deserialize, Serialize};

/// Block a transaction executes in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    pub number: BlockNumber,
    pub difficulty: U256,
    pub gas_limit: Gas,
    pub timestamp: Timestamp,
    pub coinbase: Address,
}

impl Default for BlockContext {
    fn default() -> Self {
        Self {
            number: 0,
            difficulty: U256::ZERO,
            gas_limit: DEFAULT_BLOCK_GAS_LIMIT,
            timestamp: 0,
            coinbase: Address::ZERO,
        }
    }
}

impl BlockContext {
    pub fn new(number: BlockNumber, timestamp: Timestamp) -> Self {
        Self {
            number,
            timestamp,
            ..Default::default()
        }
    }

    /// Hash of block `n`, or zero outside the last 256 blocks
    pub fn block_hash(&self, n: BlockNumber) -> Hash {
        if n >= self.number || self.number - n > BLOCK_HASH_WINDOW {
            return Hash::ZERO;
        }
        keccak256(n.to_string().as_bytes())
    }

    pub fn with_difficulty(mut self, difficulty: U256) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: Gas) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_coinbase(mut self, coinbase: Address) -> Self {
        self.coinbase = coinbase;
        self
    }
}

/// Block for the current host action
pub fn load_current_block<H: HostLedger + ?Sized>(host: &H) -> BlockContext {
    BlockContext::new(host.block_num(), host.now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    #[test]
    fn test_load_current_block_defaults() {
        let host = MemoryHost::new(1_000, 1_600_000_000);
        let block = load_current_block(&host);
        assert_eq!(block.number, 1_000);
        assert_eq!(block.timestamp, 1_600_000_000);
        assert_eq!(block.gas_limit, 10_000_000);
        assert_eq!(block.difficulty, U256::ZERO);
        assert_eq!(block.coinbase, Address::ZERO);
    }

    #[test]
    fn test_block_hash_window() {
        let block = BlockContext::new(1_000, 0);

        assert_eq!(block.block_hash(1_000), Hash::ZERO);
        assert_eq!(block.block_hash(1_001), Hash::ZERO);
        assert_eq!(block.block_hash(743), Hash::ZERO);
        assert_eq!(block.block_hash(744), keccak256(b"744"));
        assert_eq!(block.block_hash(999), keccak256(b"999"));
        assert_ne!(block.block_hash(998), block.block_hash(999));
    }

    #[test]
    fn test_block_hash_early_chain() {
        let block = BlockContext::new(3, 0);
        assert_eq!(block.block_hash(0), keccak256(b"0"));
        assert_eq!(block.block_hash(3), Hash::ZERO);
    }

    #[test]
    fn test_builder_overrides() {
        let block = BlockContext::new(5, 10)
            .with_difficulty(U256::from(2u64))
            .with_gas_limit(30_000_000)
            .with_coinbase(Address::repeat_byte(0xcc));
        assert_eq!(block.difficulty, U256::from(2u64));
        assert_eq!(block.gas_limit, 30_000_000);
        assert_eq!(block.coinbase, Address::repeat_byte(0xcc));
    }
}
