//! Protocol constants

use crate::types::U256;

/// Largest accepted encoded transaction, in bytes (128 KiB)
pub const MAX_TX_SIZE: usize = 128 * 1024;

/// Base cost of every transaction
pub const GP_TRANSACTION: u64 = 21_000;
/// Cost per zero byte of transaction data
pub const GP_TXDATAZERO: u64 = 4;
/// Cost per non-zero byte of transaction data
pub const GP_TXDATANONZERO: u64 = 16;
/// Surcharge for contract creation transactions
pub const GP_TXCREATE: u64 = 32_000;

/// Warm storage read (EIP-2929)
pub const GP_WARM_STORAGE_READ: u64 = 100;
/// Cold storage access surcharge (EIP-2929)
pub const GP_COLD_SLOAD: u64 = 2_100;
/// Zero to non-zero storage write
pub const GP_SSTORE_SET: u64 = 20_000;
/// Non-zero to different value storage write, cold surcharge excluded
pub const GP_SSTORE_RESET: u64 = 5_000 - GP_COLD_SLOAD;
/// Refund for clearing a storage slot
pub const GP_SSTORE_CLEARS_REFUND: i64 = 15_000;

/// `v` of a pre-EIP-155 signature is 27 or 28
pub const PRE_155_V_START: u64 = 27;
/// `v` of an EIP-155 signature is `chain_id * 2 + 35 + recovery_id`
pub const POST_155_V_START: u64 = 35;
/// Smallest `v` that encodes a chain id (chain id 1)
pub const MIN_POST_155_V: u64 = 37;

/// secp256k1 curve order divided by two; upper bound for `s`
pub const SECP256K1N_HALF: U256 = U256::from_limbs([
    0xDFE9_2F46_681B_20A0,
    0x5D57_6E73_57A4_501D,
    0xFFFF_FFFF_FFFF_FFFF,
    0x7FFF_FFFF_FFFF_FFFF,
]);

/// RAM charged for the first storage row of an account (includes table scope)
pub const RAM_FIRST_STORAGE: i64 = 457;
/// RAM charged for each further storage row
pub const RAM_STORAGE: i64 = 347;
/// RAM charged for an account row
pub const RAM_ACCOUNT: i64 = 478;
/// RAM charged per code row on top of its length
pub const RAM_CODE_OVERHEAD: i64 = 1;

/// Number of past blocks whose hash is available
pub const BLOCK_HASH_WINDOW: u64 = 256;
/// Synthesized block gas limit (average on Ethereum mainnet)
pub const DEFAULT_BLOCK_GAS_LIMIT: u64 = 10_000_000;

/// Wei have 18 decimals
pub const WEI_DECIMALS: u32 = 18;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secp256k1n_half_hex() {
        let bytes = SECP256K1N_HALF.to_be_bytes::<32>();
        assert_eq!(
            hex::encode(bytes),
            "7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0"
        );
    }

    #[test]
    fn test_sstore_reset_matches_berlin() {
        assert_eq!(GP_SSTORE_RESET, 2_900);
    }
}
