//! Hashing utilities
//!
//! Keccak256 for transaction hashes, signing hashes, address derivation and
//! the synthesized block hashes. All functions are deterministic.

use crate::errors::Result;
use crate::types::{Address, Hash, B256};
use sha3::{Digest, Keccak256};

/// Compute Keccak256 hash of arbitrary data
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    B256::from_slice(&hasher.finalize())
}

/// Hash a serializable struct
///
/// Uses bincode for deterministic serialization before hashing.
pub fn hash_struct<T: serde::Serialize>(value: &T) -> Result<Hash> {
    let bytes = bincode::serialize(value)?;
    Ok(keccak256(&bytes))
}

/// Last 20 bytes of a Keccak256 digest
pub fn address_from_hash(hash: &Hash) -> Address {
    Address::from_slice(&hash.as_slice()[12..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        let hash = keccak256(&[]);
        // Known empty Keccak256 hash
        assert_eq!(
            hex::encode(hash),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak256_hello() {
        let hash = keccak256(b"hello");
        assert_eq!(
            hex::encode(hash),
            "1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8"
        );
    }

    #[test]
    fn test_hash_struct() {
        #[derive(serde::Serialize)]
        struct TestStruct {
            a: u64,
            b: u64,
        }

        let s1 = TestStruct { a: 1, b: 2 };
        let s2 = TestStruct { a: 1, b: 2 };
        let s3 = TestStruct { a: 2, b: 1 };

        assert_eq!(hash_struct(&s1).unwrap(), hash_struct(&s2).unwrap());
        assert_ne!(hash_struct(&s1).unwrap(), hash_struct(&s3).unwrap());
    }

    #[test]
    fn test_address_from_hash_takes_low_bytes() {
        let mut bytes = [0u8; 32];
        bytes[12..].copy_from_slice(&[0xAB; 20]);
        let address = address_from_hash(&B256::from(bytes));
        assert_eq!(address, Address::repeat_byte(0xAB));
    }
}
