//! Sender recovery for legacy and EIP-155 signatures

use crate::codec::SignedTransaction;
use crate::constants::{MIN_POST_155_V, POST_155_V_START, PRE_155_V_START, SECP256K1N_HALF};
use crate::errors::{EvmError, Result};
use crate::hashing::{address_from_hash, keccak256};
use crate::types::{Address, Hash, U256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;

/// Recovery id and, for EIP-155 signatures, the bound chain id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryParams {
    pub recovery_id: u8,
    pub chain_id: Option<u64>,
}

pub fn is_pre_eip155(v: u64) -> bool {
    v == PRE_155_V_START || v == PRE_155_V_START + 1
}

/// Split `v` into a recovery id, checking any bound chain id against `chain_id`
pub fn normalize_v(v: u64, chain_id: u64) -> Result<RecoveryParams> {
    if is_pre_eip155(v) {
        return Ok(RecoveryParams {
            recovery_id: (v - PRE_155_V_START) as u8,
            chain_id: None,
        });
    }
    if v < MIN_POST_155_V {
        return Err(EvmError::InvalidRecoveryId(v));
    }

    let recovery_id = (v - POST_155_V_START) % 2;
    let actual = (v - POST_155_V_START - recovery_id) / 2;
    if actual != chain_id {
        return Err(EvmError::ChainIdMismatch {
            expected: chain_id,
            actual,
        });
    }
    Ok(RecoveryParams {
        recovery_id: recovery_id as u8,
        chain_id: Some(actual),
    })
}

/// Hash the sender signed, depending on which form `v` indicates
pub fn signing_hash(tx: &SignedTransaction, chain_id: u64) -> Hash {
    if is_pre_eip155(tx.v) {
        keccak256(&tx.encode_unsigned())
    } else {
        keccak256(&tx.encode_for_chain(chain_id))
    }
}

/// Recover the sending address of a signed transaction
pub fn recover_sender(tx: &SignedTransaction, chain_id: u64) -> Result<Address> {
    let params = normalize_v(tx.v, chain_id)?;

    if !is_low_s(tx.s) {
        return Err(EvmError::InvalidSignature(
            "s must be between 1 and secp256k1n/2, inclusive".into(),
        ));
    }
    let signature = Signature::from_scalars(tx.r.to_be_bytes::<32>(), tx.s.to_be_bytes::<32>())
        .map_err(|err| EvmError::InvalidSignature(err.to_string()))?;
    let recovery_id = RecoveryId::from_byte(params.recovery_id)
        .ok_or(EvmError::InvalidRecoveryId(tx.v))?;

    let message = signing_hash(tx, chain_id);
    let key = VerifyingKey::recover_from_prehash(message.as_slice(), &signature, recovery_id)
        .map_err(|err| EvmError::InvalidSignature(err.to_string()))?;

    let compressed = key.to_encoded_point(true);
    let uncompressed = decompress_public_key(compressed.as_bytes())?;
    Ok(public_key_to_address(&uncompressed))
}

/// Expand a SEC1 compressed key into its 65-byte uncompressed form
pub fn decompress_public_key(compressed: &[u8]) -> Result<[u8; 65]> {
    let key = PublicKey::from_sec1_bytes(compressed)
        .map_err(|err| EvmError::InvalidSignature(err.to_string()))?;
    let point = key.to_encoded_point(false);
    let mut out = [0u8; 65];
    out.copy_from_slice(point.as_bytes());
    Ok(out)
}

/// Ethereum address of an uncompressed (0x04-prefixed) public key
pub fn public_key_to_address(uncompressed: &[u8; 65]) -> Address {
    address_from_hash(&keccak256(&uncompressed[1..]))
}

/// `v` for a recovery id under the given signing form
pub fn encode_v(recovery_id: u8, chain_id: Option<u64>) -> u64 {
    match chain_id {
        Some(id) => id * 2 + POST_155_V_START + u64::from(recovery_id),
        None => PRE_155_V_START + u64::from(recovery_id),
    }
}

/// `s` lies in `[1, secp256k1n / 2]`
pub fn is_low_s(s: U256) -> bool {
    !s.is_zero() && s <= SECP256K1N_HALF
}
