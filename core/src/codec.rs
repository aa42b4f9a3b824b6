//! Wire codec for legacy Ethereum transactions
//!
//! A transaction is an RLP list of byte strings:
//! `[nonce, gas_price, gas_limit, to, value, data]` for the pre-signing form
//! and `[.., v, r, s]` once signed. Scalars are big-endian without a fixed width.

use crate::errors::{EvmError, Result};
use crate::types::{Address, Bytes, Gas, Nonce, U256};
use alloy_rlp::{Encodable, Header, EMPTY_STRING_CODE};
use serde::{Deserialize, Serialize};

/// Field count of an unsigned transaction
pub const UNSIGNED_FIELDS: usize = 6;
/// Field count of a signed transaction
pub const SIGNED_FIELDS: usize = 9;

/// The decoded wire fields of one legacy transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub nonce: Nonce,
    pub gas_price: U256,
    pub gas_limit: Gas,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl SignedTransaction {
    /// Decode and validate an encoded transaction of at most `max_size` bytes
    pub fn decode(encoded: &[u8], max_size: usize) -> Result<Self> {
        if encoded.is_empty() {
            return Err(EvmError::MalformedTransaction("no encoded data".into()));
        }
        if encoded.len() > max_size {
            return Err(EvmError::MalformedTransaction(format!(
                "max size of a transaction is {max_size} bytes, got {}",
                encoded.len()
            )));
        }

        let mut buf = encoded;
        let header = Header::decode(&mut buf)?;
        if !header.list {
            return Err(EvmError::MalformedTransaction("expected an RLP list".into()));
        }
        if buf.len() != header.payload_length {
            return Err(EvmError::MalformedTransaction(format!(
                "list payload is {} bytes but {} bytes follow the header",
                header.payload_length,
                buf.len()
            )));
        }

        let mut fields = Vec::with_capacity(SIGNED_FIELDS);
        while !buf.is_empty() {
            fields.push(decode_string(&mut buf)?);
        }
        if fields.len() != UNSIGNED_FIELDS && fields.len() != SIGNED_FIELDS {
            return Err(EvmError::MalformedTransaction(format!(
                "expected {UNSIGNED_FIELDS} or {SIGNED_FIELDS} fields, got {}",
                fields.len()
            )));
        }

        let to = match fields[3].len() {
            0 => None,
            20 => Some(Address::from_slice(fields[3])),
            other => return Err(EvmError::InvalidDestination(other)),
        };
        if fields[4].len() > 32 {
            return Err(EvmError::NegativeValue);
        }

        let (v, r, s) = if fields.len() == SIGNED_FIELDS {
            (
                read_u64(fields[6], "v")?,
                read_u256(fields[7], "r")?,
                read_u256(fields[8], "s")?,
            )
        } else {
            (0, U256::ZERO, U256::ZERO)
        };

        Ok(Self {
            nonce: read_u64(fields[0], "nonce")?,
            gas_price: read_u256(fields[1], "gas price")?,
            gas_limit: read_u64(fields[2], "gas limit")?,
            to,
            value: read_u256(fields[4], "value")?,
            data: Bytes::copy_from_slice(fields[5]),
            v,
            r,
            s,
        })
    }

    /// Canonical nine-field encoding
    pub fn encode(&self) -> Vec<u8> {
        self.encode_with_tail(Some((self.v, self.r, self.s)))
    }

    /// Six-field encoding signed by pre-EIP-155 signatures
    pub fn encode_unsigned(&self) -> Vec<u8> {
        self.encode_with_tail(None)
    }

    /// Nine-field encoding with `(chain_id, 0, 0)` signed under EIP-155
    pub fn encode_for_chain(&self, chain_id: u64) -> Vec<u8> {
        self.encode_with_tail(Some((chain_id, U256::ZERO, U256::ZERO)))
    }

    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    /// No signature attached
    pub fn is_unsigned(&self) -> bool {
        self.r.is_zero() && self.s.is_zero()
    }

    fn encode_with_tail(&self, tail: Option<(u64, U256, U256)>) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.data.len() + 128);
        self.nonce.encode(&mut payload);
        self.gas_price.encode(&mut payload);
        self.gas_limit.encode(&mut payload);
        match &self.to {
            Some(address) => address.encode(&mut payload),
            None => payload.push(EMPTY_STRING_CODE),
        }
        self.value.encode(&mut payload);
        self.data[..].encode(&mut payload);
        if let Some((v, r, s)) = tail {
            v.encode(&mut payload);
            r.encode(&mut payload);
            s.encode(&mut payload);
        }

        let mut out = Vec::with_capacity(payload.len() + 9);
        Header {
            list: true,
            payload_length: payload.len(),
        }
        .encode(&mut out);
        out.extend_from_slice(&payload);
        out
    }
}

fn decode_string<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8]> {
    let header = Header::decode(buf)?;
    if header.list {
        return Err(EvmError::MalformedTransaction(
            "nested lists are not allowed".into(),
        ));
    }
    if buf.len() < header.payload_length {
        return Err(EvmError::MalformedTransaction("field runs past the end".into()));
    }
    let (bytes, rest) = buf.split_at(header.payload_length);
    *buf = rest;
    Ok(bytes)
}

/// Scalars are minimal big-endian: no leading zero byte, zero is empty
fn require_canonical(bytes: &[u8], field: &str) -> Result<()> {
    if bytes.first() == Some(&0) {
        return Err(EvmError::MalformedTransaction(format!(
            "{field} has leading zero bytes"
        )));
    }
    Ok(())
}

fn read_u64(bytes: &[u8], field: &str) -> Result<u64> {
    require_canonical(bytes, field)?;
    if bytes.len() > 8 {
        return Err(EvmError::MalformedTransaction(format!(
            "{field} does not fit in 64 bits"
        )));
    }
    Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn read_u256(bytes: &[u8], field: &str) -> Result<U256> {
    require_canonical(bytes, field)?;
    if bytes.len() > 32 {
        return Err(EvmError::MalformedTransaction(format!(
            "{field} does not fit in 256 bits"
        )));
    }
    Ok(U256::from_be_slice(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    // EIP-155 example: nonce 9, 20 gwei, 21000 gas, 1 ether to 0x3535..35, chain id 1
    const EIP155_SIGNED: &str = "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83";
    const EIP155_SIGNING_DATA: &str = "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080";

    fn sample() -> SignedTransaction {
        SignedTransaction {
            nonce: 7,
            gas_price: U256::from(1_000_000_000u64),
            gas_limit: 90_000,
            to: Some(Address::repeat_byte(0x42)),
            value: U256::from(12345u64),
            data: Bytes::from(vec![0x00, 0x01, 0xff]),
            v: 116,
            r: U256::from(99u64),
            s: U256::from(77u64),
        }
    }

    #[test]
    fn test_decode_eip155_vector() {
        let bytes = hex::decode(EIP155_SIGNED).unwrap();
        let tx = SignedTransaction::decode(&bytes, 1024).unwrap();

        assert_eq!(tx.nonce, 9);
        assert_eq!(tx.gas_price, U256::from(20_000_000_000u64));
        assert_eq!(tx.gas_limit, 21_000);
        assert_eq!(tx.to, Some(Address::repeat_byte(0x35)));
        assert_eq!(tx.value, U256::from(1_000_000_000_000_000_000u128));
        assert!(tx.data.is_empty());
        assert_eq!(tx.v, 37);
        assert_eq!(tx.encode(), bytes);
        assert_eq!(hex::encode(tx.encode_for_chain(1)), EIP155_SIGNING_DATA);
    }

    #[test]
    fn test_signed_round_trip() {
        let tx = sample();
        let decoded = SignedTransaction::decode(&tx.encode(), 1024).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_unsigned_round_trip() {
        let tx = SignedTransaction {
            v: 0,
            r: U256::ZERO,
            s: U256::ZERO,
            to: None,
            ..sample()
        };
        let decoded = SignedTransaction::decode(&tx.encode_unsigned(), 1024).unwrap();
        assert_eq!(decoded, tx);
        assert!(decoded.is_create());
        assert!(decoded.is_unsigned());
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert!(matches!(
            SignedTransaction::decode(&[], 1024),
            Err(EvmError::MalformedTransaction(_))
        ));
        let tx = SignedTransaction {
            data: Bytes::from(vec![1u8; 2048]),
            ..sample()
        };
        assert!(matches!(
            SignedTransaction::decode(&tx.encode(), 1024),
            Err(EvmError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_field_count() {
        // [1, 2, 3]
        let bytes = [0xc3, 0x01, 0x02, 0x03];
        assert!(matches!(
            SignedTransaction::decode(&bytes, 1024),
            Err(EvmError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn test_rejects_non_list_and_trailing_bytes() {
        assert!(matches!(
            SignedTransaction::decode(&[0x83, 1, 2, 3], 1024),
            Err(EvmError::MalformedTransaction(_))
        ));

        let mut bytes = sample().encode();
        bytes.push(0x00);
        assert!(matches!(
            SignedTransaction::decode(&bytes, 1024),
            Err(EvmError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn test_rejects_short_destination() {
        // [0, 0, 0, 0x1234, 0, ""]
        let bytes = [0xc8, 0x80, 0x80, 0x80, 0x82, 0x12, 0x34, 0x80, 0x80];
        assert!(matches!(
            SignedTransaction::decode(&bytes, 1024),
            Err(EvmError::InvalidDestination(2))
        ));
    }

    #[test]
    fn test_rejects_oversized_value() {
        let mut payload = vec![0x80, 0x80, 0x80, 0x80];
        payload.push(0xa1); // 33-byte string
        payload.extend_from_slice(&[0xff; 33]);
        payload.push(0x80);
        let mut bytes = vec![0xc0 + payload.len() as u8];
        bytes.extend_from_slice(&payload);

        assert!(matches!(
            SignedTransaction::decode(&bytes, 1024),
            Err(EvmError::NegativeValue)
        ));
    }

    #[test]
    fn test_rejects_leading_zero_scalars() {
        // [5, 1, 21000, "", 0, ""]
        let canonical = [0xc9, 0x05, 0x01, 0x82, 0x52, 0x08, 0x80, 0x80, 0x80];
        let tx = SignedTransaction::decode(&canonical, 1024).unwrap();
        assert_eq!(tx.nonce, 5);
        assert_eq!(tx.encode_unsigned(), canonical);

        // Same list with the nonce written as 0x0005
        let padded = [0xca, 0x82, 0x00, 0x05, 0x01, 0x82, 0x52, 0x08, 0x80, 0x80, 0x80];
        assert!(matches!(
            SignedTransaction::decode(&padded, 1024),
            Err(EvmError::MalformedTransaction(_))
        ));

        // Value written as 0x00
        let zero_value = [0xc9, 0x05, 0x01, 0x82, 0x52, 0x08, 0x80, 0x00, 0x80];
        assert!(matches!(
            SignedTransaction::decode(&zero_value, 1024),
            Err(EvmError::MalformedTransaction(_))
        ));
    }
}
