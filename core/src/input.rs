//! Interpreter input
//!
//! A validated transaction reduced to what the interpreter needs to run it.
//! Fees are settled outside the interpreter, so there is no gas price here.

use crate::transaction::EthereumTransaction;
use crate::types::{Address, Bytes, Gas, U256};
use serde::{Deserialize, Serialize};

/// One top-level call or create handed to the interpreter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Caller address (tx.origin and initial msg.sender)
    pub caller: Address,
    /// Target contract address (None for contract creation)
    pub to: Option<Address>,
    /// Value to transfer (in wei)
    pub value: U256,
    /// Input data (calldata or init code)
    pub data: Bytes,
    /// Gas available to execution, intrinsic gas included
    pub gas_limit: Gas,
}

impl Default for CallRequest {
    fn default() -> Self {
        Self {
            caller: Address::ZERO,
            to: None,
            value: U256::ZERO,
            data: Bytes::new(),
            gas_limit: 10_000_000,
        }
    }
}

impl CallRequest {
    /// Request for a decoded transaction sent by `caller`. The caller's
    /// nonce is checked and bumped by the processor, not the interpreter.
    pub fn from_transaction(tx: &EthereumTransaction, caller: Address) -> Self {
        let signed = tx.signed();
        Self {
            caller,
            to: signed.to,
            value: signed.value,
            data: signed.data.clone(),
            gas_limit: signed.gas_limit,
        }
    }

    pub fn call(caller: Address, to: Address, data: Bytes) -> Self {
        Self {
            caller,
            to: Some(to),
            data,
            ..Default::default()
        }
    }

    pub fn transfer(caller: Address, to: Address, value: U256) -> Self {
        Self {
            caller,
            to: Some(to),
            value,
            gas_limit: 21_000,
            ..Default::default()
        }
    }

    pub fn create(caller: Address, init_code: Bytes, value: U256) -> Self {
        Self {
            caller,
            to: None,
            data: init_code,
            value,
            ..Default::default()
        }
    }

    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    pub fn with_gas_limit(mut self, gas_limit: Gas) -> Self {
        self.gas_limit = gas_limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let caller = Address::repeat_byte(0x01);
        let transfer = CallRequest::transfer(caller, Address::repeat_byte(0x02), U256::from(5u64));
        assert_eq!(transfer.gas_limit, 21_000);
        assert!(!transfer.is_create());

        let create = CallRequest::create(caller, Bytes::from(vec![0x00]), U256::ZERO)
            .with_gas_limit(60_000);
        assert!(create.is_create());
        assert_eq!(create.gas_limit, 60_000);
    }
}
