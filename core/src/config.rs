//! Deployment settings
//!
//! Values fixed for the lifetime of a deployment. Parameters that change at
//! runtime (gas price floor, RAM economics) live in the persisted
//! [`Config`](crate::resources::Config) and [`Resources`](crate::resources::Resources) rows.

use crate::constants::{MAX_TX_SIZE, WEI_DECIMALS};
use crate::errors::{EvmError, Result};
use crate::types::{NativeName, U256};
use revm::primitives::SpecId;
use serde::{Deserialize, Serialize};

/// Static configuration of one EVM deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvmSettings {
    /// EIP-155 chain id signatures must bind to
    pub chain_id: u64,
    /// Host account this contract runs as
    pub contract: NativeName,
    /// Host authority allowed to bypass the gas price floor
    pub privileged_authority: NativeName,
    /// Receiver of the fee transfer performed by `do_resources`
    pub fee_recipient: NativeName,
    /// Decimals of the host's native token
    pub native_decimals: u32,
    /// Upper bound for encoded transactions
    pub max_tx_size: usize,
    /// Hardfork rules used by the interpreter
    pub spec: SpecId,
}

impl Default for EvmSettings {
    fn default() -> Self {
        Self {
            chain_id: 40,
            contract: NativeName::from("eosio.evm"),
            privileged_authority: NativeName::from("eosio"),
            fee_recipient: NativeName::from("eosio.evmfee"),
            native_decimals: 4,
            max_tx_size: MAX_TX_SIZE,
            spec: SpecId::BERLIN,
        }
    }
}

impl EvmSettings {
    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings with a different chain id
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.native_decimals > WEI_DECIMALS {
            return Err(EvmError::InvalidArgument(format!(
                "native token cannot have more than {WEI_DECIMALS} decimals"
            )));
        }
        if self.max_tx_size == 0 || self.max_tx_size > MAX_TX_SIZE {
            return Err(EvmError::InvalidArgument(format!(
                "max_tx_size must be within 1..={MAX_TX_SIZE}"
            )));
        }
        Ok(())
    }

    /// Wei per smallest native unit
    pub fn native_scale(&self) -> U256 {
        U256::from(10u64).pow(U256::from(WEI_DECIMALS - self.native_decimals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = EvmSettings::default();
        assert_eq!(settings.chain_id, 40);
        assert_eq!(settings.max_tx_size, 131_072);
        assert_eq!(settings.native_scale(), U256::from(100_000_000_000_000u64));
    }

    #[test]
    fn test_from_json_partial() {
        let settings = EvmSettings::from_json(r#"{"chain_id": 1, "contract": "evm"}"#).unwrap();
        assert_eq!(settings.chain_id, 1);
        assert_eq!(settings.contract, NativeName::from("evm"));
        assert_eq!(settings.privileged_authority, NativeName::from("eosio"));
    }

    #[test]
    fn test_from_json_rejects_bad_decimals() {
        let err = EvmSettings::from_json(r#"{"native_decimals": 19}"#).unwrap_err();
        assert!(matches!(err, EvmError::InvalidArgument(_)));
    }
}
