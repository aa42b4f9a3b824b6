//! Gas accounting
//!
//! Intrinsic cost, the gas price floor, storage write pricing for interpreters
//! that meter SSTORE through the execution context, and RAM converted to gas.

use crate::constants::{
    GP_COLD_SLOAD, GP_SSTORE_CLEARS_REFUND, GP_SSTORE_RESET, GP_SSTORE_SET, GP_TRANSACTION,
    GP_TXCREATE, GP_TXDATANONZERO, GP_TXDATAZERO, GP_WARM_STORAGE_READ,
};
use crate::errors::{EvmError, Result};
use crate::types::{Gas, U256};

/// Gas charged before any code runs
pub fn intrinsic_gas(data: &[u8], is_create: bool) -> Gas {
    let zeros = data.iter().filter(|b| **b == 0).count() as u64;
    let non_zeros = data.len() as u64 - zeros;

    let mut gas = GP_TRANSACTION + zeros * GP_TXDATAZERO + non_zeros * GP_TXDATANONZERO;
    if is_create {
        gas += GP_TXCREATE;
    }
    gas
}

/// Intrinsic gas, or `GasLimitTooLow` if it does not fit in `gas_limit`
pub fn check_intrinsic(data: &[u8], is_create: bool, gas_limit: Gas) -> Result<Gas> {
    let required = intrinsic_gas(data, is_create);
    if required > gas_limit {
        return Err(EvmError::GasLimitTooLow {
            limit: gas_limit,
            required,
        });
    }
    Ok(required)
}

/// Price actually charged per unit of gas
///
/// Offers below the floor are only accepted from the privileged authority,
/// which then pays its offered price. Everyone else pays the floor.
pub fn resolve_gas_price(offered: U256, floor: U256, privileged: bool) -> Result<U256> {
    if offered < floor {
        if privileged {
            return Ok(offered);
        }
        return Err(EvmError::GasPriceTooLow { offered, floor });
    }
    Ok(floor)
}

/// Cost and refund delta of one storage write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SstoreGas {
    pub cost: Gas,
    /// May be negative when an earlier refund is taken back
    pub refund: i64,
}

/// EIP-2200 storage write pricing with EIP-2929 cold access
pub fn sstore_gas(original: U256, current: U256, new: U256, cold: bool) -> SstoreGas {
    let mut cost = if cold { GP_COLD_SLOAD } else { 0 };
    let mut refund = 0i64;

    if current == new {
        cost += GP_WARM_STORAGE_READ;
        return SstoreGas { cost, refund };
    }

    if original == current {
        if original.is_zero() {
            cost += GP_SSTORE_SET;
        } else {
            cost += GP_SSTORE_RESET;
            if new.is_zero() {
                refund += GP_SSTORE_CLEARS_REFUND;
            }
        }
        return SstoreGas { cost, refund };
    }

    // Dirty slot
    cost += GP_WARM_STORAGE_READ;
    if !original.is_zero() {
        if current.is_zero() {
            refund -= GP_SSTORE_CLEARS_REFUND;
        } else if new.is_zero() {
            refund += GP_SSTORE_CLEARS_REFUND;
        }
    }
    if original == new {
        let restored = if original.is_zero() {
            GP_SSTORE_SET
        } else {
            GP_SSTORE_RESET
        };
        refund += (restored - GP_WARM_STORAGE_READ) as i64;
    }
    SstoreGas { cost, refund }
}

/// Gas charged for net RAM growth; freed RAM is not credited back as gas
pub fn ram_gas(ram_bytes: i64, gas_per_byte: u64) -> Gas {
    if ram_bytes <= 0 {
        return 0;
    }
    (ram_bytes as u64).saturating_mul(gas_per_byte)
}

/// Fee for `gas_used` at `price`, saturating instead of wrapping
pub fn gas_fee(gas_used: Gas, price: U256) -> U256 {
    price.saturating_mul(U256::from(gas_used))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_intrinsic_gas() {
        assert_eq!(intrinsic_gas(&[], false), 21_000);
        assert_eq!(intrinsic_gas(&[], true), 53_000);
        assert_eq!(intrinsic_gas(&[0, 0, 1], false), 21_000 + 4 + 4 + 16);
    }

    #[test]
    fn test_gas_limit_too_low_iff_intrinsic_exceeds_limit() {
        assert_eq!(check_intrinsic(&[], true, 53_000).unwrap(), 53_000);
        assert!(matches!(
            check_intrinsic(&[], true, 52_999),
            Err(EvmError::GasLimitTooLow {
                limit: 52_999,
                required: 53_000
            })
        ));
        assert!(check_intrinsic(&[1], false, 21_016).is_ok());
        assert!(check_intrinsic(&[1], false, 21_015).is_err());
    }

    #[test]
    fn test_gas_price_floor() {
        assert_eq!(resolve_gas_price(word(5), word(1), false).unwrap(), word(1));
        assert_eq!(resolve_gas_price(word(1), word(1), false).unwrap(), word(1));
        assert!(matches!(
            resolve_gas_price(word(0), word(1), false),
            Err(EvmError::GasPriceTooLow { .. })
        ));
    }

    #[test]
    fn test_gas_price_privileged_bypass_pays_offered() {
        assert_eq!(resolve_gas_price(word(0), word(10), true).unwrap(), word(0));
        assert_eq!(resolve_gas_price(word(3), word(10), true).unwrap(), word(3));
    }

    #[test]
    fn test_sstore_fresh_slot() {
        let gas = sstore_gas(word(0), word(0), word(1), true);
        assert_eq!(gas.cost, 22_100);
        assert_eq!(gas.refund, 0);
    }

    #[test]
    fn test_sstore_noop_is_warm_read() {
        let gas = sstore_gas(word(1), word(1), word(1), false);
        assert_eq!(gas, SstoreGas { cost: 100, refund: 0 });
    }

    #[test]
    fn test_sstore_clear_refunds() {
        let gas = sstore_gas(word(1), word(1), word(0), false);
        assert_eq!(gas.cost, 2_900);
        assert_eq!(gas.refund, 15_000);
    }

    #[test]
    fn test_sstore_dirty_restore_to_original_zero() {
        // 0 -> 1 -> 0 within one transaction
        let gas = sstore_gas(word(0), word(1), word(0), false);
        assert_eq!(gas.cost, 100);
        assert_eq!(gas.refund, 19_900);
    }

    #[test]
    fn test_sstore_dirty_undo_clear() {
        // 1 -> 0 -> 2 takes the clearing refund back
        let gas = sstore_gas(word(1), word(0), word(2), false);
        assert_eq!(gas.cost, 100);
        assert_eq!(gas.refund, -15_000);
    }

    #[test]
    fn test_ram_gas() {
        assert_eq!(ram_gas(-100, 10), 0);
        assert_eq!(ram_gas(0, 10), 0);
        assert_eq!(ram_gas(478, 10), 4_780);
    }

    #[test]
    fn test_gas_fee() {
        assert_eq!(gas_fee(21_000, word(2)), word(42_000));
        assert_eq!(gas_fee(1, U256::MAX), U256::MAX);
    }
}
