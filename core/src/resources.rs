//! Persisted singletons: per-block counters and RAM economics

use crate::config::EvmSettings;
use crate::errors::{EvmError, Result};
use crate::host::HostLedger;
use crate::types::{BlockNumber, NativeAmount, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Block counters and the gas price floor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Index of the last transaction within `last_block`
    pub trx_index: u32,
    pub last_block: BlockNumber,
    /// Gas used by all transactions of `last_block`
    pub gas_used_block: U256,
    /// Minimum gas price
    pub gas_price: U256,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trx_index: 0,
            last_block: 0,
            gas_used_block: U256::ZERO,
            gas_price: U256::from(1u64),
        }
    }
}

impl Config {
    /// Counters for the next transaction executed in `block`
    ///
    /// The result is staged on the transaction and written back only when
    /// the transaction commits.
    pub fn begin_transaction(&self, block: BlockNumber) -> Config {
        let mut next = self.clone();
        if block != self.last_block {
            next.trx_index = 0;
            next.last_block = block;
            next.gas_used_block = U256::ZERO;
        } else {
            next.trx_index = self.trx_index.saturating_add(1);
        }
        next
    }
}

/// Arguments of the one-time resource initialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInit {
    /// RAM bought up front
    pub start_bytes: u64,
    /// Native cost of `start_bytes`
    pub start_cost: NativeAmount,
    pub target_free: u64,
    pub min_buy: u64,
    pub fee_transfer_pct: u16,
    pub gas_per_byte: u64,
}

/// RAM economics of the contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub initialized: bool,
    /// Gas charged per RAM byte when the contract pays for RAM
    pub gas_per_byte: u64,
    /// Wei per RAM byte
    pub byte_cost: U256,
    pub bytes_used: u64,
    pub bytes_bought: u64,
    pub target_bytes_free: u64,
    pub min_byte_buy: u64,
    /// Gas fees collected and not yet spent or transferred, in wei
    pub fee_balance: U256,
    pub fee_transfer_pct: u16,
}

impl Resources {
    /// Set the RAM parameters and buy the initial RAM; allowed once
    pub fn init<H: HostLedger + ?Sized>(
        &mut self,
        host: &mut H,
        settings: &EvmSettings,
        params: &ResourceInit,
    ) -> Result<()> {
        if self.initialized {
            return Err(EvmError::AlreadyInitialized);
        }
        if params.start_bytes == 0 || params.start_cost <= 0 {
            return Err(EvmError::InvalidArgument(
                "start bytes and start cost must be positive".into(),
            ));
        }
        check_pct(u64::from(params.fee_transfer_pct))?;

        let cost_wei = U256::from(params.start_cost as u64) * settings.native_scale();
        self.byte_cost = cost_wei / U256::from(params.start_bytes);
        self.bytes_bought = params.start_bytes;
        self.target_bytes_free = params.target_free;
        self.min_byte_buy = params.min_buy;
        self.fee_transfer_pct = params.fee_transfer_pct;
        self.gas_per_byte = params.gas_per_byte;
        self.initialized = true;

        host.buy_ram(&settings.contract, params.start_bytes, params.start_cost)?;
        debug!(byte_cost = %self.byte_cost, bytes = params.start_bytes, "resources initialized");
        Ok(())
    }

    pub fn set_resources(
        &mut self,
        gas_per_byte: u64,
        target_free: u64,
        min_buy: u64,
        fee_transfer_pct: u64,
    ) -> Result<()> {
        check_pct(fee_transfer_pct)?;
        self.gas_per_byte = gas_per_byte;
        self.target_bytes_free = target_free;
        self.min_byte_buy = min_buy;
        self.fee_transfer_pct = fee_transfer_pct as u16;
        Ok(())
    }

    /// Bytes bought and not yet used
    pub fn free_bytes(&self) -> u64 {
        self.bytes_bought.saturating_sub(self.bytes_used)
    }

    /// Top up RAM from the fee balance, then pass a share of the remaining
    /// fees to the fee recipient
    pub fn do_resources<H: HostLedger + ?Sized>(
        &mut self,
        host: &mut H,
        settings: &EvmSettings,
    ) -> Result<()> {
        let scale = settings.native_scale();

        let free = self.free_bytes();
        if free < self.target_bytes_free {
            let bytes = (self.target_bytes_free - free).max(self.min_byte_buy);
            let cost_wei = self.byte_cost.saturating_mul(U256::from(bytes));
            // The host is paid whole native units, rounded up
            let cost = native_amount((cost_wei + scale - U256::from(1u64)) / scale)?;
            let remaining = self
                .fee_balance
                .checked_sub(U256::from(cost as u64) * scale)
                .ok_or_else(|| {
                    EvmError::InvalidArgument(format!(
                        "fee balance {} cannot pay for {bytes} bytes of RAM",
                        self.fee_balance
                    ))
                })?;

            host.buy_ram(&settings.contract, bytes, cost)?;
            self.fee_balance = remaining;
            self.bytes_bought += bytes;
            debug!(bytes, cost, "bought RAM");
        }

        let share = self.fee_balance * U256::from(self.fee_transfer_pct) / U256::from(100u64);
        let amount = native_amount(share / scale)?;
        if amount > 0 {
            host.transfer(
                &settings.contract,
                &settings.fee_recipient,
                amount,
                "EVM fees",
            )?;
            self.fee_balance -= U256::from(amount as u64) * scale;
            debug!(amount, "transferred fees");
        }
        Ok(())
    }

    /// Apply a transaction's net RAM usage, never going below zero
    pub fn record_ram(&mut self, bytes: i64) {
        if bytes >= 0 {
            self.bytes_used = self.bytes_used.saturating_add(bytes as u64);
        } else {
            self.bytes_used = self.bytes_used.saturating_sub(bytes.unsigned_abs());
        }
    }

    pub fn collect_fee(&mut self, fee: U256) {
        self.fee_balance = self.fee_balance.saturating_add(fee);
    }
}

fn check_pct(pct: u64) -> Result<()> {
    if pct > 100 {
        return Err(EvmError::InvalidArgument(
            "fee transfer percentage cannot exceed 100".into(),
        ));
    }
    Ok(())
}

fn native_amount(value: U256) -> Result<NativeAmount> {
    i64::try_from(value).map_err(|_| {
        EvmError::InvalidArgument(format!("{value} does not fit a native amount"))
    })
}
