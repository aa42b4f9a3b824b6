//! Host ledger interface
//!
//! Everything the EVM needs from the ledger it runs inside: the block
//! counter and clock, authorization checks, the current host transaction id,
//! native token transfers and RAM billing. [`MemoryHost`] is a deterministic
//! in-memory implementation for tests and embedding.

use crate::errors::{EvmError, Result};
use crate::types::{BlockNumber, NativeAmount, NativeName, Timestamp, B256};
use std::collections::{BTreeMap, BTreeSet};

/// Services provided by the host ledger
pub trait HostLedger {
    /// Current host block number
    fn block_num(&self) -> BlockNumber;

    /// Current host time, seconds since epoch
    fn now(&self) -> Timestamp;

    /// Whether `account` authorized the current action
    fn has_auth(&self, account: &NativeName) -> bool;

    /// Id of the host transaction carrying the current action
    fn transaction_id(&self) -> B256;

    /// Move native tokens between host accounts
    fn transfer(
        &mut self,
        from: &NativeName,
        to: &NativeName,
        amount: NativeAmount,
        memo: &str,
    ) -> Result<()>;

    /// Bill `bytes` of RAM to `payer`; negative values release RAM
    fn charge_ram(&mut self, payer: &NativeName, bytes: i64) -> Result<()>;

    /// Buy `bytes` of RAM for `payer`, paying `cost` native units
    fn buy_ram(&mut self, payer: &NativeName, bytes: u64, cost: NativeAmount) -> Result<()>;
}

/// `AuthorizationRequired` unless `account` authorized the current action
pub fn require_auth<H: HostLedger + ?Sized>(host: &H, account: &NativeName) -> Result<()> {
    if host.has_auth(account) {
        Ok(())
    } else {
        Err(EvmError::AuthorizationRequired(account.clone()))
    }
}

/// A native transfer issued through the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTransfer {
    pub from: NativeName,
    pub to: NativeName,
    pub amount: NativeAmount,
    pub memo: String,
}

/// In-memory host ledger
///
/// Records transfers and RAM billing instead of performing them, so tests
/// can assert on exactly what the EVM asked the host to do.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    block_num: BlockNumber,
    now: Timestamp,
    transaction_id: B256,
    authorized: BTreeSet<NativeName>,
    transfers: Vec<NativeTransfer>,
    ram_charges: BTreeMap<NativeName, i64>,
    ram_purchases: Vec<(NativeName, u64, NativeAmount)>,
}

impl MemoryHost {
    pub fn new(block_num: BlockNumber, now: Timestamp) -> Self {
        Self {
            block_num,
            now,
            ..Default::default()
        }
    }

    pub fn set_block(&mut self, block_num: BlockNumber, now: Timestamp) {
        self.block_num = block_num;
        self.now = now;
    }

    pub fn set_transaction_id(&mut self, id: B256) {
        self.transaction_id = id;
    }

    /// Authorize `account` for subsequent actions
    pub fn authorize(&mut self, account: impl Into<NativeName>) {
        self.authorized.insert(account.into());
    }

    pub fn revoke(&mut self, account: &NativeName) {
        self.authorized.remove(account);
    }

    pub fn clear_auth(&mut self) {
        self.authorized.clear();
    }

    pub fn transfers(&self) -> &[NativeTransfer] {
        &self.transfers
    }

    /// Net RAM billed to `payer` so far
    pub fn ram_charged(&self, payer: &NativeName) -> i64 {
        self.ram_charges.get(payer).copied().unwrap_or_default()
    }

    pub fn ram_purchases(&self) -> &[(NativeName, u64, NativeAmount)] {
        &self.ram_purchases
    }
}

impl HostLedger for MemoryHost {
    fn block_num(&self) -> BlockNumber {
        self.block_num
    }

    fn now(&self) -> Timestamp {
        self.now
    }

    fn has_auth(&self, account: &NativeName) -> bool {
        self.authorized.contains(account)
    }

    fn transaction_id(&self) -> B256 {
        self.transaction_id
    }

    fn transfer(
        &mut self,
        from: &NativeName,
        to: &NativeName,
        amount: NativeAmount,
        memo: &str,
    ) -> Result<()> {
        if amount <= 0 {
            return Err(EvmError::InvalidArgument(
                "transfer quantity must be positive".into(),
            ));
        }
        self.transfers.push(NativeTransfer {
            from: from.clone(),
            to: to.clone(),
            amount,
            memo: memo.to_string(),
        });
        Ok(())
    }

    fn charge_ram(&mut self, payer: &NativeName, bytes: i64) -> Result<()> {
        *self.ram_charges.entry(payer.clone()).or_default() += bytes;
        Ok(())
    }

    fn buy_ram(&mut self, payer: &NativeName, bytes: u64, cost: NativeAmount) -> Result<()> {
        self.ram_purchases.push((payer.clone(), bytes, cost));
        Ok(())
    }
}
