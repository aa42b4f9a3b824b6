//! Account and storage tables
//!
//! Accounts are rows keyed by a dense index, with secondary indices by
//! address and by linked host account. Storage is partitioned per account
//! index, each partition keyed by a dense index with a secondary index by slot
//! key. Every row inserted or removed is metered in RAM bytes.

use crate::constants::{RAM_ACCOUNT, RAM_CODE_OVERHEAD, RAM_FIRST_STORAGE, RAM_STORAGE};
use crate::errors::{EvmError, Result};
use crate::hashing::keccak256;
use crate::types::{Address, Bytes, Hash, NativeName, Nonce, RowIndex, B256, U256};
use revm::primitives::KECCAK_EMPTY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An EVM account row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub index: RowIndex,
    pub address: Address,
    /// Host account this wallet is linked to, if any
    pub account: Option<NativeName>,
    pub nonce: Nonce,
    pub code: Bytes,
    pub balance: U256,
}

impl Account {
    /// No code, zero nonce and zero balance
    pub fn is_empty(&self) -> bool {
        self.code.is_empty() && self.nonce == 0 && self.balance.is_zero()
    }

    pub fn is_contract(&self) -> bool {
        !self.code.is_empty()
    }

    /// Linked accounts are wallets and are never pruned
    pub fn is_linked(&self) -> bool {
        self.account.is_some()
    }

    pub fn code_hash(&self) -> Hash {
        if self.code.is_empty() {
            KECCAK_EMPTY
        } else {
            keccak256(&self.code)
        }
    }
}

/// A storage slot row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub index: RowIndex,
    pub key: B256,
    pub value: U256,
}

/// Running RAM usage in bytes; negative when more was freed than allocated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RamMeter {
    bytes: i64,
}

impl RamMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> i64 {
        self.bytes
    }

    pub fn first_storage_emplaced(&mut self) {
        self.bytes += RAM_FIRST_STORAGE;
    }

    pub fn first_storage_erased(&mut self) {
        self.bytes -= RAM_FIRST_STORAGE;
    }

    pub fn storage_emplaced(&mut self) {
        self.bytes += RAM_STORAGE;
    }

    pub fn storage_erased(&mut self) {
        self.bytes -= RAM_STORAGE;
    }

    pub fn account_emplaced(&mut self) {
        self.bytes += RAM_ACCOUNT;
    }

    pub fn account_erased(&mut self) {
        self.bytes -= RAM_ACCOUNT;
    }

    pub fn code_added(&mut self, len: usize) {
        self.bytes += len as i64 + RAM_CODE_OVERHEAD;
    }

    pub fn code_removed(&mut self, len: usize) {
        self.bytes -= len as i64 + RAM_CODE_OVERHEAD;
    }
}

/// Account rows with their secondary indices
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTable {
    rows: BTreeMap<RowIndex, Account>,
    by_address: BTreeMap<Address, RowIndex>,
    by_account: BTreeMap<NativeName, RowIndex>,
}

/// Storage rows of one account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePartition {
    rows: BTreeMap<RowIndex, AccountState>,
    by_key: BTreeMap<B256, RowIndex>,
}

impl StoragePartition {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn find(&self, key: &B256) -> Option<&AccountState> {
        self.by_key.get(key).and_then(|index| self.rows.get(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccountState> {
        self.rows.values()
    }

    fn next_index(&self) -> RowIndex {
        self.rows.keys().next_back().map_or(0, |last| last + 1)
    }
}

/// The persisted account and storage tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    accounts: AccountTable,
    storage: BTreeMap<RowIndex, StoragePartition>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.rows.len()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.rows.values()
    }

    pub fn account(&self, index: RowIndex) -> Option<&Account> {
        self.accounts.rows.get(&index)
    }

    pub fn find_by_address(&self, address: &Address) -> Option<&Account> {
        self.accounts
            .by_address
            .get(address)
            .and_then(|index| self.accounts.rows.get(index))
    }

    pub fn find_by_native(&self, name: &NativeName) -> Option<&Account> {
        self.accounts
            .by_account
            .get(name)
            .and_then(|index| self.accounts.rows.get(index))
    }

    pub fn index_of(&self, address: &Address) -> Option<RowIndex> {
        self.accounts.by_address.get(address).copied()
    }

    /// Account by address, or `AccountNotFound`
    pub fn require(&self, address: &Address) -> Result<&Account> {
        self.find_by_address(address)
            .ok_or(EvmError::AccountNotFound(*address))
    }

    /// Insert a new account row and return its index
    pub fn create_account(
        &mut self,
        address: Address,
        native: Option<NativeName>,
        ram: &mut RamMeter,
    ) -> Result<RowIndex> {
        if self.accounts.by_address.contains_key(&address) {
            return Err(EvmError::AccountExists(address));
        }
        if let Some(name) = &native {
            if self.accounts.by_account.contains_key(name) {
                return Err(EvmError::InvalidArgument(format!(
                    "host account {name} already has a linked EVM account"
                )));
            }
        }

        let index = self
            .accounts
            .rows
            .keys()
            .next_back()
            .map_or(0, |last| last + 1);
        self.insert_row(Account {
            index,
            address,
            account: native,
            ..Default::default()
        });
        ram.account_emplaced();
        Ok(index)
    }

    /// Remove an account row; its storage must already be cleared
    pub fn remove_account(&mut self, index: RowIndex, ram: &mut RamMeter) -> Result<Account> {
        if self.storage.get(&index).is_some_and(|p| !p.is_empty()) {
            return Err(EvmError::InvalidArgument(format!(
                "account {index} still owns storage"
            )));
        }
        let row = self
            .accounts
            .rows
            .remove(&index)
            .ok_or_else(|| missing_row(index))?;
        self.accounts.by_address.remove(&row.address);
        if let Some(name) = &row.account {
            self.accounts.by_account.remove(name);
        }
        self.storage.remove(&index);

        if !row.code.is_empty() {
            ram.code_removed(row.code.len());
        }
        ram.account_erased();
        Ok(row)
    }

    /// Put back a removed row under its original index
    pub fn reinsert_account(&mut self, row: Account, ram: &mut RamMeter) -> Result<()> {
        if self.accounts.rows.contains_key(&row.index) {
            return Err(EvmError::Journal(format!(
                "account row {} is occupied",
                row.index
            )));
        }
        if self.accounts.by_address.contains_key(&row.address) {
            return Err(EvmError::AccountExists(row.address));
        }
        ram.account_emplaced();
        if !row.code.is_empty() {
            ram.code_added(row.code.len());
        }
        self.insert_row(row);
        Ok(())
    }

    /// Returns the previous balance
    pub fn set_balance(&mut self, index: RowIndex, balance: U256) -> Result<U256> {
        let row = self.row_mut(index)?;
        Ok(std::mem::replace(&mut row.balance, balance))
    }

    /// Returns the previous nonce
    pub fn set_nonce(&mut self, index: RowIndex, nonce: Nonce) -> Result<Nonce> {
        let row = self.row_mut(index)?;
        Ok(std::mem::replace(&mut row.nonce, nonce))
    }

    /// Replace code, metering the old and new code rows; returns the old code
    pub fn set_code(&mut self, index: RowIndex, code: Bytes, ram: &mut RamMeter) -> Result<Bytes> {
        let row = self.row_mut(index)?;
        let old = std::mem::replace(&mut row.code, code);
        if !old.is_empty() {
            ram.code_removed(old.len());
        }
        if !row.code.is_empty() {
            ram.code_added(row.code.len());
        }
        Ok(old)
    }

    /// Slot value, zero when the slot has no row
    pub fn load(&self, index: RowIndex, key: &B256) -> U256 {
        self.storage
            .get(&index)
            .and_then(|partition| partition.find(key))
            .map_or(U256::ZERO, |slot| slot.value)
    }

    /// Strict slot lookup
    pub fn find_slot(&self, index: RowIndex, key: &B256) -> Result<&AccountState> {
        self.storage
            .get(&index)
            .and_then(|partition| partition.find(key))
            .ok_or(EvmError::StorageKeyNotFound {
                account: index,
                key: *key,
            })
    }

    /// Row index currently holding `key`, if the slot has a row
    pub fn slot_row(&self, index: RowIndex, key: &B256) -> Option<RowIndex> {
        self.storage
            .get(&index)
            .and_then(|partition| partition.by_key.get(key).copied())
    }

    pub fn partition(&self, index: RowIndex) -> Option<&StoragePartition> {
        self.storage.get(&index)
    }

    /// Keys of every slot owned by the account, in row order
    pub fn storage_keys(&self, index: RowIndex) -> Vec<B256> {
        self.storage
            .get(&index)
            .map(|partition| partition.iter().map(|slot| slot.key).collect())
            .unwrap_or_default()
    }

    /// Write a slot, creating its row on first non-zero value and erasing it
    /// when the value returns to zero. Returns the previous value.
    pub fn store(
        &mut self,
        index: RowIndex,
        key: B256,
        value: U256,
        ram: &mut RamMeter,
    ) -> Result<U256> {
        if !self.accounts.rows.contains_key(&index) {
            return Err(missing_row(index));
        }
        let partition = self.storage.entry(index).or_default();

        match partition.by_key.get(&key).copied() {
            Some(row_index) if value.is_zero() => {
                partition.by_key.remove(&key);
                let old = partition
                    .rows
                    .remove(&row_index)
                    .map_or(U256::ZERO, |slot| slot.value);
                if partition.is_empty() {
                    ram.first_storage_erased();
                    self.storage.remove(&index);
                } else {
                    ram.storage_erased();
                }
                Ok(old)
            }
            Some(row_index) => {
                let slot = partition
                    .rows
                    .get_mut(&row_index)
                    .ok_or_else(|| EvmError::Journal(format!("dangling storage key {key}")))?;
                Ok(std::mem::replace(&mut slot.value, value))
            }
            None if value.is_zero() => {
                if partition.is_empty() {
                    self.storage.remove(&index);
                }
                Ok(U256::ZERO)
            }
            None => {
                if partition.is_empty() {
                    ram.first_storage_emplaced();
                } else {
                    ram.storage_emplaced();
                }
                let row_index = partition.next_index();
                partition.rows.insert(
                    row_index,
                    AccountState {
                        index: row_index,
                        key,
                        value,
                    },
                );
                partition.by_key.insert(key, row_index);
                Ok(U256::ZERO)
            }
        }
    }

    /// Put back an erased slot row under its original index
    pub fn reinsert_slot(
        &mut self,
        index: RowIndex,
        slot: AccountState,
        ram: &mut RamMeter,
    ) -> Result<()> {
        if !self.accounts.rows.contains_key(&index) {
            return Err(missing_row(index));
        }
        let partition = self.storage.entry(index).or_default();
        if partition.rows.contains_key(&slot.index) || partition.by_key.contains_key(&slot.key) {
            return Err(EvmError::Journal(format!(
                "storage row {} of account {index} is occupied",
                slot.index
            )));
        }
        if partition.is_empty() {
            ram.first_storage_emplaced();
        } else {
            ram.storage_emplaced();
        }
        partition.by_key.insert(slot.key, slot.index);
        partition.rows.insert(slot.index, slot);
        Ok(())
    }

    fn insert_row(&mut self, row: Account) {
        self.accounts.by_address.insert(row.address, row.index);
        if let Some(name) = &row.account {
            self.accounts.by_account.insert(name.clone(), row.index);
        }
        self.accounts.rows.insert(row.index, row);
    }

    fn row_mut(&mut self, index: RowIndex) -> Result<&mut Account> {
        self.accounts
            .rows
            .get_mut(&index)
            .ok_or_else(|| missing_row(index))
    }
}

fn missing_row(index: RowIndex) -> EvmError {
    EvmError::InvalidArgument(format!("no account row {index}"))
}
