//! Journaled execution context
//!
//! The only way execution touches the ledger. Every mutation goes through a
//! method here that records its journal entry first, so any of them can be
//! rolled back.

use crate::block::BlockContext;
use crate::errors::{EvmError, Result};
use crate::gas::{sstore_gas, SstoreGas};
use crate::journal::{Journal, StateModification, TxEffects};
use crate::ledger::{Account, Ledger};
use crate::output::Log;
use crate::types::{Address, Bytes, Nonce, RowIndex, B256, U256};
use tracing::trace;

/// Mutable view of the ledger for one transaction
pub struct ExecutionContext<'a> {
    ledger: &'a mut Ledger,
    journal: &'a mut Journal,
    effects: &'a mut TxEffects,
    block: &'a BlockContext,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        ledger: &'a mut Ledger,
        journal: &'a mut Journal,
        effects: &'a mut TxEffects,
        block: &'a BlockContext,
    ) -> Self {
        Self {
            ledger,
            journal,
            effects,
            block,
        }
    }

    pub fn block(&self) -> &BlockContext {
        self.block
    }

    pub fn ledger(&self) -> &Ledger {
        self.ledger
    }

    pub fn effects(&self) -> &TxEffects {
        self.effects
    }

    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }

    /// Undo everything recorded after `checkpoint`
    pub fn revert_to(&mut self, checkpoint: usize) -> Result<usize> {
        self.journal
            .revert_to(checkpoint, self.ledger, self.effects)
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.ledger.find_by_address(address)
    }

    pub fn exists(&self, address: &Address) -> bool {
        self.ledger.index_of(address).is_some()
    }

    pub fn balance(&self, address: &Address) -> U256 {
        self.account(address).map_or(U256::ZERO, |row| row.balance)
    }

    pub fn nonce(&self, address: &Address) -> Nonce {
        self.account(address).map_or(0, |row| row.nonce)
    }

    pub fn code(&self, address: &Address) -> Bytes {
        self.account(address)
            .map(|row| row.code.clone())
            .unwrap_or_default()
    }

    /// Current slot value
    pub fn storage(&self, address: &Address, key: &B256) -> U256 {
        self.ledger
            .index_of(address)
            .map_or(U256::ZERO, |index| self.ledger.load(index, key))
    }

    /// Slot value before this transaction first wrote it
    pub fn original_storage(&self, address: &Address, key: &B256) -> U256 {
        let Some(index) = self.ledger.index_of(address) else {
            return U256::ZERO;
        };
        self.effects
            .original_storage
            .get(&(index, *key))
            .copied()
            .unwrap_or_else(|| self.ledger.load(index, key))
    }

    /// Index of the account at `address`, creating an empty one if needed
    pub fn get_or_create_account(&mut self, address: Address) -> Result<RowIndex> {
        if let Some(index) = self.ledger.index_of(&address) {
            return Ok(index);
        }
        let index = self
            .ledger
            .create_account(address, None, &mut self.effects.ram)?;
        self.journal
            .record(StateModification::CreateAccount { account: index });
        trace!(%address, index, "account created");
        Ok(index)
    }

    /// Move `amount` between two accounts, creating the receiver if needed
    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let from_index = self.require_index(&from)?;
        let to_index = self.get_or_create_account(to)?;

        let available = self.balance(&from);
        let debited = available
            .checked_sub(amount)
            .ok_or(EvmError::InsufficientBalance {
                address: from,
                required: amount,
                available,
            })?;
        let credited = self
            .balance(&to)
            .checked_add(amount)
            .ok_or_else(|| EvmError::InvalidArgument(format!("balance overflow on {to}")))?;

        self.journal.record(StateModification::Transfer {
            from: Some(from_index),
            to: Some(to_index),
            amount,
        });
        self.ledger.set_balance(from_index, debited)?;
        self.ledger.set_balance(to_index, credited)?;
        Ok(())
    }

    /// Add funds entering the ledger from outside
    pub fn credit(&mut self, address: Address, amount: U256) -> Result<()> {
        let index = self.get_or_create_account(address)?;
        let balance = self
            .balance(&address)
            .checked_add(amount)
            .ok_or_else(|| EvmError::InvalidArgument(format!("balance overflow on {address}")))?;
        self.journal.record(StateModification::Transfer {
            from: None,
            to: Some(index),
            amount,
        });
        self.ledger.set_balance(index, balance)?;
        Ok(())
    }

    /// Remove funds leaving the ledger
    pub fn debit(&mut self, address: Address, amount: U256) -> Result<()> {
        let index = self.require_index(&address)?;
        let available = self.balance(&address);
        let balance = available
            .checked_sub(amount)
            .ok_or(EvmError::InsufficientBalance {
                address,
                required: amount,
                available,
            })?;
        self.journal.record(StateModification::Transfer {
            from: Some(index),
            to: None,
            amount,
        });
        self.ledger.set_balance(index, balance)?;
        Ok(())
    }

    /// Set an absolute balance, journaled as a credit or debit of the difference
    pub fn set_balance(&mut self, address: Address, balance: U256) -> Result<()> {
        let current = self.balance(&address);
        if balance > current {
            self.credit(address, balance - current)
        } else if balance < current {
            self.debit(address, current - balance)
        } else {
            Ok(())
        }
    }

    pub fn increment_nonce(&mut self, address: Address) -> Result<Nonce> {
        let index = self.get_or_create_account(address)?;
        let nonce = self.nonce(&address);
        let next = nonce
            .checked_add(1)
            .ok_or_else(|| EvmError::InvalidArgument(format!("nonce overflow on {address}")))?;
        self.journal
            .record(StateModification::IncrementNonce { account: index });
        self.ledger.set_nonce(index, next)?;
        Ok(next)
    }

    pub fn set_code(&mut self, address: Address, code: Bytes) -> Result<()> {
        let index = self.get_or_create_account(address)?;
        let old = self.ledger.set_code(index, code, &mut self.effects.ram)?;
        self.journal
            .record(StateModification::SetCode { account: index, old });
        Ok(())
    }

    /// Write a slot, caching its pre-transaction value on first write
    pub fn write_storage(&mut self, address: Address, key: B256, value: U256) -> Result<()> {
        let index = self.get_or_create_account(address)?;
        let current = self.ledger.load(index, &key);

        if !self.effects.original_storage.contains_key(&(index, key)) {
            self.effects.original_storage.insert((index, key), current);
            self.journal.record(StateModification::OriginalStorage {
                account: index,
                key,
            });
        }
        if current == value {
            return Ok(());
        }

        let row = self.ledger.slot_row(index, &key);
        self.ledger.store(index, key, value, &mut self.effects.ram)?;
        self.journal.record(StateModification::StoreKv {
            account: index,
            key,
            row,
            old: current,
            new: value,
        });
        Ok(())
    }

    /// Metered SSTORE: access, price, then write
    pub fn sstore(&mut self, address: Address, key: B256, value: U256) -> Result<SstoreGas> {
        let cold = self.access_slot(address, key);
        let original = self.original_storage(&address, &key);
        let current = self.storage(&address, &key);
        let gas = sstore_gas(original, current, value, cold);
        self.write_storage(address, key, value)?;
        Ok(gas)
    }

    pub fn emit_log(&mut self, log: Log) {
        self.effects.logs.push(log);
        self.journal.record(StateModification::Log);
    }

    pub fn mark_selfdestruct(&mut self, address: Address) {
        self.effects.selfdestructs.push(address);
        self.journal.record(StateModification::SelfDestruct);
    }

    /// Warm `address`; returns whether it was cold
    pub fn access_address(&mut self, address: Address) -> bool {
        if self.effects.access_list.contains_key(&address) {
            return false;
        }
        self.effects.access_list.insert(address, Vec::new());
        self.journal
            .record(StateModification::AccessListAddress { address });
        true
    }

    /// Warm a slot (and its address); returns whether the slot was cold
    pub fn access_slot(&mut self, address: Address, key: B256) -> bool {
        self.access_address(address);
        let slots = self.effects.access_list.entry(address).or_default();
        if slots.contains(&key) {
            return false;
        }
        slots.push(key);
        self.journal
            .record(StateModification::AccessListSlot { address, key });
        true
    }

    /// Remove `address` if it is an empty, unlinked account without storage
    pub fn prune_account(&mut self, address: Address) -> Result<bool> {
        let Some(row) = self.account(&address) else {
            return Ok(false);
        };
        if !row.is_empty() || row.is_linked() || self.ledger.partition(row.index).is_some() {
            return Ok(false);
        }
        let index = row.index;
        let snapshot = self.ledger.remove_account(index, &mut self.effects.ram)?;
        self.journal
            .record(StateModification::RemoveAccount { snapshot });
        trace!(%address, "pruned empty account");
        Ok(true)
    }

    /// Wipe a self-destructed account: storage, balance, code, then the row.
    /// Linked wallets keep their row.
    pub fn destroy_account(&mut self, address: Address) -> Result<()> {
        let Some(index) = self.ledger.index_of(&address) else {
            return Ok(());
        };
        for key in self.ledger.storage_keys(index) {
            self.write_storage(address, key, U256::ZERO)?;
        }
        let balance = self.balance(&address);
        if !balance.is_zero() {
            self.debit(address, balance)?;
        }

        let linked = self
            .ledger
            .account(index)
            .is_some_and(|row| row.is_linked());
        if linked {
            self.set_code(address, Bytes::new())?;
        } else {
            let snapshot = self.ledger.remove_account(index, &mut self.effects.ram)?;
            self.journal
                .record(StateModification::RemoveAccount { snapshot });
        }
        trace!(%address, linked, "destroyed account");
        Ok(())
    }

    fn require_index(&self, address: &Address) -> Result<RowIndex> {
        self.ledger
            .index_of(address)
            .ok_or(EvmError::AccountNotFound(*address))
    }
}
