//! State-modification journal
//!
//! Every mutation made while a transaction runs is recorded here before it is
//! applied. Rolling back replays the entries in reverse, each through its own
//! inverse, until the ledger and the per-transaction effects are back at the
//! checkpoint.

use crate::errors::{EvmError, Result};
use crate::ledger::{Account, AccountState, Ledger, RamMeter};
use crate::output::Log;
use crate::types::{Address, Bytes, RowIndex, B256, U256};
use std::collections::BTreeMap;
use tracing::{error, trace};

/// A single recorded mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateModification {
    /// Action: slot `key` of `account` went from `old` to `new`
    /// Revert: write `old` back (erasing the row when `old` is zero), or
    /// reinsert the erased row under `row` when `new` cleared it
    StoreKv {
        account: RowIndex,
        key: B256,
        /// Row that held the slot before the write
        row: Option<RowIndex>,
        old: U256,
        new: U256,
    },
    /// Action: a fresh account row was inserted
    /// Revert: remove the row
    CreateAccount { account: RowIndex },
    /// Action: code replaced
    /// Revert: restore `old`
    SetCode { account: RowIndex, old: Bytes },
    /// Action: nonce incremented by one
    /// Revert: decrement by one
    IncrementNonce { account: RowIndex },
    /// Action: first value of a slot seen this transaction was cached
    /// Revert: forget the cached value
    OriginalStorage { account: RowIndex, key: B256 },
    /// Action: `amount` moved from `from` to `to`; `None` is outside the ledger
    /// Revert: move it back
    Transfer {
        from: Option<RowIndex>,
        to: Option<RowIndex>,
        amount: U256,
    },
    /// Action: a log was emitted
    /// Revert: drop the last log
    Log,
    /// Action: an address was scheduled for destruction
    /// Revert: drop the last scheduled address
    SelfDestruct,
    /// Action: an address was added to the access list
    /// Revert: remove it
    AccessListAddress { address: Address },
    /// Action: a slot was added to an address' access list entry
    /// Revert: remove it
    AccessListSlot { address: Address, key: B256 },
    /// Action: an account row was removed
    /// Revert: reinsert the snapshot under its original index
    RemoveAccount { snapshot: Account },
}

/// Per-transaction collections the journal keeps in step with the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxEffects {
    pub logs: Vec<Log>,
    pub selfdestructs: Vec<Address>,
    /// Touched addresses and, per address, touched slots in touch order
    pub access_list: BTreeMap<Address, Vec<B256>>,
    /// Value of each slot before this transaction first wrote it
    pub original_storage: BTreeMap<(RowIndex, B256), U256>,
    pub ram: RamMeter,
}

impl StateModification {
    /// Undo this entry against the ledger and the effects
    pub fn invert(&self, ledger: &mut Ledger, effects: &mut TxEffects) -> Result<()> {
        match self {
            StateModification::StoreKv {
                account,
                key,
                row: Some(row),
                old,
                new,
            } if new.is_zero() && !old.is_zero() => {
                let slot = AccountState {
                    index: *row,
                    key: *key,
                    value: *old,
                };
                ledger.reinsert_slot(*account, slot, &mut effects.ram)?;
            }
            StateModification::StoreKv {
                account, key, old, ..
            } => {
                ledger.store(*account, *key, *old, &mut effects.ram)?;
            }
            StateModification::CreateAccount { account } => {
                ledger.remove_account(*account, &mut effects.ram)?;
            }
            StateModification::SetCode { account, old } => {
                ledger.set_code(*account, old.clone(), &mut effects.ram)?;
            }
            StateModification::IncrementNonce { account } => {
                let nonce = ledger
                    .account(*account)
                    .map(|row| row.nonce)
                    .ok_or_else(|| missing(*account))?;
                let previous = nonce
                    .checked_sub(1)
                    .ok_or_else(|| EvmError::Journal(format!("nonce underflow on {account}")))?;
                ledger.set_nonce(*account, previous)?;
            }
            StateModification::OriginalStorage { account, key } => {
                effects.original_storage.remove(&(*account, *key));
            }
            StateModification::Transfer { from, to, amount } => {
                if let Some(to) = to {
                    adjust_balance(ledger, *to, *amount, false)?;
                }
                if let Some(from) = from {
                    adjust_balance(ledger, *from, *amount, true)?;
                }
            }
            StateModification::Log => {
                effects
                    .logs
                    .pop()
                    .ok_or_else(|| EvmError::Journal("no log to drop".into()))?;
            }
            StateModification::SelfDestruct => {
                effects
                    .selfdestructs
                    .pop()
                    .ok_or_else(|| EvmError::Journal("no self-destruct to drop".into()))?;
            }
            StateModification::AccessListAddress { address } => {
                effects.access_list.remove(address);
            }
            StateModification::AccessListSlot { address, key } => {
                let slots = effects.access_list.get_mut(address).ok_or_else(|| {
                    EvmError::Journal(format!("{address} is not in the access list"))
                })?;
                match slots.last() {
                    Some(last) if last == key => {
                        slots.pop();
                    }
                    _ => {
                        return Err(EvmError::Journal(format!(
                            "slot {key} is not the last touched slot of {address}"
                        )))
                    }
                }
            }
            StateModification::RemoveAccount { snapshot } => {
                ledger.reinsert_account(snapshot.clone(), &mut effects.ram)?;
            }
        }
        Ok(())
    }
}

/// Ordered log of the mutations of one transaction
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Vec<StateModification>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: StateModification) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position to roll back to later
    pub fn checkpoint(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[StateModification] {
        &self.entries
    }

    /// Undo every entry recorded after `checkpoint`, newest first.
    /// Returns the number of entries undone.
    pub fn revert_to(
        &mut self,
        checkpoint: usize,
        ledger: &mut Ledger,
        effects: &mut TxEffects,
    ) -> Result<usize> {
        let mut undone = 0;
        while self.entries.len() > checkpoint {
            let Some(entry) = self.entries.last() else {
                break;
            };
            trace!(?entry, "reverting");
            // A failed entry stays recorded, along with everything before it
            entry.invert(ledger, effects)?;
            self.entries.pop();
            undone += 1;
        }
        Ok(undone)
    }

    pub fn revert_all(&mut self, ledger: &mut Ledger, effects: &mut TxEffects) -> Result<usize> {
        self.revert_to(0, ledger, effects)
    }

    /// Undo everything after `cause` aborted the transaction and hand `cause`
    /// back. A failure to undo is logged; `cause` is still what the caller sees.
    pub fn abort(
        &mut self,
        ledger: &mut Ledger,
        effects: &mut TxEffects,
        cause: EvmError,
    ) -> EvmError {
        match self.revert_all(ledger, effects) {
            Ok(undone) => trace!(undone, %cause, "rolled back"),
            Err(err) => error!(%err, %cause, pending = self.len(), "rollback failed"),
        }
        cause
    }

    /// Forget all entries; the mutations stay applied
    pub fn commit(&mut self) {
        self.entries.clear();
    }
}

fn missing(account: RowIndex) -> EvmError {
    EvmError::Journal(format!("account row {account} is gone"))
}

fn adjust_balance(ledger: &mut Ledger, index: RowIndex, amount: U256, credit: bool) -> Result<()> {
    let balance = ledger
        .account(index)
        .map(|row| row.balance)
        .ok_or_else(|| missing(index))?;
    let next = if credit {
        balance.checked_add(amount)
    } else {
        balance.checked_sub(amount)
    }
    .ok_or_else(|| EvmError::Journal(format!("balance of row {index} out of range")))?;
    ledger.set_balance(index, next)?;
    Ok(())
}
