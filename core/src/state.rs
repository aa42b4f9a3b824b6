//! Ledger-backed state database
//!
//! Implements `revm::Database` over a borrowed [`Ledger`], so the interpreter
//! reads committed rows directly. Writes never go through here; the state
//! diff revm produces is applied through the journaled execution context.

use crate::block::BlockContext;
use crate::errors::{EvmError, Result};
use crate::ledger::Ledger;
use crate::types::{word_to_key, Address, Hash, U256};
use revm::primitives::{AccountInfo, Bytecode, KECCAK_EMPTY};
use revm::Database;
use std::collections::BTreeMap;

/// Read-only view of the ledger for one interpreter run
#[derive(Debug)]
pub struct LedgerDb<'a> {
    ledger: &'a Ledger,
    block: &'a BlockContext,
    /// Code seen by `basic`, keyed by hash
    code_cache: BTreeMap<Hash, Bytecode>,
}

impl<'a> LedgerDb<'a> {
    pub fn new(ledger: &'a Ledger, block: &'a BlockContext) -> Self {
        Self {
            ledger,
            block,
            code_cache: BTreeMap::new(),
        }
    }
}

impl Database for LedgerDb<'_> {
    type Error = EvmError;

    fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>> {
        let Some(account) = self.ledger.find_by_address(&address) else {
            return Ok(None);
        };
        let code_hash = account.code_hash();
        let code = if account.code.is_empty() {
            None
        } else {
            let bytecode = Bytecode::new_raw(account.code.clone());
            self.code_cache.insert(code_hash, bytecode.clone());
            Some(bytecode)
        };
        Ok(Some(AccountInfo {
            balance: account.balance,
            nonce: account.nonce,
            code_hash,
            code,
        }))
    }

    fn code_by_hash(&mut self, code_hash: Hash) -> Result<Bytecode> {
        if code_hash == KECCAK_EMPTY {
            return Ok(Bytecode::default());
        }
        if let Some(code) = self.code_cache.get(&code_hash) {
            return Ok(code.clone());
        }
        let code = self
            .ledger
            .accounts()
            .find(|account| account.is_contract() && account.code_hash() == code_hash)
            .map(|account| Bytecode::new_raw(account.code.clone()))
            .unwrap_or_default();
        Ok(code)
    }

    fn storage(&mut self, address: Address, slot: U256) -> Result<U256> {
        Ok(self
            .ledger
            .index_of(&address)
            .map_or(U256::ZERO, |index| self.ledger.load(index, &word_to_key(slot))))
    }

    fn block_hash(&mut self, number: u64) -> Result<Hash> {
        Ok(self.block.block_hash(number))
    }
}
