//! A transaction in flight
//!
//! Wraps the decoded wire fields with everything accumulated while the
//! transaction is validated, executed and settled. Never persisted.

use crate::codec::SignedTransaction;
use crate::config::EvmSettings;
use crate::errors::Result;
use crate::gas::{check_intrinsic, resolve_gas_price};
use crate::hashing::keccak256;
use crate::host::{require_auth, HostLedger};
use crate::journal::{Journal, TxEffects};
use crate::output::InternalTx;
use crate::resources::Config;
use crate::signature::recover_sender;
use crate::types::{Address, Gas, Hash, NativeName, B256, U256};
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct EthereumTransaction {
    signed: SignedTransaction,
    hash: Hash,
    host_trx_id: B256,
    ram_payer: NativeName,
    sender: Option<Address>,
    /// Position within the current block
    pub transaction_index: u32,
    /// Price per gas actually charged
    pub charged_gas_price: U256,
    pub intrinsic_gas: Gas,
    pub created_address: Option<Address>,
    pub gas_used: Gas,
    pub gas_refunds: Gas,
    pub output: Vec<u8>,
    pub journal: Journal,
    pub effects: TxEffects,
    pub internal_txs: Vec<InternalTx>,
    pub errors: Vec<String>,
    /// Config row to write back on commit
    pub staged_config: Option<Config>,
}

impl EthereumTransaction {
    /// Decode `encoded` and bind it to the current host transaction
    ///
    /// A RAM payer other than the contract itself must have authorized the
    /// action.
    pub fn from_raw<H: HostLedger + ?Sized>(
        encoded: &[u8],
        ram_payer: NativeName,
        host: &H,
        settings: &EvmSettings,
    ) -> Result<Self> {
        let signed = SignedTransaction::decode(encoded, settings.max_tx_size)?;
        if ram_payer != settings.contract {
            require_auth(host, &ram_payer)?;
        }
        let tx = Self::new(signed, ram_payer, host.transaction_id());
        debug!(hash = %tx.hash, create = tx.is_create(), "decoded transaction");
        Ok(tx)
    }

    pub fn new(signed: SignedTransaction, ram_payer: NativeName, host_trx_id: B256) -> Self {
        let hash = keccak256(&signed.encode());
        Self {
            signed,
            hash,
            host_trx_id,
            ram_payer,
            sender: None,
            transaction_index: 0,
            charged_gas_price: U256::ZERO,
            intrinsic_gas: 0,
            created_address: None,
            gas_used: 0,
            gas_refunds: 0,
            output: Vec::new(),
            journal: Journal::new(),
            effects: TxEffects::default(),
            internal_txs: Vec::new(),
            errors: Vec::new(),
            staged_config: None,
        }
    }

    pub fn signed(&self) -> &SignedTransaction {
        &self.signed
    }

    /// Keccak256 of the canonical nine-field encoding
    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn host_transaction_id(&self) -> B256 {
        self.host_trx_id
    }

    pub fn ram_payer(&self) -> &NativeName {
        &self.ram_payer
    }

    pub fn is_create(&self) -> bool {
        self.signed.is_create()
    }

    pub fn is_unsigned(&self) -> bool {
        self.signed.is_unsigned()
    }

    /// Recover the sender, once; later calls return the cached address
    pub fn sender(&mut self, chain_id: u64) -> Result<Address> {
        if let Some(sender) = self.sender {
            return Ok(sender);
        }
        let sender = recover_sender(&self.signed, chain_id)?;
        trace!(%sender, hash = %self.hash, "recovered sender");
        self.sender = Some(sender);
        Ok(sender)
    }

    /// Sender if already known
    pub fn cached_sender(&self) -> Option<Address> {
        self.sender
    }

    /// Use `sender` instead of recovering one from the signature
    pub fn set_sender(&mut self, sender: Address) {
        self.sender = Some(sender);
    }

    /// Record intrinsic gas, failing if the gas limit cannot cover it
    pub fn check_intrinsic(&mut self) -> Result<Gas> {
        self.intrinsic_gas = check_intrinsic(
            &self.signed.data,
            self.signed.is_create(),
            self.signed.gas_limit,
        )?;
        Ok(self.intrinsic_gas)
    }

    /// Fix the charged gas price against the configured floor
    pub fn resolve_gas_price(&mut self, floor: U256, privileged: bool) -> Result<U256> {
        self.charged_gas_price = resolve_gas_price(self.signed.gas_price, floor, privileged)?;
        Ok(self.charged_gas_price)
    }

    /// Net RAM consumed so far
    pub fn ram_bytes(&self) -> i64 {
        self.effects.ram.bytes()
    }

    /// Add an error message unless it is already recorded
    pub fn add_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.errors.contains(&message) {
            self.errors.push(message);
        }
    }
}
