//! The contract: persisted state plus the message dispatcher

use crate::block::load_current_block;
use crate::config::EvmSettings;
use crate::context::ExecutionContext;
use crate::errors::{EvmError, Result};
use crate::evm::{Interpreter, RevmInterpreter};
use crate::hashing::{address_from_hash, hash_struct, keccak256};
use crate::host::{require_auth, HostLedger};
use crate::journal::{Journal, TxEffects};
use crate::ledger::{Ledger, RamMeter};
use crate::message::{AdminAction, Message};
use crate::processor::{ExecutionMode, Processor};
use crate::receipt::Receipt;
use crate::resources::{Config, Resources};
use crate::transaction::EthereumTransaction;
use crate::types::{Address, Hash, NativeAmount, NativeName, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Everything the contract persists between actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractState {
    pub ledger: Ledger,
    pub config: Config,
    pub resources: Resources,
}

impl ContractState {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Keccak256 over the serialized tables
    pub fn state_root(&self) -> Result<Hash> {
        hash_struct(self)
    }
}

/// Address a `create` action links to `account`
///
/// Last 20 bytes of `keccak256(rlp([account, data]))`.
pub fn derive_address(account: &NativeName, data: &str) -> Address {
    let fields: [&[u8]; 2] = [account.as_str().as_bytes(), data.as_bytes()];
    let mut encoded = Vec::new();
    alloy_rlp::encode_list::<&[u8], [u8]>(&fields, &mut encoded);
    address_from_hash(&keccak256(&encoded))
}

/// An EVM deployment inside a host ledger
#[derive(Debug)]
pub struct EvmContract<I: Interpreter = RevmInterpreter> {
    settings: EvmSettings,
    state: ContractState,
    interpreter: I,
}

impl EvmContract<RevmInterpreter> {
    /// Fresh deployment with the revm interpreter
    pub fn new(settings: EvmSettings) -> Result<Self> {
        Self::with_state(settings, ContractState::default())
    }

    /// Resume a deployment from persisted state
    pub fn with_state(settings: EvmSettings, state: ContractState) -> Result<Self> {
        let interpreter = RevmInterpreter::from_settings(&settings);
        Self::with_interpreter(settings, state, interpreter)
    }
}

impl<I: Interpreter> EvmContract<I> {
    pub fn with_interpreter(
        settings: EvmSettings,
        state: ContractState,
        interpreter: I,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            state,
            interpreter,
        })
    }

    pub fn settings(&self) -> &EvmSettings {
        &self.settings
    }

    pub fn state(&self) -> &ContractState {
        &self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.state.ledger
    }

    pub fn into_state(self) -> ContractState {
        self.state
    }

    /// Balance of `address` in wei
    pub fn balance(&self, address: &Address) -> U256 {
        self.state
            .ledger
            .find_by_address(address)
            .map_or(U256::ZERO, |row| row.balance)
    }

    /// Handle one inbound message. Transactions return their receipt.
    pub fn dispatch<H: HostLedger + ?Sized>(
        &mut self,
        host: &mut H,
        message: Message,
    ) -> Result<Option<Receipt>> {
        debug!(kind = message.kind(), "dispatching message");
        match message {
            Message::Transfer {
                from,
                to,
                quantity,
                memo,
            } => self.deposit(host, &from, &to, quantity, &memo).map(|_| None),
            Message::Withdraw { to, quantity } => self.withdraw(host, &to, quantity).map(|_| None),
            Message::Raw {
                ram_payer,
                tx,
                estimate_gas,
                sender,
            } => {
                let mode = if estimate_gas {
                    ExecutionMode::EstimateGas
                } else {
                    ExecutionMode::Commit
                };
                self.execute_raw(host, ram_payer, &tx, sender, mode).map(Some)
            }
            Message::Call {
                ram_payer,
                tx,
                sender,
            } => self
                .execute_raw(host, ram_payer, &tx, sender, ExecutionMode::Call)
                .map(Some),
            Message::Admin(action) => self.admin(host, action).map(|_| None),
        }
    }

    fn execute_raw<H: HostLedger + ?Sized>(
        &mut self,
        host: &mut H,
        ram_payer: NativeName,
        encoded: &[u8],
        sender: Option<Address>,
        mode: ExecutionMode,
    ) -> Result<Receipt> {
        let tx = EthereumTransaction::from_raw(encoded, ram_payer, &*host, &self.settings)?;
        let receipt = Processor {
            settings: &self.settings,
            interpreter: &mut self.interpreter,
            ledger: &mut self.state.ledger,
            config: &mut self.state.config,
            resources: &mut self.state.resources,
        }
        .process(host, tx, sender, mode)?;
        trace!(receipt = %receipt.render()?, "receipt");
        Ok(receipt)
    }

    /// Credit a native deposit to the address in the memo, or else to the
    /// depositor's linked account
    fn deposit<H: HostLedger + ?Sized>(
        &mut self,
        host: &mut H,
        from: &NativeName,
        to: &NativeName,
        quantity: NativeAmount,
        memo: &str,
    ) -> Result<()> {
        if to != &self.settings.contract || from == &self.settings.contract {
            return Ok(());
        }
        let amount = self.to_wei(quantity)?;
        let address = match parse_address_memo(memo) {
            Some(address) => address,
            None => self
                .state
                .ledger
                .find_by_native(from)
                .map(|row| row.address)
                .ok_or_else(|| EvmError::NativeAccountNotLinked(from.clone()))?,
        };

        let block = load_current_block(&*host);
        let mut journal = Journal::new();
        let mut effects = TxEffects::default();
        let mut ctx =
            ExecutionContext::new(&mut self.state.ledger, &mut journal, &mut effects, &block);
        if let Err(err) = ctx.credit(address, amount) {
            return Err(journal.abort(&mut self.state.ledger, &mut effects, err));
        }
        journal.commit();
        self.state.resources.record_ram(effects.ram.bytes());
        debug!(%from, %address, %amount, "deposit credited");
        Ok(())
    }

    fn withdraw<H: HostLedger + ?Sized>(
        &mut self,
        host: &mut H,
        to: &NativeName,
        quantity: NativeAmount,
    ) -> Result<()> {
        require_auth(&*host, to)?;
        let amount = self.to_wei(quantity)?;
        let address = self
            .state
            .ledger
            .find_by_native(to)
            .map(|row| row.address)
            .ok_or_else(|| EvmError::NativeAccountNotLinked(to.clone()))?;

        let block = load_current_block(&*host);
        let mut journal = Journal::new();
        let mut effects = TxEffects::default();
        let mut ctx =
            ExecutionContext::new(&mut self.state.ledger, &mut journal, &mut effects, &block);
        ctx.debit(address, amount)?;

        if let Err(err) = host.transfer(&self.settings.contract, to, quantity, "Withdraw balance") {
            return Err(journal.abort(&mut self.state.ledger, &mut effects, err));
        }
        journal.commit();
        debug!(%to, %address, %amount, "withdrawal sent");
        Ok(())
    }

    fn admin<H: HostLedger + ?Sized>(&mut self, host: &mut H, action: AdminAction) -> Result<()> {
        match action {
            AdminAction::Init(params) => {
                require_auth(&*host, &self.settings.contract)?;
                self.state.resources.init(host, &self.settings, &params)
            }
            AdminAction::SetResources {
                gas_per_byte,
                target_free,
                min_buy,
                fee_transfer_pct,
            } => {
                require_auth(&*host, &self.settings.contract)?;
                self.state
                    .resources
                    .set_resources(gas_per_byte, target_free, min_buy, fee_transfer_pct)
            }
            AdminAction::SetGasPrice(price) => {
                require_auth(&*host, &self.settings.contract)?;
                self.state.config.gas_price = price;
                debug!(%price, "gas price floor updated");
                Ok(())
            }
            AdminAction::DoResources => self.state.resources.do_resources(host, &self.settings),
            AdminAction::Create { account, data } => {
                let address = derive_address(&account, &data);
                self.link_account(host, account, address)
            }
            AdminAction::OpenWallet { account, address } => {
                self.link_account(host, account, address)
            }
        }
    }

    /// Create an account at `address` linked to `account`, which pays its RAM
    fn link_account<H: HostLedger + ?Sized>(
        &mut self,
        host: &mut H,
        account: NativeName,
        address: Address,
    ) -> Result<()> {
        require_auth(&*host, &account)?;
        let ledger = &mut self.state.ledger;
        if ledger.find_by_native(&account).is_some() {
            return Err(EvmError::InvalidArgument(format!(
                "host account {account} already has a linked EVM account"
            )));
        }
        if ledger.find_by_address(&address).is_some() {
            return Err(EvmError::AccountExists(address));
        }

        let mut ram = RamMeter::new();
        let index = ledger.create_account(address, Some(account.clone()), &mut ram)?;
        if let Err(err) = host.charge_ram(&account, ram.bytes()) {
            ledger.remove_account(index, &mut ram)?;
            return Err(err);
        }
        debug!(%account, %address, "linked account created");
        Ok(())
    }

    fn to_wei(&self, quantity: NativeAmount) -> Result<U256> {
        if quantity <= 0 {
            return Err(EvmError::InvalidArgument(
                "quantity must be positive".into(),
            ));
        }
        Ok(U256::from(quantity.unsigned_abs()) * self.settings.native_scale())
    }
}

/// A memo holding exactly one hex address, with or without `0x`
fn parse_address_memo(memo: &str) -> Option<Address> {
    let memo = memo.trim();
    let digits = memo.strip_prefix("0x").unwrap_or(memo);
    if digits.len() != 40 {
        return None;
    }
    let bytes = hex::decode(digits).ok()?;
    Some(Address::from_slice(&bytes))
}
