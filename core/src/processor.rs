//! Transaction pipeline
//!
//! Validates a decoded transaction, runs it through the interpreter against
//! the journaled ledger, settles gas and RAM, and produces the receipt.
//!
//! Rollback is layered. A failed execution (revert or halt) undoes only the
//! interpreter's effects; the sender still pays for gas and its nonce still
//! moves. An `Err` from any step after the first mutation undoes the whole
//! journal before it is returned.

use crate::block::{load_current_block, BlockContext};
use crate::config::EvmSettings;
use crate::context::ExecutionContext;
use crate::errors::{EvmError, Result};
use crate::evm::Interpreter;
use crate::gas::{gas_fee, ram_gas};
use crate::host::{require_auth, HostLedger};
use crate::input::CallRequest;
use crate::ledger::Ledger;
use crate::output::{ExecutionStatus, InternalTx};
use crate::receipt::Receipt;
use crate::resources::{Config, Resources};
use crate::transaction::EthereumTransaction;
use crate::types::{Address, Bytes, Gas, U256};
use tracing::{debug, warn};

/// What happens to the state once the transaction has run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Keep the state changes and settle with the host
    Commit,
    /// Run the full pipeline, report the receipt, keep nothing
    EstimateGas,
    /// Like `EstimateGas`, without checking the sender's nonce
    Call,
}

impl ExecutionMode {
    pub fn is_simulation(&self) -> bool {
        !matches!(self, ExecutionMode::Commit)
    }
}

/// Outcome of the journaled part of the pipeline
struct Execution {
    status: ExecutionStatus,
    gas_used: Gas,
    gas_refunded: Gas,
    fee: U256,
    output: Bytes,
    created_address: Option<Address>,
    errors: Vec<String>,
    internal_txs: Vec<InternalTx>,
}

/// Borrowed contract state for one transaction
pub struct Processor<'a, I: Interpreter + ?Sized> {
    pub settings: &'a EvmSettings,
    pub interpreter: &'a mut I,
    pub ledger: &'a mut Ledger,
    pub config: &'a mut Config,
    pub resources: &'a mut Resources,
}

impl<I: Interpreter + ?Sized> Processor<'_, I> {
    /// Run `tx` to completion and return its receipt
    ///
    /// `sender_override` is only honored on unsigned transactions.
    pub fn process<H: HostLedger + ?Sized>(
        &mut self,
        host: &mut H,
        mut tx: EthereumTransaction,
        sender_override: Option<Address>,
        mode: ExecutionMode,
    ) -> Result<Receipt> {
        let block = load_current_block(&*host);

        tx.check_intrinsic()?;
        let mut staged = self.config.begin_transaction(block.number);
        let privileged = host.has_auth(&self.settings.privileged_authority);
        tx.resolve_gas_price(staged.gas_price, privileged)?;
        tx.transaction_index = staged.trx_index;

        let sender = self.resolve_sender(&*host, &mut tx, sender_override)?;
        self.validate_sender(&tx, sender, mode)?;

        let execution = match self.execute(&mut tx, sender, &block) {
            Ok(execution) => execution,
            Err(err) => {
                warn!(%err, hash = %tx.hash(), "transaction failed, rolling back");
                return Err(tx.journal.abort(self.ledger, &mut tx.effects, err));
            }
        };

        tx.gas_used = execution.gas_used;
        tx.gas_refunds = execution.gas_refunded;
        tx.output = execution.output.to_vec();
        tx.created_address = execution.created_address;
        tx.internal_txs = execution.internal_txs;
        for error in execution.errors {
            tx.add_error(error);
        }
        staged.gas_used_block = staged
            .gas_used_block
            .saturating_add(U256::from(execution.gas_used));

        if mode.is_simulation() {
            let receipt = Receipt::new(&tx, execution.status, &block, staged.gas_used_block);
            let undone = tx.journal.revert_all(self.ledger, &mut tx.effects)?;
            debug!(?mode, gas_used = tx.gas_used, undone, "simulated transaction");
            return Ok(receipt);
        }

        self.settle(host, &mut tx, execution.fee)?;
        *self.config = staged;
        tx.journal.commit();

        let receipt = Receipt::new(&tx, execution.status, &block, self.config.gas_used_block);
        debug!(
            hash = %tx.hash(),
            status = ?execution.status,
            gas_used = tx.gas_used,
            trx_index = tx.transaction_index,
            "transaction committed"
        );
        Ok(receipt)
    }

    /// Sender from the signature, or from an authorized override when unsigned
    fn resolve_sender<H: HostLedger + ?Sized>(
        &self,
        host: &H,
        tx: &mut EthereumTransaction,
        sender_override: Option<Address>,
    ) -> Result<Address> {
        if !tx.is_unsigned() {
            return tx.sender(self.settings.chain_id);
        }
        let Some(address) = sender_override else {
            return Err(EvmError::InvalidSignature(
                "unsigned transaction without a sender".into(),
            ));
        };
        let account = self.ledger.require(&address)?;
        let Some(native) = &account.account else {
            return Err(EvmError::InvalidArgument(format!(
                "sender {address} is not linked to a host account"
            )));
        };
        require_auth(host, native)?;
        tx.set_sender(address);
        Ok(address)
    }

    fn validate_sender(
        &self,
        tx: &EthereumTransaction,
        sender: Address,
        mode: ExecutionMode,
    ) -> Result<()> {
        let (nonce, balance) = self
            .ledger
            .find_by_address(&sender)
            .map_or((0, U256::ZERO), |row| (row.nonce, row.balance));

        let signed = tx.signed();
        if mode != ExecutionMode::Call && signed.nonce != nonce {
            return Err(EvmError::InvalidNonce {
                expected: nonce,
                actual: signed.nonce,
            });
        }

        let required = gas_fee(signed.gas_limit, tx.charged_gas_price).saturating_add(signed.value);
        if balance < required {
            return Err(EvmError::InsufficientBalance {
                address: sender,
                required,
                available: balance,
            });
        }
        Ok(())
    }

    /// Every step that mutates the ledger
    fn execute(
        &mut self,
        tx: &mut EthereumTransaction,
        sender: Address,
        block: &BlockContext,
    ) -> Result<Execution> {
        let gas_limit = tx.signed().gas_limit;
        let intrinsic = tx.intrinsic_gas;
        let price = tx.charged_gas_price;
        let contract_pays = tx.ram_payer() == &self.settings.contract;
        let gas_per_byte = self.resources.gas_per_byte;

        let request = CallRequest::from_transaction(tx, sender);

        let mut ctx = ExecutionContext::new(self.ledger, &mut tx.journal, &mut tx.effects, block);
        ctx.get_or_create_account(sender)?;
        let checkpoint = ctx.journal_len();

        let result = self.interpreter.execute(&mut ctx, &request)?;
        let mut status = result.status;
        let mut gas_used = result.gas_used;
        let mut errors = result.errors;

        if status.is_success() {
            let destroyed = ctx.effects().selfdestructs.clone();
            for address in destroyed {
                ctx.destroy_account(address)?;
            }

            if contract_pays {
                let extra = ram_gas(ctx.effects().ram.bytes(), gas_per_byte);
                if gas_used.saturating_add(extra) > gas_limit {
                    ctx.revert_to(checkpoint)?;
                    status = ExecutionStatus::Halt;
                    gas_used = gas_limit;
                    errors.push("out of gas paying for RAM".to_string());
                } else {
                    gas_used += extra;
                }
            }
        } else {
            let undone = ctx.revert_to(checkpoint)?;
            debug!(?status, undone, "execution failed, effects reverted");
        }

        ctx.increment_nonce(sender)?;
        let gas_used = gas_used.clamp(intrinsic, gas_limit);
        let fee = gas_fee(gas_used, price);
        ctx.debit(sender, fee)?;

        let success = status.is_success();
        Ok(Execution {
            status,
            gas_used,
            gas_refunded: result.gas_refunded,
            fee,
            output: result.output,
            created_address: if success { result.created_address } else { None },
            errors,
            internal_txs: result.internal_txs,
        })
    }

    /// Pay for RAM and book the fee. The host is billed first, so a
    /// refusal leaves the counters untouched.
    fn settle<H: HostLedger + ?Sized>(
        &mut self,
        host: &mut H,
        tx: &mut EthereumTransaction,
        fee: U256,
    ) -> Result<()> {
        let ram = tx.ram_bytes();
        if tx.ram_payer() == &self.settings.contract {
            self.resources.record_ram(ram);
        } else if let Err(err) = host.charge_ram(tx.ram_payer(), ram) {
            return Err(tx.journal.abort(self.ledger, &mut tx.effects, err));
        }
        self.resources.collect_fee(fee);
        debug!(ram, %fee, payer = %tx.ram_payer(), "settled transaction");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SignedTransaction;
    use crate::evm::RevmInterpreter;
    use crate::host::MemoryHost;
    use crate::ledger::RamMeter;
    use crate::signature::test_signing::{address_of, sign, signing_key};
    use crate::types::{NativeName, B256};

    const FUNDS: u64 = 1_000_000_000;

    struct Fixture {
        settings: EvmSettings,
        interpreter: RevmInterpreter,
        ledger: Ledger,
        config: Config,
        resources: Resources,
        host: MemoryHost,
    }

    impl Fixture {
        fn new() -> Self {
            let settings = EvmSettings::default();
            Self {
                interpreter: RevmInterpreter::from_settings(&settings),
                settings,
                ledger: Ledger::new(),
                config: Config::default(),
                resources: Resources::default(),
                host: MemoryHost::new(10, 1_000),
            }
        }

        fn fund(&mut self, address: Address, native: Option<&str>) {
            let mut ram = RamMeter::new();
            let index = self
                .ledger
                .create_account(address, native.map(NativeName::from), &mut ram)
                .unwrap();
            self.ledger.set_balance(index, U256::from(FUNDS)).unwrap();
        }

        fn deploy(&mut self, address: Address, code: Vec<u8>) {
            let mut ram = RamMeter::new();
            let index = self.ledger.create_account(address, None, &mut ram).unwrap();
            self.ledger
                .set_code(index, Bytes::from(code), &mut ram)
                .unwrap();
        }

        fn run(
            &mut self,
            tx: SignedTransaction,
            ram_payer: &str,
            sender: Option<Address>,
            mode: ExecutionMode,
        ) -> Result<Receipt> {
            let tx = EthereumTransaction::new(tx, ram_payer.into(), B256::ZERO);
            Processor {
                settings: &self.settings,
                interpreter: &mut self.interpreter,
                ledger: &mut self.ledger,
                config: &mut self.config,
                resources: &mut self.resources,
            }
            .process(&mut self.host, tx, sender, mode)
        }

        fn commit(&mut self, tx: SignedTransaction) -> Result<Receipt> {
            self.run(tx, "eosio.evm", None, ExecutionMode::Commit)
        }

        fn balance(&self, address: &Address) -> U256 {
            self.ledger
                .find_by_address(address)
                .map_or(U256::ZERO, |row| row.balance)
        }
    }

    fn signed(nonce: u64, to: Option<Address>, value: u64, gas_limit: u64) -> SignedTransaction {
        let mut tx = SignedTransaction {
            nonce,
            gas_price: U256::from(1u64),
            gas_limit,
            to,
            value: U256::from(value),
            ..Default::default()
        };
        sign(&mut tx, &signing_key(0x07), Some(40));
        tx
    }

    fn sender() -> Address {
        address_of(&signing_key(0x07))
    }

    fn peer() -> Address {
        Address::repeat_byte(0x22)
    }

    #[test]
    fn test_transfer_commits_and_charges_gas() {
        let mut fx = Fixture::new();
        fx.fund(sender(), None);
        let receiver = Address::repeat_byte(0x22);

        let receipt = fx.commit(signed(0, Some(receiver), 500, 21_000)).unwrap();

        assert!(receipt.is_success());
        assert_eq!(receipt.trx_index, 0);
        assert_eq!(fx.balance(&receiver), U256::from(500u64));
        assert_eq!(fx.balance(&sender()), U256::from(FUNDS - 500 - 21_000));
        assert_eq!(fx.ledger.find_by_address(&sender()).unwrap().nonce, 1);
        assert_eq!(fx.resources.fee_balance, U256::from(21_000u64));
        assert_eq!(fx.config.gas_used_block, U256::from(21_000u64));
        assert_eq!(fx.config.last_block, 10);
        // Contract paid for the receiver row
        assert_eq!(fx.resources.bytes_used, 478);
    }

    #[test]
    fn test_wrong_nonce_leaves_no_trace() {
        let mut fx = Fixture::new();
        fx.fund(sender(), None);
        let before = fx.ledger.clone();

        let err = fx.commit(signed(3, Some(peer()), 1, 21_000)).unwrap_err();

        assert!(matches!(err, EvmError::InvalidNonce { expected: 0, actual: 3 }));
        assert_eq!(fx.ledger, before);
        assert_eq!(fx.config, Config::default());
    }

    #[test]
    fn test_insufficient_balance_for_max_fee() {
        let mut fx = Fixture::new();
        fx.fund(sender(), None);

        let err = fx
            .commit(signed(0, Some(peer()), FUNDS, 21_000))
            .unwrap_err();
        assert!(matches!(err, EvmError::InsufficientBalance { .. }));
    }

    #[test]
    fn test_revert_still_charges_gas_and_bumps_nonce() {
        let mut fx = Fixture::new();
        fx.fund(sender(), None);
        let target = Address::repeat_byte(0x0d);
        // SSTORE(0, 1); REVERT(0, 0)
        fx.deploy(target, vec![0x60, 0x01, 0x60, 0x00, 0x55, 0x60, 0x00, 0x60, 0x00, 0xfd]);

        let receipt = fx.commit(signed(0, Some(target), 10, 100_000)).unwrap();

        assert!(!receipt.is_success());
        assert_eq!(receipt.errors, vec!["execution reverted".to_string()]);
        let index = fx.ledger.index_of(&target).unwrap();
        assert_eq!(fx.ledger.load(index, &B256::ZERO), U256::ZERO);
        assert_eq!(fx.balance(&target), U256::ZERO);

        let row = fx.ledger.find_by_address(&sender()).unwrap();
        assert_eq!(row.nonce, 1);
        let gas_used = u64::from_str_radix(&receipt.gasused, 16).unwrap();
        assert!(gas_used > 21_000 && gas_used <= 100_000);
        assert_eq!(row.balance, U256::from(FUNDS - gas_used));
    }

    #[test]
    fn test_simulation_keeps_nothing() {
        let mut fx = Fixture::new();
        fx.fund(sender(), None);
        let receiver = Address::repeat_byte(0x22);
        let before = fx.ledger.clone();

        let receipt = fx
            .run(
                signed(0, Some(receiver), 500, 21_000),
                "eosio.evm",
                None,
                ExecutionMode::EstimateGas,
            )
            .unwrap();

        assert!(receipt.is_success());
        assert_eq!(receipt.gasused, format!("{:064x}", 21_000));
        assert_eq!(fx.ledger, before);
        assert_eq!(fx.config, Config::default());
        assert_eq!(fx.resources, Resources::default());
    }

    #[test]
    fn test_call_mode_ignores_nonce() {
        let mut fx = Fixture::new();
        fx.fund(sender(), None);

        let receipt = fx
            .run(signed(9, Some(peer()), 0, 21_000), "eosio.evm", None, ExecutionMode::Call)
            .unwrap();
        assert!(receipt.is_success());
        assert_eq!(fx.ledger.find_by_address(&sender()).unwrap().nonce, 0);
    }

    #[test]
    fn test_unsigned_sender_override_needs_auth() {
        let mut fx = Fixture::new();
        let wallet = Address::repeat_byte(0x33);
        fx.fund(wallet, Some("alice"));
        let unsigned = SignedTransaction {
            gas_price: U256::from(1u64),
            gas_limit: 21_000,
            to: Some(peer()),
            value: U256::from(7u64),
            ..Default::default()
        };

        let err = fx
            .run(unsigned.clone(), "eosio.evm", Some(wallet), ExecutionMode::Commit)
            .unwrap_err();
        assert!(matches!(err, EvmError::AuthorizationRequired(_)));

        fx.host.authorize("alice");
        let receipt = fx
            .run(unsigned, "eosio.evm", Some(wallet), ExecutionMode::Commit)
            .unwrap();
        assert!(receipt.is_success());
        assert_eq!(receipt.from, hex::encode(wallet));
    }

    #[test]
    fn test_signed_transaction_ignores_override() {
        let mut fx = Fixture::new();
        fx.fund(sender(), None);

        let receipt = fx
            .run(
                signed(0, Some(peer()), 1, 21_000),
                "eosio.evm",
                Some(Address::repeat_byte(0x99)),
                ExecutionMode::Commit,
            )
            .unwrap();
        assert_eq!(receipt.from, hex::encode(sender()));
    }

    #[test]
    fn test_foreign_ram_payer_is_billed_by_host() {
        let mut fx = Fixture::new();
        fx.fund(sender(), None);

        fx.run(signed(0, Some(peer()), 1, 21_000), "alice", None, ExecutionMode::Commit)
            .unwrap();

        assert_eq!(fx.host.ram_charged(&NativeName::from("alice")), 478);
        assert_eq!(fx.resources.bytes_used, 0);
    }

    #[test]
    fn test_ram_gas_over_limit_fails_transaction() {
        let mut fx = Fixture::new();
        fx.resources.gas_per_byte = 1_000;
        fx.fund(sender(), None);
        let receiver = Address::repeat_byte(0x22);

        let receipt = fx.commit(signed(0, Some(receiver), 500, 100_000)).unwrap();

        assert_eq!(receipt.status, 0);
        assert_eq!(receipt.gasused, format!("{:064x}", 100_000));
        assert!(fx.ledger.find_by_address(&receiver).is_none());
        assert_eq!(fx.balance(&sender()), U256::from(FUNDS - 100_000));
        assert_eq!(fx.resources.bytes_used, 0);
    }

    #[test]
    fn test_gas_price_floor_applies() {
        let mut fx = Fixture::new();
        fx.fund(sender(), None);
        fx.config.gas_price = U256::from(2u64);

        let err = fx.commit(signed(0, Some(peer()), 1, 21_000)).unwrap_err();
        assert!(matches!(err, EvmError::GasPriceTooLow { .. }));

        fx.host.authorize("eosio");
        let receipt = fx.commit(signed(0, Some(peer()), 1, 21_000)).unwrap();
        assert_eq!(receipt.charged_gas, format!("{:064x}", 1));
    }
}
