//! Bytecode interpreter adapter
//!
//! The [`Interpreter`] trait is the seam between transaction processing and
//! opcode execution. [`RevmInterpreter`] runs `revm` against a read-only view
//! of the ledger, then replays the resulting state diff through the
//! journaled execution context so it can be rolled back like any other
//! mutation.

use crate::config::EvmSettings;
use crate::context::ExecutionContext;
use crate::errors::{EvmError, Result};
use crate::input::CallRequest;
use crate::output::{ExecResult, Log};
use crate::state::LedgerDb;
use crate::trace::CallTraceInspector;
use crate::types::{word_to_key, Address, U256};
use revm::primitives::{
    Account as RevmAccount, EvmState, ExecutionResult, Output, SpecId, TxKind,
};
use revm::{inspector_handle_register, Evm};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Runs one top-level call or create against the execution context
pub trait Interpreter {
    fn execute(&mut self, ctx: &mut ExecutionContext<'_>, request: &CallRequest)
        -> Result<ExecResult>;
}

/// revm-backed interpreter
///
/// Gas is metered by revm with a zero gas price; fees are settled by the
/// caller from the returned `gas_used`. The sender's nonce is left to the
/// caller as well.
#[derive(Debug, Clone)]
pub struct RevmInterpreter {
    spec: SpecId,
    chain_id: u64,
}

impl RevmInterpreter {
    pub fn new(spec: SpecId, chain_id: u64) -> Self {
        Self { spec, chain_id }
    }

    pub fn from_settings(settings: &EvmSettings) -> Self {
        Self::new(settings.spec, settings.chain_id)
    }

    /// Run revm and return its result, the state diff and the call trace
    fn transact(
        &self,
        ctx: &ExecutionContext<'_>,
        request: &CallRequest,
    ) -> Result<(ExecutionResult, EvmState, CallTraceInspector)> {
        let block = ctx.block();
        let db = LedgerDb::new(ctx.ledger(), block);
        // revm refuses transactions above the block gas limit
        let block_gas_limit = block.gas_limit.max(request.gas_limit);

        let mut evm = Evm::builder()
            .with_db(db)
            .with_external_context(CallTraceInspector::new())
            .with_spec_id(self.spec)
            .modify_cfg_env(|cfg| cfg.chain_id = self.chain_id)
            .modify_block_env(|env| {
                env.number = U256::from(block.number);
                env.timestamp = U256::from(block.timestamp);
                env.gas_limit = U256::from(block_gas_limit);
                env.coinbase = block.coinbase;
                env.difficulty = block.difficulty;
                env.basefee = U256::ZERO;
                env.prevrandao = None;
            })
            .modify_tx_env(|tx| {
                tx.caller = request.caller;
                tx.transact_to = match request.to {
                    Some(to) => TxKind::Call(to),
                    None => TxKind::Create,
                };
                tx.value = request.value;
                tx.data = request.data.clone();
                tx.gas_limit = request.gas_limit;
                tx.gas_price = U256::ZERO;
                tx.nonce = None;
                tx.chain_id = None;
            })
            .append_handler_register(inspector_handle_register)
            .build();

        let outcome = evm
            .transact()
            .map_err(|e| EvmError::Interpreter(format!("{e:?}")))?;
        let tracer = std::mem::take(&mut evm.context.external);
        Ok((outcome.result, outcome.state, tracer))
    }

    /// Replay revm's state diff through the journal, in address order
    fn apply_state_changes(
        ctx: &mut ExecutionContext<'_>,
        caller: Address,
        state: EvmState,
    ) -> Result<()> {
        let touched: BTreeMap<Address, RevmAccount> = state
            .into_iter()
            .filter(|(_, account)| account.is_touched())
            .collect();

        for (address, account) in &touched {
            if account.is_selfdestructed() {
                ctx.mark_selfdestruct(*address);
                continue;
            }
            let changed_slots: BTreeMap<U256, U256> = account
                .storage
                .iter()
                .filter(|(_, slot)| slot.is_changed())
                .map(|(key, slot)| (*key, slot.present_value))
                .collect();
            if !ctx.exists(address) && account.info.is_empty() && changed_slots.is_empty() {
                continue;
            }

            ctx.set_balance(*address, account.info.balance)?;
            if *address != caller {
                while ctx.nonce(address) < account.info.nonce {
                    ctx.increment_nonce(*address)?;
                }
            }
            if let Some(code) = &account.info.code {
                let bytes = code.original_bytes();
                if !bytes.is_empty() && bytes != ctx.code(address) {
                    ctx.set_code(*address, bytes)?;
                }
            }
            for (key, value) in changed_slots {
                ctx.write_storage(*address, word_to_key(key), value)?;
            }
        }

        for address in touched.keys() {
            if *address != caller && ctx.prune_account(*address)? {
                trace!(%address, "pruned touched empty account");
            }
        }
        Ok(())
    }

    fn build_result(result: ExecutionResult, ctx: &mut ExecutionContext<'_>) -> ExecResult {
        match result {
            ExecutionResult::Success {
                output,
                gas_used,
                gas_refunded,
                logs,
                ..
            } => {
                for log in logs {
                    ctx.emit_log(Log::new(
                        log.address,
                        log.topics().to_vec(),
                        log.data.data.clone(),
                    ));
                }
                match output {
                    Output::Call(data) => {
                        ExecResult::success(data, gas_used).with_refund(gas_refunded)
                    }
                    Output::Create(data, address) => {
                        let result = ExecResult::success(data, gas_used).with_refund(gas_refunded);
                        match address {
                            Some(address) => result.with_created_address(address),
                            None => result,
                        }
                    }
                }
            }
            ExecutionResult::Revert { output, gas_used } => ExecResult::revert(output, gas_used),
            ExecutionResult::Halt { reason, gas_used } => {
                ExecResult::halt(format!("{reason:?}"), gas_used)
            }
        }
    }
}

impl Interpreter for RevmInterpreter {
    fn execute(
        &mut self,
        ctx: &mut ExecutionContext<'_>,
        request: &CallRequest,
    ) -> Result<ExecResult> {
        let (result, state, tracer) = self.transact(ctx, request)?;

        let success = result.is_success();
        if success {
            Self::apply_state_changes(ctx, request.caller, state)?;
        }
        let mut exec = Self::build_result(result, ctx);
        exec.internal_txs = tracer.into_internal_txs();

        debug!(
            status = ?exec.status,
            gas_used = exec.gas_used,
            internal_txs = exec.internal_txs.len(),
            "interpreter finished"
        );
        Ok(exec)
    }
}
