//! Internal transaction tracing
//!
//! A revm inspector that records every nested call and create frame below
//! the top-level transaction, with its trace address and child count.

use crate::output::{CallKind, InternalTx};
use crate::types::Bytes;
use revm::interpreter::{
    CallInputs, CallOutcome, CallScheme, CreateInputs, CreateOutcome, CreateScheme,
};
use revm::{Database, EvmContext, Inspector};

#[derive(Debug, Clone, Default)]
struct Frame {
    /// Position in `internal_txs`; `None` for the top-level frame
    itx: Option<usize>,
    trace_address: Vec<usize>,
    children: usize,
}

/// Collects [`InternalTx`] entries while revm runs
#[derive(Debug, Clone, Default)]
pub struct CallTraceInspector {
    stack: Vec<Frame>,
    internal_txs: Vec<InternalTx>,
}

impl CallTraceInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn internal_txs(&self) -> &[InternalTx] {
        &self.internal_txs
    }

    pub fn into_internal_txs(self) -> Vec<InternalTx> {
        self.internal_txs
    }

    fn enter(&mut self, mut itx: InternalTx) {
        if self.stack.is_empty() {
            self.stack.push(Frame::default());
            return;
        }
        let depth = self.stack.len();
        let Some(parent) = self.stack.last_mut() else {
            return;
        };
        let mut trace_address = parent.trace_address.clone();
        trace_address.push(parent.children);
        parent.children += 1;
        if let Some(parent_itx) = parent.itx {
            if let Some(entry) = self.internal_txs.get_mut(parent_itx) {
                entry.subtraces += 1;
            }
        }

        itx.depth = depth;
        itx.trace_address = trace_address.clone();
        self.internal_txs.push(itx);
        self.stack.push(Frame {
            itx: Some(self.internal_txs.len() - 1),
            trace_address,
            children: 0,
        });
    }

    fn exit(&mut self, gas_used: u64, output: &Bytes) -> Option<&mut InternalTx> {
        let frame = self.stack.pop()?;
        let entry = self.internal_txs.get_mut(frame.itx?)?;
        entry.gas_used = gas_used;
        entry.output = output.clone();
        Some(entry)
    }
}

fn call_kind(scheme: CallScheme) -> CallKind {
    match scheme {
        CallScheme::Call | CallScheme::ExtCall => CallKind::Call,
        CallScheme::CallCode => CallKind::CallCode,
        CallScheme::DelegateCall | CallScheme::ExtDelegateCall => CallKind::DelegateCall,
        CallScheme::StaticCall | CallScheme::ExtStaticCall => CallKind::StaticCall,
    }
}

impl<DB: Database> Inspector<DB> for CallTraceInspector {
    fn call(
        &mut self,
        _context: &mut EvmContext<DB>,
        inputs: &mut CallInputs,
    ) -> Option<CallOutcome> {
        self.enter(InternalTx {
            kind: call_kind(inputs.scheme),
            from: inputs.caller,
            to: Some(inputs.target_address),
            value: inputs.value.get(),
            gas: inputs.gas_limit,
            gas_used: 0,
            input: inputs.input.clone(),
            output: Bytes::new(),
            depth: 0,
            trace_address: Vec::new(),
            subtraces: 0,
        });
        None
    }

    fn call_end(
        &mut self,
        _context: &mut EvmContext<DB>,
        _inputs: &CallInputs,
        outcome: CallOutcome,
    ) -> CallOutcome {
        self.exit(outcome.result.gas.spent(), &outcome.result.output);
        outcome
    }

    fn create(
        &mut self,
        _context: &mut EvmContext<DB>,
        inputs: &mut CreateInputs,
    ) -> Option<CreateOutcome> {
        let kind = match inputs.scheme {
            CreateScheme::Create => CallKind::Create,
            CreateScheme::Create2 { .. } => CallKind::Create2,
        };
        self.enter(InternalTx {
            kind,
            from: inputs.caller,
            to: None,
            value: inputs.value,
            gas: inputs.gas_limit,
            gas_used: 0,
            input: inputs.init_code.clone(),
            output: Bytes::new(),
            depth: 0,
            trace_address: Vec::new(),
            subtraces: 0,
        });
        None
    }

    fn create_end(
        &mut self,
        _context: &mut EvmContext<DB>,
        _inputs: &CreateInputs,
        outcome: CreateOutcome,
    ) -> CreateOutcome {
        if let Some(entry) = self.exit(outcome.result.gas.spent(), &outcome.result.output) {
            entry.to = outcome.address;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, U256};

    fn itx(kind: CallKind) -> InternalTx {
        InternalTx {
            kind,
            from: Address::ZERO,
            to: None,
            value: U256::ZERO,
            gas: 0,
            gas_used: 0,
            input: Bytes::new(),
            output: Bytes::new(),
            depth: 0,
            trace_address: Vec::new(),
            subtraces: 0,
        }
    }

    #[test]
    fn test_top_level_frame_is_not_recorded() {
        let mut tracer = CallTraceInspector::new();
        tracer.enter(itx(CallKind::Call));
        tracer.exit(21_000, &Bytes::new());
        assert!(tracer.internal_txs().is_empty());
    }

    #[test]
    fn test_trace_addresses_and_subtraces() {
        let mut tracer = CallTraceInspector::new();
        tracer.enter(itx(CallKind::Call)); // top level
        tracer.enter(itx(CallKind::Call)); // [0]
        tracer.enter(itx(CallKind::StaticCall)); // [0, 0]
        tracer.exit(10, &Bytes::from(vec![1]));
        tracer.exit(30, &Bytes::new());
        tracer.enter(itx(CallKind::Create)); // [1]
        tracer.exit(5, &Bytes::new());
        tracer.exit(100, &Bytes::new());

        let txs = tracer.into_internal_txs();
        assert_eq!(txs.len(), 3);
        assert_eq!(txs[0].trace_address, vec![0]);
        assert_eq!(txs[0].subtraces, 1);
        assert_eq!(txs[0].depth, 1);
        assert_eq!(txs[0].gas_used, 30);
        assert_eq!(txs[1].trace_address, vec![0, 0]);
        assert_eq!(txs[1].depth, 2);
        assert_eq!(txs[1].output, Bytes::from(vec![1]));
        assert_eq!(txs[2].trace_address, vec![1]);
        assert_eq!(txs[2].kind, CallKind::Create);
    }
}
