//! Execution output types
//!
//! What the interpreter hands back after running a call: status, return data,
//! gas figures, the created address and the internal call trace. State
//! changes are not part of the output; they go through the journaled
//! execution context.

use crate::types::{Address, Bytes, Gas, Hash, U256};
use serde::{Deserialize, Serialize};

/// EVM execution log entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Log {
    /// Contract that emitted the log
    pub address: Address,
    /// Log topics (up to 4, first is usually event signature)
    pub topics: Vec<Hash>,
    /// Log data (ABI-encoded event parameters)
    pub data: Bytes,
}

impl Log {
    pub fn new(address: Address, topics: Vec<Hash>, data: Bytes) -> Self {
        Self {
            address,
            topics,
            data,
        }
    }

    /// Get the event signature (first topic, if present)
    pub fn event_signature(&self) -> Option<Hash> {
        self.topics.first().copied()
    }
}

/// Execution result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Execution completed successfully
    Success,
    /// Execution reverted (REVERT opcode)
    Revert,
    /// Execution halted (out of gas, invalid opcode, etc.)
    Halt,
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }

    pub fn is_revert(&self) -> bool {
        matches!(self, ExecutionStatus::Revert)
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, ExecutionStatus::Halt)
    }

    /// Receipt status code: 1 for success, 0 otherwise
    pub fn code(&self) -> u8 {
        u8::from(self.is_success())
    }
}

/// Frame kind of an internal transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
    Create,
    Create2,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Call => "call",
            CallKind::CallCode => "callcode",
            CallKind::DelegateCall => "delegatecall",
            CallKind::StaticCall => "staticcall",
            CallKind::Create => "create",
            CallKind::Create2 => "create2",
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, CallKind::Create | CallKind::Create2)
    }
}

/// One nested call or create frame below the top-level transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalTx {
    pub kind: CallKind,
    pub from: Address,
    /// Callee, or the created address once known
    pub to: Option<Address>,
    pub value: U256,
    pub gas: Gas,
    pub gas_used: Gas,
    pub input: Bytes,
    pub output: Bytes,
    /// Depth below the top-level frame, starting at 1
    pub depth: usize,
    /// Child positions from the top-level frame down to this one
    pub trace_address: Vec<usize>,
    /// Number of direct children
    pub subtraces: usize,
}

/// What an interpreter run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub status: ExecutionStatus,
    /// Return data, or revert data
    pub output: Bytes,
    /// Gas consumed by execution, including intrinsic gas
    pub gas_used: Gas,
    pub gas_refunded: Gas,
    pub created_address: Option<Address>,
    /// Interpreter-reported failure reasons
    pub errors: Vec<String>,
    pub internal_txs: Vec<InternalTx>,
}

impl ExecResult {
    pub fn success(output: Bytes, gas_used: Gas) -> Self {
        Self {
            status: ExecutionStatus::Success,
            output,
            gas_used,
            gas_refunded: 0,
            created_address: None,
            errors: Vec::new(),
            internal_txs: Vec::new(),
        }
    }

    pub fn revert(output: Bytes, gas_used: Gas) -> Self {
        Self {
            status: ExecutionStatus::Revert,
            errors: vec!["execution reverted".to_string()],
            ..Self::success(output, gas_used)
        }
    }

    pub fn halt(reason: impl Into<String>, gas_used: Gas) -> Self {
        Self {
            status: ExecutionStatus::Halt,
            errors: vec![reason.into()],
            ..Self::success(Bytes::new(), gas_used)
        }
    }

    pub fn with_created_address(mut self, address: Address) -> Self {
        self.created_address = Some(address);
        self
    }

    pub fn with_refund(mut self, gas_refunded: Gas) -> Self {
        self.gas_refunded = gas_refunded;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_creation() {
        let address = Address::repeat_byte(0x01);
        let topic = Hash::repeat_byte(0xAB);
        let log = Log::new(address, vec![topic], Bytes::from(vec![1, 2, 3]));

        assert_eq!(log.address, address);
        assert_eq!(log.event_signature(), Some(topic));
    }

    #[test]
    fn test_execution_status() {
        assert!(ExecutionStatus::Success.is_success());
        assert!(ExecutionStatus::Revert.is_revert());
        assert!(ExecutionStatus::Halt.is_halt());
        assert_eq!(ExecutionStatus::Success.code(), 1);
        assert_eq!(ExecutionStatus::Halt.code(), 0);
    }

    #[test]
    fn test_failed_results_carry_errors() {
        let reverted = ExecResult::revert(Bytes::from(vec![0x08]), 30_000);
        assert!(!reverted.is_success());
        assert_eq!(reverted.errors, vec!["execution reverted".to_string()]);

        let halted = ExecResult::halt("out of gas", 53_000);
        assert_eq!(halted.status, ExecutionStatus::Halt);
        assert!(halted.output.is_empty());
        assert_eq!(halted.errors, vec!["out of gas".to_string()]);
    }

    #[test]
    fn test_call_kind_names() {
        assert_eq!(CallKind::DelegateCall.as_str(), "delegatecall");
        assert!(CallKind::Create2.is_create());
        assert!(!CallKind::StaticCall.is_create());
    }
}
