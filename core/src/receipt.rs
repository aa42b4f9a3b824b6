//! Transaction receipts
//!
//! A receipt is an order-preserving JSON record of one executed transaction.
//! Words and byte strings are lowercase hex without a prefix. `render` frames
//! the JSON for log scrapers that pick receipts out of the host's console
//! output.

use crate::block::BlockContext;
use crate::errors::Result;
use crate::output::{ExecutionStatus, InternalTx, Log};
use crate::transaction::EthereumTransaction;
use crate::types::{Timestamp, U256};
use serde::{Deserialize, Serialize};

pub const RECEIPT_PREFIX: &str = "RCPT{{";
pub const RECEIPT_SUFFIX: &str = "}}RCPT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLog {
    pub address: String,
    pub data: String,
    pub topics: Vec<String>,
}

impl From<&Log> for ReceiptLog {
    fn from(log: &Log) -> Self {
        Self {
            address: hex::encode(log.address),
            data: hex::encode(&log.data),
            topics: log.topics.iter().map(hex::encode).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptItx {
    pub call_type: String,
    pub from: String,
    pub gas: String,
    pub input: String,
    pub to: String,
    pub value: String,
    pub gas_used: String,
    pub output: String,
    pub subtraces: String,
    pub trace_address: Vec<usize>,
    #[serde(rename = "type")]
    pub kind: String,
    pub depth: String,
}

impl From<&InternalTx> for ReceiptItx {
    fn from(itx: &InternalTx) -> Self {
        Self {
            call_type: itx.kind.as_str().to_string(),
            from: hex::encode(itx.from),
            gas: hex_word(U256::from(itx.gas)),
            input: hex::encode(&itx.input),
            to: itx.to.map(hex::encode).unwrap_or_default(),
            value: hex_word(itx.value),
            gas_used: hex_word(U256::from(itx.gas_used)),
            output: hex::encode(&itx.output),
            subtraces: itx.subtraces.to_string(),
            trace_address: itx.trace_address.clone(),
            kind: if itx.kind.is_create() { "create" } else { "call" }.to_string(),
            depth: itx.depth.to_string(),
        }
    }
}

/// Outcome of one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub hash: String,
    pub trxid: String,
    pub charged_gas: String,
    pub trx_index: u32,
    pub block: u64,
    pub from: String,
    pub status: u8,
    pub epoch: Timestamp,
    pub createdaddr: String,
    pub gasused: String,
    pub gasusedblock: String,
    pub logs: Vec<ReceiptLog>,
    pub output: String,
    pub errors: Vec<String>,
    pub itxs: Vec<ReceiptItx>,
}

impl Receipt {
    pub fn new(
        tx: &EthereumTransaction,
        status: ExecutionStatus,
        block: &BlockContext,
        gas_used_block: U256,
    ) -> Self {
        Self {
            hash: hex::encode(tx.hash()),
            trxid: hex::encode(tx.host_transaction_id()),
            charged_gas: hex_word(tx.charged_gas_price),
            trx_index: tx.transaction_index,
            block: block.number,
            from: tx.cached_sender().map(hex::encode).unwrap_or_default(),
            status: status.code(),
            epoch: block.timestamp,
            createdaddr: tx.created_address.map(hex::encode).unwrap_or_default(),
            gasused: hex_word(U256::from(tx.gas_used)),
            gasusedblock: hex_word(gas_used_block),
            logs: tx.effects.logs.iter().map(ReceiptLog::from).collect(),
            output: hex::encode(&tx.output),
            errors: dedup(&tx.errors),
            itxs: tx.internal_txs.iter().map(ReceiptItx::from).collect(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 1
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// JSON framed as `RCPT{{{...}}}RCPT`
    pub fn render(&self) -> Result<String> {
        Ok(format!("{RECEIPT_PREFIX}{}{RECEIPT_SUFFIX}", self.to_json()?))
    }

    /// Parse a receipt back out of `render` output
    pub fn parse(rendered: &str) -> Result<Self> {
        let json = rendered
            .trim()
            .strip_prefix(RECEIPT_PREFIX)
            .and_then(|rest| rest.strip_suffix(RECEIPT_SUFFIX))
            .unwrap_or(rendered);
        Ok(serde_json::from_str(json)?)
    }
}

/// Big-endian 32-byte hex of a word
pub fn hex_word(value: U256) -> String {
    hex::encode(value.to_be_bytes::<32>())
}

/// First occurrence of each message, in order
fn dedup(errors: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(errors.len());
    for error in errors {
        if !out.contains(error) {
            out.push(error.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SignedTransaction;
    use crate::output::CallKind;
    use crate::types::{Address, Bytes, Hash, B256};

    fn sample_tx() -> EthereumTransaction {
        let mut tx = EthereumTransaction::new(
            SignedTransaction::default(),
            "alice".into(),
            B256::repeat_byte(0x11),
        );
        tx.set_sender(Address::repeat_byte(0xaa));
        tx.charged_gas_price = U256::from(1u64);
        tx.gas_used = 21_000;
        tx.transaction_index = 2;
        tx.errors = vec!["a".into(), "b".into(), "a".into()];
        tx.effects.logs.push(Log::new(
            Address::repeat_byte(0x01),
            vec![Hash::repeat_byte(0x02)],
            Bytes::from(vec![0xff]),
        ));
        tx.internal_txs.push(InternalTx {
            kind: CallKind::DelegateCall,
            from: Address::repeat_byte(0x01),
            to: Some(Address::repeat_byte(0x02)),
            value: U256::ZERO,
            gas: 100,
            gas_used: 50,
            input: Bytes::new(),
            output: Bytes::new(),
            depth: 1,
            trace_address: vec![0],
            subtraces: 0,
        });
        tx
    }

    #[test]
    fn test_receipt_fields() {
        let tx = sample_tx();
        let block = BlockContext::new(77, 1_234);
        let receipt = Receipt::new(&tx, ExecutionStatus::Success, &block, U256::from(42_000u64));

        assert_eq!(receipt.trx_index, 2);
        assert_eq!(receipt.block, 77);
        assert_eq!(receipt.epoch, 1_234);
        assert_eq!(receipt.status, 1);
        assert_eq!(receipt.from, "aa".repeat(20));
        assert_eq!(receipt.trxid, "11".repeat(32));
        assert_eq!(receipt.gasused, format!("{:064x}", 21_000));
        assert_eq!(receipt.gasusedblock, format!("{:064x}", 42_000));
        assert_eq!(receipt.errors, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(receipt.logs[0].data, "ff");
        assert_eq!(receipt.itxs[0].call_type, "delegatecall");
        assert_eq!(receipt.itxs[0].kind, "call");
        assert!(receipt.createdaddr.is_empty());
    }

    #[test]
    fn test_json_key_order() {
        let tx = sample_tx();
        let block = BlockContext::default();
        let receipt = Receipt::new(&tx, ExecutionStatus::Revert, &block, U256::ZERO);
        let json = receipt.to_json().unwrap();

        let keys = [
            "\"charged_gas\"",
            "\"trx_index\"",
            "\"block\"",
            "\"status\"",
            "\"epoch\"",
            "\"createdaddr\"",
            "\"gasused\"",
            "\"gasusedblock\"",
            "\"logs\"",
            "\"output\"",
            "\"errors\"",
            "\"itxs\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(json.contains("\"traceAddress\":[0]"));
        assert!(json.contains("\"callType\":\"delegatecall\""));
    }

    #[test]
    fn test_render_and_parse() {
        let tx = sample_tx();
        let block = BlockContext::default();
        let receipt = Receipt::new(&tx, ExecutionStatus::Halt, &block, U256::ZERO);
        let rendered = receipt.render().unwrap();

        assert!(rendered.starts_with("RCPT{{{"));
        assert!(rendered.ends_with("}}}RCPT"));
        assert_eq!(Receipt::parse(&rendered).unwrap(), receipt);
        assert!(!receipt.is_success());
    }
}
