//! Inbound messages
//!
//! Everything the contract reacts to, as one closed set. Native token
//! notifications, user actions and administrative actions all arrive here
//! and are routed by [`EvmContract::dispatch`](crate::contract::EvmContract::dispatch).

use crate::resources::ResourceInit;
use crate::types::{Address, Bytes, NativeAmount, NativeName, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Native token transfer notification
    Transfer {
        from: NativeName,
        to: NativeName,
        quantity: NativeAmount,
        memo: String,
    },
    /// Move native tokens out of the caller's linked account
    Withdraw { to: NativeName, quantity: NativeAmount },
    /// Execute an encoded transaction
    Raw {
        ram_payer: NativeName,
        tx: Bytes,
        estimate_gas: bool,
        /// Sender of an unsigned transaction
        sender: Option<Address>,
    },
    /// Read-only execution; nothing is kept
    Call {
        ram_payer: NativeName,
        tx: Bytes,
        sender: Option<Address>,
    },
    Admin(AdminAction),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminAction {
    /// One-time RAM setup, contract authority
    Init(ResourceInit),
    /// Update RAM parameters, contract authority
    SetResources {
        gas_per_byte: u64,
        target_free: u64,
        min_buy: u64,
        fee_transfer_pct: u64,
    },
    /// Update the gas price floor, contract authority
    SetGasPrice(U256),
    /// Buy RAM and pass on fees; anyone may trigger it
    DoResources,
    /// Derive a linked account from the host name and `data`
    Create { account: NativeName, data: String },
    /// Link a chosen, unused address to a host account
    OpenWallet { account: NativeName, address: Address },
}

impl Message {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Transfer { .. } => "transfer",
            Message::Withdraw { .. } => "withdraw",
            Message::Raw { .. } => "raw",
            Message::Call { .. } => "call",
            Message::Admin(action) => action.kind(),
        }
    }
}

impl AdminAction {
    pub fn kind(&self) -> &'static str {
        match self {
            AdminAction::Init(_) => "init",
            AdminAction::SetResources { .. } => "setresources",
            AdminAction::SetGasPrice(_) => "setgasprice",
            AdminAction::DoResources => "doresources",
            AdminAction::Create { .. } => "create",
            AdminAction::OpenWallet { .. } => "openwallet",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_json() {
        let msg = Message::Withdraw {
            to: "alice".into(),
            quantity: 10_000,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"Withdraw":{"to":"alice","quantity":10000}}"#);
        assert_eq!(serde_json::from_str::<Message>(&json).unwrap(), msg);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Message::Admin(AdminAction::DoResources).kind(), "doresources");
        let raw = Message::Raw {
            ram_payer: "alice".into(),
            tx: Bytes::new(),
            estimate_gas: false,
            sender: None,
        };
        assert_eq!(raw.kind(), "raw");
    }
}
