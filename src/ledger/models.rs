use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::prelude::FromRow;
use sqlx::Type;
use std::fmt;

use crate::error::GatewayResult;

/// Checkpoint discriminator, one per reconciliation stage.
///
/// The numeric values are persisted and shared with the rest of the ledger,
/// so they are part of the storage contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[repr(i32)]
pub enum GatewayLogType {
    ImportAddress = 1,
    Deposit = 2,
    Withdrawal = 3,
    SendWithdrawal = 4,
}

impl fmt::Display for GatewayLogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GatewayLogType::ImportAddress => "import_address",
            GatewayLogType::Deposit => "deposit",
            GatewayLogType::Withdrawal => "withdrawal",
            GatewayLogType::SendWithdrawal => "send_withdrawal",
        };
        write!(f, "{}", name)
    }
}

/// One deposit address ever allocated for a gateway. `seq` is the
/// allocation-order counter, unique per gateway.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GatewayAccount {
    pub gateway: String,
    pub out_address: String,
    pub attachment: String,
    pub seq: i64,
    pub created_at: DateTime<Utc>,
}

/// Validator roster entry. Only elected members participate in the
/// current signing quorum.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GatewayMember {
    pub gateway: String,
    pub out_public_key: String,
    pub elected: bool,
}

/// A withdrawal request recorded on the internal ledger. `out_transaction`
/// holds the constructed-but-unsigned external skeleton as JSON once the
/// signing stage has built it; it is set at most once per withdrawal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GatewayWithdrawal {
    pub tid: String,
    pub gateway: String,
    pub recipient_id: String,
    /// Amount in the ledger's integer unit, as a decimal string.
    pub amount: String,
    pub out_transaction: Option<String>,
    pub seq: i64,
    pub created_at: DateTime<Utc>,
}

/// One validator's partial-signature contribution to a withdrawal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GatewayWithdrawalPrep {
    pub wid: String,
    pub signature: String,
}

/// Metadata stored alongside a gateway account when its deposit address
/// was allocated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountAttachment {
    #[serde(rename = "redeemScript")]
    pub redeem_script: String,
}

impl AccountAttachment {
    pub fn parse(raw: &str) -> GatewayResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Internal transactions the gateway submits to the ledger node.
///
/// The stable numeric type ids and positional argument arrays form the
/// wire contract with the ledger; both are produced only at the
/// submission boundary, never passed around inside the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    /// Credit a confirmed external-chain deposit on the internal ledger.
    DepositCredit {
        gateway: String,
        address: String,
        currency: String,
        /// Integer ledger units rendered as a string.
        amount: String,
        out_txid: String,
    },
    /// Record a freshly constructed withdrawal skeleton together with this
    /// node's first partial signature.
    WithdrawalRegister {
        wid: String,
        out_transaction: String,
        signature: String,
    },
    /// Add this node's partial signature to an already-constructed
    /// withdrawal.
    WithdrawalCosign { wid: String, signature: String },
}

impl LedgerCall {
    /// Flat fee attached to every gateway-submitted internal transaction.
    pub const FEE: u64 = 10_000_000;

    pub fn transaction_type(&self) -> u32 {
        match self {
            LedgerCall::DepositCredit { .. } => 402,
            LedgerCall::WithdrawalRegister { .. } => 404,
            LedgerCall::WithdrawalCosign { .. } => 405,
        }
    }

    pub fn args(&self) -> Vec<Value> {
        match self {
            LedgerCall::DepositCredit {
                gateway,
                address,
                currency,
                amount,
                out_txid,
            } => vec![
                json!(gateway),
                json!(address),
                json!(currency),
                json!(amount),
                json!(out_txid),
            ],
            LedgerCall::WithdrawalRegister {
                wid,
                out_transaction,
                signature,
            } => vec![json!(wid), json!(out_transaction), json!(signature)],
            LedgerCall::WithdrawalCosign { wid, signature } => {
                vec![json!(wid), json!(signature)]
            }
        }
    }
}
