use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Address → redeem script, for every source address of a transaction.
pub type InputAccountMap = HashMap<String, String>;

/// One transaction reported by the external chain's history query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainTransaction {
    pub address: String,
    pub category: String,
    pub confirmations: u32,
    /// Amount in the chain's native decimal unit.
    pub amount: Decimal,
    pub height: i64,
    pub txid: String,
}

impl ChainTransaction {
    /// A deposit candidate: an incoming payment with at least one
    /// confirmation.
    pub fn is_confirmed_receive(&self) -> bool {
        self.category == "receive" && self.confirmations >= 1
    }
}

/// One output of a to-be-constructed external transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub value: u64,
}

/// Constructed-but-unsigned external transaction skeleton. Built at most
/// once per withdrawal; rebuilding would change transaction identity and
/// invalidate partial signatures already collected against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub hex: String,
    /// Source addresses whose redeem scripts are needed for signing.
    #[serde(rename = "input")]
    pub inputs: Vec<String>,
}

/// One validator's signatures over every input of an unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSignatureSet {
    pub signer: String,
    pub signatures: Vec<String>,
}

/// A derived M-of-N multisig account. Recomputed each cycle from the
/// elected roster; address-stable for a fixed key set and threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigAccount {
    pub address: String,
    pub redeem_script: String,
    pub threshold: usize,
    /// Canonically ordered.
    pub public_keys: Vec<String>,
}

/// This node's external-chain signing material.
#[derive(Debug, Clone)]
pub struct SignerAccount {
    pub private_key: String,
}
