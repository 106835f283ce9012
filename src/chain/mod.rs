pub mod rpc;
pub mod types;

use async_trait::async_trait;

use crate::error::GatewayResult;
use types::{
    ChainTransaction, InputAccountMap, MultisigAccount, PartialSignatureSet, SignerAccount,
    TxOutput, UnsignedTransaction,
};

/// Seam to the external value-transfer chain. Address generation, UTXO
/// selection, script formats, and broadcast mechanics all live behind
/// this trait; the stages only consume it.
#[async_trait]
pub trait ExternalChainAdapter: Send + Sync {
    /// Start watching an address for incoming payments. Idempotent.
    async fn import_address(&self, address: &str) -> GatewayResult<()>;

    /// Transactions in blocks strictly above `height`. Each transaction
    /// is reported at most once per height.
    async fn transactions_from_height(&self, height: i64)
        -> GatewayResult<Vec<ChainTransaction>>;

    /// Construct an unsigned transaction spending from the multisig
    /// account to the given outputs.
    async fn create_transaction(
        &self,
        from: &MultisigAccount,
        outputs: &[TxOutput],
    ) -> GatewayResult<UnsignedTransaction>;

    /// Produce this signer's partial signatures over every input.
    async fn sign_transaction(
        &self,
        transaction: &UnsignedTransaction,
        signer: &SignerAccount,
        inputs: &InputAccountMap,
    ) -> GatewayResult<PartialSignatureSet>;

    /// Assemble a final raw transaction from the skeleton and a quorum of
    /// partial signature sets.
    async fn build_transaction(
        &self,
        transaction: &UnsignedTransaction,
        signatures: &[PartialSignatureSet],
        inputs: &InputAccountMap,
    ) -> GatewayResult<String>;

    /// Broadcast a final raw transaction; returns its external txid.
    async fn send_raw_transaction(&self, raw: &str) -> GatewayResult<String>;

    /// Derive the deterministic multisig account for a sorted key set and
    /// threshold. Must return the same account for the same inputs.
    async fn derive_multisig_address(
        &self,
        gateway: &str,
        threshold: usize,
        sorted_keys: &[String],
        cold: bool,
    ) -> GatewayResult<MultisigAccount>;
}
