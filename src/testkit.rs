//! In-memory fakes of the ledger and chain seams, plus fixture builders.
//! Test-only.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

use crate::chain::types::{
    ChainTransaction, InputAccountMap, MultisigAccount, PartialSignatureSet, SignerAccount,
    TxOutput, UnsignedTransaction,
};
use crate::chain::ExternalChainAdapter;
use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::GatewayContext;
use crate::ledger::models::{
    GatewayAccount, GatewayLogType, GatewayMember, GatewayWithdrawal, GatewayWithdrawalPrep,
    LedgerCall,
};
use crate::ledger::LedgerAdapter;

#[derive(Default)]
pub struct MockLedgerState {
    pub syncing: bool,
    pub accounts: Vec<GatewayAccount>,
    pub members: Vec<GatewayMember>,
    pub withdrawals: Vec<GatewayWithdrawal>,
    pub preps: Vec<GatewayWithdrawalPrep>,
    pub checkpoints: HashMap<(String, GatewayLogType), i64>,
    pub submitted: Vec<LedgerCall>,
    /// Number of upcoming `submit` calls that fail.
    pub fail_submits: u32,
}

#[derive(Default)]
pub struct MockLedger {
    pub state: Mutex<MockLedgerState>,
}

#[async_trait]
impl LedgerAdapter for MockLedger {
    async fn is_syncing(&self) -> bool {
        self.state.lock().syncing
    }

    async fn accounts_after(
        &self,
        gateway: &str,
        seq: i64,
        limit: i64,
    ) -> GatewayResult<Vec<GatewayAccount>> {
        let state = self.state.lock();
        let mut rows: Vec<_> = state
            .accounts
            .iter()
            .filter(|a| a.gateway == gateway && a.seq > seq)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.seq);
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn account_by_out_address(
        &self,
        out_address: &str,
    ) -> GatewayResult<Option<GatewayAccount>> {
        let state = self.state.lock();
        Ok(state
            .accounts
            .iter()
            .find(|a| a.out_address == out_address)
            .cloned())
    }

    async fn account_count(&self, gateway: &str) -> GatewayResult<i64> {
        let state = self.state.lock();
        Ok(state.accounts.iter().filter(|a| a.gateway == gateway).count() as i64)
    }

    async fn elected_members(&self, gateway: &str) -> GatewayResult<Vec<GatewayMember>> {
        let state = self.state.lock();
        Ok(state
            .members
            .iter()
            .filter(|m| m.gateway == gateway && m.elected)
            .cloned()
            .collect())
    }

    async fn withdrawals_after(
        &self,
        gateway: &str,
        seq: i64,
        limit: i64,
    ) -> GatewayResult<Vec<GatewayWithdrawal>> {
        let state = self.state.lock();
        let mut rows: Vec<_> = state
            .withdrawals
            .iter()
            .filter(|w| w.gateway == gateway && w.seq > seq)
            .cloned()
            .collect();
        rows.sort_by_key(|w| w.seq);
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn withdrawal(&self, tid: &str) -> GatewayResult<Option<GatewayWithdrawal>> {
        let state = self.state.lock();
        Ok(state.withdrawals.iter().find(|w| w.tid == tid).cloned())
    }

    async fn withdrawal_preps(&self, wid: &str) -> GatewayResult<Vec<GatewayWithdrawalPrep>> {
        let state = self.state.lock();
        Ok(state
            .preps
            .iter()
            .filter(|p| p.wid == wid)
            .cloned()
            .collect())
    }

    async fn checkpoint(&self, gateway: &str, log_type: GatewayLogType) -> GatewayResult<i64> {
        let mut state = self.state.lock();
        let seq = *state
            .checkpoints
            .entry((gateway.to_string(), log_type))
            .or_insert(0);
        Ok(seq)
    }

    async fn advance_checkpoint(
        &self,
        gateway: &str,
        log_type: GatewayLogType,
        seq: i64,
    ) -> GatewayResult<()> {
        let mut state = self.state.lock();
        state.checkpoints.insert((gateway.to_string(), log_type), seq);
        Ok(())
    }

    async fn submit(&self, call: LedgerCall) -> GatewayResult<()> {
        let mut state = self.state.lock();
        if state.fail_submits > 0 {
            state.fail_submits -= 1;
            return Err(GatewayError::Ledger("simulated submit failure".to_string()));
        }
        state.submitted.push(call);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockChainState {
    pub transactions: Vec<ChainTransaction>,
    pub imported: Vec<String>,
    pub broadcast: Vec<String>,
    /// Fail the import at this position in the import sequence.
    pub fail_import_at: Option<usize>,
    /// Number of upcoming `send_raw_transaction` calls that fail.
    pub fail_sends: u32,
    /// Count of `create_transaction` calls.
    pub created: u32,
}

#[derive(Default)]
pub struct MockChain {
    pub state: Mutex<MockChainState>,
}

#[async_trait]
impl ExternalChainAdapter for MockChain {
    async fn import_address(&self, address: &str) -> GatewayResult<()> {
        let mut state = self.state.lock();
        if state.fail_import_at == Some(state.imported.len()) {
            return Err(GatewayError::Chain("simulated import failure".to_string()));
        }
        state.imported.push(address.to_string());
        Ok(())
    }

    async fn transactions_from_height(
        &self,
        height: i64,
    ) -> GatewayResult<Vec<ChainTransaction>> {
        let state = self.state.lock();
        Ok(state
            .transactions
            .iter()
            .filter(|t| t.height > height)
            .cloned()
            .collect())
    }

    async fn create_transaction(
        &self,
        from: &MultisigAccount,
        _outputs: &[TxOutput],
    ) -> GatewayResult<UnsignedTransaction> {
        let mut state = self.state.lock();
        state.created += 1;
        Ok(UnsignedTransaction {
            hex: format!("rawtx-{}", state.created),
            inputs: vec![from.address.clone()],
        })
    }

    async fn sign_transaction(
        &self,
        transaction: &UnsignedTransaction,
        signer: &SignerAccount,
        _inputs: &InputAccountMap,
    ) -> GatewayResult<PartialSignatureSet> {
        Ok(PartialSignatureSet {
            signer: signer.private_key.clone(),
            signatures: transaction
                .inputs
                .iter()
                .map(|i| format!("sig-{}", i))
                .collect(),
        })
    }

    async fn build_transaction(
        &self,
        transaction: &UnsignedTransaction,
        signatures: &[PartialSignatureSet],
        _inputs: &InputAccountMap,
    ) -> GatewayResult<String> {
        Ok(format!("built-{}-{}", transaction.hex, signatures.len()))
    }

    async fn send_raw_transaction(&self, raw: &str) -> GatewayResult<String> {
        let mut state = self.state.lock();
        if state.fail_sends > 0 {
            state.fail_sends -= 1;
            return Err(GatewayError::Chain("simulated send failure".to_string()));
        }
        state.broadcast.push(raw.to_string());
        Ok(format!("txid-{}", state.broadcast.len()))
    }

    async fn derive_multisig_address(
        &self,
        _gateway: &str,
        threshold: usize,
        sorted_keys: &[String],
        _cold: bool,
    ) -> GatewayResult<MultisigAccount> {
        Ok(MultisigAccount {
            address: format!("msig-{}-{}", threshold, sorted_keys.join("+")),
            redeem_script: format!("redeem-{}", sorted_keys.join("+")),
            threshold,
            public_keys: sorted_keys.to_vec(),
        })
    }
}

pub fn test_account(gateway: &str, out_address: &str, seq: i64, attachment: &str) -> GatewayAccount {
    GatewayAccount {
        gateway: gateway.to_string(),
        out_address: out_address.to_string(),
        attachment: attachment.to_string(),
        seq,
        created_at: Utc::now(),
    }
}

pub fn test_member(gateway: &str, out_public_key: &str) -> GatewayMember {
    GatewayMember {
        gateway: gateway.to_string(),
        out_public_key: out_public_key.to_string(),
        elected: true,
    }
}

pub fn test_withdrawal(
    tid: &str,
    recipient_id: &str,
    amount: &str,
    out_transaction: Option<String>,
    seq: i64,
) -> GatewayWithdrawal {
    GatewayWithdrawal {
        tid: tid.to_string(),
        gateway: "btc_gateway".to_string(),
        recipient_id: recipient_id.to_string(),
        amount: amount.to_string(),
        out_transaction,
        seq,
        created_at: Utc::now(),
    }
}

pub fn test_prep(wid: &str, signature: &str) -> GatewayWithdrawalPrep {
    GatewayWithdrawalPrep {
        wid: wid.to_string(),
        signature: signature.to_string(),
    }
}

pub fn test_transaction(
    address: &str,
    category: &str,
    confirmations: u32,
    amount: Decimal,
    height: i64,
    txid: &str,
) -> ChainTransaction {
    ChainTransaction {
        address: address.to_string(),
        category: category.to_string(),
        confirmations,
        amount,
        height,
        txid: txid.to_string(),
    }
}

/// Context wired to the mocks, configured for the `btc_gateway` gateway
/// with sending enabled.
pub fn test_context(ledger: Arc<MockLedger>, chain: Arc<MockChain>) -> Arc<GatewayContext> {
    let config = Config {
        database_url: "postgres://localhost/test".to_string(),
        ledger_node_url: "http://127.0.0.1:4096".to_string(),
        chain_rpc_url: "http://127.0.0.1:8332".to_string(),
        gateway_name: Some("btc_gateway".to_string()),
        gateway_secret: "gateway-secret".to_string(),
        out_secret: "out-secret".to_string(),
        send_withdrawal: true,
        currency: "BTC".to_string(),
    };
    Arc::new(GatewayContext::new(config, ledger, chain))
}

pub fn checkpoint_of(ledger: &Arc<MockLedger>, log_type: GatewayLogType) -> i64 {
    ledger
        .state
        .lock()
        .checkpoints
        .get(&("btc_gateway".to_string(), log_type))
        .copied()
        .unwrap_or(0)
}
