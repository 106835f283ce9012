use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use super::{Stage, WITHDRAWAL_PAGE_SIZE};
use crate::chain::types::{MultisigAccount, SignerAccount, TxOutput, UnsignedTransaction};
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::checkpoint::CheckpointLog;
use crate::gateway::quorum::QuorumCoordinator;
use crate::gateway::retry::RetryPolicy;
use crate::gateway::{resolve_input_accounts, GatewayContext};
use crate::ledger::models::{GatewayLogType, LedgerCall};

/// Picks up withdrawal requests from the internal ledger and contributes
/// this validator's partial signature: the first validator to reach a
/// withdrawal constructs the unsigned skeleton and registers it, every
/// later one co-signs the skeleton already on the ledger.
pub struct ProcessWithdrawals {
    ctx: Arc<GatewayContext>,
    checkpoints: CheckpointLog,
    quorum: QuorumCoordinator,
    retry: RetryPolicy,
}

impl ProcessWithdrawals {
    pub fn new(ctx: Arc<GatewayContext>) -> Self {
        Self::with_policy(ctx, RetryPolicy::new(3, Duration::from_secs(10)))
    }

    pub fn with_policy(ctx: Arc<GatewayContext>, retry: RetryPolicy) -> Self {
        let checkpoints = CheckpointLog::new(ctx.ledger.clone());
        let quorum = QuorumCoordinator::new(ctx.ledger.clone(), ctx.chain.clone());
        Self {
            ctx,
            checkpoints,
            quorum,
            retry,
        }
    }

    /// Sign one withdrawal. The row is re-fetched by id immediately before
    /// deciding between construct and co-sign, so a skeleton registered by
    /// another validator since the page was read is never overwritten.
    /// Returns the internal transaction type that was submitted.
    async fn sign_one(
        &self,
        tid: &str,
        multisig: &MultisigAccount,
        signer: &SignerAccount,
    ) -> GatewayResult<u32> {
        let withdrawal = self
            .ctx
            .ledger
            .withdrawal(tid)
            .await?
            .ok_or_else(|| GatewayError::WithdrawalNotFound(tid.to_string()))?;

        let call = match &withdrawal.out_transaction {
            None => {
                let value: u64 = withdrawal
                    .amount
                    .parse()
                    .map_err(|_| GatewayError::InvalidAmount(withdrawal.amount.clone()))?;
                let output = TxOutput {
                    address: withdrawal.recipient_id.clone(),
                    value,
                };
                let unsigned = self
                    .ctx
                    .chain
                    .create_transaction(multisig, &[output])
                    .await?;
                let inputs =
                    resolve_input_accounts(self.ctx.ledger.as_ref(), &unsigned.inputs, multisig)
                        .await?;
                let signatures = self
                    .ctx
                    .chain
                    .sign_transaction(&unsigned, signer, &inputs)
                    .await?;
                LedgerCall::WithdrawalRegister {
                    wid: withdrawal.tid.clone(),
                    out_transaction: serde_json::to_string(&unsigned)?,
                    signature: serde_json::to_string(&signatures)?,
                }
            }
            Some(raw) => {
                let unsigned: UnsignedTransaction = serde_json::from_str(raw)?;
                let inputs =
                    resolve_input_accounts(self.ctx.ledger.as_ref(), &unsigned.inputs, multisig)
                        .await?;
                let signatures = self
                    .ctx
                    .chain
                    .sign_transaction(&unsigned, signer, &inputs)
                    .await?;
                LedgerCall::WithdrawalCosign {
                    wid: withdrawal.tid.clone(),
                    signature: serde_json::to_string(&signatures)?,
                }
            }
        };

        let transaction_type = call.transaction_type();
        self.ctx.ledger.submit(call).await?;
        Ok(transaction_type)
    }
}

#[async_trait]
impl Stage for ProcessWithdrawals {
    fn name(&self) -> &'static str {
        "process_withdrawals"
    }

    async fn run(&self) -> GatewayResult<()> {
        let Some(gateway) = self.ctx.gateway_name() else {
            return Ok(());
        };
        if self.ctx.ledger.is_syncing().await {
            debug!(stage = self.name(), "node still syncing, skipping tick");
            return Ok(());
        }

        let validators = self.ctx.ledger.elected_members(gateway).await?;
        if validators.is_empty() {
            error!(gateway, "no elected validators, withdrawals not signed");
            return Ok(());
        }
        let multisig = self.quorum.derive_multisig(gateway, &validators).await?;

        let last_seq = self
            .checkpoints
            .get(gateway, GatewayLogType::Withdrawal)
            .await?;
        let withdrawals = self
            .ctx
            .ledger
            .withdrawals_after(gateway, last_seq, WITHDRAWAL_PAGE_SIZE)
            .await?;
        if withdrawals.is_empty() {
            return Ok(());
        }
        debug!(gateway, count = withdrawals.len(), "found pending withdrawals");

        let signer = self.ctx.signer();
        for withdrawal in &withdrawals {
            let result = self
                .retry
                .run(
                    || self.sign_one(&withdrawal.tid, &multisig, &signer),
                    |err| {
                        error!(
                            wid = %withdrawal.tid,
                            error = %err,
                            "withdrawal signing failed, will retry"
                        )
                    },
                )
                .await;

            match result {
                Ok(transaction_type) => info!(
                    gateway,
                    wid = %withdrawal.tid,
                    transaction_type,
                    "withdrawal signature submitted"
                ),
                // Broken items do not block the page; later validators can
                // still reach quorum without this signature.
                Err(e) => warn!(
                    gateway,
                    wid = %withdrawal.tid,
                    error = %e,
                    "giving up on withdrawal this cycle"
                ),
            }
        }

        if let Some(last) = withdrawals.last() {
            self.checkpoints
                .advance(gateway, GatewayLogType::Withdrawal, last.seq)
                .await?;
        }

        Ok(())
    }
}
