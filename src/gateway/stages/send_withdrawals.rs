use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, error, info};

use super::{Stage, WITHDRAWAL_PAGE_SIZE};
use crate::chain::types::{MultisigAccount, PartialSignatureSet, UnsignedTransaction};
use crate::error::GatewayResult;
use crate::gateway::checkpoint::CheckpointLog;
use crate::gateway::quorum::QuorumCoordinator;
use crate::gateway::retry::RetryPolicy;
use crate::gateway::{resolve_input_accounts, GatewayContext};
use crate::ledger::models::{GatewayLogType, GatewayWithdrawal};

/// Assembles fully signed withdrawals and broadcasts them to the external
/// chain, strictly in ledger order. Only enabled on the one node that is
/// configured to send.
pub struct SendWithdrawals {
    ctx: Arc<GatewayContext>,
    checkpoints: CheckpointLog,
    quorum: QuorumCoordinator,
    retry: RetryPolicy,
}

enum SendOutcome {
    Broadcast,
    /// Not yet constructed; nothing to send, the item is passed over.
    Skipped,
    /// Below threshold. Later withdrawals must wait so that broadcast
    /// order matches ledger order.
    AwaitingQuorum,
}

impl SendWithdrawals {
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

    async fn broadcast_one(
        &self,
        withdrawal: &GatewayWithdrawal,
        multisig: &MultisigAccount,
    ) -> GatewayResult<SendOutcome> {
        let Some(raw) = &withdrawal.out_transaction else {
            debug!(wid = %withdrawal.tid, "withdrawal not yet constructed, skipping");
            return Ok(SendOutcome::Skipped);
        };

        let preps = self.ctx.ledger.withdrawal_preps(&withdrawal.tid).await?;
        if preps.len() < multisig.threshold {
            debug!(
                wid = %withdrawal.tid,
                have = preps.len(),
                need = multisig.threshold,
                "awaiting signature quorum"
            );
            return Ok(SendOutcome::AwaitingQuorum);
        }

        let unsigned: UnsignedTransaction = serde_json::from_str(raw)?;
        let signatures = preps
            .iter()
            .take(multisig.threshold)
            .map(|p| serde_json::from_str::<PartialSignatureSet>(&p.signature))
            .collect::<Result<Vec<_>, _>>()?;

        let txid = self
            .retry
            .run(
                || async {
                    let inputs = resolve_input_accounts(
                        self.ctx.ledger.as_ref(),
                        &unsigned.inputs,
                        multisig,
                    )
                    .await?;
                    let raw_transaction = self
                        .ctx
                        .chain
                        .build_transaction(&unsigned, &signatures, &inputs)
                        .await?;
                    self.ctx.chain.send_raw_transaction(&raw_transaction).await
                },
                |err| {
                    error!(
                        wid = %withdrawal.tid,
                        error = %err,
                        "withdrawal broadcast failed, will retry"
                    )
                },
            )
            .await?;

        info!(
            wid = %withdrawal.tid,
            recipient = %withdrawal.recipient_id,
            amount = %withdrawal.amount,
            txid = %txid,
            "withdrawal broadcast"
        );
        Ok(SendOutcome::Broadcast)
    }
}

#[async_trait]
impl Stage for SendWithdrawals {
    fn name(&self) -> &'static str {
        "send_withdrawals"
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
            error!(gateway, "no elected validators, withdrawals not sent");
            return Ok(());
        }
        let multisig = self.quorum.derive_multisig(gateway, &validators).await?;

        let last_seq = self
            .checkpoints
            .get(gateway, GatewayLogType::SendWithdrawal)
            .await?;
        let withdrawals = self
            .ctx
            .ledger
            .withdrawals_after(gateway, last_seq, WITHDRAWAL_PAGE_SIZE)
            .await?;
        if withdrawals.is_empty() {
            return Ok(());
        }
        debug!(gateway, count = withdrawals.len(), "withdrawals queued for sending");

        // Broadcast in ledger order; a withdrawal that cannot go out yet
        // stops the page so nothing behind it overtakes it. The checkpoint
        // only covers the prefix actually dealt with, so a crash between
        // broadcast and advance re-examines at most one sent item.
        let mut processed_seq = last_seq;
        for withdrawal in &withdrawals {
            match self.broadcast_one(withdrawal, &multisig).await {
                Ok(SendOutcome::Broadcast) | Ok(SendOutcome::Skipped) => {
                    processed_seq = withdrawal.seq;
                }
                Ok(SendOutcome::AwaitingQuorum) => break,
                Err(e) => {
                    error!(
                        gateway,
                        wid = %withdrawal.tid,
                        error = %e,
                        "withdrawal send halted"
                    );
                    break;
                }
            }
        }

        if processed_seq > last_seq {
            self.checkpoints
                .advance(gateway, GatewayLogType::SendWithdrawal, processed_seq)
                .await?;
        }

        Ok(())
    }
}
