use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use super::Stage;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::checkpoint::CheckpointLog;
use crate::gateway::retry::RetryPolicy;
use crate::gateway::GatewayContext;
use crate::ledger::models::{GatewayLogType, LedgerCall};

/// Detects confirmed external-chain payments to registered deposit
/// addresses and credits them on the internal ledger.
pub struct ProcessDeposits {
    ctx: Arc<GatewayContext>,
    checkpoints: CheckpointLog,
    retry: RetryPolicy,
}

/// Convert a native-unit chain amount to the ledger's integer unit:
/// multiply by 10^8 and truncate, rendered as a string.
fn ledger_amount(amount: Decimal) -> GatewayResult<String> {
    if amount.is_sign_negative() {
        return Err(GatewayError::InvalidAmount(amount.to_string()));
    }
    let scaled = amount
        .checked_mul(Decimal::from(100_000_000u64))
        .ok_or_else(|| GatewayError::InvalidAmount(amount.to_string()))?
        .trunc();
    Ok(scaled.normalize().to_string())
}

impl ProcessDeposits {
    pub fn new(ctx: Arc<GatewayContext>) -> Self {
        Self::with_policy(ctx, RetryPolicy::new(3, Duration::from_secs(10)))
    }

    pub fn with_policy(ctx: Arc<GatewayContext>, retry: RetryPolicy) -> Self {
        let checkpoints = CheckpointLog::new(ctx.ledger.clone());
        Self {
            ctx,
            checkpoints,
            retry,
        }
    }
}

#[async_trait]
impl Stage for ProcessDeposits {
    fn name(&self) -> &'static str {
        "process_deposits"
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
            error!(gateway, "no elected validators, deposits not processed");
            return Ok(());
        }
        if self.ctx.ledger.account_count(gateway).await? == 0 {
            error!(gateway, "no gateway accounts registered");
            return Ok(());
        }

        let last_height = self
            .checkpoints
            .get(gateway, GatewayLogType::Deposit)
            .await?;
        let mut transactions = self.ctx.chain.transactions_from_height(last_height).await?;
        transactions.retain(|t| t.is_confirmed_receive());
        transactions.sort_by_key(|t| t.height);
        if transactions.is_empty() {
            return Ok(());
        }
        debug!(gateway, count = transactions.len(), "confirmed receive transactions");

        for ot in &transactions {
            if self
                .ctx
                .ledger
                .account_by_out_address(&ot.address)
                .await?
                .is_none()
            {
                warn!(
                    gateway,
                    address = %ot.address,
                    txid = %ot.txid,
                    "deposit to unknown address, dropped"
                );
                continue;
            }

            // A malformed amount is an item problem, not a page problem:
            // skip it like an exhausted item so later deposits still land.
            let amount = match ledger_amount(ot.amount) {
                Ok(amount) => amount,
                Err(e) => {
                    warn!(
                        gateway,
                        txid = %ot.txid,
                        amount = %ot.amount,
                        error = %e,
                        "deposit with invalid amount, dropped"
                    );
                    continue;
                }
            };

            let call = LedgerCall::DepositCredit {
                gateway: gateway.to_string(),
                address: ot.address.clone(),
                currency: self.ctx.config.currency.clone(),
                amount,
                out_txid: ot.txid.clone(),
            };

            let ledger = self.ctx.ledger.clone();
            let result = self
                .retry
                .run(
                    || {
                        let ledger = ledger.clone();
                        let call = call.clone();
                        async move { ledger.submit(call).await }
                    },
                    |err| error!(txid = %ot.txid, error = %err, "deposit credit failed, will retry"),
                )
                .await;

            match result {
                Ok(()) => info!(
                    gateway,
                    address = %ot.address,
                    amount = %ot.amount,
                    txid = %ot.txid,
                    "gateway deposit processed"
                ),
                // The page still advances past this item: a permanently
                // failing deposit is surfaced for manual intervention
                // rather than blocking all later deposits.
                Err(e) => warn!(
                    gateway,
                    txid = %ot.txid,
                    error = %e,
                    "giving up on deposit this cycle"
                ),
            }
        }

        if let Some(last) = transactions.last() {
            self.checkpoints
                .advance(gateway, GatewayLogType::Deposit, last.height)
                .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::testkit::*;

    fn stage_with(ledger: Arc<MockLedger>, chain: Arc<MockChain>) -> ProcessDeposits {
        ProcessDeposits::with_policy(
            test_context(ledger, chain),
            RetryPolicy::new(3, Duration::from_millis(1)),
        )
    }

    fn seed_roster(ledger: &MockLedger) {
        let mut state = ledger.state.lock();
        state.members.push(test_member("btc_gateway", "key-a"));
        state.accounts.push(test_account(
            "btc_gateway",
            "A1",
            1,
            r#"{"redeemScript":"s"}"#,
        ));
    }

    #[test]
    fn test_ledger_amount_scales_and_truncates() {
        assert_eq!(ledger_amount(dec!(0.5)).unwrap(), "50000000");
        assert_eq!(ledger_amount(dec!(1)).unwrap(), "100000000");
        assert_eq!(ledger_amount(dec!(0.000000019)).unwrap(), "1");
        assert_eq!(ledger_amount(dec!(0)).unwrap(), "0");
        assert!(ledger_amount(dec!(-1)).is_err());
        assert!(ledger_amount(Decimal::MAX).is_err());
    }

    #[tokio::test]
    async fn test_confirmed_deposit_is_credited() {
        let ledger = Arc::new(MockLedger::default());
        let chain = Arc::new(MockChain::default());
        seed_roster(&ledger);
        chain
            .state
            .lock()
            .transactions
            .push(test_transaction("A1", "receive", 1, dec!(0.5), 100, "tx-1"));

        let stage = stage_with(ledger.clone(), chain);
        stage.run().await.unwrap();

        let submitted = ledger.state.lock().submitted.clone();
        assert_eq!(
            submitted,
            vec![LedgerCall::DepositCredit {
                gateway: "btc_gateway".to_string(),
                address: "A1".to_string(),
                currency: "BTC".to_string(),
                amount: "50000000".to_string(),
                out_txid: "tx-1".to_string(),
            }]
        );
        assert_eq!(checkpoint_of(&ledger, GatewayLogType::Deposit), 100);
    }

    #[tokio::test]
    async fn test_rerun_with_no_new_transactions_is_noop() {
        let ledger = Arc::new(MockLedger::default());
        let chain = Arc::new(MockChain::default());
        seed_roster(&ledger);
        chain
            .state
            .lock()
            .transactions
            .push(test_transaction("A1", "receive", 2, dec!(1), 100, "tx-1"));

        let stage = stage_with(ledger.clone(), chain);
        stage.run().await.unwrap();
        stage.run().await.unwrap();

        assert_eq!(ledger.state.lock().submitted.len(), 1);
        assert_eq!(checkpoint_of(&ledger, GatewayLogType::Deposit), 100);
    }

    #[tokio::test]
    async fn test_unknown_address_is_dropped_not_retried() {
        let ledger = Arc::new(MockLedger::default());
        let chain = Arc::new(MockChain::default());
        seed_roster(&ledger);
        {
            let mut state = chain.state.lock();
            state
                .transactions
                .push(test_transaction("A9", "receive", 1, dec!(2), 90, "tx-9"));
            state
                .transactions
                .push(test_transaction("A1", "receive", 1, dec!(1), 100, "tx-1"));
        }

        let stage = stage_with(ledger.clone(), chain);
        stage.run().await.unwrap();

        // Only the registered address produced a submission, and the page
        // advanced past the unknown one.
        let submitted = ledger.state.lock().submitted.clone();
        assert_eq!(submitted.len(), 1);
        assert!(matches!(
            &submitted[0],
            LedgerCall::DepositCredit { address, .. } if address == "A1"
        ));
        assert_eq!(checkpoint_of(&ledger, GatewayLogType::Deposit), 100);

        stage.run().await.unwrap();
        assert_eq!(ledger.state.lock().submitted.len(), 1);
    }

    #[tokio::test]
    async fn test_unconfirmed_and_send_transactions_are_filtered() {
        let ledger = Arc::new(MockLedger::default());
        let chain = Arc::new(MockChain::default());
        seed_roster(&ledger);
        {
            let mut state = chain.state.lock();
            state
                .transactions
                .push(test_transaction("A1", "receive", 0, dec!(1), 100, "tx-1"));
            state
                .transactions
                .push(test_transaction("A1", "send", 3, dec!(1), 101, "tx-2"));
        }

        let stage = stage_with(ledger.clone(), chain);
        stage.run().await.unwrap();

        assert!(ledger.state.lock().submitted.is_empty());
        assert_eq!(checkpoint_of(&ledger, GatewayLogType::Deposit), 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_still_advance_page() {
        let ledger = Arc::new(MockLedger::default());
        let chain = Arc::new(MockChain::default());
        seed_roster(&ledger);
        {
            let mut state = chain.state.lock();
            state
                .transactions
                .push(test_transaction("A1", "receive", 1, dec!(1), 100, "tx-1"));
            state
                .transactions
                .push(test_transaction("A1", "receive", 1, dec!(2), 101, "tx-2"));
        }
        // First item fails all three attempts, second succeeds.
        ledger.state.lock().fail_submits = 3;

        let stage = stage_with(ledger.clone(), chain);
        stage.run().await.unwrap();

        let submitted = ledger.state.lock().submitted.clone();
        assert_eq!(submitted.len(), 1);
        assert!(matches!(
            &submitted[0],
            LedgerCall::DepositCredit { out_txid, .. } if out_txid == "tx-2"
        ));
        assert_eq!(checkpoint_of(&ledger, GatewayLogType::Deposit), 101);
    }

    #[tokio::test]
    async fn test_invalid_amount_is_dropped_without_blocking_page() {
        let ledger = Arc::new(MockLedger::default());
        let chain = Arc::new(MockChain::default());
        seed_roster(&ledger);
        {
            let mut state = chain.state.lock();
            state
                .transactions
                .push(test_transaction("A1", "receive", 1, dec!(-0.1), 90, "tx-bad"));
            state
                .transactions
                .push(test_transaction("A1", "receive", 1, dec!(1), 100, "tx-ok"));
        }

        let stage = stage_with(ledger.clone(), chain);
        stage.run().await.unwrap();

        let submitted = ledger.state.lock().submitted.clone();
        assert_eq!(submitted.len(), 1);
        assert!(matches!(
            &submitted[0],
            LedgerCall::DepositCredit { out_txid, .. } if out_txid == "tx-ok"
        ));
        assert_eq!(checkpoint_of(&ledger, GatewayLogType::Deposit), 100);

        // The bad item stays behind the checkpoint for good.
        stage.run().await.unwrap();
        assert_eq!(ledger.state.lock().submitted.len(), 1);
    }

    #[tokio::test]
    async fn test_skips_while_syncing() {
        let ledger = Arc::new(MockLedger::default());
        let chain = Arc::new(MockChain::default());
        seed_roster(&ledger);
        ledger.state.lock().syncing = true;
        chain
            .state
            .lock()
            .transactions
            .push(test_transaction("A1", "receive", 1, dec!(1), 100, "tx-1"));

        let stage = stage_with(ledger.clone(), chain);
        stage.run().await.unwrap();

        assert!(ledger.state.lock().submitted.is_empty());
    }

    #[tokio::test]
    async fn test_requires_elected_validators() {
        let ledger = Arc::new(MockLedger::default());
        let chain = Arc::new(MockChain::default());
        ledger.state.lock().accounts.push(test_account(
            "btc_gateway",
            "A1",
            1,
            r#"{"redeemScript":"s"}"#,
        ));
        chain
            .state
            .lock()
            .transactions
            .push(test_transaction("A1", "receive", 1, dec!(1), 100, "tx-1"));

        let stage = stage_with(ledger.clone(), chain);
        stage.run().await.unwrap();

        assert!(ledger.state.lock().submitted.is_empty());
    }
}
