use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tracing::warn;

use super::models::*;
use super::LedgerAdapter;
use crate::error::{GatewayError, GatewayResult};

/// Ledger backend for a co-located internal node: entity tables read from
/// the node's Postgres store, transaction submission and the syncing probe
/// through its HTTP API.
pub struct LedgerRepository {
    pool: PgPool,
    http: reqwest::Client,
    node_url: String,
    secret: String,
}

#[derive(Serialize)]
struct UnsignedTransactionRequest<'a> {
    #[serde(rename = "type")]
    transaction_type: u32,
    fee: u64,
    secret: &'a str,
    args: Vec<Value>,
}

#[derive(Deserialize)]
struct SubmitResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct LoaderStatus {
    syncing: bool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool, node_url: &str, secret: &str) -> Self {
        Self {
            pool,
            http: reqwest::Client::new(),
            node_url: node_url.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
        }
    }
}

#[async_trait]
impl LedgerAdapter for LedgerRepository {
    async fn is_syncing(&self) -> bool {
        let url = format!("{}/api/loader/status", self.node_url);
        let status = async {
            let resp = self.http.get(&url).send().await?;
            resp.json::<LoaderStatus>().await
        }
        .await;

        match status {
            Ok(status) => status.syncing,
            Err(e) => {
                // Unknown sync state is treated as syncing: running a stage
                // against a node of unknown state risks stale reads.
                warn!(error = %e, "failed to query loader status, assuming syncing");
                true
            }
        }
    }

    async fn accounts_after(
        &self,
        gateway: &str,
        seq: i64,
        limit: i64,
    ) -> GatewayResult<Vec<GatewayAccount>> {
        let accounts = sqlx::query_as::<_, GatewayAccount>(
            r#"
            SELECT gateway, out_address, attachment, seq, created_at
            FROM gateway_accounts
            WHERE gateway = $1 AND seq > $2
            ORDER BY seq ASC
            LIMIT $3
            "#,
        )
        .bind(gateway)
        .bind(seq)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    async fn account_by_out_address(
        &self,
        out_address: &str,
    ) -> GatewayResult<Option<GatewayAccount>> {
        let account = sqlx::query_as::<_, GatewayAccount>(
            r#"
            SELECT gateway, out_address, attachment, seq, created_at
            FROM gateway_accounts
            WHERE out_address = $1
            "#,
        )
        .bind(out_address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn account_count(&self, gateway: &str) -> GatewayResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM gateway_accounts WHERE gateway = $1",
        )
        .bind(gateway)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn elected_members(&self, gateway: &str) -> GatewayResult<Vec<GatewayMember>> {
        let members = sqlx::query_as::<_, GatewayMember>(
            r#"
            SELECT gateway, out_public_key, elected
            FROM gateway_members
            WHERE gateway = $1 AND elected = TRUE
            "#,
        )
        .bind(gateway)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    async fn withdrawals_after(
        &self,
        gateway: &str,
        seq: i64,
        limit: i64,
    ) -> GatewayResult<Vec<GatewayWithdrawal>> {
        let withdrawals = sqlx::query_as::<_, GatewayWithdrawal>(
            r#"
            SELECT tid, gateway, recipient_id, amount, out_transaction, seq, created_at
            FROM gateway_withdrawals
            WHERE gateway = $1 AND seq > $2
            ORDER BY seq ASC
            LIMIT $3
            "#,
        )
        .bind(gateway)
        .bind(seq)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(withdrawals)
    }

    async fn withdrawal(&self, tid: &str) -> GatewayResult<Option<GatewayWithdrawal>> {
        let withdrawal = sqlx::query_as::<_, GatewayWithdrawal>(
            r#"
            SELECT tid, gateway, recipient_id, amount, out_transaction, seq, created_at
            FROM gateway_withdrawals
            WHERE tid = $1
            "#,
        )
        .bind(tid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(withdrawal)
    }

    async fn withdrawal_preps(&self, wid: &str) -> GatewayResult<Vec<GatewayWithdrawalPrep>> {
        let preps = sqlx::query_as::<_, GatewayWithdrawalPrep>(
            r#"
            SELECT wid, signature
            FROM gateway_withdrawal_preps
            WHERE wid = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(wid)
        .fetch_all(&self.pool)
        .await?;

        Ok(preps)
    }

    async fn checkpoint(&self, gateway: &str, log_type: GatewayLogType) -> GatewayResult<i64> {
        // Single round trip: create the zero row on first use, otherwise
        // return the existing seq untouched.
        let seq = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO gateway_logs (gateway, log_type, seq)
            VALUES ($1, $2, 0)
            ON CONFLICT (gateway, log_type)
            DO UPDATE SET seq = gateway_logs.seq
            RETURNING seq
            "#,
        )
        .bind(gateway)
        .bind(log_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(seq)
    }

    async fn advance_checkpoint(
        &self,
        gateway: &str,
        log_type: GatewayLogType,
        seq: i64,
    ) -> GatewayResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE gateway_logs
            SET seq = $3
            WHERE gateway = $1 AND log_type = $2
            "#,
        )
        .bind(gateway)
        .bind(log_type)
        .bind(seq)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::Internal(format!(
                "checkpoint row missing for gateway {} stage {}",
                gateway, log_type
            )));
        }

        Ok(())
    }

    async fn submit(&self, call: LedgerCall) -> GatewayResult<()> {
        let request = UnsignedTransactionRequest {
            transaction_type: call.transaction_type(),
            fee: LedgerCall::FEE,
            secret: &self.secret,
            args: call.args(),
        };

        let url = format!("{}/api/transactions/unsigned", self.node_url);
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await?
            .json::<SubmitResponse>()
            .await?;

        if !response.success {
            return Err(GatewayError::Ledger(
                response
                    .error
                    .unwrap_or_else(|| "transaction rejected".to_string()),
            ));
        }

        Ok(())
    }
}
