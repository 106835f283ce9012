pub mod models;
pub mod repository;

use async_trait::async_trait;

use crate::error::GatewayResult;
use models::{
    GatewayAccount, GatewayLogType, GatewayMember, GatewayWithdrawal, GatewayWithdrawalPrep,
    LedgerCall,
};

/// Read/write seam to the internal ledger.
///
/// The ledger's storage engine, consensus, and transaction pipeline live
/// behind this trait; the reconciliation stages only consume it. All
/// paged queries return rows ordered ascending by `seq`.
#[async_trait]
pub trait LedgerAdapter: Send + Sync {
    /// Whether the local node is still catching up to network consensus.
    /// Stages skip their tick entirely while this is true.
    async fn is_syncing(&self) -> bool;

    /// Gateway accounts with `seq` strictly greater than `seq`, ascending,
    /// at most `limit` rows.
    async fn accounts_after(
        &self,
        gateway: &str,
        seq: i64,
        limit: i64,
    ) -> GatewayResult<Vec<GatewayAccount>>;

    async fn account_by_out_address(
        &self,
        out_address: &str,
    ) -> GatewayResult<Option<GatewayAccount>>;

    async fn account_count(&self, gateway: &str) -> GatewayResult<i64>;

    async fn elected_members(&self, gateway: &str) -> GatewayResult<Vec<GatewayMember>>;

    /// Withdrawals with `seq` strictly greater than `seq`, ascending, at
    /// most `limit` rows.
    async fn withdrawals_after(
        &self,
        gateway: &str,
        seq: i64,
        limit: i64,
    ) -> GatewayResult<Vec<GatewayWithdrawal>>;

    async fn withdrawal(&self, tid: &str) -> GatewayResult<Option<GatewayWithdrawal>>;

    /// Partial-signature rows for a withdrawal, in insertion order.
    async fn withdrawal_preps(&self, wid: &str) -> GatewayResult<Vec<GatewayWithdrawalPrep>>;

    /// Find-or-create the checkpoint row for `(gateway, log_type)`;
    /// created lazily with seq 0 on first use.
    async fn checkpoint(&self, gateway: &str, log_type: GatewayLogType) -> GatewayResult<i64>;

    /// Unconditionally set the checkpoint. The caller guarantees `seq`
    /// reflects fully committed work.
    async fn advance_checkpoint(
        &self,
        gateway: &str,
        log_type: GatewayLogType,
        seq: i64,
    ) -> GatewayResult<()>;

    /// Submit a fee-bearing internal transaction signed with the gateway
    /// secret through the node's transaction pipeline.
    async fn submit(&self, call: LedgerCall) -> GatewayResult<()>;
}
