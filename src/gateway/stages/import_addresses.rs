use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{Stage, IMPORT_PAGE_SIZE};
use crate::error::GatewayResult;
use crate::gateway::checkpoint::CheckpointLog;
use crate::gateway::GatewayContext;
use crate::ledger::models::GatewayLogType;

/// Mirrors every newly allocated deposit address onto the external chain
/// by asking the chain to start watching it.
pub struct ImportAddresses {
    ctx: Arc<GatewayContext>,
    checkpoints: CheckpointLog,
}

impl ImportAddresses {
    pub fn new(ctx: Arc<GatewayContext>) -> Self {
        let checkpoints = CheckpointLog::new(ctx.ledger.clone());
        Self { ctx, checkpoints }
    }
}

#[async_trait]
impl Stage for ImportAddresses {
    fn name(&self) -> &'static str {
        "import_addresses"
    }

    async fn run(&self) -> GatewayResult<()> {
        let Some(gateway) = self.ctx.gateway_name() else {
            return Ok(());
        };
        if self.ctx.ledger.is_syncing().await {
            debug!(stage = self.name(), "node still syncing, skipping tick");
            return Ok(());
        }

        let last_seq = self
            .checkpoints
            .get(gateway, GatewayLogType::ImportAddress)
            .await?;
        let accounts = self
            .ctx
            .ledger
            .accounts_after(gateway, last_seq, IMPORT_PAGE_SIZE)
            .await?;
        if accounts.is_empty() {
            return Ok(());
        }
        debug!(gateway, count = accounts.len(), "found new gateway accounts");

        for account in &accounts {
            // Deliberately no retry wrapper: import is idempotent, so a
            // failure aborts the page without advancing the checkpoint and
            // the whole page is re-attempted on the next tick.
            self.ctx.chain.import_address(&account.out_address).await?;
        }

        if let Some(last) = accounts.last() {
            self.checkpoints
                .advance(gateway, GatewayLogType::ImportAddress, last.seq)
                .await?;
            info!(
                gateway,
                count = accounts.len(),
                seq = last.seq,
                "imported gateway addresses"
            );
        }

        Ok(())
    }
}
