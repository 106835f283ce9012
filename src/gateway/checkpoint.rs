use std::sync::Arc;
use tracing::debug;

use crate::error::GatewayResult;
use crate::ledger::models::GatewayLogType;
use crate::ledger::LedgerAdapter;

/// Persisted `(gateway, stage) → last processed sequence` cursor.
///
/// Each stage owns exactly one cursor and is the only writer of it, so
/// read-then-advance needs no locking beyond single-flight stage runs.
pub struct CheckpointLog {
    ledger: Arc<dyn LedgerAdapter>,
}

impl CheckpointLog {
    pub fn new(ledger: Arc<dyn LedgerAdapter>) -> Self {
        Self { ledger }
    }

    /// Last fully processed sequence, 0 on first use (the zero row is
    /// created as a side effect).
    pub async fn get(&self, gateway: &str, log_type: GatewayLogType) -> GatewayResult<i64> {
        let seq = self.ledger.checkpoint(gateway, log_type).await?;
        debug!(gateway, stage = %log_type, seq, "loaded checkpoint");
        Ok(seq)
    }

    /// Advance the cursor. The caller guarantees every item up to `seq`
    /// has had its side effects durably applied or been explicitly
    /// skipped.
    pub async fn advance(
        &self,
        gateway: &str,
        log_type: GatewayLogType,
        seq: i64,
    ) -> GatewayResult<()> {
        self.ledger.advance_checkpoint(gateway, log_type, seq).await?;
        debug!(gateway, stage = %log_type, seq, "advanced checkpoint");
        Ok(())
    }
}
