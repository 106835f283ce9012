pub mod import_addresses;
pub mod process_deposits;
pub mod process_withdrawals;
pub mod send_withdrawals;

pub use import_addresses::ImportAddresses;
pub use process_deposits::ProcessDeposits;
pub use process_withdrawals::ProcessWithdrawals;
pub use send_withdrawals::SendWithdrawals;

use async_trait::async_trait;

use crate::error::GatewayResult;

/// Page bound for the address-import stage.
pub const IMPORT_PAGE_SIZE: i64 = 100;
/// Page bound for both withdrawal stages.
pub const WITHDRAWAL_PAGE_SIZE: i64 = 25;

/// One reconciliation stage: reads its checkpoint, pulls a bounded page
/// of new work, applies side effects per item, advances the checkpoint.
///
/// A run returning `Err` is logged and retried on the next scheduled
/// tick; no stage failure is fatal to the daemon.
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run(&self) -> GatewayResult<()>;
}
