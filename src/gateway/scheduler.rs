use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::gateway::stages::{
    ImportAddresses, ProcessDeposits, ProcessWithdrawals, SendWithdrawals, Stage,
};
use crate::gateway::GatewayContext;

pub const IMPORT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEPOSIT_INTERVAL: Duration = Duration::from_secs(60);
pub const WITHDRAWAL_INTERVAL: Duration = Duration::from_secs(10);
pub const SEND_WITHDRAWAL_INTERVAL: Duration = Duration::from_secs(30);

/// Runs each reconciliation stage on its own fixed period, one run at a
/// time per stage.
pub struct StageScheduler {
    ctx: Arc<GatewayContext>,
}

impl StageScheduler {
    pub fn new(ctx: Arc<GatewayContext>) -> Self {
        Self { ctx }
    }

    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let mut handles = vec![
            spawn_stage(ImportAddresses::new(self.ctx.clone()), IMPORT_INTERVAL),
            spawn_stage(ProcessDeposits::new(self.ctx.clone()), DEPOSIT_INTERVAL),
            spawn_stage(
                ProcessWithdrawals::new(self.ctx.clone()),
                WITHDRAWAL_INTERVAL,
            ),
        ];

        if self.ctx.config.send_withdrawal {
            handles.push(spawn_stage(
                SendWithdrawals::new(self.ctx.clone()),
                SEND_WITHDRAWAL_INTERVAL,
            ));
        } else {
            info!("withdrawal sending disabled on this node");
        }

        handles
    }
}

/// Drive a stage forever. The tick is awaited before each run and the run
/// is awaited before the next tick, so overlapping runs of the same stage
/// cannot happen; a run that overshoots its period just delays the next
/// one.
pub fn spawn_stage<S: Stage>(stage: S, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            debug!(stage = stage.name(), "stage tick");
            if let Err(e) = stage.run().await {
                error!(stage = stage.name(), error = %e, "stage run failed, will retry next tick");
            }
        }
    })
}
