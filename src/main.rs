mod bootstrap;
mod chain;
mod config;
mod error;
mod gateway;
mod ledger;
#[cfg(test)]
mod testkit;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::gateway::scheduler::StageScheduler;

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,gatewayd=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("🚀 Starting cross-chain gateway daemon");

    dotenv::dotenv().ok();
    let config = config::Config::from_env()?;

    if config.gateway_name.is_none() {
        info!("no gateway configured, stages will idle");
    }

    let ctx = bootstrap::initialize(config).await?;
    bootstrap::wait_for_ready(ctx.ledger.as_ref()).await;

    let scheduler = StageScheduler::new(ctx);
    let handles = scheduler.start();
    info!(stages = handles.len(), "🌐 Gateway reconciliation stages started");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, stopping stages");
    for handle in handles {
        handle.abort();
    }

    Ok(())
}
