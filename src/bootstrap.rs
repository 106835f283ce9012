use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::info;

use crate::chain::rpc::ChainRpcClient;
use crate::config::Config;
use crate::error::GatewayResult;
use crate::gateway::GatewayContext;
use crate::ledger::repository::LedgerRepository;
use crate::ledger::LedgerAdapter;

async fn initialize_database(database_url: &str) -> GatewayResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("database initialized");
    Ok(pool)
}

/// Wire the database, ledger node, and chain RPC into a ready-to-use
/// context.
pub async fn initialize(config: Config) -> GatewayResult<Arc<GatewayContext>> {
    let pool = initialize_database(&config.database_url).await?;
    let ledger = LedgerRepository::new(pool, &config.ledger_node_url, &config.gateway_secret);
    let chain = ChainRpcClient::new(&config.chain_rpc_url);
    Ok(Arc::new(GatewayContext::new(
        config,
        Arc::new(ledger),
        Arc::new(chain),
    )))
}

/// Block until the ledger node reports it has caught up to consensus.
/// Stages also skip ticks while syncing; this just keeps the startup log
/// honest about when reconciliation actually begins.
pub async fn wait_for_ready(ledger: &dyn LedgerAdapter) {
    while ledger.is_syncing().await {
        info!("ledger node still syncing, waiting");
        sleep(Duration::from_secs(5)).await;
    }
    info!("ledger node in sync");
}
