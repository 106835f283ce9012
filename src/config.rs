use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    /// Base URL of the local internal-ledger node (queries and unsigned
    /// transaction submission go here).
    pub ledger_node_url: String,
    /// JSON-RPC endpoint of the external-chain helper node.
    pub chain_rpc_url: String,
    /// Name of the gateway this node serves. Unset means gateway mode is
    /// disabled and every stage is a no-op.
    pub gateway_name: Option<String>,
    /// Secret used to sign internal-ledger transactions.
    pub gateway_secret: String,
    /// This node's external-chain private key material.
    pub out_secret: String,
    /// Whether this node broadcasts fully-signed withdrawals.
    pub send_withdrawal: bool,
    /// Currency code credited for deposits.
    pub currency: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/gateway".to_string()),
            ledger_node_url: std::env::var("LEDGER_NODE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:4096".to_string()),
            chain_rpc_url: std::env::var("CHAIN_RPC_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8332".to_string()),
            gateway_name: std::env::var("GATEWAY_NAME")
                .ok()
                .filter(|name| !name.is_empty()),
            gateway_secret: std::env::var("GATEWAY_SECRET").unwrap_or_default(),
            out_secret: std::env::var("GATEWAY_OUT_SECRET").unwrap_or_default(),
            send_withdrawal: std::env::var("GATEWAY_SEND_WITHDRAWAL")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            currency: std::env::var("GATEWAY_CURRENCY").unwrap_or_else(|_| "BTC".to_string()),
        })
    }
}
