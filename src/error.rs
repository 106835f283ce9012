use sqlx::migrate::MigrateError;
use thiserror::Error;

/// Top-level error type for the gateway daemon
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrateError),

    #[error("External chain error: {0}")]
    Chain(String),

    #[error("Ledger node error: {0}")]
    Ledger(String),

    #[error("No elected validators for gateway {0}")]
    NoElectedValidators(String),

    #[error("Input address has no gateway account: {0}")]
    UnknownInputAddress(String),

    #[error("Withdrawal not found: {0}")]
    WithdrawalNotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for the gateway daemon
pub type GatewayResult<T> = Result<T, GatewayError>;
