//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chain error: {0}")]
    Chain(#[from] keeper_chain::ChainError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] keeper_discovery::DiscoveryError),

    #[error("Executor error: {0}")]
    Executor(#[from] keeper_executor::ExecutorError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] keeper_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
