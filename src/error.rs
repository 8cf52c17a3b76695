//! Crate-level error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::observability::{LoggingError, TracerError};

/// Any failure that stops the service from starting or running.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("tracing error: {0}")]
    Tracer(#[from] TracerError),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;
