use std::io;

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::error::{AppError, AppResult};

/// Installs the global subscriber. Logs go to stderr so that stdout only
/// carries the JSON responses.
pub fn init_logging(default_directive: &str) -> AppResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| AppError::Config(format!("invalid log filter: {}", e)))?;

    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| AppError::Internal(format!("failed to initialise logging: {}", e)))?;

    Ok(())
}
