//! Logging setup.
//!
//! Installs a global tracing subscriber writing to stderr. The filter is taken from `RUST_LOG`
//! and falls back to `info`.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

const DEFAULT_FILTER: &str = "info";

/// outcome of the first installation attempt, shared by every later call
static INSTALLED: OnceLock<Result<(), String>> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(String),
}

/// Initialize tracing. Only the first call installs the subscriber; later and concurrent calls
/// return its outcome.
pub fn init() -> Result<(), LoggingError> {
    INSTALLED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let subscriber = Registry::default()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        tracing::subscriber::set_global_default(subscriber).map_err(|e| e.to_string())
    }).clone().map_err(LoggingError::SetGlobal)
}
