use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing with the SHOPLEDGER_LOG environment variable.
///
/// Falls back to `default_level` when SHOPLEDGER_LOG is unset or invalid.
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
