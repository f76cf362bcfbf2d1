//! Process-wide logging setup.
//!
//! Library code logs through `tracing`; storage code uses `log`, which is
//! forwarded into the same subscriber.

use std::sync::OnceLock;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber. Later calls are no-ops and return `false`.
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
pub fn init(config: &LoggingConfig) -> bool {
    let mut installed = false;
    INSTALLED.get_or_init(|| {
        installed = install(config);
    });
    installed
}

fn install(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|e| {
            eprintln!(
                "Invalid log level '{}' ({}), falling back to info",
                config.level, e
            );
            EnvFilter::new("info")
        });

    let output: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(true).boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(output).with(filter);
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install tracing subscriber: {}", e);
        return false;
    }

    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::debug!("log bridge already installed: {}", e);
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        init(&config);
        assert!(!init(&config));
        log::info!("bridged through tracing");
    }
}
