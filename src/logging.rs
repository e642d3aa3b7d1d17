//! # Structured Logging Module
//!
//! Environment-aware tracing initialization. Safe to call from multiple
//! entry points; only the first call installs a subscriber.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::environment;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific defaults.
///
/// `RUST_LOG` wins when set; otherwise the level is derived from the
/// runtime environment (debug outside production, info in production).
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_log_level(&environment())));

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_filter(filter),
        );

        // A host application may have installed its own subscriber already.
        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized - continuing");
        }
    });
}

fn default_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
