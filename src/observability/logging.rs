//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Configure log level from config or environment
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Pretty format for development, compact for production
//! - Installing twice is not an error, so tests can call it freely

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Filter used when `RUST_LOG` is unset.
pub fn env_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Returns false if one was already set.
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter(config));
    let result = match config.log_format {
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    };
    result.is_ok()
}
