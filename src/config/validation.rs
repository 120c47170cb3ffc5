//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a configuration, collecting every error.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.listener.bind_address.parse::<SocketAddr>() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{:?} is not a socket address: {e}", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }

    if config.http.max_header_bytes == 0 {
        errors.push(ValidationError::new("http.max_header_bytes", "must be greater than 0"));
    }

    if config.websocket.max_frame_bytes == 0 {
        errors.push(ValidationError::new("websocket.max_frame_bytes", "must be greater than 0"));
    }
    if config.websocket.max_message_bytes == 0 {
        errors.push(ValidationError::new(
            "websocket.max_message_bytes",
            "must be greater than 0",
        ));
    }

    if config.timeouts.idle_secs == 0 {
        errors.push(ValidationError::new("timeouts.idle_secs", "must be greater than 0"));
    }

    if let Err(e) = EnvFilter::try_new(&config.observability.log_level) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("invalid filter: {e}"),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
