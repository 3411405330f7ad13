//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the upstream URL, bind address and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("upstream.target_url '{0}' is not an absolute http URL")]
    TargetUrl(String),

    #[error("inspection.meta_name must not be empty")]
    EmptyMetaName,

    #[error("inspection.max_inspect_bytes must be greater than zero")]
    ZeroInspectLimit,

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    match Url::parse(&config.upstream.target_url) {
        Ok(url) if url.scheme() == "http" && url.has_host() => {}
        _ => errors.push(ValidationError::TargetUrl(config.upstream.target_url.clone())),
    }

    if config.inspection.meta_name.trim().is_empty() {
        errors.push(ValidationError::EmptyMetaName);
    }

    if config.inspection.max_inspect_bytes == 0 {
        errors.push(ValidationError::ZeroInspectLimit);
    }

    if config.timeouts.settle_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.settle_secs"));
    }

    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("upstream.connect_timeout_secs"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
