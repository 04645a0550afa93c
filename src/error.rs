use std::fmt;

/// Domain errors threaded through the pipeline where a typed error is more
/// useful than an HTTP response (the Orchestrator renders these at the edge).
#[derive(Debug)]
pub enum GatewayError {
    /// The shared store could not be reached or returned an error.
    StoreUnavailable(String),
    /// No upstream in the roster accepted the request after retries.
    UpstreamUnreachable(String),
    /// The selected upstream's circuit breaker is open.
    BreakerOpen,
    /// Upstream roster is empty.
    NoUpstream,
    /// Config file/env parsing or validation failed.
    Config(String),
    Internal(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::StoreUnavailable(msg) => write!(f, "store unavailable: {}", msg),
            GatewayError::UpstreamUnreachable(msg) => write!(f, "upstream unreachable: {}", msg),
            GatewayError::BreakerOpen => write!(f, "circuit breaker open"),
            GatewayError::NoUpstream => write!(f, "no upstream configured"),
            GatewayError::Config(msg) => write!(f, "config error: {}", msg),
            GatewayError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}
