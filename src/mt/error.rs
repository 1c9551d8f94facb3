use std::fmt;

use thiserror::Error;

/// Error types for the translation client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MtError {
    /// The service rejected the request (4xx, malformed input)
    #[error("request rejected: {0}")]
    Request(String),
    /// The request never reached the service or timed out
    #[error("network error: {0}")]
    Network(String),
    /// The service failed while handling the request (5xx)
    #[error("service error: {0}")]
    Service(String),
    /// The service answered with something that is not a usable translation
    #[error("invalid response: {0}")]
    Response(String),
    /// Client is misconfigured (missing key, bad URL)
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid locale: {0}")]
    InvalidLocale(String),
}

impl MtError {
    pub fn kind(&self) -> FailureKind {
        match self {
            MtError::Request(_) | MtError::InvalidLocale(_) => FailureKind::Request,
            MtError::Network(_) => FailureKind::Network,
            MtError::Service(_) => FailureKind::Service,
            MtError::Response(_) => FailureKind::Response,
            MtError::Config(_) => FailureKind::Config,
        }
    }
}

impl From<reqwest::Error> for MtError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            MtError::Response(error.to_string())
        } else if error.is_builder() {
            MtError::Config(error.to_string())
        } else {
            MtError::Network(error.to_string())
        }
    }
}

/// Coarse classification of a failed translation call, carried by progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Request,
    Network,
    Service,
    Response,
    Config,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Request => "request",
            FailureKind::Network => "network",
            FailureKind::Service => "service",
            FailureKind::Response => "response",
            FailureKind::Config => "config",
        };
        f.write_str(name)
    }
}

/// Result type for translation operations
pub type MtResult<T> = Result<T, MtError>;
