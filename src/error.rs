//! Unified error types for the floor-sweep bot.
//!
//! All failures coming out of the resilient request layer are normalized
//! into [`ApiError`] before they reach any caller; raw transport errors
//! never cross that boundary.

use std::time::Duration;

use strum::Display;
use thiserror::Error;

/// Unified error type for the bot binary and library surface.
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Classified API error from the request layer.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP server error.
    #[error("server error: {0}")]
    Server(String),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, BotError>;

/// Classified error taxonomy for every remote-API interaction.
///
/// Each variant carries a coarse [`ErrorKind`] for retry-set membership and
/// metrics labels, and a [`Severity`] for log routing.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// The remote API (or the local budget) throttled the request.
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Milliseconds to wait before retrying.
        retry_after_ms: u64,
    },

    /// Invalid or missing API key (HTTP 401).
    #[error("authentication failed: {message}")]
    Authentication {
        /// Detail from the remote API, if any.
        message: String,
    },

    /// Malformed request or response shape.
    #[error("validation failed for {field}: {message}")]
    Validation {
        /// The offending field or payload section.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// The request exceeded its hard timeout.
    #[error("request timed out: {message}")]
    Timeout {
        /// Transport-level detail.
        message: String,
    },

    /// Transport-level failure (DNS, connect, TLS, reset).
    #[error("network error: {message}")]
    Network {
        /// Transport-level detail.
        message: String,
    },

    /// Any other non-2xx response.
    #[error("http {status}{}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Http {
        /// HTTP status code.
        status: u16,
        /// API-specific error code from the body, if present.
        code: Option<String>,
    },

    /// The circuit breaker for this call path is open; the call was not sent.
    #[error("circuit open for {path}")]
    CircuitOpen {
        /// The protected call path.
        path: String,
    },

    /// Anything that defied classification.
    #[error("unknown error: {message}")]
    Unknown {
        /// Whatever detail was available.
        message: String,
    },
}

/// Coarse error classification, used for retryable-set membership and as a
/// metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Throttled locally or remotely.
    RateLimit,
    /// Credential rejected.
    Authentication,
    /// Malformed request/response.
    Validation,
    /// Hard timeout hit.
    Timeout,
    /// Transport failure.
    Network,
    /// Non-2xx fallback.
    Http,
    /// Breaker fast-fail.
    CircuitOpen,
    /// Unclassified.
    Unknown,
}

/// Severity for log routing and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    /// Needs operator attention (bad key, malformed data, dead network).
    Critical,
    /// Unexpected but survivable.
    Error,
    /// Expected under load (throttling, open breaker).
    Warning,
}

impl ApiError {
    /// Build a rate-limit error with an explicit retry hint.
    pub fn rate_limited(retry_after_ms: u64) -> Self {
        ApiError::RateLimited { retry_after_ms }
    }

    /// Build an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        ApiError::Authentication {
            message: message.into(),
        }
    }

    /// Build a validation error for a named field or payload section.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Build an unclassified error.
    pub fn unknown(message: impl Into<String>) -> Self {
        ApiError::Unknown {
            message: message.into(),
        }
    }

    /// The coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::RateLimited { .. } => ErrorKind::RateLimit,
            ApiError::Authentication { .. } => ErrorKind::Authentication,
            ApiError::Validation { .. } => ErrorKind::Validation,
            ApiError::Timeout { .. } => ErrorKind::Timeout,
            ApiError::Network { .. } => ErrorKind::Network,
            ApiError::Http { .. } => ErrorKind::Http,
            ApiError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            ApiError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Whether this error is transient in nature.
    ///
    /// Rate limits, timeouts, and transport failures can clear on their own;
    /// everything else will fail the same way if replayed. Note that the
    /// retry policy consults its own configured kind set, which by default
    /// retries rate limits only.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited { .. } | ApiError::Timeout { .. } | ApiError::Network { .. }
        )
    }

    /// Severity for log routing.
    pub fn severity(&self) -> Severity {
        match self {
            ApiError::Authentication { .. }
            | ApiError::Validation { .. }
            | ApiError::Timeout { .. }
            | ApiError::Network { .. } => Severity::Critical,
            ApiError::RateLimited { .. } | ApiError::CircuitOpen { .. } => Severity::Warning,
            ApiError::Http { .. } | ApiError::Unknown { .. } => Severity::Error,
        }
    }

    /// Explicit wait hint, present only on rate-limit errors.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after_ms } => {
                Some(Duration::from_millis(*retry_after_ms))
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout {
                message: err.to_string(),
            }
        } else if err.is_connect() {
            ApiError::Network {
                message: err.to_string(),
            }
        } else if err.is_decode() {
            ApiError::validation("response", err.to_string())
        } else {
            ApiError::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::validation("response", err.to_string())
    }
}
