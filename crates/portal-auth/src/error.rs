//! Authentication and access-decision error types.
//!
//! [`AuthError`] is the error that crosses module boundaries inside this crate
//! and is rendered to HTTP by [`crate::middleware::error`]. Failures of the
//! outbound resilience layer are described by [`UpstreamError`] and folded into
//! an `AuthError` at the component boundary.

use std::fmt;

/// Result type for authentication and access-decision operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur while authenticating a member or deciding access.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No live session, or the session has expired.
    #[error("Unauthenticated: {message}")]
    Unauthenticated {
        /// Description of why the request is unauthenticated.
        message: String,
    },

    /// The authorization code, PKCE verifier or refresh token was rejected.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// The identity provider could not be reached or failed.
    #[error("Identity provider error: {message}")]
    IdentityProvider {
        /// Description of the provider failure.
        message: String,
    },

    /// An identity gateway failed and no cached value could stand in for it.
    #[error("Upstream error: {service} - {message}")]
    Upstream {
        /// The upstream service name.
        service: String,
        /// Description of the failure.
        message: String,
    },

    /// The request is malformed (missing identifier, bad verifier, ...).
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// The access decision does not permit the requested operation.
    #[error("Access denied: {message}")]
    AccessDenied {
        /// Description of why access was denied.
        message: String,
    },

    /// The session backend failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Unauthenticated` error.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `IdentityProvider` error.
    #[must_use]
    pub fn identity_provider(message: impl Into<String>) -> Self {
        Self::IdentityProvider {
            message: message.into(),
        }
    }

    /// Creates a new `Upstream` error.
    #[must_use]
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `AccessDenied` error.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated { .. }
                | Self::InvalidGrant { .. }
                | Self::IdentityProvider { .. }
                | Self::InvalidRequest { .. }
                | Self::AccessDenied { .. }
        )
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Upstream { .. }
                | Self::Storage { .. }
                | Self::Configuration { .. }
                | Self::Internal { .. }
        )
    }

    /// Returns `true` if the caller must be treated as unauthenticated.
    ///
    /// Identity provider outages land here too: login never silently succeeds
    /// without a provider answer.
    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated { .. }
                | Self::InvalidGrant { .. }
                | Self::IdentityProvider { .. }
        )
    }

    /// Returns the error category for logging and metrics.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthenticated { .. }
            | Self::InvalidGrant { .. }
            | Self::IdentityProvider { .. } => ErrorCategory::Authentication,
            Self::AccessDenied { .. } => ErrorCategory::Authorization,
            Self::InvalidRequest { .. } => ErrorCategory::Validation,
            Self::Upstream { .. } => ErrorCategory::Upstream,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of errors for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Login, session and token failures.
    Authentication,
    /// Capability checks against an access decision.
    Authorization,
    /// Malformed input rejected before any upstream call.
    Validation,
    /// Identity gateway failures.
    Upstream,
    /// Session backend failures.
    Infrastructure,
    /// Configuration failures.
    Configuration,
    /// Unexpected internal failures.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Validation => write!(f, "validation"),
            Self::Upstream => write!(f, "upstream"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Failures of a single outbound call, as seen by the resilience layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    /// The connection could not be established or was reset.
    #[error("Network error: {0}")]
    Network(String),

    /// The call did not complete within the request timeout.
    #[error("Request timed out")]
    Timeout,

    /// The upstream answered with a non-success status.
    #[error("HTTP error: status {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body, kept for diagnostics.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The circuit breaker is open and the call was short-circuited.
    #[error("Circuit open for {service}")]
    CircuitOpen {
        /// The protected service.
        service: String,
    },
}

impl UpstreamError {
    /// Returns `true` if retrying the same call may succeed.
    ///
    /// Client errors (4xx other than 429) are never transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Decode(_) | Self::CircuitOpen { .. } => false,
        }
    }

    /// Returns `true` if the upstream rejected the request itself.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Status { status, .. } if (400..500).contains(status) && *status != 429)
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            Self::Network(err.to_string())
        }
    }
}
