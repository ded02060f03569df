//! Error types for fbxconf
//!
//! Every failure a reconciliation can hit maps onto one variant here. Router
//! clients return these directly and the reconciler passes them through
//! untouched, so the variant a caller sees is the one the client produced.

use thiserror::Error;

/// Result type alias for fbxconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for fbxconf
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The desired resource breaks a model invariant, or the router rejected the payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// The router could not be reached or the session was refused
    #[error("Transport error: {0}")]
    Transport(String),

    /// The router answered with something that does not decode into the expected shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The router reports that the resource already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The targeted resource does not exist (anymore)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cancellation was requested before the router was contacted
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Stable name of the error kind, used verbatim in reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Transport(_) => "TransportError",
            Self::Protocol(_) => "ProtocolError",
            Self::Conflict(_) => "ConflictError",
            Self::NotFound(_) => "NotFoundError",
            Self::Config(_) => "ConfigError",
            Self::Cancelled(_) => "CancelledError",
        }
    }

    /// The detail message carried by the error, without the kind prefix
    pub fn detail(&self) -> &str {
        match self {
            Self::Validation(msg)
            | Self::Transport(msg)
            | Self::Protocol(msg)
            | Self::Conflict(msg)
            | Self::NotFound(msg)
            | Self::Config(msg)
            | Self::Cancelled(msg) => msg,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}
