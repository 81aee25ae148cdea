//! Error types for shell-link

use thiserror::Error;

use crate::models::LoadingState;

/// Errors surfaced by the engine, the session driver and the requisition bus.
///
/// Protocol problems on the inbound channel (malformed frames, unknown request
/// ids, late chunks) never reach callers as errors; they are logged and
/// dropped by the demultiplexer. The variants here are either caller contract
/// violations or infrastructure failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShellLinkError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Unknown execution context: {0}")]
    UnknownContext(String),

    #[error("Execution context {context} is busy ({state})")]
    ContextBusy { context: String, state: LoadingState },

    #[error("Invalid state transition for {context}: {from} -> {to}")]
    InvalidTransition {
        context: String,
        from: LoadingState,
        to: LoadingState,
    },

    #[error("Result not found: {0}")]
    ResultNotFound(String),

    #[error("Result cannot be paged: {0}")]
    NotPageable(String),

    #[error("Handler error: {0}")]
    HandlerError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Session closed")]
    SessionClosed,
}

impl From<serde_json::Error> for ShellLinkError {
    fn from(err: serde_json::Error) -> Self {
        ShellLinkError::SerializationError(err.to_string())
    }
}

/// Result type for shell-link operations
pub type Result<T> = std::result::Result<T, ShellLinkError>;
