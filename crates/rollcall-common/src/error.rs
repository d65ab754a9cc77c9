//! Error types for rollcall
//!
//! Every fallible operation in the workspace returns [`RollcallError`]. The
//! variants separate failures of the transport from failures of the store-side
//! contract, so callers can decide what is worth retrying.

/// Application-specific error types
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RollcallError {
    /// The store could not be reached, the connection is closed, or a request timed out.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store answered with a reply that does not match the operation's schema.
    #[error("protocol violation in {operation}: {detail}")]
    ProtocolViolation {
        operation: &'static str,
        detail: String,
    },

    #[error("node '{0}' is not registered")]
    NodeNotRegistered(String),

    /// The store-side operation explicitly signalled an error.
    #[error("store reported error: {0}")]
    ScriptReported(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RollcallError {
    pub fn protocol(operation: &'static str, detail: impl Into<String>) -> Self {
        RollcallError::ProtocolViolation {
            operation,
            detail: detail.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, RollcallError::Transport(_))
    }

    pub fn is_not_registered(&self) -> bool {
        matches!(self, RollcallError::NodeNotRegistered(_))
    }

    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, RollcallError::ProtocolViolation { .. })
    }
}

pub type Result<T> = std::result::Result<T, RollcallError>;
