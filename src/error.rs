use thiserror::Error;

use crate::state::lifecycle::InvalidTransition;

/// Errors raised while handling one connection's lifecycle or messages.
///
/// These never escape the session actor: they are logged and the offending
/// command is dropped, leaving the other connections untouched.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Lifecycle event not legal from the connection's current state.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// Message references a participant that is no longer registered.
    #[error("unknown participant `{0}`")]
    UnknownParticipant(String),
    /// Connection id collides with a live participant.
    #[error("participant `{0}` is already registered")]
    DuplicateParticipant(String),
    /// Application event with unusable arguments.
    #[error("malformed event: {0}")]
    MalformedEvent(String),
}

/// Failures delivering messages to peers.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer's writer channel is gone.
    #[error("connection `{0}` closed")]
    ConnectionClosed(String),
    /// Some recipients of a broadcast could not be reached.
    #[error("broadcast undelivered to {failed} of {total} connections")]
    Undelivered {
        /// Connections whose writer was closed.
        failed: usize,
        /// Connections targeted.
        total: usize,
    },
    /// The message could not be encoded.
    #[error("failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced to the HTTP/WebSocket edge.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The session actor stopped accepting commands.
    #[error("session unavailable")]
    SessionUnavailable,
}
