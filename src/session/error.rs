use thiserror::Error;

/// Failures the session surfaces to its observers.
///
/// None of these are retried; they are published once and stored as the
/// snapshot's `last_error` until the next failure replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("authorization failed: {0}")]
    AuthorizationFailed(String),
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("{command} failed: {reason}")]
    CommandFailed { command: String, reason: String },
    #[error("could not read player state: {0}")]
    StateFetchFailed(String),
}
