//! Error types for the pull protocol.

use thiserror::Error;

/// Errors surfaced by the pull engine and its collaborators.
///
/// Stale or unsolicited protocol messages are not errors; they are dropped.
#[derive(Debug, Error)]
pub enum PullError {
    /// No free outgoing nonce was found within the attempt budget.
    #[error("failed to generate a unique nonce after {attempts} attempts")]
    NonceExhausted { attempts: usize },

    /// Transport-level send failure reported by an adapter.
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration could not be parsed or is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for pull operations.
pub type Result<T> = std::result::Result<T, PullError>;
