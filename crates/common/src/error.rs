//! Common error types shared across crates.

use std::time::Duration;

use thiserror::Error;

/// Top-level error type for every sealbox operation.
///
/// Variants map to stable machine-readable codes (see [`EnvelopeError::code`]):
/// - [`EnvelopeError::Format`] → `format`
/// - [`EnvelopeError::Crypto`] → `crypto`
/// - [`EnvelopeError::NoSessionKey`] → `no_session_key`
/// - [`EnvelopeError::Transport`] → `transport`
/// - [`EnvelopeError::Cancelled`] → `cancelled`
/// - [`EnvelopeError::TimedOut`] → `timed_out`
/// - [`EnvelopeError::Internal`] → `internal`
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The envelope is malformed: bad transport encoding, shorter than the
    /// salt + iv header, absent from the store response, or not UTF-8 once opened.
    #[error("malformed envelope: {0}")]
    Format(String),

    /// Authenticated decryption failed.
    ///
    /// Deliberately carries no detail: a wrong password and a tampered
    /// ciphertext must be indistinguishable to the caller.
    #[error("decryption failed")]
    Crypto,

    /// Encryption was requested before any record unlocked the session.
    #[error("no session key: decrypt a record to unlock the session first")]
    NoSessionKey,

    /// Retrieval from or persistence to the remote store failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The password prompt was cancelled or dismissed without a submission.
    #[error("password prompt cancelled")]
    Cancelled,

    /// The password prompt was not answered in time.
    #[error("password prompt timed out after {0:?}")]
    TimedOut(Duration),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EnvelopeError {
    /// Returns the stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            EnvelopeError::Format(_) => "format",
            EnvelopeError::Crypto => "crypto",
            EnvelopeError::NoSessionKey => "no_session_key",
            EnvelopeError::Transport(_) => "transport",
            EnvelopeError::Cancelled => "cancelled",
            EnvelopeError::TimedOut(_) => "timed_out",
            EnvelopeError::Internal(_) => "internal",
        }
    }

    /// Returns `true` if the caller may reasonably retry the same operation.
    ///
    /// Only transport failures qualify; format and crypto failures are terminal
    /// for the envelope in question.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EnvelopeError::Transport(_))
    }
}
