//! Secret-bearing value types: the user's [`Credential`] and opened [`PlaintextRecord`]s.
//!
//! Neither type implements `Serialize`, and both redact themselves in `Debug`, so
//! they cannot leak into logs or traces by accident. Their buffers are zeroed on drop.

use std::fmt;

use common::EnvelopeError;
use zeroize::Zeroizing;

/// An ephemeral password supplied by the user at runtime.
///
/// Lives only as long as the orchestrator step that consumes it.
pub struct Credential(Zeroizing<String>);

impl Credential {
    /// Wrap a password string.
    pub fn new(password: impl Into<String>) -> Self {
        Self(Zeroizing::new(password.into()))
    }

    /// Borrow the password bytes for key derivation.
    pub fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<String> for Credential {
    fn from(password: String) -> Self {
        Self::new(password)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Verified plaintext of an opened envelope. Arbitrary JSON-encoded text.
#[derive(Clone, PartialEq, Eq)]
pub struct PlaintextRecord(Zeroizing<String>);

impl PlaintextRecord {
    /// Wrap already-validated text.
    pub fn new(text: impl Into<String>) -> Self {
        Self(Zeroizing::new(text.into()))
    }

    /// Take ownership of decrypted bytes, rejecting anything that is not UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Format`] if `bytes` is not valid UTF-8.
    pub fn from_utf8(mut bytes: Zeroizing<Vec<u8>>) -> Result<Self, EnvelopeError> {
        let owned = std::mem::take(&mut *bytes);
        match String::from_utf8(owned) {
            Ok(text) => Ok(Self::new(text)),
            Err(e) => {
                // Hand the bytes back to a zeroizing buffer before reporting.
                drop(Zeroizing::new(e.into_bytes()));
                Err(EnvelopeError::Format("plaintext is not valid UTF-8".into()))
            }
        }
    }

    /// Borrow the plaintext.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for a genuinely empty payload.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the plaintext as JSON.
    ///
    /// # Errors
    ///
    /// Returns the parser error if the text is not valid JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.0)
    }
}

impl fmt::Debug for PlaintextRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlaintextRecord([REDACTED; {} bytes])", self.0.len())
    }
}
