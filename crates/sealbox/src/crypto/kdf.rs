//! Password-based key derivation: PBKDF2-HMAC-SHA-256 → 256-bit AES-GCM key.
//!
//! Derivation is split in two steps. [`derive_password_key`] imports the password
//! as a [`PasswordKey`], which can do nothing except derive. [`derive_aead_key`]
//! stretches it with a salt into an [`AeadKey`] bound to a single [`KeyUsage`].

use std::fmt;

use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::codec::SALT_LEN;
use crate::secret::Credential;

/// Byte length of a derived AES-256 key.
pub const KEY_LEN: usize = 32;

/// Production PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 250_000;

/// Errors produced by the KDF layer.
#[derive(Debug, Error)]
pub enum KdfError {
    /// PBKDF2 requires at least one iteration.
    #[error("PBKDF2 iteration count must be non-zero")]
    ZeroIterations,
}

/// PBKDF2 parameters that must match between the producer and the consumer of
/// an envelope. The hash (SHA-256) and output length (256 bits) are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    iterations: u32,
}

impl KdfParams {
    /// Parameters with a custom iteration count.
    ///
    /// # Errors
    ///
    /// Returns [`KdfError::ZeroIterations`] if `iterations` is zero.
    pub fn new(iterations: u32) -> Result<Self, KdfError> {
        if iterations == 0 {
            return Err(KdfError::ZeroIterations);
        }
        Ok(Self { iterations })
    }

    /// The PBKDF2 iteration count.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// The single operation an [`AeadKey`] is allowed to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    Encrypt,
    Decrypt,
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyUsage::Encrypt => f.write_str("encrypt"),
            KeyUsage::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// Base key material imported from a password.
///
/// Only [`derive_aead_key`] can consume it; the cipher layer has no entry point
/// that accepts a `PasswordKey`. This is the value the session key cache holds.
#[derive(Clone)]
pub struct PasswordKey {
    material: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for PasswordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordKey([REDACTED])")
    }
}

/// A 256-bit AES-GCM key scoped to one [`KeyUsage`] and one salt.
pub struct AeadKey {
    pub(crate) bytes: Zeroizing<[u8; KEY_LEN]>,
    usage: KeyUsage,
}

impl AeadKey {
    /// The operation this key is restricted to.
    pub fn usage(&self) -> KeyUsage {
        self.usage
    }
}

impl fmt::Debug for AeadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AeadKey({}, [REDACTED])", self.usage)
    }
}

/// Import `password` as derive-only base key material.
pub fn derive_password_key(password: &Credential) -> PasswordKey {
    PasswordKey {
        material: Zeroizing::new(password.expose().to_vec()),
    }
}

/// Stretch `base` with `salt` into an AES-256-GCM key restricted to `usage`.
///
/// Deterministic: the same password, salt and parameters always produce the
/// same key, which is what lets a stored envelope be opened later.
pub fn derive_aead_key(
    base: &PasswordKey,
    salt: &[u8; SALT_LEN],
    usage: KeyUsage,
    params: &KdfParams,
) -> AeadKey {
    let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(&base.material, salt, params.iterations, &mut bytes[..]);
    AeadKey { bytes, usage }
}
