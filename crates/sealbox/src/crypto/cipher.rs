//! AES-256-GCM encryption and decryption with usage-scoped keys.
//!
//! **Never reuse an iv under the same key.** GCM iv reuse breaks both
//! confidentiality and authentication. Every envelope gets a fresh salt (and so a
//! fresh key) and a fresh iv from the OS CSPRNG via [`random_salt`] and [`random_iv`].

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use common::EnvelopeError;
use thiserror::Error;
use zeroize::Zeroizing;

use super::kdf::{AeadKey, KeyUsage};
use crate::codec::{IV_LEN, SALT_LEN};

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The key was derived for the other operation.
    #[error("key derived for {actual} cannot be used to {attempted}")]
    WrongUsage {
        attempted: KeyUsage,
        actual: KeyUsage,
    },

    /// AES-GCM encryption or authenticated decryption failed.
    #[error("aead operation failed")]
    AeadFailure,
}

impl From<CipherError> for EnvelopeError {
    fn from(e: CipherError) -> Self {
        match e {
            CipherError::AeadFailure => EnvelopeError::Crypto,
            wrong @ CipherError::WrongUsage { .. } => EnvelopeError::Internal(wrong.to_string()),
        }
    }
}

/// A fresh random PBKDF2 salt.
pub fn random_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// A fresh random AES-GCM iv.
pub fn random_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypt `plaintext` under an encrypt-scoped `key`, returning ciphertext + tag.
///
/// # Errors
///
/// Returns [`CipherError::WrongUsage`] for a decrypt-scoped key and
/// [`CipherError::AeadFailure`] on an internal AEAD error.
pub fn encrypt(key: &AeadKey, iv: &[u8; IV_LEN], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = build_cipher(key, KeyUsage::Encrypt)?;
    cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|_| CipherError::AeadFailure)
}

/// Authenticate and decrypt `ciphertext` (with trailing tag) under a
/// decrypt-scoped `key`.
///
/// # Errors
///
/// Returns [`CipherError::WrongUsage`] for an encrypt-scoped key and
/// [`CipherError::AeadFailure`] if authentication fails (wrong key or tampered data).
pub fn decrypt(
    key: &AeadKey,
    iv: &[u8; IV_LEN],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CipherError> {
    let cipher = build_cipher(key, KeyUsage::Decrypt)?;
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CipherError::AeadFailure)
}

fn build_cipher(key: &AeadKey, attempted: KeyUsage) -> Result<Aes256Gcm, CipherError> {
    if key.usage() != attempted {
        return Err(CipherError::WrongUsage {
            attempted,
            actual: key.usage(),
        });
    }
    Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.bytes[..])))
}
