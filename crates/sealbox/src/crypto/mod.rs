//! Key derivation and AES-256-GCM primitives.
//!
//! This module is intentionally free of network and prompt dependencies.
//! It provides the low-level operations composed by [`crate::pipeline`].
//!
//! # Key hierarchy
//!
//! ```text
//! Credential ──derive_password_key──► PasswordKey (derive-only, cached per session)
//!                                         │
//!                        derive_aead_key(salt, usage, PBKDF2-SHA-256)
//!                                         ▼
//!                                      AeadKey (AES-256-GCM, encrypt XOR decrypt)
//! ```

pub mod cipher;
pub mod kdf;

pub use kdf::{
    derive_aead_key, derive_password_key, AeadKey, KdfParams, KeyUsage, PasswordKey,
    DEFAULT_ITERATIONS, KEY_LEN,
};
