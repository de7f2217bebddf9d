//! Client-side envelope encryption for records held in a remote keyed table.
//!
//! Records are sealed with AES-256-GCM under a key derived from a user
//! password (PBKDF2-HMAC-SHA256, fresh salt per envelope) and stored as opaque
//! base64 strings. The store never sees plaintext, passwords or keys.
//!
//! Entry point is [`pipeline::Session`]: decrypting a record prompts for its
//! password and unlocks the session; later encrypts reuse the cached key.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod pipeline;
pub mod prompt;
pub mod secret;
pub mod session;
pub mod store;
pub mod telemetry;

pub use common::{EnvelopeError, RecordRef};
pub use pipeline::{open_envelope, seal_envelope, DecryptState, Session};
pub use secret::{Credential, PlaintextRecord};
