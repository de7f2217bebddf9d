//! Decrypt and encrypt orchestration.
//!
//! A [`Session`] bundles the collaborators both pipelines share: the remote
//! store, the password prompt, the session key cache and the KDF parameters.
//!
//! ```text
//! decrypt:  store.fetch ─► decode ─► prompt ─► derive(decrypt) ─► open ─► render + cache base key
//! encrypt:  cache base key ─► fresh salt/iv ─► derive(encrypt) ─► seal ─► encode ─► store.persist
//! ```
//!
//! Both pipelines go through [`SessionKeyCache::lock`], so an encrypt can never
//! observe a half-finished decrypt.

pub mod decrypt;
pub mod encrypt;

pub use decrypt::{open_envelope, DecryptState};
pub use encrypt::seal_envelope;

use std::sync::Arc;

use common::EnvelopeError;

use crate::codec::SALT_LEN;
use crate::crypto::{derive_aead_key, AeadKey, KdfParams, KeyUsage, PasswordKey};
use crate::prompt::PasswordPrompt;
use crate::session::SessionKeyCache;
use crate::store::RemoteStore;

/// Collaborators shared by the decrypt and encrypt pipelines.
///
/// All fields are cheaply cloneable, so a `Session` can be cloned into
/// concurrent tasks that must share one key cache.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn RemoteStore>,
    prompt: PasswordPrompt,
    keys: SessionKeyCache,
    kdf: KdfParams,
}

impl Session {
    /// Assemble a session around an explicitly owned key cache.
    pub fn new(
        store: Arc<dyn RemoteStore>,
        prompt: PasswordPrompt,
        keys: SessionKeyCache,
        kdf: KdfParams,
    ) -> Self {
        Self {
            store,
            prompt,
            keys,
            kdf,
        }
    }

    /// The key cache this session unlocks.
    pub fn keys(&self) -> &SessionKeyCache {
        &self.keys
    }

    /// The KDF parameters envelopes are opened and sealed with.
    pub fn kdf(&self) -> KdfParams {
        self.kdf
    }

    /// Forget the cached base key; encryption fails until the next decrypt.
    pub async fn lock(&self) {
        self.keys.clear().await;
    }
}

/// Run PBKDF2 on the blocking pool; it is too slow for a runtime worker.
async fn derive_off_thread(
    base: PasswordKey,
    salt: [u8; SALT_LEN],
    usage: KeyUsage,
    params: KdfParams,
) -> Result<AeadKey, EnvelopeError> {
    tokio::task::spawn_blocking(move || derive_aead_key(&base, &salt, usage, &params))
        .await
        .map_err(|e| EnvelopeError::Internal(format!("key derivation task failed: {e}")))
}
