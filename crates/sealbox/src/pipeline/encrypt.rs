//! Encrypt orchestration: plaintext → fresh envelope → store.

use common::{EnvelopeError, RecordRef};
use tracing::{debug, info, instrument};

use super::{derive_off_thread, Session};
use crate::codec;
use crate::crypto::cipher::{self, random_iv, random_salt};
use crate::crypto::{derive_aead_key, KdfParams, KeyUsage, PasswordKey};

impl Session {
    /// Seal `plaintext` under the cached base key without persisting it.
    ///
    /// Every call draws a fresh salt and IV. The cache is only read.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::NoSessionKey`] until a decrypt has unlocked the session.
    #[instrument(skip_all, fields(len = plaintext.len()))]
    pub async fn seal(&self, plaintext: &str) -> Result<String, EnvelopeError> {
        let base = {
            let slot = self.keys.lock().await;
            slot.get().cloned().ok_or(EnvelopeError::NoSessionKey)?
        };

        let salt = random_salt();
        let iv = random_iv();
        let key = derive_off_thread(base, salt, KeyUsage::Encrypt, self.kdf).await?;
        let ciphertext = cipher::encrypt(&key, &iv, plaintext.as_bytes())?;
        debug!("plaintext sealed");
        Ok(codec::encode(&salt, &iv, &ciphertext))
    }

    /// Seal `plaintext` and store it under `record`.
    ///
    /// Returns the store's free-text response. No password is requested; the
    /// session must already be unlocked by a successful decrypt.
    #[instrument(skip_all, fields(record = %record))]
    pub async fn encrypt(
        &self,
        record: &RecordRef,
        plaintext: &str,
    ) -> Result<String, EnvelopeError> {
        let wire = self.seal(plaintext).await?;
        let response = self.store.persist(record, &wire).await?;
        info!(envelope_len = wire.len(), "record encrypted and stored");
        Ok(response)
    }
}

/// Seal `plaintext` under `base` with a fresh salt and IV, synchronously.
pub fn seal_envelope(
    plaintext: &[u8],
    base: &PasswordKey,
    params: &KdfParams,
) -> Result<String, EnvelopeError> {
    let salt = random_salt();
    let iv = random_iv();
    let key = derive_aead_key(base, &salt, KeyUsage::Encrypt, params);
    let ciphertext = cipher::encrypt(&key, &iv, plaintext)?;
    Ok(codec::encode(&salt, &iv, &ciphertext))
}
