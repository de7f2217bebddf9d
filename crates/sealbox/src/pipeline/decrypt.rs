//! Decrypt orchestration: stored envelope → verified plaintext.

use std::fmt;

use common::{EnvelopeError, RecordRef};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{derive_off_thread, Session};
use crate::codec::Envelope;
use crate::crypto::{cipher, derive_aead_key, derive_password_key, KdfParams, KeyUsage};
use crate::secret::{Credential, PlaintextRecord};

/// Progress of one decrypt invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptState {
    /// Envelope retrieved from the store.
    Idle,
    /// Suspended on the password prompt.
    AwaitingPassword,
    /// Running PBKDF2 with the envelope salt.
    Deriving,
    /// Authenticating and decrypting the ciphertext.
    Decrypting,
    Done,
    Failed,
}

impl fmt::Display for DecryptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecryptState::Idle => "idle",
            DecryptState::AwaitingPassword => "awaiting_password",
            DecryptState::Deriving => "deriving",
            DecryptState::Decrypting => "decrypting",
            DecryptState::Done => "done",
            DecryptState::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn advance(state: &mut DecryptState, next: DecryptState) {
    debug!(from = %state, to = %next, "decrypt state");
    *state = next;
}

impl Session {
    /// Retrieve `record`, ask for its password, and open it.
    ///
    /// `render` is called exactly once, with either the verified plaintext or the
    /// failure. On success the password-derived base key is cached so later
    /// [`Session::encrypt`] calls can run without prompting.
    ///
    /// # Errors
    ///
    /// - [`EnvelopeError::Transport`] if the store cannot be reached.
    /// - [`EnvelopeError::Format`] for a malformed envelope; no password is requested.
    /// - [`EnvelopeError::Cancelled`] / [`EnvelopeError::TimedOut`] from the prompt.
    /// - [`EnvelopeError::Crypto`] for a wrong password or tampered envelope.
    #[instrument(skip_all, fields(record = %record))]
    pub async fn decrypt<F>(
        &self,
        record: &RecordRef,
        cancel: &CancellationToken,
        render: F,
    ) -> Result<PlaintextRecord, EnvelopeError>
    where
        F: FnOnce(Result<&PlaintextRecord, &EnvelopeError>),
    {
        let mut state = DecryptState::Idle;
        let outcome = self.run_decrypt(record, cancel, &mut state).await;
        match &outcome {
            Ok(_) => info!("record decrypted"),
            Err(e) => {
                warn!(error = %e, code = e.code(), state = %state, "decrypt failed");
                advance(&mut state, DecryptState::Failed);
            }
        }
        render(outcome.as_ref());
        outcome
    }

    async fn run_decrypt(
        &self,
        record: &RecordRef,
        cancel: &CancellationToken,
        state: &mut DecryptState,
    ) -> Result<PlaintextRecord, EnvelopeError> {
        let wire = self.store.fetch(record).await?;
        let envelope = Envelope::decode(&wire)?;

        // Held until Done or Failed: no encrypt may read the slot mid-unlock.
        let mut slot = tokio::select! {
            _ = cancel.cancelled() => return Err(EnvelopeError::Cancelled),
            slot = self.keys.lock() => slot,
        };

        advance(state, DecryptState::AwaitingPassword);
        let credential = self.prompt.request(record, cancel).await?;

        advance(state, DecryptState::Deriving);
        let base = derive_password_key(&credential);
        drop(credential);
        let key =
            derive_off_thread(base.clone(), envelope.salt, KeyUsage::Decrypt, self.kdf).await?;

        advance(state, DecryptState::Decrypting);
        let opened = cipher::decrypt(&key, &envelope.iv, &envelope.ciphertext)?;
        let plaintext = PlaintextRecord::from_utf8(opened)?;

        slot.set(base);
        advance(state, DecryptState::Done);
        Ok(plaintext)
    }
}

/// Open an encoded envelope with `credential`, synchronously and without
/// touching any session state.
///
/// # Errors
///
/// [`EnvelopeError::Format`] for a malformed envelope or non-UTF-8 plaintext;
/// [`EnvelopeError::Crypto`] if authentication fails.
pub fn open_envelope(
    wire: &str,
    credential: &Credential,
    params: &KdfParams,
) -> Result<PlaintextRecord, EnvelopeError> {
    let envelope = Envelope::decode(wire)?;
    let base = derive_password_key(credential);
    let key = derive_aead_key(&base, &envelope.salt, KeyUsage::Decrypt, params);
    let opened = cipher::decrypt(&key, &envelope.iv, &envelope.ciphertext)?;
    PlaintextRecord::from_utf8(opened)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::codec::{self, IV_LEN, SALT_LEN};
    use crate::pipeline::seal_envelope;
    use crate::pipeline::test_support::{fast_kdf, locked_with, sealed, serve_password};
    use crate::prompt;
    use crate::session::SessionKeyCache;
    use crate::store::{HttpStore, MockRemoteStore, StoreError};

    fn record() -> RecordRef {
        RecordRef::new("journal", "2024-10-27")
    }

    fn store_returning(wire: String) -> MockRemoteStore {
        let mut store = MockRemoteStore::new();
        store
            .expect_fetch()
            .times(1)
            .returning(move |_| Ok(wire.clone()));
        store
    }

    #[test]
    fn open_recovers_plaintext() {
        let wire = sealed("correct-horse", r#"{"note":"hello"}"#);
        let opened = open_envelope(&wire, &Credential::new("correct-horse"), &fast_kdf()).unwrap();
        assert_eq!(opened.as_str(), r#"{"note":"hello"}"#);
    }

    #[test]
    fn opens_envelope_sealed_by_independent_implementation() {
        // Password "correct-horse", 1000 iterations, salt 00..0f, iv 64..6f.
        const WIRE: &str =
            "AAECAwQFBgcICQoLDA0OD2RlZmdoaWprbG1ub1PgNKynlcOuoMgSXDrNHPY51z3mTq8Y6G2Qp2CenpJo";

        let env = Envelope::decode(WIRE).unwrap();
        let salt: [u8; SALT_LEN] = core::array::from_fn(|i| i as u8);
        let iv: [u8; IV_LEN] = core::array::from_fn(|i| 0x64 + i as u8);
        assert_eq!((env.salt, env.iv), (salt, iv));

        let opened = open_envelope(WIRE, &Credential::new("correct-horse"), &fast_kdf()).unwrap();
        assert_eq!(opened.as_str(), r#"{"note":"hello"}"#);

        let err = open_envelope(WIRE, &Credential::new("wrong-password"), &fast_kdf()).unwrap_err();
        assert_eq!(err.code(), "crypto");
        let err = open_envelope("AAEC", &Credential::new("correct-horse"), &fast_kdf()).unwrap_err();
        assert_eq!(err.code(), "format");
    }

    #[test]
    fn wrong_password_is_a_crypto_error() {
        let wire = sealed("correct-horse", r#"{"note":"hello"}"#);
        let err =
            open_envelope(&wire, &Credential::new("wrong-password"), &fast_kdf()).unwrap_err();
        assert!(matches!(err, EnvelopeError::Crypto));
    }

    #[test]
    fn mismatched_iterations_is_a_crypto_error() {
        let wire = sealed("pw", "{}");
        let err = open_envelope(&wire, &Credential::new("pw"), &KdfParams::new(999).unwrap())
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::Crypto));
    }

    #[test]
    fn every_single_bit_flip_in_iv_or_ciphertext_is_detected() {
        let params = fast_kdf();
        let cred = Credential::new("pw");
        let env = Envelope::decode(&sealed("pw", r#"{"a":1}"#)).unwrap();

        for byte in 0..IV_LEN {
            for bit in 0..8 {
                let mut iv = env.iv;
                iv[byte] ^= 1 << bit;
                let wire = codec::encode(&env.salt, &iv, &env.ciphertext);
                let err = open_envelope(&wire, &cred, &params).unwrap_err();
                assert!(matches!(err, EnvelopeError::Crypto), "iv {byte}:{bit}");
            }
        }
        for byte in 0..env.ciphertext.len() {
            for bit in 0..8 {
                let mut ct = env.ciphertext.clone();
                ct[byte] ^= 1 << bit;
                let wire = codec::encode(&env.salt, &env.iv, &ct);
                let err = open_envelope(&wire, &cred, &params).unwrap_err();
                assert!(matches!(err, EnvelopeError::Crypto), "ct {byte}:{bit}");
            }
        }
    }

    #[test]
    fn short_envelope_is_a_format_error() {
        let wire = codec::encode(&[0; SALT_LEN], &[0; IV_LEN], &[]);
        let truncated = &wire[..wire.len() - 8];
        let err = open_envelope(truncated, &Credential::new("pw"), &fast_kdf()).unwrap_err();
        assert!(matches!(err, EnvelopeError::Format(_)));
        // Header only: decodes, but there is no tag to authenticate.
        let err = open_envelope(&wire, &Credential::new("pw"), &fast_kdf()).unwrap_err();
        assert!(matches!(err, EnvelopeError::Crypto));
        assert!(codec::decode(&wire).unwrap().ciphertext.is_empty());
    }

    #[test]
    fn empty_payload_is_not_a_failure() {
        let wire = sealed("pw", "");
        let opened = open_envelope(&wire, &Credential::new("pw"), &fast_kdf()).unwrap();
        assert!(opened.is_empty());
    }

    #[tokio::test]
    async fn decrypt_renders_plaintext_and_unlocks_session() {
        let wire = sealed("correct-horse", r#"{"note":"hello"}"#);
        let session = locked_with(store_returning(wire), "correct-horse");

        let mut rendered = None;
        let opened = session
            .decrypt(&record(), &CancellationToken::new(), |r| {
                rendered = Some(r.map(|p| p.as_str().to_owned()).map_err(|e| e.code()));
            })
            .await
            .unwrap();

        assert_eq!(opened.as_str(), r#"{"note":"hello"}"#);
        assert_eq!(rendered, Some(Ok(r#"{"note":"hello"}"#.to_owned())));
        assert!(session.keys().is_unlocked().await);
    }

    #[tokio::test]
    async fn wrong_password_renders_failure_and_stays_locked() {
        let wire = sealed("correct-horse", r#"{"note":"hello"}"#);
        let session = locked_with(store_returning(wire), "wrong-password");

        let mut rendered = None;
        let err = session
            .decrypt(&record(), &CancellationToken::new(), |r| {
                rendered = Some(r.map(|p| p.as_str().to_owned()).map_err(|e| e.code()));
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EnvelopeError::Crypto));
        assert_eq!(rendered, Some(Err("crypto")));
        assert!(!session.keys().is_unlocked().await);
    }

    #[tokio::test]
    async fn malformed_envelope_fails_before_prompting() {
        // The prompt receiver is dropped: asking for a password would surface
        // as an internal error instead of the format error.
        let (prompt, rx) = prompt::channel(Duration::from_secs(5));
        drop(rx);
        let session = Session::new(
            Arc::new(store_returning("AAAA".into())),
            prompt,
            SessionKeyCache::new(),
            fast_kdf(),
        );
        let err = session
            .decrypt(&record(), &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::Format(_)));
    }

    #[tokio::test]
    async fn missing_field_is_rendered_as_format_error() {
        let mut store = MockRemoteStore::new();
        store.expect_fetch().times(1).returning(|r| {
            Err(StoreError::MissingField {
                record: r.to_string(),
                field: r.field_key().to_owned(),
            })
        });
        let session = locked_with(store, "pw");
        let mut called = 0;
        let err = session
            .decrypt(&record(), &CancellationToken::new(), |r| {
                assert!(r.is_err());
                called += 1;
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "format");
        assert_eq!(called, 1);
    }

    #[tokio::test]
    async fn unreachable_store_is_rendered_as_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = format!("http://{addr}/cgi-bin/table");
        let store = HttpStore::new(&url, Duration::from_secs(5)).unwrap();
        let session = locked_with(store, "pw");

        let mut rendered = None;
        let err = session
            .decrypt(&record(), &CancellationToken::new(), |r| {
                rendered = Some(r.err().map(|e| (e.code(), e.is_retryable())));
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EnvelopeError::Transport(_)));
        assert_eq!(rendered, Some(Some(("transport", true))));
        assert!(!session.keys().is_unlocked().await);
    }

    #[tokio::test]
    async fn cancelled_prompt_leaves_session_locked() {
        let wire = sealed("pw", "{}");
        let (prompt, mut rx) = prompt::channel(Duration::from_secs(5));
        let session = Session::new(
            Arc::new(store_returning(wire)),
            prompt,
            SessionKeyCache::new(),
            fast_kdf(),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            let req = rx.recv().await.unwrap();
            trigger.cancel();
            req.cancelled().await;
        });

        let err = session
            .decrypt(&record(), &cancel, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::Cancelled));
        assert!(!session.keys().is_unlocked().await);
    }

    #[tokio::test]
    async fn successful_decrypt_replaces_previous_key() {
        let first = sealed("first", "{}");
        let second = sealed("second", r#"{"n":2}"#);
        let mut store = MockRemoteStore::new();
        let mut queue = vec![second, first];
        store
            .expect_fetch()
            .times(2)
            .returning(move |_| Ok(queue.pop().unwrap()));

        let (prompt, rx) = prompt::channel(Duration::from_secs(5));
        serve_password(rx, vec!["first", "second"]);
        let session = Session::new(Arc::new(store), prompt, SessionKeyCache::new(), fast_kdf());

        let cancel = CancellationToken::new();
        session.decrypt(&record(), &cancel, |_| {}).await.unwrap();
        session.decrypt(&record(), &cancel, |_| {}).await.unwrap();

        let base = session.keys().get().await.unwrap();
        let resealed = seal_envelope(b"{}", &base, &fast_kdf()).unwrap();
        let (first, second) = (Credential::new("first"), Credential::new("second"));
        assert!(open_envelope(&resealed, &second, &fast_kdf()).is_ok());
        assert!(open_envelope(&resealed, &first, &fast_kdf()).is_err());
    }

    #[test]
    fn states_display_snake_case() {
        assert_eq!(
            DecryptState::AwaitingPassword.to_string(),
            "awaiting_password"
        );
        assert_eq!(DecryptState::Failed.to_string(), "failed");
    }
}
