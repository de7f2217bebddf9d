//! Password prompt request/response channel.
//!
//! The orchestrator side holds a [`PasswordPrompt`]; the UI side drains a
//! [`PromptReceiver`] and answers each [`PasswordRequest`] exactly once. A request
//! resolves with the first of:
//!
//! - a submitted [`Credential`],
//! - the caller's [`CancellationToken`] firing,
//! - the configured timeout elapsing,
//! - the UI dropping or dismissing the request.
//!
//! On every outcome other than a submission the request's own token is cancelled
//! so the UI can tear down its input.

pub mod terminal;

use std::time::Duration;

use common::{EnvelopeError, RecordRef};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;
use uuid::Uuid;

use crate::secret::Credential;

/// Number of requests that may queue before [`PasswordPrompt::request`] waits.
const QUEUE_DEPTH: usize = 4;

/// Errors produced while waiting for a password.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    /// No UI is listening for requests.
    #[error("password prompt is not being served")]
    Closed,

    /// The UI closed the prompt without submitting.
    #[error("password prompt dismissed")]
    Dismissed,

    /// The caller cancelled the request.
    #[error("password request cancelled")]
    Cancelled,

    /// Nobody answered within the configured timeout.
    #[error("password prompt timed out after {0:?}")]
    TimedOut(Duration),
}

impl From<PromptError> for EnvelopeError {
    fn from(e: PromptError) -> Self {
        match e {
            PromptError::Cancelled | PromptError::Dismissed => EnvelopeError::Cancelled,
            PromptError::TimedOut(d) => EnvelopeError::TimedOut(d),
            PromptError::Closed => EnvelopeError::Internal(e.to_string()),
        }
    }
}

/// A pending request for the password that unlocks `record`.
#[derive(Debug)]
pub struct PasswordRequest {
    id: Uuid,
    record: RecordRef,
    reply: oneshot::Sender<Credential>,
    cancel: CancellationToken,
}

impl PasswordRequest {
    /// Correlation id, safe to log.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The record the password is for.
    pub fn record(&self) -> &RecordRef {
        &self.record
    }

    /// Returns `true` once the requester has stopped waiting.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the requester has stopped waiting.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Answer the request.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Cancelled`] if the requester already gave up; the
    /// credential is dropped (and zeroed) in that case.
    pub fn submit(self, credential: Credential) -> Result<(), PromptError> {
        self.reply
            .send(credential)
            .map_err(|_| PromptError::Cancelled)
    }

    /// Close the prompt without answering.
    pub fn dismiss(self) {
        debug!(request_id = %self.id, "password request dismissed");
    }
}

/// UI side of the channel.
#[derive(Debug)]
pub struct PromptReceiver {
    rx: mpsc::Receiver<PasswordRequest>,
}

impl PromptReceiver {
    /// Wait for the next request. Returns `None` once every [`PasswordPrompt`]
    /// handle has been dropped.
    pub async fn recv(&mut self) -> Option<PasswordRequest> {
        self.rx.recv().await
    }
}

/// Orchestrator side of the channel. Cheap to clone.
#[derive(Clone, Debug)]
pub struct PasswordPrompt {
    tx: mpsc::Sender<PasswordRequest>,
    timeout: Duration,
}

/// Create a prompt channel whose requests time out after `timeout`.
pub fn channel(timeout: Duration) -> (PasswordPrompt, PromptReceiver) {
    let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
    (PasswordPrompt { tx, timeout }, PromptReceiver { rx })
}

impl PasswordPrompt {
    /// How long a request waits for an answer.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ask the UI for the password that unlocks `record`.
    ///
    /// # Errors
    ///
    /// See [`PromptError`].
    pub async fn request(
        &self,
        record: &RecordRef,
        cancel: &CancellationToken,
    ) -> Result<Credential, PromptError> {
        let (reply, answer) = oneshot::channel();
        let request_cancel = cancel.child_token();
        let request = PasswordRequest {
            id: Uuid::new_v4(),
            record: record.clone(),
            reply,
            cancel: request_cancel.clone(),
        };
        let id = request.id;
        debug!(request_id = %id, record = %record, "requesting password");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PromptError::Cancelled),
            res = tokio::time::timeout(self.timeout, self.exchange(request, answer)) => {
                res.unwrap_or(Err(PromptError::TimedOut(self.timeout)))
            }
        };

        if let Err(e) = &outcome {
            debug!(request_id = %id, error = %e, "password request abandoned");
            request_cancel.cancel();
        }
        outcome
    }

    async fn exchange(
        &self,
        request: PasswordRequest,
        answer: oneshot::Receiver<Credential>,
    ) -> Result<Credential, PromptError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| PromptError::Closed)?;
        answer.await.map_err(|_| PromptError::Dismissed)
    }
}
