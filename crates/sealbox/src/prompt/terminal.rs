//! Serve password requests from an interactive terminal.

use std::fmt;
use std::thread;

use dialoguer::Password;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{PasswordRequest, PromptReceiver};
use crate::secret::Credential;

/// Spawn a task that answers every request on `rx` with a hidden-input
/// terminal prompt.
///
/// Each read runs on its own detached thread. A request cancelled while the user
/// is typing is abandoned and its input discarded; the process can exit without
/// waiting for that read to finish.
pub fn spawn(mut rx: PromptReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            serve(request, read_terminal).await;
        }
        debug!("password prompt channel closed");
    })
}

fn read_terminal(label: String) -> dialoguer::Result<Credential> {
    Password::new()
        .with_prompt(label)
        .allow_empty_password(true)
        .interact()
        .map(Credential::new)
}

async fn serve<R, E>(request: PasswordRequest, read: R)
where
    R: FnOnce(String) -> Result<Credential, E> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let label = format!("Password for {}", request.record());
    let (tx, rx) = oneshot::channel();
    // Not on the blocking pool: runtime shutdown joins that pool.
    let started = thread::Builder::new()
        .name("password-prompt".into())
        .spawn(move || {
            let _ = tx.send(read(label));
        });
    if let Err(e) = started {
        warn!(error = %e, "failed to start password prompt thread");
        request.dismiss();
        return;
    }

    let answer = tokio::select! {
        _ = request.cancelled() => {
            debug!(request_id = %request.id(), "password request withdrawn");
            return;
        }
        res = rx => res,
    };

    match answer {
        Ok(Ok(credential)) => {
            if request.submit(credential).is_err() {
                debug!("password submitted after the request was abandoned");
            }
        }
        Ok(Err(e)) => {
            warn!(error = %e, "failed to read password from terminal");
            request.dismiss();
        }
        Err(_) => {
            warn!("password prompt thread exited without answering");
            request.dismiss();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::{Duration, Instant};

    use common::RecordRef;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::prompt::{channel, PromptError};

    fn record() -> RecordRef {
        RecordRef::new("journal", "7")
    }

    #[tokio::test]
    async fn answered_read_resolves_request() {
        let (prompt, mut rx) = channel(Duration::from_secs(5));
        tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            serve(request, |label| {
                assert_eq!(label, "Password for journal/7");
                Ok::<_, io::Error>(Credential::new("correct-horse"))
            })
            .await;
        });

        let credential = prompt
            .request(&record(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(credential.expose(), b"correct-horse");
    }

    #[tokio::test]
    async fn failed_read_dismisses_request() {
        let (prompt, mut rx) = channel(Duration::from_secs(5));
        tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            let read = |_: String| Err::<Credential, _>(io::Error::other("not a tty"));
            serve(request, read).await;
        });

        let err = prompt
            .request(&record(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, PromptError::Dismissed);
    }

    #[test]
    fn cancelled_read_does_not_delay_runtime_shutdown() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let started = Instant::now();

        runtime.block_on(async {
            let (prompt, mut rx) = channel(Duration::from_secs(30));
            let server = tokio::spawn(async move {
                let request = rx.recv().await.unwrap();
                serve(request, |_| {
                    // A user who never presses Enter.
                    thread::sleep(Duration::from_secs(3));
                    Ok::<_, io::Error>(Credential::new("late"))
                })
                .await;
            });

            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                trigger.cancel();
            });

            let err = prompt.request(&record(), &cancel).await.unwrap_err();
            assert_eq!(err, PromptError::Cancelled);
            server.await.unwrap();
        });

        drop(runtime);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
