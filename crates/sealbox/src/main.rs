//! `sealbox` command-line entry point.
//!
//! Startup sequence:
//! 1. Parse arguments.
//! 2. Load and validate [`Config`] from environment variables.
//! 3. Initialise telemetry (JSON logs on stderr, optional OTLP).
//! 4. Build the store client, the password prompt and the [`Session`].
//! 5. Wire Ctrl-C to cancellation of any pending prompt.
//! 6. Run the requested command.

use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use zeroize::Zeroizing;

use sealbox::config::Config;
use sealbox::prompt::{self, terminal};
use sealbox::session::SessionKeyCache;
use sealbox::store::HttpStore;
use sealbox::{telemetry, EnvelopeError, PlaintextRecord, RecordRef, Session};

#[derive(Debug, Parser)]
#[command(
    name = "sealbox",
    version,
    about = "Password-encrypted records in a remote table"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decrypt a record and print it to stdout.
    Show {
        table: String,
        index: String,
        /// Response key holding the envelope (defaults to the index).
        #[arg(long)]
        field: Option<String>,
    },
    /// Replace a record with JSON read from stdin.
    ///
    /// The session is unlocked by decrypting the unlock record first, which
    /// defaults to the target record itself.
    Put {
        table: String,
        index: String,
        #[arg(long)]
        unlock_table: Option<String>,
        #[arg(long)]
        unlock_index: Option<String>,
        /// Response key holding the unlock record's envelope.
        #[arg(long)]
        field: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // -----------------------------------------------------------------------
    // 1. Arguments
    // -----------------------------------------------------------------------
    let cli = Cli::parse();

    // -----------------------------------------------------------------------
    // 2. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 3. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        kdf_iterations = cfg.kdf_iterations,
        "sealbox starting"
    );

    // -----------------------------------------------------------------------
    // 4. Session
    // -----------------------------------------------------------------------
    let store = HttpStore::new(&cfg.store_url, cfg.http_timeout())
        .context("failed to build store client")?;
    let (prompt, requests) = prompt::channel(cfg.prompt_timeout());
    let _prompt_ui = terminal::spawn(requests);
    let session = Session::new(
        Arc::new(store),
        prompt,
        SessionKeyCache::new(),
        cfg.kdf_params()?,
    );

    // -----------------------------------------------------------------------
    // 5. Cancellation
    // -----------------------------------------------------------------------
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    // -----------------------------------------------------------------------
    // 6. Command
    // -----------------------------------------------------------------------
    let code = match cli.command {
        Command::Show {
            table,
            index,
            field,
        } => {
            let record = with_field(RecordRef::new(table, index), field);
            show(&session, &record, &cancel).await
        }
        Command::Put {
            table,
            index,
            unlock_table,
            unlock_index,
            field,
        } => {
            let unlock = with_field(
                RecordRef::new(
                    unlock_table.unwrap_or_else(|| table.clone()),
                    unlock_index.unwrap_or_else(|| index.clone()),
                ),
                field,
            );
            put(&session, &unlock, &RecordRef::new(table, index), &cancel).await?
        }
    };

    telemetry::shutdown_telemetry();
    Ok(code)
}

fn with_field(record: RecordRef, field: Option<String>) -> RecordRef {
    match field {
        Some(f) => record.with_field(f),
        None => record,
    }
}

async fn show(session: &Session, record: &RecordRef, cancel: &CancellationToken) -> ExitCode {
    let outcome = session
        .decrypt(record, cancel, |outcome| match outcome {
            Ok(plaintext) => println!("{}", pretty(plaintext)),
            Err(e) => report(e),
        })
        .await;
    match outcome {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => exit_code(&e),
    }
}

async fn put(
    session: &Session,
    unlock: &RecordRef,
    target: &RecordRef,
    cancel: &CancellationToken,
) -> Result<ExitCode> {
    let replacement = read_stdin_json().await?;

    if let Err(e) = session.decrypt(unlock, cancel, |_| {}).await {
        report(&e);
        return Ok(exit_code(&e));
    }

    match session.encrypt(target, &replacement).await {
        Ok(response) => {
            println!("{}", response.trim());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            report(&e);
            Ok(exit_code(&e))
        }
    }
}

/// Read stdin and check that it is a JSON document.
async fn read_stdin_json() -> Result<Zeroizing<String>> {
    let text = tokio::task::spawn_blocking(|| {
        let mut buf = Zeroizing::new(String::new());
        std::io::stdin().read_to_string(&mut *buf).map(|_| buf)
    })
    .await
    .context("stdin reader task failed")?
    .context("failed to read record from stdin")?;

    serde_json::from_str::<serde_json::Value>(&text).context("stdin is not valid JSON")?;
    Ok(text)
}

fn pretty(plaintext: &PlaintextRecord) -> String {
    let fallback = || plaintext.as_str().to_owned();
    match plaintext.to_json() {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| fallback()),
        Err(_) => fallback(),
    }
}

fn report(e: &EnvelopeError) {
    eprintln!("error [{}]: {e}", e.code());
}

fn exit_code(e: &EnvelopeError) -> ExitCode {
    match e {
        EnvelopeError::Cancelled => ExitCode::from(130),
        EnvelopeError::Transport(_) => ExitCode::from(75),
        _ => ExitCode::FAILURE,
    }
}
