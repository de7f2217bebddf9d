//! Structured logging and optional OpenTelemetry span export.
//!
//! Logs are JSON on stderr; stdout is reserved for decrypted records.
//!
//! # Telemetry invariants
//!
//! - **No passwords, keys or plaintext** may appear in any span attribute or
//!   log field. Records are identified by table and index only.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`).

pub mod init;

pub use init::{init_telemetry, shutdown_telemetry};
