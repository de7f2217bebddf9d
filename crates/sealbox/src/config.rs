//! Configuration loading and validation.
//!
//! All values are read from environment variables at startup. The process exits
//! with a clear error message if any required variable is missing or invalid.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;

use crate::crypto::{KdfParams, DEFAULT_ITERATIONS};

/// Lowest PBKDF2 iteration count accepted from configuration.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Validated client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Endpoint of the keyed-table store, e.g.
    /// `https://example.org/cgi-bin/table`. **Required.**
    pub store_url: String,

    /// PBKDF2-HMAC-SHA256 iteration count for every envelope.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// How long a password prompt may stay unanswered.
    #[serde(default = "default_prompt_timeout")]
    pub prompt_timeout_secs: u64,

    /// Per-request timeout for store calls.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP collector endpoint. Span export is disabled when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
}

fn default_kdf_iterations() -> u32 {
    DEFAULT_ITERATIONS
}
fn default_prompt_timeout() -> u64 {
    300
}
fn default_http_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_source(config::Environment::default())
    }

    fn from_source(env: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(env)
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.store_url, "STORE_URL")?;
        let url = Url::parse(&self.store_url).context("STORE_URL is not a valid URL")?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("STORE_URL must use http or https, got `{}`", url.scheme());
        }

        if self.kdf_iterations < MIN_KDF_ITERATIONS {
            anyhow::bail!("KDF_ITERATIONS must be at least {MIN_KDF_ITERATIONS}");
        }
        if self.prompt_timeout_secs == 0 {
            anyhow::bail!("PROMPT_TIMEOUT_SECS must be > 0");
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("HTTP_TIMEOUT_SECS must be > 0");
        }
        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            ensure_non_empty(endpoint, "OTEL_EXPORTER_OTLP_ENDPOINT")?;
        }
        Ok(())
    }

    pub fn kdf_params(&self) -> Result<KdfParams> {
        KdfParams::new(self.kdf_iterations).context("invalid KDF_ITERATIONS")
    }

    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
