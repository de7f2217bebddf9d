//! [`HttpStore`]: [`RemoteStore`] over the CGI table endpoint.

use std::time::Duration;

use async_trait::async_trait;
use common::protocol::{ReadQuery, StoreForm};
use common::RecordRef;
use reqwest::{Client, Url};
use tracing::{debug, instrument};

use super::{extract_envelope, RemoteStore, StoreError};

/// HTTP client for a single store endpoint.
///
/// Reads are `GET <url>?action=read&tablename=…&index=…` answered with JSON;
/// writes are form `POST`s with `action=store` answered with free text.
#[derive(Clone, Debug)]
pub struct HttpStore {
    client: Client,
    url: Url,
}

impl HttpStore {
    /// Build a client for `url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidUrl`] if `url` does not parse, or
    /// [`StoreError::Request`] if the HTTP client cannot be constructed.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let url = Url::parse(url).map_err(|e| StoreError::InvalidUrl(e.to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sealbox/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl RemoteStore for HttpStore {
    #[instrument(skip_all, fields(record = %record))]
    async fn fetch(&self, record: &RecordRef) -> Result<String, StoreError> {
        let body: serde_json::Value = self
            .client
            .get(self.url.clone())
            .query(&ReadQuery::for_record(record))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("record retrieved");
        extract_envelope(&body, record)
    }

    #[instrument(skip_all, fields(record = %record, envelope_len = envelope.len()))]
    async fn persist(&self, record: &RecordRef, envelope: &str) -> Result<String, StoreError> {
        let response = self
            .client
            .post(self.url.clone())
            .form(&StoreForm::text(record, envelope))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!("record persisted");
        Ok(response)
    }
}
