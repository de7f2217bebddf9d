//! Remote-store protocol types.
//!
//! The store is a single CGI endpoint keyed by `(tablename, index)`. Reads are
//! `GET` requests carrying [`ReadQuery`] and answer with a JSON object; writes are
//! form-encoded `POST` requests carrying [`StoreForm`] and answer with free text.
//! The store only ever sees opaque envelope strings.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Record addressing
// ---------------------------------------------------------------------------

/// Address of one record in the remote keyed table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    /// Table the record lives in.
    pub table: String,
    /// Index (key) of the record within the table.
    pub index: String,
    /// JSON key the envelope is read from in the retrieval response.
    /// Falls back to `index` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl RecordRef {
    /// Address `index` in `table`, reading the envelope from the `index` key.
    pub fn new(table: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            index: index.into(),
            field: None,
        }
    }

    /// Read the envelope from `field` instead of the index key.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// The JSON key holding the envelope in a read response.
    pub fn field_key(&self) -> &str {
        self.field.as_deref().unwrap_or(&self.index)
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.index)
    }
}

// ---------------------------------------------------------------------------
// Store endpoint
// ---------------------------------------------------------------------------

/// The `action` field understood by the store endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreAction {
    /// Write `data` to `(tablename, index)`.
    Store,
    /// Read `(tablename, index)` as JSON.
    Read,
}

/// How the store should interpret the `data` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Opaque text; the store quotes it as a JSON string.
    Text,
    /// Raw JSON written verbatim.
    Json,
}

/// Query parameters for a read request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadQuery {
    pub action: StoreAction,
    pub tablename: String,
    pub index: String,
}

impl ReadQuery {
    /// Build the read query for `record`.
    pub fn for_record(record: &RecordRef) -> Self {
        Self {
            action: StoreAction::Read,
            tablename: record.table.clone(),
            index: record.index.clone(),
        }
    }
}

/// Form body for a persistence request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreForm {
    pub action: StoreAction,
    pub tablename: String,
    pub index: String,
    pub data: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

impl StoreForm {
    /// Build the form that stores `envelope` as text under `record`.
    pub fn text(record: &RecordRef, envelope: impl Into<String>) -> Self {
        Self {
            action: StoreAction::Store,
            tablename: record.table.clone(),
            index: record.index.clone(),
            data: envelope.into(),
            data_type: DataType::Text,
        }
    }
}
