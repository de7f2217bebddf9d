//! Common types, protocol definitions, and errors shared across `sealbox` crates.

pub mod error;
pub mod protocol;

pub use error::EnvelopeError;
pub use protocol::RecordRef;
