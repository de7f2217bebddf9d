//! Envelope wire format.
//!
//! ```text
//! base64( salt[16] ‖ iv[12] ‖ ciphertext[N] )
//! ```
//!
//! `ciphertext` carries the trailing 16-byte AES-GCM tag. The base64 alphabet is the
//! standard one with `=` padding on output; decoding accepts unpadded input too.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use common::EnvelopeError;
use thiserror::Error;

/// Byte length of the PBKDF2 salt.
pub const SALT_LEN: usize = 16;

/// Byte length of the AES-GCM iv (96 bits).
pub const IV_LEN: usize = 12;

/// Byte length of the fixed salt + iv header; the minimum decoded envelope length.
pub const HEADER_LEN: usize = SALT_LEN + IV_LEN;

/// Byte length of the AES-GCM authentication tag at the end of the ciphertext.
pub const TAG_LEN: usize = 16;

const WIRE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors produced while decoding an envelope string.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The transport string is not valid base64.
    #[error("invalid transport encoding: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    /// The decoded bytes cannot hold the salt + iv header.
    #[error("decoded length {0} is below the {HEADER_LEN}-byte minimum")]
    TooShort(usize),
}

impl From<CodecError> for EnvelopeError {
    fn from(e: CodecError) -> Self {
        EnvelopeError::Format(e.to_string())
    }
}

/// A parsed envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// PBKDF2 salt the AEAD key was derived with.
    pub salt: [u8; SALT_LEN],
    /// AES-GCM iv.
    pub iv: [u8; IV_LEN],
    /// Ciphertext + authentication tag.
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encode this envelope to its transport string.
    pub fn encode(&self) -> String {
        encode(&self.salt, &self.iv, &self.ciphertext)
    }

    /// Parse a transport string.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidEncoding`] for bad base64 and
    /// [`CodecError::TooShort`] when fewer than [`HEADER_LEN`] bytes decode.
    pub fn decode(wire: &str) -> Result<Self, CodecError> {
        decode(wire)
    }
}

/// Concatenate `salt ‖ iv ‖ ciphertext` and base64-encode the result.
pub fn encode(salt: &[u8; SALT_LEN], iv: &[u8; IV_LEN], ciphertext: &[u8]) -> String {
    let mut raw = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    raw.extend_from_slice(salt);
    raw.extend_from_slice(iv);
    raw.extend_from_slice(ciphertext);
    WIRE.encode(raw)
}

/// Decode a transport string and slice it into salt, iv and ciphertext.
///
/// Surrounding ASCII whitespace is ignored.
///
/// # Errors
///
/// See [`Envelope::decode`].
pub fn decode(wire: &str) -> Result<Envelope, CodecError> {
    let raw = WIRE.decode(wire.trim_matches(|c: char| c.is_ascii_whitespace()))?;
    if raw.len() < HEADER_LEN {
        return Err(CodecError::TooShort(raw.len()));
    }
    let (header, ciphertext) = raw.split_at(HEADER_LEN);
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    salt.copy_from_slice(&header[..SALT_LEN]);
    iv.copy_from_slice(&header[SALT_LEN..]);
    Ok(Envelope {
        salt,
        iv,
        ciphertext: ciphertext.to_vec(),
    })
}
