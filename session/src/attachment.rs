//! Attachment payload codec: bytes to a self-describing data-URI string
//! and back. The rest of the system treats the encoded form as an opaque
//! string field.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

/// Errors from decoding a data URI.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("not a data URI")]
    NotADataUri,

    #[error("unsupported data URI encoding (expected base64)")]
    UnsupportedEncoding,

    #[error("invalid base64 payload: {0}")]
    InvalidPayload(String),
}

/// Encode a binary blob as `data:<mime>;base64,<payload>`.
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Decode a data URI back into its media type and bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), AttachmentError> {
    let rest = uri.strip_prefix("data:").ok_or(AttachmentError::NotADataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(AttachmentError::NotADataUri)?;

    let mime = header
        .strip_suffix(";base64")
        .ok_or(AttachmentError::UnsupportedEncoding)?;

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| AttachmentError::InvalidPayload(e.to_string()))?;

    Ok((mime.to_string(), bytes))
}
