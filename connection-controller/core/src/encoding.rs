//! DNS-safe encoding of namespace names for use in subdomains.

use data_encoding::BASE32_NOPAD;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid base32: {0}")]
    Base32(#[from] data_encoding::DecodeError),

    #[error("decoded value is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Encodes a string as lowercase, unpadded base32.
///
/// The output only contains `[a-z2-7]`.
pub fn encode_b32(value: &str) -> String {
    BASE32_NOPAD.encode(value.as_bytes()).to_ascii_lowercase()
}

pub fn decode_b32(encoded: &str) -> Result<String, DecodeError> {
    let bytes = BASE32_NOPAD.decode(encoded.to_ascii_uppercase().as_bytes())?;
    Ok(String::from_utf8(bytes)?)
}
