//! Request codec: stitching instructions as opaque URL tokens.
//!
//! The whole instruction set travels in the URL, so every later request can
//! rebuild it without server-side state. A token is compact JSON encoded with
//! standard base64. Its alphabet only needs `+`, `/` and `=` escaped to be
//! used inside a query value; callers that embed it elsewhere (e.g. a path
//! segment) do their own escaping.

use base64::{
    Engine as _,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Standard alphabet, padded on encode, padding optional on decode.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("token does not hold the expected JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode any serializable value into a token.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    let json = serde_json::to_vec(value)?;
    Ok(TOKEN_ENGINE.encode(json))
}

/// Decode a token back into a value.
///
/// A space is read as `+`: tokens are placed unescaped in query strings and
/// form decoding turns `+` into a space on the way back in.
pub fn decode<T: DeserializeOwned>(token: &str) -> Result<T, CodecError> {
    let normalized = token.trim().replace(' ', "+");
    let bytes = TOKEN_ENGINE.decode(normalized.as_bytes())?;
    Ok(serde_json::from_slice(&bytes)?)
}
