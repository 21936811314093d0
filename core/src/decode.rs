//! Decoding layer: raw response bytes into a caller-chosen type.

use serde::de::DeserializeOwned;

use crate::error::SpiderError;

/// Decode a JSON body into `T`.
///
/// Missing required fields, type mismatches and malformed JSON all yield
/// `SpiderError::DecodingFailed`; no partially built value is ever returned.
/// Extra fields are ignored unless `T` opts into `deny_unknown_fields`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SpiderError> {
    Ok(serde_json::from_slice(bytes)?)
}
