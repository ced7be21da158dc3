//! # JSON Serialization Module
//!
//! Request bodies are parsed with simd-json; responses are serialized with
//! `serde_json` (simd-json is primarily for parsing).

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse JSON bytes to a typed value using simd-json
///
/// simd-json parses in place, so the buffer is clobbered.
///
/// # Errors
///
/// Returns `Error::InvalidBody` if parsing fails
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &mut [u8]) -> Result<T> {
    simd_json::from_slice(bytes).map_err(|e| Error::InvalidBody {
        reason: format!("Parse error: {e}"),
    })
}

/// Serialize a value to JSON bytes
///
/// # Errors
///
/// Returns `Error::Write` if serialization fails
pub fn to_json_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::Write {
        reason: format!("Serialize error: {e}"),
    })
}
