//! Wire payload codec.
//!
//! Characteristic payloads cross the GATT layer as base64-encoded byte
//! strings; the session layers operate on the decoded UTF-8 text (a
//! stringified decimal amount or balance).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::core::bluetooth::error::BleError;

/// Encodes text into the base64 form written to a characteristic.
pub(crate) fn encode_payload(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Decodes a base64 characteristic payload back into text.
pub(crate) fn decode_payload(wire: &str) -> Result<String, BleError> {
    let bytes = STANDARD
        .decode(wire)
        .map_err(|e| BleError::ReadFailure(format!("invalid base64 payload: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| BleError::ReadFailure(format!("payload is not valid UTF-8: {e}")))
}
