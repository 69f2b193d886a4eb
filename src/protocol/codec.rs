//! Audio payload encoding and the wire-boundary frame parser.
//!
//! Raw audio crosses the transport as standard base64 inside typed JSON
//! envelopes. Parsing distinguishes three failure classes so the session can
//! decide what to drop and what to log: `MalformedPayload` (not JSON / not
//! base64), `SchemaViolation` (missing discriminator or required fields) and
//! `UnknownKind` (unrecognized discriminator).

use base64::Engine as _;
use base64::engine::general_purpose;
use serde_json::Value;

use super::frames::Frame;
use crate::error::{Error, Result};

const KNOWN_KINDS: &[&str] = &["start", "audio", "interrupt", "clear", "error"];

/// Encode raw audio bytes as transport-safe base64 text.
///
/// # Errors
/// Returns `MalformedPayload` for empty input; an empty chunk carries no
/// signal and is rejected rather than silently encoded.
#[allow(clippy::result_large_err)]
pub fn encode_audio(raw: &[u8]) -> Result<String> {
    if raw.is_empty() {
        return Err(Error::MalformedPayload(
            "empty audio payload".to_string(),
        ));
    }
    Ok(general_purpose::STANDARD.encode(raw))
}

/// Decode transport text back to raw audio bytes.
///
/// # Errors
/// Returns `MalformedPayload` when the input is not valid base64.
#[allow(clippy::result_large_err)]
pub fn decode_audio(text: &str) -> Result<Vec<u8>> {
    general_purpose::STANDARD
        .decode(text.as_bytes())
        .map_err(|err| Error::MalformedPayload(format!("invalid base64 audio: {err}")))
}

/// Parse one wire message into a typed frame.
///
/// # Errors
/// `MalformedPayload` when the text is not JSON, `SchemaViolation` when the
/// `type` discriminator or a required field is missing, `UnknownKind` for an
/// unrecognized discriminator.
#[allow(clippy::result_large_err)]
pub fn parse_frame(text: &str) -> Result<Frame> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| Error::MalformedPayload(format!("frame is not valid JSON: {err}")))?;

    let kind = value
        .get("type")
        .ok_or_else(|| Error::SchemaViolation("missing `type` discriminator".to_string()))?
        .as_str()
        .ok_or_else(|| Error::SchemaViolation("`type` is not a string".to_string()))?
        .to_owned();

    if !KNOWN_KINDS.contains(&kind.as_str()) {
        return Err(Error::UnknownKind(kind.to_string()));
    }

    serde_json::from_value(value)
        .map_err(|err| Error::SchemaViolation(format!("{kind} frame: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_rejects_empty_input() {
        let err = encode_audio(&[]).unwrap_err();
        assert!(matches!(err, Error::MalformedPayload(_)));
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        let err = decode_audio("not base64!!").unwrap_err();
        assert!(matches!(err, Error::MalformedPayload(_)));
    }

    #[test]
    fn round_trip_single_byte() {
        let raw = [0x7fu8];
        let text = encode_audio(&raw).unwrap();
        assert_eq!(decode_audio(&text).unwrap(), raw);
    }
}
