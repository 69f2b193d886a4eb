use serde::{Deserialize, Serialize};

use super::codec;
use super::models::StreamFormat;
use crate::error::Result;

/// The in-band identifier reserved for the handshake frame. Audio frames
/// start numbering at [`FIRST_AUDIO_MESSAGE_ID`].
pub const HANDSHAKE_MESSAGE_ID: u64 = 1;
pub const FIRST_AUDIO_MESSAGE_ID: u64 = 2;

/// Identifiers binding a media stream to its owning call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StreamIdentity {
    pub account_id: String,
    pub call_app_id: String,
    pub call_id: String,
    pub stream_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioPayload {
    pub audio_b64: String,
}

/// One discrete wire message on the media stream.
///
/// The handshake carries an integer `message_id` (always 1); audio frames
/// carry decimal-string ids, strictly increasing per stream starting at "2".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Frame {
    #[serde(rename = "start")]
    Start {
        account_id: String,
        call_app_id: String,
        call_id: String,
        stream_id: String,
        message_id: u64,
        data: StreamFormat,
    },
    #[serde(rename = "audio")]
    Audio {
        stream_id: String,
        message_id: String,
        data: AudioPayload,
    },
    #[serde(rename = "interrupt")]
    Interrupt { message_id: u64 },
    #[serde(rename = "clear")]
    Clear,
    #[serde(rename = "error")]
    Error { message: String },
}

impl Frame {
    /// Wrap stream metadata in the initial handshake envelope.
    #[must_use]
    pub fn handshake(identity: &StreamIdentity, format: StreamFormat) -> Self {
        Self::Start {
            account_id: identity.account_id.clone(),
            call_app_id: identity.call_app_id.clone(),
            call_id: identity.call_id.clone(),
            stream_id: identity.stream_id.clone(),
            message_id: HANDSHAKE_MESSAGE_ID,
            data: format,
        }
    }

    /// Wrap raw audio bytes in an audio envelope.
    ///
    /// # Errors
    /// Returns `MalformedPayload` for an empty chunk; an empty media slice
    /// carries no signal and is rejected rather than silently encoded.
    pub fn audio(stream_id: &str, message_id: u64, raw: &[u8]) -> Result<Self> {
        Ok(Self::Audio {
            stream_id: stream_id.to_string(),
            message_id: message_id.to_string(),
            data: AudioPayload {
                audio_b64: codec::encode_audio(raw)?,
            },
        })
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Audio { .. } => "audio",
            Self::Interrupt { .. } => "interrupt",
            Self::Clear => "clear",
            Self::Error { .. } => "error",
        }
    }

    #[must_use]
    pub fn stream_id(&self) -> Option<&str> {
        match self {
            Self::Start { stream_id, .. } | Self::Audio { stream_id, .. } => {
                Some(stream_id.as_str())
            }
            _ => None,
        }
    }
}
