use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const DEFAULT_ENCODING: &str = "audio/l16";
pub const DEFAULT_SAMPLE_RATE: u32 = 8000;
pub const DEFAULT_CHANNELS: u32 = 1;
pub const DEFAULT_FLOW_CHUNK_SIZE: u32 = 500;

/// Call status as reported by the provider.
///
/// Transitions are provider-driven and deliberately unconstrained: the
/// registry mirrors whatever the provider reports, including repeated or
/// out-of-order updates. Values outside the documented set fold into
/// `Unknown` instead of failing deserialization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    #[default]
    Initiated,
    Ringing,
    InProgress,
    Answered,
    Completed,
    Failed,
    Busy,
    NoAnswer,
    #[serde(other)]
    Unknown,
}

impl CallStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Ringing => "ringing",
            Self::InProgress => "in-progress",
            Self::Answered => "answered",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Busy => "busy",
            Self::NoAnswer => "no-answer",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    Caller,
    Assistant,
}

/// One conversation turn in a call transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptTurn {
    pub role: TurnRole,
    pub text: String,
}

impl TranscriptTurn {
    #[must_use]
    pub fn new(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// A call record held by the session registry.
///
/// Created when a call request is accepted, mutated by status updates and
/// conversation turns, retained in memory for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallSession {
    pub id: String,
    pub from_number: String,
    pub to_number: String,
    pub flow_url: String,
    pub status: CallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_callback_url: Option<String>,
    pub record: bool,
    /// Unix seconds at creation, immutable thereafter.
    pub created_at: u64,
    pub transcript: Vec<TranscriptTurn>,
}

/// Request to place an outbound call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallRequest {
    pub from_number: String,
    pub to_number: String,
    pub flow_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_callback_url: Option<String>,
    #[serde(default = "default_record")]
    pub record: bool,
}

const fn default_record() -> bool {
    true
}

impl CallRequest {
    #[must_use]
    pub fn new(
        from_number: impl Into<String>,
        to_number: impl Into<String>,
        flow_url: impl Into<String>,
    ) -> Self {
        Self {
            from_number: from_number.into(),
            to_number: to_number.into(),
            flow_url: flow_url.into(),
            status_callback_url: None,
            record: true,
        }
    }
}

/// Provider response to a call creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCall {
    #[serde(alias = "id")]
    pub call_id: String,
    #[serde(default)]
    pub status: CallStatus,
}

/// Audio format descriptor carried by the stream handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamFormat {
    pub encoding: String,
    pub sample_rate: u32,
    pub channels: u32,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            encoding: DEFAULT_ENCODING.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
        }
    }
}

/// Explicit constraints requested when acquiring a capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub sample_rate: u32,
    pub channels: u32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    /// Fixed duration of each capture slice; one slice becomes exactly one
    /// outbound audio frame.
    pub chunk: Duration,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            chunk: Duration::from_secs(1),
        }
    }
}

/// Call-handling flow descriptors, serialized for the provider's flow
/// endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CallFlow {
    Stream {
        ws_url: String,
        chunk_size: u32,
        record: bool,
    },
    Dial {
        from_number: String,
        to_number: String,
        status_callback_url: String,
        record: bool,
    },
    Play {
        file_url: String,
    },
}

impl CallFlow {
    /// Stream flow pointing the provider's media stream at `ws_url`.
    #[must_use]
    pub fn stream(ws_url: impl Into<String>) -> Self {
        Self::Stream {
            ws_url: ws_url.into(),
            chunk_size: DEFAULT_FLOW_CHUNK_SIZE,
            record: true,
        }
    }

    #[must_use]
    pub fn dial(
        from_number: impl Into<String>,
        to_number: impl Into<String>,
        status_callback_url: impl Into<String>,
    ) -> Self {
        Self::Dial {
            from_number: from_number.into(),
            to_number: to_number.into(),
            status_callback_url: status_callback_url.into(),
            record: true,
        }
    }

    #[must_use]
    pub fn play(file_url: impl Into<String>) -> Self {
        Self::Play {
            file_url: file_url.into(),
        }
    }
}

/// Unix seconds, saturating at zero if the clock is before the epoch.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
