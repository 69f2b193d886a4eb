#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use error::{Error, Result};
pub use protocol::frames::{Frame, StreamIdentity};
pub use protocol::models::{
    CallFlow, CallRequest, CallSession, CallStatus, CaptureConstraints, StreamFormat,
    TranscriptTurn, TurnRole,
};
pub use session::{
    CallOrchestrator, CallProvider, CaptureSource, ConversationRelay, FrameSink, FrameSource,
    LanguageModel, MediaStream, PlaybackSink, SessionRegistry, SpeechToText, StreamHandle,
    StreamState, StreamingSession, Teler, TelerBuilder, TextToSpeech, VoiceAgent, VoiceService,
};
pub use transport::rest::{MessagesRestAdapter, SpeechRestAdapter, TelerRestAdapter};

use futures::{SinkExt, StreamExt};
use session::BoxFuture;
use tokio_tungstenite::tungstenite::protocol::Message;
use transport::ws::WsStream;

const TRACE_LOG_MAX_BYTES: usize = 1024;
const MAX_AUDIO_CHUNK_BYTES: usize = 1024 * 1024;
const TRACE_TRUNCATE_SUFFIX: &str = "... (truncated)";

/// A typed client over one media-stream WebSocket connection.
///
/// Thread safety: `StreamClient` is `Send` but not `Sync` because the
/// underlying WebSocket stream is not `Sync`.
#[must_use]
pub struct StreamClient {
    stream: WsStream,
}

impl StreamClient {
    /// Connect to a media-stream endpoint.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the connection fails.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let stream = transport::ws::connect(ws_url).await?;
        Ok(Self { stream })
    }

    /// Send a frame to the peer.
    ///
    /// # Errors
    /// Returns an error if the frame is invalid, serialization fails or the
    /// WebSocket send fails.
    pub async fn send(&mut self, frame: Frame) -> Result<()> {
        validate_outbound(&frame)?;
        let json = serde_json::to_string(&frame)?;
        tracing::trace!("Sending frame: {}", safe_truncate(&json, TRACE_LOG_MAX_BYTES));
        self.stream.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Receive the next frame. `Ok(None)` means the peer closed the
    /// connection.
    ///
    /// # Errors
    /// Returns an error if the WebSocket fails or the text cannot be parsed
    /// as a known frame.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        while let Some(msg) = self.stream.next().await {
            match msg? {
                Message::Text(text) => {
                    tracing::trace!(
                        "Received frame: {}",
                        safe_truncate(&text, TRACE_LOG_MAX_BYTES)
                    );
                    return Ok(Some(protocol::codec::parse_frame(&text)?));
                }
                Message::Close(_) => {
                    tracing::info!("WebSocket connection closed by peer");
                    return Ok(None);
                }
                Message::Ping(payload) => {
                    tracing::debug!("Received Ping, sending Pong");
                    self.stream.send(Message::Pong(payload)).await?;
                }
                _ => (),
            }
        }
        Ok(None)
    }

    /// Split the client into a sender and a receiver for concurrent usage.
    pub fn split(self) -> (FrameSender, FrameReceiver) {
        let (write, read) = self.stream.split();
        (FrameSender { write }, FrameReceiver { read })
    }

    /// Re-unify a split client.
    ///
    /// # Errors
    /// Returns an error if the split halves don't match or cannot be
    /// reunited.
    #[allow(clippy::result_large_err)]
    pub fn unsplit(sender: FrameSender, receiver: FrameReceiver) -> Result<Self> {
        let stream = receiver.read.reunite(sender.write)?;
        Ok(Self { stream })
    }
}

/// The sending half of a split `StreamClient`.
pub struct FrameSender {
    write: futures::stream::SplitSink<WsStream, Message>,
}

impl FrameSender {
    /// Send a frame.
    ///
    /// # Errors
    /// Returns an error if validation, serialization or sending fails.
    pub async fn send(&mut self, frame: Frame) -> Result<()> {
        validate_outbound(&frame)?;
        let json = serde_json::to_string(&frame)?;
        tracing::trace!(
            "Sending frame (split): {}",
            safe_truncate(&json, TRACE_LOG_MAX_BYTES)
        );
        self.write.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Close the outbound half.
    ///
    /// # Errors
    /// Returns an error if the close handshake fails.
    pub async fn close(&mut self) -> Result<()> {
        self.write.send(Message::Close(None)).await?;
        Ok(())
    }
}

impl FrameSink for FrameSender {
    fn send(&mut self, frame: Frame) -> BoxFuture<'_, Result<()>> {
        Box::pin(Self::send(self, frame))
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(Self::close(self))
    }
}

/// The receiving half of a split `StreamClient`.
pub struct FrameReceiver {
    read: futures::stream::SplitStream<WsStream>,
}

impl FrameReceiver {
    /// Receive the next frame. `Ok(None)` means the peer closed the
    /// connection.
    ///
    /// # Errors
    /// Returns an error if the WebSocket fails or the text cannot be parsed
    /// as a known frame.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        while let Some(msg) = self.read.next().await {
            match msg? {
                Message::Text(text) => {
                    tracing::trace!(
                        "Received frame (split): {}",
                        safe_truncate(&text, TRACE_LOG_MAX_BYTES)
                    );
                    return Ok(Some(protocol::codec::parse_frame(&text)?));
                }
                Message::Close(_) => {
                    tracing::info!("WebSocket connection closed by peer");
                    return Ok(None);
                }
                _ => (),
            }
        }
        Ok(None)
    }
}

impl FrameSource for FrameReceiver {
    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<Frame>>> {
        Box::pin(Self::next_frame(self))
    }
}

#[allow(clippy::result_large_err)]
fn validate_outbound(frame: &Frame) -> Result<()> {
    match frame {
        Frame::Audio { data, .. } => {
            if data.audio_b64.is_empty() {
                return Err(Error::MalformedPayload(
                    "audio frame with empty payload".to_string(),
                ));
            }
            let size = estimate_base64_decoded_len(&data.audio_b64)?;
            if size > MAX_AUDIO_CHUNK_BYTES {
                return Err(Error::MalformedPayload(format!(
                    "audio chunk exceeds 1MB ({size} bytes)",
                )));
            }
        }
        Frame::Start { message_id, .. } => {
            if *message_id != protocol::frames::HANDSHAKE_MESSAGE_ID {
                return Err(Error::ProtocolViolation(format!(
                    "handshake must carry message_id {}, got {message_id}",
                    protocol::frames::HANDSHAKE_MESSAGE_ID,
                )));
            }
        }
        _ => {}
    }
    Ok(())
}

#[allow(clippy::result_large_err)]
fn estimate_base64_decoded_len(s: &str) -> Result<usize> {
    let bytes = s.as_bytes();
    if bytes.len() % 4 != 0 {
        return Err(Error::MalformedPayload(
            "audio frame has invalid base64 length".to_string(),
        ));
    }

    let mut padding = 0;
    let mut seen_padding = false;
    for &b in bytes {
        if b == b'=' {
            seen_padding = true;
            padding += 1;
            continue;
        }
        if seen_padding {
            return Err(Error::MalformedPayload(
                "audio frame has malformed base64 padding".to_string(),
            ));
        }
    }
    if padding > 2 {
        return Err(Error::MalformedPayload(
            "audio frame has malformed base64 padding".to_string(),
        ));
    }

    Ok(bytes.len() / 4 * 3 - padding)
}

fn safe_truncate(s: &str, max_bytes: usize) -> std::borrow::Cow<'_, str> {
    if s.len() <= max_bytes {
        return std::borrow::Cow::Borrowed(s);
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    std::borrow::Cow::Owned(format!(
        "{} {} {} bytes",
        &s[..end],
        TRACE_TRUNCATE_SUFFIX,
        s.len() - end
    ))
}
