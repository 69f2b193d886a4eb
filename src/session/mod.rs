//! Call and media-stream session layer.
//!
//! The streaming session is a state machine over abstract transport halves
//! so it can be driven by a real WebSocket, by the pump task, or by channel
//! mocks in tests.

pub mod agent;
pub mod builder;
pub mod orchestrator;
pub mod registry;
pub mod relay;
pub mod stream;

pub use agent::{SpeechToText, TextToSpeech, VoiceAgent};
pub use builder::{Teler, TelerBuilder, VoiceService};
pub use orchestrator::{CallOrchestrator, CallProvider};
pub use registry::SessionRegistry;
pub use relay::{ConversationRelay, LanguageModel};
pub use stream::{
    CaptureSource, MediaStream, PlaybackSink, StreamHandle, StreamState, StreamingSession,
};

use crate::error::Result;
use crate::protocol::frames::Frame;
use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outbound half of a media transport.
pub trait FrameSink: Send {
    fn send(&mut self, frame: Frame) -> BoxFuture<'_, Result<()>>;
    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Inbound half of a media transport. `Ok(None)` means the peer closed the
/// connection.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<Frame>>>;
}
