use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use super::{FrameSink, FrameSource};
use crate::error::{Error, Result};
use crate::protocol::codec;
use crate::protocol::frames::{Frame, StreamIdentity, FIRST_AUDIO_MESSAGE_ID};
use crate::protocol::models::{CaptureConstraints, StreamFormat};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// Local audio capture device. One opened source yields fixed-duration
/// slices; each slice becomes exactly one outbound audio frame.
#[async_trait::async_trait]
pub trait CaptureSource: Send {
    /// Acquire the device with explicit constraints and return its chunk
    /// stream. A closed channel means the capture pipeline ended.
    ///
    /// # Errors
    /// Returns `CaptureUnavailable` when the device is denied or missing.
    async fn open(&mut self, constraints: &CaptureConstraints) -> Result<mpsc::Receiver<Vec<u8>>>;

    /// Release the device. Called at most once per successful `open`.
    async fn close(&mut self);
}

/// Destination for decoded inbound audio.
#[async_trait::async_trait]
pub trait PlaybackSink: Send {
    async fn play(&mut self, pcm: Vec<u8>) -> Result<()>;

    /// Drop any buffered or in-progress playback.
    async fn clear(&mut self);
}

/// One bidirectional audio channel bound to a single call.
///
/// State machine: `connecting → active → closing → closed`, no reentry to
/// `active`. The session emits exactly one handshake frame (message id 1)
/// when entering `active`; outbound audio ids are assigned strictly
/// increasing from 2 with no gaps.
pub struct StreamingSession {
    identity: StreamIdentity,
    format: StreamFormat,
    state: StreamState,
    next_message_id: u64,
    peer_format: Option<StreamFormat>,
    inbound_audio_seen: bool,
    transport: Box<dyn FrameSink>,
    sink: Box<dyn PlaybackSink>,
    capture: Option<Box<dyn CaptureSource>>,
}

impl StreamingSession {
    #[must_use]
    pub fn new(
        identity: StreamIdentity,
        format: StreamFormat,
        transport: Box<dyn FrameSink>,
        sink: Box<dyn PlaybackSink>,
    ) -> Self {
        Self {
            identity,
            format,
            state: StreamState::Connecting,
            next_message_id: FIRST_AUDIO_MESSAGE_ID,
            peer_format: None,
            inbound_audio_seen: false,
            transport,
            sink,
            capture: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> StreamState {
        self.state
    }

    #[must_use]
    pub fn stream_id(&self) -> &str {
        &self.identity.stream_id
    }

    /// Format negotiated by an accepted inbound handshake, if any.
    #[must_use]
    pub const fn peer_format(&self) -> Option<&StreamFormat> {
        self.peer_format.as_ref()
    }

    /// Acquire capture and bring the session up: requests the device with
    /// the given constraints, emits the handshake frame and enters `active`.
    /// Returns the capture chunk stream for the caller (normally the pump)
    /// to drain.
    ///
    /// # Errors
    /// `ProtocolViolation` if the session already left `connecting`;
    /// `CaptureUnavailable` when the device cannot be acquired, in which
    /// case the session transitions straight to `closed`.
    pub async fn start(
        &mut self,
        mut capture: Box<dyn CaptureSource>,
        constraints: &CaptureConstraints,
    ) -> Result<mpsc::Receiver<Vec<u8>>> {
        if self.state != StreamState::Connecting {
            return Err(Error::ProtocolViolation(format!(
                "start on a session that is not connecting (state {:?})",
                self.state
            )));
        }

        let chunks = match capture.open(constraints).await {
            Ok(chunks) => chunks,
            Err(err) => {
                tracing::warn!(
                    "Capture unavailable for stream {}: {err}",
                    self.identity.stream_id
                );
                self.stop().await;
                return Err(err);
            }
        };
        self.capture = Some(capture);

        let handshake = Frame::handshake(&self.identity, self.format.clone());
        if let Err(err) = self.transport.send(handshake).await {
            self.stop().await;
            return Err(err);
        }
        self.state = StreamState::Active;
        tracing::info!("Stream {} active", self.identity.stream_id);
        Ok(chunks)
    }

    /// Send one capture slice as the next outbound audio frame.
    ///
    /// Outside `active` this is a logged no-op, not a hard failure: a
    /// capture pipeline winding down may still flush buffered chunks.
    ///
    /// # Errors
    /// `MalformedPayload` for an empty chunk, or a transport error. Neither
    /// consumes a message id, so the emitted sequence stays gap-free.
    pub async fn send_audio_chunk(&mut self, bytes: &[u8]) -> Result<()> {
        if self.state != StreamState::Active {
            tracing::warn!(
                "Dropping audio chunk for stream {} in state {:?}",
                self.identity.stream_id,
                self.state
            );
            return Ok(());
        }

        let frame = Frame::audio(&self.identity.stream_id, self.next_message_id, bytes)?;
        self.transport.send(frame).await?;
        self.next_message_id += 1;
        Ok(())
    }

    /// Parse and dispatch one inbound wire message. Malformed frames are
    /// logged and dropped; the session stays up.
    ///
    /// # Errors
    /// Only playback sink failures propagate.
    pub async fn on_inbound_text(&mut self, text: &str) -> Result<()> {
        match codec::parse_frame(text) {
            Ok(frame) => self.on_inbound_frame(frame).await,
            Err(err) => {
                tracing::warn!(
                    "Dropping unparseable frame on stream {}: {err}",
                    self.identity.stream_id
                );
                Ok(())
            }
        }
    }

    /// Dispatch one typed inbound frame.
    ///
    /// Audio is decoded and forwarded to the playback sink; a handshake out
    /// of its initial position is a protocol violation (logged, dropped,
    /// session remains `active`); interrupt/clear flush the sink.
    ///
    /// # Errors
    /// Only playback sink failures propagate.
    pub async fn on_inbound_frame(&mut self, frame: Frame) -> Result<()> {
        match frame {
            Frame::Audio { data, message_id, .. } => {
                if self.state != StreamState::Active {
                    tracing::warn!(
                        "Dropping inbound audio frame {message_id} in state {:?}",
                        self.state
                    );
                    return Ok(());
                }
                self.inbound_audio_seen = true;
                match codec::decode_audio(&data.audio_b64) {
                    Ok(pcm) => self.sink.play(pcm).await,
                    Err(err) => {
                        tracing::warn!("Dropping undecodable audio frame {message_id}: {err}");
                        Ok(())
                    }
                }
            }
            Frame::Start { data, .. } => {
                if self.peer_format.is_none() && !self.inbound_audio_seen {
                    tracing::debug!(
                        "Peer handshake on stream {}: {data:?}",
                        self.identity.stream_id
                    );
                    self.peer_format = Some(data);
                } else {
                    tracing::warn!(
                        "Protocol violation on stream {}: handshake out of initial position",
                        self.identity.stream_id
                    );
                }
                Ok(())
            }
            Frame::Interrupt { message_id } => {
                tracing::info!("Interrupt for frame {message_id}, clearing playback");
                self.sink.clear().await;
                Ok(())
            }
            Frame::Clear => {
                tracing::info!("Clearing playback buffer");
                self.sink.clear().await;
                Ok(())
            }
            Frame::Error { message } => {
                tracing::warn!(
                    "Peer error on stream {}: {message}",
                    self.identity.stream_id
                );
                Ok(())
            }
        }
    }

    /// Tear the session down, releasing capture, transport and playback
    /// exactly once. Safe to call from any state and any number of times;
    /// repeat calls are no-ops.
    pub async fn stop(&mut self) {
        if self.state == StreamState::Closed {
            return;
        }
        self.state = StreamState::Closing;

        if let Some(mut capture) = self.capture.take() {
            capture.close().await;
        }
        self.sink.clear().await;
        if let Err(err) = self.transport.close().await {
            tracing::debug!(
                "Transport close failed for stream {}: {err}",
                self.identity.stream_id
            );
        }

        self.state = StreamState::Closed;
        tracing::info!("Stream {} closed", self.identity.stream_id);
    }
}

enum Command {
    SendChunk(Vec<u8>, oneshot::Sender<Result<()>>),
    Stop(oneshot::Sender<()>),
}

/// Clonable control handle for a spawned [`MediaStream`].
#[derive(Clone)]
pub struct StreamHandle {
    sender: mpsc::Sender<Command>,
}

impl StreamHandle {
    /// Queue one audio chunk for sending. A no-op once the stream stopped,
    /// matching the late-chunk tolerance of the session itself.
    ///
    /// # Errors
    /// Propagates encode and transport errors from the session.
    pub async fn send_audio_chunk(&self, bytes: Vec<u8>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(Command::SendChunk(bytes, tx))
            .await
            .is_err()
        {
            tracing::warn!("Dropping audio chunk: stream already stopped");
            return Ok(());
        }
        rx.await.unwrap_or(Ok(()))
    }

    /// Request teardown and wait for it to finish. Idempotent: stopping an
    /// already-stopped stream succeeds with no effect.
    pub async fn stop(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(Command::Stop(tx)).await.is_err() {
            return;
        }
        let _ = rx.await;
    }
}

/// Spawned pump driving one [`StreamingSession`].
///
/// Multiplexes the command channel, the capture chunk stream, the inbound
/// transport and an optional inactivity timeout. Cancellation arrives as a
/// queued `Stop` command, never as an interrupt.
pub struct MediaStream {
    handle: StreamHandle,
    task: tokio::task::JoinHandle<()>,
}

impl MediaStream {
    #[must_use]
    pub fn spawn(
        mut session: StreamingSession,
        mut chunks: mpsc::Receiver<Vec<u8>>,
        mut inbound: Box<dyn FrameSource>,
        inactivity: Option<Duration>,
    ) -> Self {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(COMMAND_BUFFER);

        let task = tokio::spawn(async move {
            loop {
                let idle = inactivity.unwrap_or(Duration::ZERO);
                tokio::select! {
                    cmd = cmd_rx.recv() => match cmd {
                        Some(Command::SendChunk(bytes, ack)) => {
                            let result = session.send_audio_chunk(&bytes).await;
                            let _ = ack.send(result);
                        }
                        Some(Command::Stop(ack)) => {
                            session.stop().await;
                            let _ = ack.send(());
                            break;
                        }
                        None => {
                            session.stop().await;
                            break;
                        }
                    },
                    chunk = chunks.recv() => match chunk {
                        Some(bytes) => {
                            if let Err(err) = session.send_audio_chunk(&bytes).await {
                                tracing::warn!("Failed to send capture chunk: {err}");
                            }
                        }
                        None => {
                            tracing::info!("Capture stream ended");
                            session.stop().await;
                            break;
                        }
                    },
                    frame = inbound.next_frame() => match frame {
                        Ok(Some(frame)) => {
                            if let Err(err) = session.on_inbound_frame(frame).await {
                                tracing::warn!("Playback failed: {err}");
                            }
                        }
                        Ok(None) => {
                            tracing::info!("Transport closed by peer");
                            session.stop().await;
                            break;
                        }
                        Err(err) => {
                            tracing::warn!("Transport error: {err}");
                            session.stop().await;
                            break;
                        }
                    },
                    () = tokio::time::sleep(idle), if inactivity.is_some() => {
                        tracing::warn!("Stream inactive for {idle:?}, stopping");
                        session.stop().await;
                        break;
                    }
                }
            }
        });

        Self {
            handle: StreamHandle { sender: cmd_tx },
            task,
        }
    }

    #[must_use]
    pub fn handle(&self) -> StreamHandle {
        self.handle.clone()
    }

    /// Wait for the pump task to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}
