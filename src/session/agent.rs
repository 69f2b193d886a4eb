use std::sync::Arc;

use super::relay::ConversationRelay;
use crate::error::Result;

/// Opaque speech-to-text collaborator: audio bytes in, transcript out.
/// `Ok(None)` means no speech was detected in the chunk.
#[async_trait::async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, raw: &[u8]) -> Result<Option<String>>;
}

/// Opaque text-to-speech collaborator: text in, audio bytes out.
#[async_trait::async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Voice-bot pipeline over one call: inbound audio is transcribed, relayed
/// to the language model, and the reply synthesized for sending back as the
/// next outbound frame.
pub struct VoiceAgent {
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn TextToSpeech>,
    relay: Arc<ConversationRelay>,
    greeting: Option<String>,
}

impl VoiceAgent {
    #[must_use]
    pub fn new(
        stt: Arc<dyn SpeechToText>,
        tts: Arc<dyn TextToSpeech>,
        relay: Arc<ConversationRelay>,
    ) -> Self {
        Self {
            stt,
            tts,
            relay,
            greeting: None,
        }
    }

    /// Greeting spoken when the media stream opens.
    #[must_use]
    pub fn greeting(mut self, text: impl Into<String>) -> Self {
        self.greeting = Some(text.into());
        self
    }

    /// Synthesized greeting audio, if a greeting is configured.
    ///
    /// # Errors
    /// Propagates synthesis failures.
    pub async fn greeting_audio(&self) -> Result<Option<Vec<u8>>> {
        match &self.greeting {
            Some(text) => Ok(Some(self.tts.synthesize(text).await?)),
            None => Ok(None),
        }
    }

    /// Process one inbound audio chunk for a call. Returns the reply audio
    /// to send back, or `None` when the chunk contained no speech.
    ///
    /// # Errors
    /// Propagates transcription, relay and synthesis failures; the caller
    /// decides whether a failed turn tears down the stream (it should not).
    pub async fn handle_chunk(&self, call_id: &str, pcm: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(utterance) = self.stt.transcribe(pcm).await? else {
            tracing::debug!("No speech detected in chunk for call {call_id}");
            return Ok(None);
        };
        tracing::info!("Caller said: {utterance}");

        let reply = self.relay.reply_for_call(call_id, &utterance).await?;
        let audio = self.tts.synthesize(&reply).await?;
        Ok(Some(audio))
    }
}
