use std::sync::Arc;

use super::registry::SessionRegistry;
use crate::error::Result;
use crate::protocol::models::{TranscriptTurn, TurnRole};

pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// External language-model collaborator. `history` holds the turns before
/// `input`; implementations append `input` as the final user message
/// themselves. Retry policy, if any, belongs on the implementation side of
/// this boundary; the relay performs none.
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, history: &[TranscriptTurn], input: &str) -> Result<String>;
}

/// Forwards transcribed caller utterances to the language model and returns
/// generated replies, recording both sides in the call transcript.
pub struct ConversationRelay {
    model: Arc<dyn LanguageModel>,
    registry: Arc<SessionRegistry>,
    history_limit: usize,
}

impl ConversationRelay {
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>, registry: Arc<SessionRegistry>) -> Self {
        Self {
            model,
            registry,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Cap on how many trailing transcript turns are sent to the model.
    #[must_use]
    pub const fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Generate a reply from explicit history without touching any call
    /// record.
    ///
    /// # Errors
    /// `UpstreamUnavailable` when the model cannot be reached, `Upstream`
    /// when it returns an error payload.
    pub async fn generate_reply(
        &self,
        history: &[TranscriptTurn],
        input: &str,
    ) -> Result<String> {
        self.model.complete(history, input).await
    }

    /// Generate a reply for a recorded call, appending the caller turn and
    /// the assistant turn to its transcript.
    ///
    /// The model sees at most the most recent `history_limit` turns.
    ///
    /// # Errors
    /// `NotFound` for an unknown call id, plus the `generate_reply` errors.
    pub async fn reply_for_call(&self, call_id: &str, input: &str) -> Result<String> {
        // History is captured before the new turn is recorded; the model
        // receives the input separately and must not see it twice.
        let transcript = self.registry.transcript(call_id)?;
        let start = transcript.len().saturating_sub(self.history_limit);
        let history = &transcript[start..];

        self.registry
            .append_transcript_turn(call_id, TurnRole::Caller, input)?;

        let reply = self.model.complete(history, input).await?;
        tracing::info!("Generated reply for call {call_id}");

        self.registry
            .append_transcript_turn(call_id, TurnRole::Assistant, reply.as_str())?;
        Ok(reply)
    }
}
