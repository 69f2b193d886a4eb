use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::models::CaptureConstraints;
use crate::transport::rest::{MessagesRestAdapter, SpeechRestAdapter, TelerRestAdapter};

use super::agent::VoiceAgent;
use super::orchestrator::CallOrchestrator;
use super::registry::SessionRegistry;
use super::relay::{ConversationRelay, DEFAULT_HISTORY_LIMIT};

pub struct Teler;

impl Teler {
    #[must_use]
    pub fn builder() -> TelerBuilder {
        TelerBuilder::new()
    }
}

/// Assembles the registry, orchestrator, relay and voice agent into one
/// [`VoiceService`] from a flat set of credentials and knobs.
pub struct TelerBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    speech_key: Option<String>,
    messages_key: Option<String>,
    messages_model: Option<String>,
    history_limit: usize,
    chunk: Duration,
    inactivity: Option<Duration>,
    greeting: Option<String>,
}

impl TelerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: None,
            speech_key: None,
            messages_key: None,
            messages_model: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            chunk: Duration::from_secs(1),
            inactivity: None,
            greeting: None,
        }
    }

    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the call provider base URL, e.g. for a staging deployment.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn speech_key(mut self, key: impl Into<String>) -> Self {
        self.speech_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn messages_key(mut self, key: impl Into<String>) -> Self {
        self.messages_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn messages_model(mut self, model: impl Into<String>) -> Self {
        self.messages_model = Some(model.into());
        self
    }

    /// Number of transcript turns fed back to the language model per reply.
    #[must_use]
    pub const fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Capture chunk duration for microphone sources.
    #[must_use]
    pub const fn chunk(mut self, chunk: Duration) -> Self {
        self.chunk = chunk;
        self
    }

    /// Close idle media streams after this long without traffic.
    #[must_use]
    pub const fn inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity = Some(timeout);
        self
    }

    #[must_use]
    pub fn greeting(mut self, text: impl Into<String>) -> Self {
        self.greeting = Some(text.into());
        self
    }

    /// Build the service.
    ///
    /// # Errors
    /// Returns [`Error::InvalidRequest`] when a required credential is
    /// missing or empty.
    pub fn build(self) -> Result<VoiceService> {
        let api_key = self
            .api_key
            .ok_or_else(|| Error::InvalidRequest("api_key required".to_string()))?;
        let speech_key = self
            .speech_key
            .ok_or_else(|| Error::InvalidRequest("speech_key required".to_string()))?;
        let messages_key = self
            .messages_key
            .ok_or_else(|| Error::InvalidRequest("messages_key required".to_string()))?;

        let provider = match self.base_url {
            Some(url) => TelerRestAdapter::with_base_url(&api_key, &url)?,
            None => TelerRestAdapter::new(&api_key)?,
        };
        let speech = Arc::new(SpeechRestAdapter::new(&speech_key)?);
        let mut messages = MessagesRestAdapter::new(&messages_key)?;
        if let Some(model) = self.messages_model {
            messages = messages.model(model);
        }

        let registry = Arc::new(SessionRegistry::new());
        let orchestrator =
            CallOrchestrator::new(Arc::new(provider), Arc::clone(&registry));
        let relay = Arc::new(
            ConversationRelay::new(Arc::new(messages), Arc::clone(&registry))
                .history_limit(self.history_limit),
        );
        let stt: Arc<dyn super::agent::SpeechToText> = speech.clone();
        let tts: Arc<dyn super::agent::TextToSpeech> = speech;
        let mut agent = VoiceAgent::new(stt, tts, Arc::clone(&relay));
        if let Some(greeting) = self.greeting {
            agent = agent.greeting(greeting);
        }

        Ok(VoiceService {
            registry,
            orchestrator,
            relay,
            agent: Arc::new(agent),
            constraints: CaptureConstraints {
                chunk: self.chunk,
                ..CaptureConstraints::default()
            },
            inactivity: self.inactivity,
        })
    }
}

impl Default for TelerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The assembled calling stack: one registry shared by the orchestrator,
/// the relay and the voice agent.
pub struct VoiceService {
    registry: Arc<SessionRegistry>,
    orchestrator: CallOrchestrator,
    relay: Arc<ConversationRelay>,
    agent: Arc<VoiceAgent>,
    constraints: CaptureConstraints,
    inactivity: Option<Duration>,
}

impl VoiceService {
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    #[must_use]
    pub const fn orchestrator(&self) -> &CallOrchestrator {
        &self.orchestrator
    }

    #[must_use]
    pub fn relay(&self) -> &Arc<ConversationRelay> {
        &self.relay
    }

    #[must_use]
    pub fn agent(&self) -> &Arc<VoiceAgent> {
        &self.agent
    }

    #[must_use]
    pub const fn capture_constraints(&self) -> &CaptureConstraints {
        &self.constraints
    }

    #[must_use]
    pub const fn inactivity_timeout(&self) -> Option<Duration> {
        self.inactivity
    }
}
