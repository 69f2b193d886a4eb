use reqwest::{
    Client,
    header::{HeaderValue, CONTENT_TYPE},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::models::{CallRequest, CallStatus, ProviderCall, TranscriptTurn, TurnRole};
use crate::session::agent::{SpeechToText, TextToSpeech};
use crate::session::orchestrator::CallProvider;
use crate::session::relay::LanguageModel;
use crate::protocol::codec;

const TELER_BASE_URL: &str = "https://api.teler.ai";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

const API_KEY_HEADER: &str = "x-api-key";

/// Success responses from the provider wrap the resource in a `data` field.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// REST adapter for the Teler call API.
#[derive(Clone, Debug)]
pub struct TelerRestAdapter {
    client: Client,
    api_key: HeaderValue,
    base_url: String,
}

impl TelerRestAdapter {
    /// Create a new adapter with the given API key.
    ///
    /// # Errors
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, TELER_BASE_URL)
    }

    /// Create a new adapter against a custom base URL (used by tests and
    /// self-hosted deployments).
    ///
    /// # Errors
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::InvalidRequest("api_key is required".to_string()));
        }
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .pool_idle_timeout(DEFAULT_POOL_IDLE_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key: HeaderValue::from_str(api_key)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn create_call_inner(&self, request: &CallRequest) -> Result<ProviderCall> {
        let url = format!("{}/calls/initiate", self.base_url);

        let res = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|err| provider_unreachable("create_call", &err))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::error!("Provider rejected call creation ({status}): {body}");
            return Err(Error::Provider {
                status: Some(status.as_u16()),
                message: sanitized_provider_message(&body),
            });
        }

        let envelope: DataEnvelope<ProviderCall> = res.json().await?;
        Ok(envelope.data)
    }

    async fn get_status_inner(&self, call_id: &str) -> Result<CallStatus> {
        let url = format!("{}/calls/{call_id}", self.base_url);

        let res = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|err| provider_unreachable("get_status", &err))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::error!("Provider rejected status fetch for {call_id} ({status}): {body}");
            return Err(Error::Provider {
                status: Some(status.as_u16()),
                message: sanitized_provider_message(&body),
            });
        }

        let envelope: DataEnvelope<ProviderCall> = res.json().await?;
        Ok(envelope.data.status)
    }
}

#[async_trait::async_trait]
impl CallProvider for TelerRestAdapter {
    async fn create_call(&self, request: &CallRequest) -> Result<ProviderCall> {
        self.create_call_inner(request).await
    }

    async fn get_status(&self, call_id: &str) -> Result<CallStatus> {
        self.get_status_inner(call_id).await
    }
}

fn provider_unreachable(what: &str, err: &reqwest::Error) -> Error {
    tracing::error!("Provider request failed during {what}: {err}");
    Error::Provider {
        status: None,
        message: "call provider unreachable".to_string(),
    }
}

/// Extract the provider's own message from an error body, falling back to a
/// generic line so raw diagnostics never reach callers.
fn sanitized_provider_message(body: &str) -> String {
    serde_json::from_str::<ProviderErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message.or(parsed.error))
        .unwrap_or_else(|| "call provider rejected the request".to_string())
}

/// REST adapter for the speech service (STT and TTS).
///
/// Audio crosses this boundary as base64 text; the adapter owns the
/// conversion so the rest of the crate deals in raw bytes only.
#[derive(Clone, Debug)]
pub struct SpeechRestAdapter {
    client: Client,
    api_key: HeaderValue,
    base_url: String,
    language: String,
    speaker: String,
    sample_rate: u32,
}

const SPEECH_KEY_HEADER: &str = "api-subscription-key";
const SPEECH_BASE_URL: &str = "https://api.sarvam.ai";

#[derive(Debug, Serialize)]
struct TranscribeRequest<'a> {
    language_code: &'a str,
    model: &'a str,
    file: String,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    transcript: String,
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    inputs: [&'a str; 1],
    target_language_code: &'a str,
    speaker: &'a str,
    speech_sample_rate: u32,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    #[serde(default)]
    audios: Vec<String>,
}

impl SpeechRestAdapter {
    /// # Errors
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, SPEECH_BASE_URL)
    }

    /// # Errors
    /// Same conditions as [`Self::new`].
    #[allow(clippy::result_large_err)]
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key: HeaderValue::from_str(api_key)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            language: "hi-IN".to_string(),
            speaker: "meera".to_string(),
            sample_rate: crate::protocol::models::DEFAULT_SAMPLE_RATE,
        })
    }

    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    #[must_use]
    pub fn speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = speaker.into();
        self
    }
}

#[async_trait::async_trait]
impl SpeechToText for SpeechRestAdapter {
    async fn transcribe(&self, raw: &[u8]) -> Result<Option<String>> {
        let payload = TranscribeRequest {
            language_code: &self.language,
            model: "saaras:v1",
            file: codec::encode_audio(raw)?,
        };

        let res = self
            .client
            .post(format!("{}/speech-to-text", self.base_url))
            .header(SPEECH_KEY_HEADER, &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| upstream_unreachable("speech-to-text", &err))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::error!("STT request failed ({status}): {body}");
            return Err(Error::Upstream(format!(
                "speech-to-text returned {status}"
            )));
        }

        let parsed: TranscribeResponse = res.json().await?;
        if parsed.transcript.is_empty() {
            // No speech detected in the chunk.
            Ok(None)
        } else {
            Ok(Some(parsed.transcript))
        }
    }
}

#[async_trait::async_trait]
impl TextToSpeech for SpeechRestAdapter {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let payload = SynthesizeRequest {
            inputs: [text],
            target_language_code: &self.language,
            speaker: &self.speaker,
            speech_sample_rate: self.sample_rate,
            model: "bulbul:v1",
        };

        let res = self
            .client
            .post(format!("{}/text-to-speech", self.base_url))
            .header(SPEECH_KEY_HEADER, &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| upstream_unreachable("text-to-speech", &err))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::error!("TTS request failed ({status}): {body}");
            return Err(Error::Upstream(format!(
                "text-to-speech returned {status}"
            )));
        }

        let parsed: SynthesizeResponse = res.json().await?;
        let audio = parsed
            .audios
            .into_iter()
            .next()
            .ok_or_else(|| Error::Upstream("no audio in synthesis response".to_string()))?;
        codec::decode_audio(&audio)
    }
}

/// REST adapter for the language-model messages API.
#[derive(Clone, Debug)]
pub struct MessagesRestAdapter {
    client: Client,
    api_key: HeaderValue,
    base_url: String,
    model: String,
    max_tokens: u32,
}

const MESSAGES_BASE_URL: &str = "https://api.anthropic.com";
const MESSAGES_VERSION: &str = "2023-06-01";
const DEFAULT_MESSAGES_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_MAX_TOKENS: u32 = 500;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl MessagesRestAdapter {
    /// # Errors
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, MESSAGES_BASE_URL)
    }

    /// # Errors
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key: HeaderValue::from_str(api_key)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: DEFAULT_MESSAGES_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait::async_trait]
impl LanguageModel for MessagesRestAdapter {
    async fn complete(&self, history: &[TranscriptTurn], input: &str) -> Result<String> {
        let mut messages: Vec<ChatMessage> = history
            .iter()
            .map(|turn| ChatMessage {
                role: match turn.role {
                    TurnRole::Caller => "user",
                    TurnRole::Assistant => "assistant",
                },
                content: turn.text.clone(),
            })
            .collect();
        messages.push(ChatMessage {
            role: "user",
            content: input.to_string(),
        });

        let payload = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages,
        };

        let res = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .header("anthropic-version", MESSAGES_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(|err| upstream_unreachable("completion", &err))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::error!("Completion request failed ({status}): {body}");
            return Err(Error::Upstream(format!(
                "language model returned {status}"
            )));
        }

        let parsed: MessagesResponse = res.json().await?;
        let text = parsed
            .content
            .into_iter()
            .map(|block| block.text)
            .collect::<String>();
        if text.is_empty() {
            return Err(Error::Upstream(
                "empty completion response".to_string(),
            ));
        }
        Ok(text.trim().to_string())
    }
}

fn upstream_unreachable(what: &str, err: &reqwest::Error) -> Error {
    tracing::error!("Upstream request failed during {what}: {err}");
    Error::UpstreamUnavailable(what.to_string())
}
