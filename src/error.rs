use crate::transport::ws::WsStream;
use futures::stream::ReuniteError;
use thiserror::Error;
use tokio_tungstenite::tungstenite::protocol::Message;

#[derive(Error, Debug)]
pub enum Error {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP protocol error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse or serialize JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Header error: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The call provider rejected or failed the request. Carries the
    /// provider's sanitized message, never its raw diagnostics.
    #[error("Provider error: {message}")]
    Provider {
        status: Option<u16>,
        message: String,
    },

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Capture device unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Unknown frame kind: {0}")]
    UnknownKind(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("The connection was closed unexpectedly")]
    ConnectionClosed,

    #[error("Failed to reunite split client: {0}")]
    Reunite(#[from] ReuniteError<WsStream, Message>),
}

pub type Result<T> = std::result::Result<T, Error>;
