use thiserror::Error;

/// Failures of the transport underneath a session. These never reach
/// session callers; the session logs them and reconnects.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("connection closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// `close()` was called, or every handle to the session was dropped
    #[error("session is closed")]
    Closed,

    #[error("no reply to request {0} before the timeout")]
    Timeout(String),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid server url: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to encode wav: {0}")]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecorderError {
    #[error("recorder was stopped without being started")]
    NotStarted,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("registry request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("transcription request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("audio encoding failed: {0}")]
    Audio(#[from] hound::Error),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    #[error("timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("failed to encode metadata: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("no reply before the timeout")]
    Timeout,

    #[error("connection closed before a reply arrived")]
    ClosedEarly,

    #[error("server rejected the upload: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
