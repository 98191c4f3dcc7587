use shared::protocol::{CONTROL_PATH, HOTWORD_PATH, STATUS_PATH};
use shared::types::ServiceRecord;
use crate::audio::streamer::HotwordStreamer;
use crate::channels::{ControlChannel, HotwordChannel, StatusChannel};
use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::session::Session;

/// Rewrite an `http(s)://` base into the `ws(s)://` URL of `path`
pub fn websocket_url(base_url: &str, path: &str) -> Result<String, SessionError> {
    let base = base_url.trim().trim_end_matches('/');
    let (scheme, rest) = base
        .split_once("://")
        .ok_or_else(|| SessionError::InvalidUrl(base_url.to_string()))?;
    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(SessionError::InvalidUrl(base_url.to_string())),
    };
    if rest.is_empty() {
        return Err(SessionError::InvalidUrl(base_url.to_string()));
    }
    Ok(format!("{}://{}{}", ws_scheme, rest, path))
}

/// The channels to one backend, shared by everything in the client that
/// talks to it.
pub struct ClientContext {
    base_url: String,
    config: ClientConfig,
    pub control: ControlChannel,
    pub status: StatusChannel,
    pub hotword: HotwordChannel,
}

impl ClientContext {
    /// Build the channels without dialling any of them
    pub fn new(base_url: &str, config: ClientConfig) -> Result<Self, SessionError> {
        let control = Session::websocket(websocket_url(base_url, CONTROL_PATH)?, &config.reconnect, &config.queue);
        let status = Session::websocket(websocket_url(base_url, STATUS_PATH)?, &config.reconnect, &config.queue);
        let hotword = Session::websocket(
            websocket_url(base_url, HOTWORD_PATH)?,
            &config.reconnect,
            &config.hotword_queue,
        );

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            control: ControlChannel::new(control, config.request_timeout()),
            status: StatusChannel::new(status),
            hotword: HotwordChannel::new(hotword),
            config,
        })
    }

    /// Build the channels and start the control connection
    pub fn connect(base_url: &str, config: ClientConfig) -> Result<Self, SessionError> {
        let context = Self::new(base_url, config)?;
        tracing::info!("Connecting to backend at {}", context.base_url);
        context.control.session().connect();
        Ok(context)
    }

    pub fn for_server(record: &ServiceRecord, config: ClientConfig) -> Result<Self, SessionError> {
        let base_url = record
            .endpoint_url()
            .ok_or_else(|| SessionError::InvalidUrl(format!("server {} has no address", record.id)))?;
        Self::connect(&base_url, config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Streamer feeding this backend's hotword channel with the configured VAD
    pub fn hotword_streamer(&self) -> HotwordStreamer {
        HotwordStreamer::new(self.hotword.clone(), self.config.vad.clone())
    }

    pub fn close(&self) {
        self.control.session().close();
        self.status.session().close();
        self.hotword.session().close();
    }
}
