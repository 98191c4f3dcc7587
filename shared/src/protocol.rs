/// Directory listing, optionally filtered with `?name=`
pub const API_SERVERS: &str = "/api/servers";

/// Plain-text fingerprint of the directory contents
pub const API_SERVERS_HASH: &str = "/api/servers/hash";

/// Single directory entry by id
pub const API_SERVER_BY_ID: &str = "/api/servers/:id";

/// Liveness endpoint, served by the registry and by backend servers
pub const HEALTH: &str = "/health";

/// Default registry listen port
pub const DEFAULT_REGISTRY_PORT: u16 = 3001;

/// Environment variables read by the registry at startup
pub const ENV_PORT: &str = "PORT";
pub const ENV_LISTEN_ADDR: &str = "LISTEN_ADDR";
pub const ENV_SERVICE_NAME: &str = "SERVICE_NAME";
pub const ENV_BROWSE_TYPE: &str = "BROWSE_TYPE";

/// Backend WebSocket endpoints
pub const CONTROL_PATH: &str = "/communicate";
pub const STATUS_PATH: &str = "/info";
pub const HOTWORD_PATH: &str = "/hotword";
pub const FACE_UPLOAD_PATH: &str = "/face_recognition";

/// Backend REST endpoint for full-utterance transcription
pub const TRANSCRIPTION_PATH: &str = "/api/v1/audio/transcriptions";

/// `event` value announcing a wake-word hit on the hotword channel
pub const WAKEWORD_EVENT: &str = "wakeword_detected";
