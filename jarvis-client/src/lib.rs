//! Client side of the Jarvis backend: reconnecting WebSocket sessions, the
//! typed channels built on them, microphone audio framing, and helpers for
//! the discovery registry and speech-to-text endpoints.

pub mod audio;
pub mod channels;
pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod session;
pub mod transcription;
pub mod transport;
pub mod upload;

pub use config::ClientConfig;
pub use context::ClientContext;
pub use session::{Session, SessionState, Subscription};
pub use transport::Frame;
