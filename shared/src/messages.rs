//! Message schema for the backend WebSocket channels.
//!
//! Inbound payloads are classified here, at the boundary, so channel
//! consumers never poke at untyped JSON.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};
use crate::protocol::WAKEWORD_EVENT;

/// Outbound request on the control channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Echoed back by the server so replies can be matched to requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ControlRequest {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            action: None,
            request_id: None,
            payload: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// A control-channel message that answers a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlReply {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    pub request_id: String,

    #[serde(default)]
    pub success: Option<bool>,

    #[serde(default)]
    pub error: Option<String>,

    /// Everything else the server put in the reply
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Classified inbound control-channel payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlInbound {
    /// JSON object carrying a `request_id`
    Reply(ControlReply),
    /// Any other JSON value
    Event(Value),
    /// Not JSON at all
    Text(String),
}

impl ControlInbound {
    pub fn parse(raw: &str) -> Self {
        if let Ok(reply) = serde_json::from_str::<ControlReply>(raw) {
            return ControlInbound::Reply(reply);
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => ControlInbound::Event(value),
            Err(_) => ControlInbound::Text(raw.to_string()),
        }
    }
}

/// Telemetry sample pushed on the status channel. Values are percentages,
/// except `up_time` which is in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    #[serde(rename = "CPU", default)]
    pub cpu: Option<f64>,

    #[serde(rename = "Memory", default)]
    pub memory: Option<f64>,

    #[serde(rename = "Network", default)]
    pub network: Option<f64>,

    #[serde(rename = "GPU", default)]
    pub gpu: Option<f64>,

    #[serde(rename = "UP_TIME", default)]
    pub up_time: Option<f64>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemHealth {
    Optimal,
    Critical,
}

impl StatusReport {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Memory at or below 94% or CPU at or below 90% counts as optimal.
    /// Missing readings never count in favour.
    pub fn health(&self) -> SystemHealth {
        let memory_ok = self.memory.map_or(false, |m| m <= 94.0);
        let cpu_ok = self.cpu.map_or(false, |c| c <= 90.0);
        if memory_ok || cpu_ok {
            SystemHealth::Optimal
        } else {
            SystemHealth::Critical
        }
    }
}

#[derive(Deserialize)]
struct HotwordWire {
    event: String,
    #[serde(flatten)]
    detail: Map<String, Value>,
}

/// Inbound text message on the hotword channel.
#[derive(Debug, Clone, PartialEq)]
pub enum HotwordEvent {
    WakewordDetected(Map<String, Value>),
    Other(String),
}

impl HotwordEvent {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let wire: HotwordWire = serde_json::from_str(raw)?;
        if wire.event.eq_ignore_ascii_case(WAKEWORD_EVENT) {
            Ok(HotwordEvent::WakewordDetected(wire.detail))
        } else {
            Ok(HotwordEvent::Other(wire.event))
        }
    }
}
