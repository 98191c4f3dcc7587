use std::collections::BTreeMap;
use std::net::IpAddr;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// A backend instance advertised on the local network.
/// This is the canonical record served by the discovery registry and read by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    /// Stable identity, see [`ServiceRecord::derive_id`]
    pub id: String,

    /// Display name, e.g. "J.A.R.V.I.S Main"
    pub name: String,

    /// Instance name including the service type, e.g. "J.A.R.V.I.S Main._http._tcp.local"
    pub fqdn: Option<String>,

    /// Hostname, e.g. "workstation.local"
    pub host: Option<String>,

    /// Service port
    pub port: Option<u16>,

    /// Resolved addresses, ordered
    #[serde(default)]
    pub addresses: Vec<IpAddr>,

    /// TXT record key-value pairs
    #[serde(default)]
    pub txt: BTreeMap<String, String>,

    /// Service type without underscores, e.g. "http"
    #[serde(rename = "type")]
    pub service_type: Option<String>,

    /// Transport protocol, e.g. "tcp"
    pub protocol: Option<String>,

    /// When the record was last (re)placed in the directory
    pub updated_at: DateTime<Utc>,
}

impl ServiceRecord {
    pub fn new(
        name: impl Into<String>,
        fqdn: Option<String>,
        host: Option<String>,
        port: Option<u16>,
    ) -> Self {
        let name = name.into();
        let id = Self::derive_id(fqdn.as_deref(), host.as_deref(), &name, port);
        Self {
            id,
            name,
            fqdn,
            host,
            port,
            addresses: Vec::new(),
            txt: BTreeMap::new(),
            service_type: None,
            protocol: None,
            updated_at: Utc::now(),
        }
    }

    /// Identity used for upsert/remove: `"{fqdn or host or name}:{port}"`.
    /// A missing port leaves the part after the colon empty.
    pub fn derive_id(fqdn: Option<&str>, host: Option<&str>, name: &str, port: Option<u16>) -> String {
        let key = fqdn
            .filter(|s| !s.is_empty())
            .or(host.filter(|s| !s.is_empty()))
            .unwrap_or(name);
        match port {
            Some(port) => format!("{}:{}", key, port),
            None => format!("{}:", key),
        }
    }

    pub fn with_addresses(mut self, addresses: Vec<IpAddr>) -> Self {
        self.addresses = addresses;
        self
    }

    pub fn with_txt(mut self, txt: BTreeMap<String, String>) -> Self {
        self.txt = txt;
        self
    }

    pub fn with_service_type(mut self, service_type: impl Into<String>, protocol: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self.protocol = Some(protocol.into());
        self
    }

    /// Base URL a client should use for this instance: first resolved address,
    /// falling back to the hostname.
    pub fn endpoint_url(&self) -> Option<String> {
        let port = self.port?;
        match self.addresses.first() {
            Some(IpAddr::V6(addr)) => Some(format!("http://[{}]:{}", addr, port)),
            Some(IpAddr::V4(addr)) => Some(format!("http://{}:{}", addr, port)),
            None => {
                let host = self.host.as_deref().filter(|h| !h.is_empty())?;
                Some(format!("http://{}:{}", host, port))
            }
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_id_prefers_fqdn_then_host_then_name() {
        assert_eq!(
            ServiceRecord::derive_id(Some("a._http._tcp.local"), Some("box.local"), "a", Some(8000)),
            "a._http._tcp.local:8000"
        );
        assert_eq!(ServiceRecord::derive_id(None, Some("box.local"), "a", Some(8000)), "box.local:8000");
        assert_eq!(ServiceRecord::derive_id(Some(""), None, "a", None), "a:");
    }

    #[test]
    fn test_endpoint_url() {
        let record = ServiceRecord::new("main", None, Some("box.local".to_string()), Some(8000));
        assert_eq!(record.endpoint_url().as_deref(), Some("http://box.local:8000"));

        let record = record.with_addresses(vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))]);
        assert_eq!(record.endpoint_url().as_deref(), Some("http://192.168.1.20:8000"));

        let record = record.with_addresses(vec![IpAddr::V6(Ipv6Addr::LOCALHOST)]);
        assert_eq!(record.endpoint_url().as_deref(), Some("http://[::1]:8000"));

        let portless = ServiceRecord::new("main", None, Some("box.local".to_string()), None);
        assert_eq!(portless.endpoint_url(), None);
    }

    #[test]
    fn test_wire_field_names() {
        let record = ServiceRecord::new("main", Some("main._http._tcp.local".to_string()), None, Some(8000))
            .with_service_type("http", "tcp");
        let json = serde_json::to_value(&record).unwrap();
        for key in ["id", "name", "fqdn", "host", "port", "addresses", "txt", "type", "protocol", "updatedAt"] {
            assert!(json.get(key).is_some(), "missing field {}", key);
        }
    }
}
