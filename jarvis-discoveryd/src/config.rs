use std::path::Path;
use serde::Deserialize;
use anyhow::{Context, Result};
use shared::protocol::{DEFAULT_REGISTRY_PORT, ENV_BROWSE_TYPE, ENV_LISTEN_ADDR, ENV_PORT, ENV_SERVICE_NAME};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveryConfig {
    /// Name filter applied when a query carries none. Empty means no filtering.
    #[serde(default)]
    pub service_name: String,
    /// Browse a single service type (e.g. "_http._tcp.local.") instead of every type
    #[serde(default)]
    pub browse_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_REGISTRY_PORT
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ApiConfig {
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl DiscoveryConfig {
    /// The configured default filter, `None` when filtering is off
    pub fn default_filter(&self) -> Option<String> {
        let name = self.service_name.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply `PORT`, `LISTEN_ADDR`, `SERVICE_NAME` and `BROWSE_TYPE` from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = lookup(ENV_PORT) {
            self.api.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} value: {}", ENV_PORT, port))?;
        }
        if let Some(host) = lookup(ENV_LISTEN_ADDR) {
            self.api.host = host;
        }
        if let Some(name) = lookup(ENV_SERVICE_NAME) {
            self.discovery.service_name = name;
        }
        if let Some(browse_type) = lookup(ENV_BROWSE_TYPE) {
            self.discovery.browse_type = Some(browse_type).filter(|t| !t.trim().is_empty());
        }
        Ok(())
    }
}
