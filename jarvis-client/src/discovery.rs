use std::time::Duration;
use reqwest::{Client, StatusCode};
use shared::protocol::{API_SERVERS, HEALTH};
use shared::types::ServiceRecord;
use crate::error::DiscoveryError;

pub const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerHealth {
    Healthy,
    Unhealthy,
}

/// Client for the discovery registry's HTTP API
#[derive(Clone)]
pub struct DiscoveryClient {
    client: Client,
    base_url: String,
}

impl DiscoveryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Servers currently advertised, optionally filtered by name
    pub async fn list_servers(&self, name_filter: Option<&str>) -> Result<Vec<ServiceRecord>, DiscoveryError> {
        let mut request = self.client.get(format!("{}{}", self.base_url, API_SERVERS));
        if let Some(name) = name_filter {
            request = request.query(&[("name", name)]);
        }
        let records = request
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<ServiceRecord>>()
            .await?;
        tracing::debug!("Registry listed {} servers", records.len());
        Ok(records)
    }
}

/// Healthy only for a 200 from `{base_url}/health` within the probe timeout
pub async fn probe_health(client: &Client, base_url: &str) -> ServerHealth {
    let url = format!("{}{}", base_url.trim_end_matches('/'), HEALTH);
    match client.get(&url).timeout(HEALTH_PROBE_TIMEOUT).send().await {
        Ok(response) if response.status() == StatusCode::OK => ServerHealth::Healthy,
        Ok(response) => {
            tracing::warn!("Health check for {} returned {}", base_url, response.status());
            ServerHealth::Unhealthy
        }
        Err(e) => {
            tracing::warn!("Health check for {} failed: {}", base_url, e);
            ServerHealth::Unhealthy
        }
    }
}
