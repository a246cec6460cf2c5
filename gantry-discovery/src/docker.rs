//! Docker Engine API client over TCP.

use crate::container::{ContainerDiscovery, ContainerRef, Health, LabelFilter, RuntimeInfo};
use crate::error::DiscoveryError;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize)]
struct ContainerSummary {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Status", default)]
    status: String,
    #[serde(rename = "Labels", default)]
    labels: Option<HashMap<String, String>>,
    #[serde(rename = "NetworkSettings", default)]
    network_settings: Option<NetworkSettings>,
}

#[derive(Deserialize, Default)]
struct NetworkSettings {
    #[serde(rename = "Networks", default)]
    networks: HashMap<String, EndpointSettings>,
}

#[derive(Deserialize)]
struct EndpointSettings {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

impl From<ContainerSummary> for ContainerRef {
    fn from(c: ContainerSummary) -> Self {
        let networks = c
            .network_settings
            .unwrap_or_default()
            .networks
            .into_iter()
            .filter(|(_, ep)| !ep.ip_address.is_empty())
            .map(|(name, ep)| (name, ep.ip_address))
            .collect();
        Self {
            running: c.state == "running",
            health: health_from_status(&c.status),
            id: c.id,
            labels: c.labels.unwrap_or_default(),
            networks,
        }
    }
}

/// The list endpoint only exposes health inside the human status text,
/// e.g. `Up 3 minutes (healthy)`.
fn health_from_status(status: &str) -> Option<Health> {
    if status.contains("(health: starting)") {
        Some(Health::Starting)
    } else if status.contains("(unhealthy)") {
        Some(Health::Unhealthy)
    } else if status.contains("(healthy)") {
        Some(Health::Healthy)
    } else {
        None
    }
}

/// Normalizes `tcp://host:port` (the `DOCKER_HOST` form) to an HTTP URL.
fn endpoint_url(endpoint: &str) -> Result<Url, DiscoveryError> {
    let unsupported = || DiscoveryError::UnsupportedEndpoint(endpoint.to_string());
    let normalized = match endpoint.strip_prefix("tcp://") {
        Some(rest) => format!("http://{rest}"),
        None => endpoint.to_string(),
    };
    let url = Url::parse(&normalized).map_err(|_| unsupported())?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(unsupported());
    }
    Ok(url)
}

#[derive(Debug, Clone)]
pub struct DockerClient {
    base: Url,
    http: Client,
}

impl DockerClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, DiscoveryError> {
        let base = endpoint_url(endpoint)?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { base, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(path);
        }
        url
    }

    async fn get_raw(&self, url: Url) -> Result<String, DiscoveryError> {
        let path = url.path().to_string();
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                path,
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, DiscoveryError> {
        let body = self.get_raw(url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ContainerDiscovery for DockerClient {
    async fn ping(&self) -> Result<RuntimeInfo, DiscoveryError> {
        self.get_raw(self.url("_ping")).await?;
        self.get_json(self.url("version")).await
    }

    async fn list(&self, filter: &LabelFilter) -> Result<Vec<ContainerRef>, DiscoveryError> {
        let filters = serde_json::json!({ "label": [filter.as_query()] }).to_string();
        let mut url = self.url("containers");
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push("json");
        }
        url.query_pairs_mut().append_pair("filters", &filters);

        let summaries: Vec<ContainerSummary> = self.get_json(url).await?;
        debug!(count = summaries.len(), filter = %filter.as_query(), "listed containers");
        Ok(summaries.into_iter().map(ContainerRef::from).collect())
    }
}
