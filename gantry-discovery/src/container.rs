use crate::error::DiscoveryError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// Length of the short container id the runtime registers as hostname and
/// network alias.
const SHORT_ID_LEN: usize = 12;

/// Health reported by the container's own health check, if it has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Starting,
    Healthy,
    Unhealthy,
}

/// A container as seen by the runtime at listing time.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerRef {
    pub id: String,
    pub running: bool,
    pub health: Option<Health>,
    pub labels: HashMap<String, String>,
    /// Network name → address of the container in that network.
    pub networks: HashMap<String, String>,
}

impl ContainerRef {
    /// Hostname under which the container is reachable from its networks.
    pub fn identity(&self) -> &str {
        match self.id.get(..SHORT_ID_LEN) {
            Some(short) => short,
            None => &self.id,
        }
    }

    /// Running and not failing its health check. Containers still starting
    /// up, or without a health check, count as serving.
    pub fn is_serving(&self) -> bool {
        self.running && self.health != Some(Health::Unhealthy)
    }
}

/// Runtime version details returned by [`ContainerDiscovery::ping`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuntimeInfo {
    #[serde(rename = "ApiVersion", default)]
    pub api_version: String,
    #[serde(rename = "Os", default)]
    pub os: String,
    #[serde(rename = "Version", default)]
    pub version: String,
}

/// Label-presence filter: `key` matches any value, `key=value` an exact one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelFilter {
    key: String,
    value: Option<String>,
}

impl LabelFilter {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('=') {
            Some((key, value)) => Self {
                key: key.trim().to_string(),
                value: Some(value.trim().to_string()),
            },
            None => Self {
                key: raw.trim().to_string(),
                value: None,
            },
        }
    }

    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        match (labels.get(&self.key), &self.value) {
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
            (None, _) => false,
        }
    }

    /// Form used by the runtime's `label` list filter.
    pub fn as_query(&self) -> String {
        match &self.value {
            Some(value) => format!("{}={}", self.key, value),
            None => self.key.clone(),
        }
    }
}

/// Lists candidate containers on the container host.
#[async_trait]
pub trait ContainerDiscovery: Send + Sync {
    /// Verifies the runtime is reachable.
    async fn ping(&self) -> Result<RuntimeInfo, DiscoveryError>;

    /// Containers carrying a label matching `filter`.
    async fn list(&self, filter: &LabelFilter) -> Result<Vec<ContainerRef>, DiscoveryError>;
}
