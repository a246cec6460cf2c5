//! Discovery backed by a fixed, mutable container list.

use crate::container::{ContainerDiscovery, ContainerRef, LabelFilter, RuntimeInfo};
use crate::error::DiscoveryError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    containers: Vec<ContainerRef>,
    failing: Option<u16>,
}

/// Returns whatever containers were last set. Clones share state, so a test
/// can keep a handle while the scheduler owns another.
#[derive(Clone, Default)]
pub struct StaticDiscovery {
    inner: Arc<Mutex<Inner>>,
}

impl StaticDiscovery {
    pub fn new(containers: Vec<ContainerRef>) -> Self {
        let discovery = Self::default();
        discovery.set(containers);
        discovery
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self, containers: Vec<ContainerRef>) {
        self.lock().containers = containers;
    }

    pub fn push(&self, container: ContainerRef) {
        self.lock().containers.push(container);
    }

    pub fn remove(&self, id: &str) {
        self.lock().containers.retain(|c| c.id != id);
    }

    /// Makes every call fail with the given status until [`Self::recover`].
    pub fn fail_with(&self, status: u16) {
        self.lock().failing = Some(status);
    }

    pub fn recover(&self) {
        self.lock().failing = None;
    }

    fn check(&self, path: &str) -> Result<(), DiscoveryError> {
        match self.lock().failing {
            Some(status) => Err(DiscoveryError::Status {
                path: path.to_string(),
                status,
                body: "injected failure".into(),
            }),
            None => Ok(()),
        }
    }
}

/// A running container with the given labels, attached to no network.
pub fn running(id: &str, labels: &[(&str, &str)]) -> ContainerRef {
    ContainerRef {
        id: id.to_string(),
        running: true,
        health: None,
        labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        networks: HashMap::new(),
    }
}

#[async_trait]
impl ContainerDiscovery for StaticDiscovery {
    async fn ping(&self) -> Result<RuntimeInfo, DiscoveryError> {
        self.check("/_ping")?;
        Ok(RuntimeInfo {
            api_version: "static".into(),
            os: std::env::consts::OS.into(),
            version: env!("CARGO_PKG_VERSION").into(),
        })
    }

    async fn list(&self, filter: &LabelFilter) -> Result<Vec<ContainerRef>, DiscoveryError> {
        self.check("/containers/json")?;
        Ok(self
            .lock()
            .containers
            .iter()
            .filter(|c| filter.matches(&c.labels))
            .cloned()
            .collect())
    }
}
