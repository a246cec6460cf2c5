use crate::error::GatewayError;
use async_trait::async_trait;
use gantry_core::{Plugin, Route, Service, Target, Upstream};
use serde::Deserialize;
use std::fmt;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Kinds of gateway objects, used to label errors and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Node,
    Upstream,
    Target,
    Service,
    Route,
    Plugin,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Node => "node",
            ObjectKind::Upstream => "upstream",
            ObjectKind::Target => "target",
            ObjectKind::Service => "service",
            ObjectKind::Route => "route",
            ObjectKind::Plugin => "plugin",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node information reported by the admin API root.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayInfo {
    pub version: String,
    #[serde(default)]
    pub hostname: Option<String>,
}

/// Admin API of the gateway being configured.
///
/// Objects are addressed by name (upstreams, services, routes) or by the
/// owning object (targets under an upstream, plugins under a service).
/// Lookups of absent objects fail with [`GatewayError::NotFound`]; creates of
/// objects that already exist fail with [`GatewayError::AlreadyExists`].
#[async_trait]
pub trait GatewayAdmin: Send + Sync {
    async fn info(&self) -> Result<GatewayInfo>;

    async fn get_upstream(&self, name: &str) -> Result<Upstream>;
    async fn create_upstream(&self, upstream: &Upstream) -> Result<Upstream>;

    /// Every target of `upstream`, across all pages.
    async fn list_targets(&self, upstream: &str) -> Result<Vec<Target>>;
    async fn create_target(&self, upstream: &str, target: &Target) -> Result<Target>;
    /// Removing a target that is already gone succeeds.
    async fn delete_target(&self, upstream: &str, target: &str) -> Result<()>;

    async fn get_service(&self, name: &str) -> Result<Service>;
    async fn create_service(&self, service: &Service) -> Result<Service>;
    /// Updates the service identified by its `id`.
    async fn update_service(&self, service: &Service) -> Result<Service>;

    async fn get_route(&self, name: &str) -> Result<Route>;
    async fn create_route(&self, route: &Route) -> Result<Route>;

    /// Every plugin attached to the service with id `service`.
    async fn list_plugins_for_service(&self, service: &str) -> Result<Vec<Plugin>>;
    async fn create_plugin_for_service(&self, service: &str, plugin: &Plugin) -> Result<Plugin>;
    /// Updates the plugin identified by its `id`.
    async fn update_plugin_for_service(&self, service: &str, plugin: &Plugin) -> Result<Plugin>;
}
