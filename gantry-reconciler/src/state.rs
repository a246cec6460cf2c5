//! Current gateway state for one gateway key.

use gantry_core::{GatewayKey, Plugin, Route, Service, Target, Upstream};
use gantry_gateway::{GatewayAdmin, GatewayError};

/// What the gateway holds for a key at the start of its reconciliation.
///
/// Absent objects are `None`; they are the create signal, not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyState {
    pub upstream: Option<Upstream>,
    /// Empty when the upstream is absent.
    pub targets: Vec<Target>,
    pub service: Option<Service>,
    pub route: Option<Route>,
    /// The service's auth plugin, `None` when the service is absent.
    pub auth_plugin: Option<Plugin>,
}

/// Maps `NotFound` to `None`; every other error propagates.
pub(crate) fn found<T>(result: Result<T, GatewayError>) -> Result<Option<T>, GatewayError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Picks the plugin named `plugin_name` out of a service's plugins.
pub(crate) fn auth_plugin_of(plugins: Vec<Plugin>, plugin_name: &str) -> Option<Plugin> {
    plugins.into_iter().find(|p| p.name == plugin_name)
}

pub async fn read_key_state(
    admin: &dyn GatewayAdmin,
    key: &GatewayKey,
    plugin_name: &str,
) -> Result<KeyState, GatewayError> {
    let name = key.as_str();

    let upstream = found(admin.get_upstream(name).await)?;
    let targets = match &upstream {
        Some(_) => admin.list_targets(name).await?,
        None => Vec::new(),
    };

    let service = found(admin.get_service(name).await)?;
    let auth_plugin = match service.as_ref().and_then(|s| s.id.as_deref()) {
        Some(id) => auth_plugin_of(admin.list_plugins_for_service(id).await?, plugin_name),
        None => None,
    };

    let route = found(admin.get_route(name).await)?;

    Ok(KeyState {
        upstream,
        targets,
        service,
        route,
        auth_plugin,
    })
}
