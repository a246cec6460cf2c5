//! Converges gateway objects toward the desired specs, one gateway key at a
//! time.
//!
//! For every key the steps run in a fixed order because each object refers
//! to the one before it by name or id:
//!
//! 1. upstream
//! 2. targets
//! 3. service
//! 4. auth plugin
//! 5. route
//!
//! A failing step ends that key for the cycle. Whatever earlier steps wrote
//! stays in place and is re-checked on the next cycle.

use crate::error::{ReconcileError, Step};
use crate::state::{KeyState, auth_plugin_of, read_key_state};
use gantry_core::config::AuthConfig;
use gantry_core::{GatewayKey, Plugin, Route, Service, ServiceSpec, Target, Upstream};
use gantry_gateway::{GatewayAdmin, GatewayError, ObjectKind};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

/// Plugin config field holding the identity provider discovery URL.
pub const DISCOVERY_URL_FIELD: &str = "discoveryUri";
/// Plugin config field holding the client identifier.
pub const CLIENT_ID_FIELD: &str = "clientID";

/// A gateway write performed while reconciling a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreatedUpstream,
    CreatedTarget(String),
    RemovedTarget(String),
    CreatedService,
    /// Service host pointed elsewhere and was re-bound to the upstream.
    UpdatedService { previous_host: String },
    CreatedAuthPlugin,
    UpdatedAuthPlugin,
    CreatedRoute,
}

/// Outcome of one key in one cycle.
#[derive(Debug)]
pub struct KeyReport {
    pub key: GatewayKey,
    pub actions: Vec<Action>,
    pub error: Option<ReconcileError>,
}

impl KeyReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Desired state for one key, folded from all of its replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DesiredKey {
    key: GatewayKey,
    gateway_path: String,
    addresses: BTreeSet<String>,
    require_authentication: bool,
}

/// Groups specs by gateway key. Replicas share a key; distinct paths that
/// fold to the same key are refused.
fn group_specs(specs: &[ServiceSpec]) -> Vec<Result<DesiredKey, ReconcileError>> {
    let mut groups: BTreeMap<GatewayKey, Vec<&ServiceSpec>> = BTreeMap::new();
    for spec in specs {
        groups.entry(spec.gateway_key()).or_default().push(spec);
    }

    groups
        .into_iter()
        .map(|(key, replicas)| {
            let paths: BTreeSet<&str> = replicas.iter().map(|s| s.gateway_path.as_str()).collect();
            if paths.len() > 1 {
                return Err(ReconcileError::KeyCollision {
                    key,
                    paths: paths.into_iter().map(String::from).collect(),
                });
            }
            Ok(DesiredKey {
                gateway_path: replicas[0].gateway_path.clone(),
                addresses: replicas.iter().map(|s| s.instance_address.clone()).collect(),
                // Any replica asking for auth wins.
                require_authentication: replicas.iter().any(|s| s.require_authentication),
                key,
            })
        })
        .collect()
}

pub struct Reconciler {
    admin: Arc<dyn GatewayAdmin>,
    auth: AuthConfig,
}

impl Reconciler {
    pub fn new(admin: Arc<dyn GatewayAdmin>, auth: AuthConfig) -> Self {
        Self { admin, auth }
    }

    /// Reconciles every key implicated by `specs`, sequentially.
    ///
    /// `live_hosts` is the identity of every container discovered this
    /// cycle, across all keys. A target is only removed when its host is
    /// not among them.
    pub async fn reconcile(&self, specs: &[ServiceSpec], live_hosts: &HashSet<String>) -> Vec<KeyReport> {
        let mut reports = Vec::new();
        for desired in group_specs(specs) {
            let report = match desired {
                Ok(desired) => {
                    let span = info_span!("reconcile_key", gateway_key = %desired.key);
                    self.reconcile_key(&desired, live_hosts).instrument(span).await
                }
                Err(error) => {
                    warn!(gateway_key = %error.key(), error = %error, "gateway key refused");
                    KeyReport {
                        key: error.key().clone(),
                        actions: Vec::new(),
                        error: Some(error),
                    }
                }
            };
            reports.push(report);
        }
        reports
    }

    async fn reconcile_key(&self, desired: &DesiredKey, live_hosts: &HashSet<String>) -> KeyReport {
        let mut actions = Vec::new();
        let error = self.converge(desired, live_hosts, &mut actions).await.err();
        match &error {
            Some(e) => warn!(step = ?e.step().map(|s| s.as_str()), error = %e, "reconciliation stopped"),
            None if actions.is_empty() => debug!("in sync"),
            None => info!(changes = actions.len(), "converged"),
        }
        KeyReport {
            key: desired.key.clone(),
            actions,
            error,
        }
    }

    async fn converge(
        &self,
        desired: &DesiredKey,
        live_hosts: &HashSet<String>,
        actions: &mut Vec<Action>,
    ) -> Result<(), ReconcileError> {
        let key = &desired.key;
        let fail = |step: Step| {
            move |source: GatewayError| ReconcileError::Step {
                key: key.clone(),
                step,
                source,
            }
        };

        let KeyState {
            upstream,
            targets,
            service,
            route,
            auth_plugin,
        } = read_key_state(self.admin.as_ref(), key, &self.auth.plugin_name)
            .await
            .map_err(fail(Step::Read))?;

        let upstream = self
            .ensure_upstream(key, upstream, actions)
            .await
            .map_err(fail(Step::Upstream))?;

        self.sync_targets(&upstream, &targets, &desired.addresses, live_hosts, actions)
            .await
            .map_err(fail(Step::Targets))?;

        let service = self
            .ensure_service(key, &upstream, service, actions)
            .await
            .map_err(fail(Step::Service))?;
        let service_id = service.id.clone().ok_or_else(|| {
            fail(Step::Service)(GatewayError::MissingId {
                kind: ObjectKind::Service,
                name: service.name.clone(),
            })
        })?;

        if desired.require_authentication {
            self.ensure_auth_plugin(&service_id, auth_plugin, actions)
                .await
                .map_err(fail(Step::AuthPlugin))?;
        } else if auth_plugin.is_some() {
            debug!(plugin = %self.auth.plugin_name, "authentication not required, existing plugin left in place");
        }

        self.ensure_route(key, &desired.gateway_path, &service_id, route, actions)
            .await
            .map_err(fail(Step::Route))?;

        Ok(())
    }

    /// Returns the upstream name.
    async fn ensure_upstream(
        &self,
        key: &GatewayKey,
        current: Option<Upstream>,
        actions: &mut Vec<Action>,
    ) -> Result<String, GatewayError> {
        if let Some(upstream) = current {
            return Ok(upstream.name);
        }
        match self.admin.create_upstream(&Upstream::named(key.as_str())).await {
            Ok(created) => {
                info!(upstream = %created.name, "created upstream");
                actions.push(Action::CreatedUpstream);
            }
            Err(e) if e.is_already_exists() => debug!("upstream already exists"),
            Err(e) => return Err(e),
        }
        Ok(key.as_str().to_string())
    }

    /// Adds missing targets and removes stale ones. Every operation is
    /// attempted; the first failure is returned afterwards.
    async fn sync_targets(
        &self,
        upstream: &str,
        current: &[Target],
        desired: &BTreeSet<String>,
        live_hosts: &HashSet<String>,
        actions: &mut Vec<Action>,
    ) -> Result<(), GatewayError> {
        let mut first_error = None;
        let actual: HashSet<&str> = current.iter().map(|t| t.target.as_str()).collect();

        for target in current.iter().filter(|t| !desired.contains(&t.target)) {
            if live_hosts.contains(target.host()) {
                debug!(address = %target.target, "target host still discovered, keeping target");
                continue;
            }
            match self.admin.delete_target(upstream, target.handle()).await {
                Ok(()) => {
                    info!(address = %target.target, reason = "host no longer discovered", "removed target");
                    actions.push(Action::RemovedTarget(target.target.clone()));
                }
                Err(e) => {
                    warn!(address = %target.target, error = %e, "failed to remove target");
                    first_error.get_or_insert(e);
                }
            }
        }

        for address in desired.iter().filter(|a| !actual.contains(a.as_str())) {
            match self.admin.create_target(upstream, &Target::new(address.as_str())).await {
                Ok(_) => {
                    info!(address = %address, "created target");
                    actions.push(Action::CreatedTarget(address.clone()));
                }
                Err(e) if e.is_already_exists() => debug!(address = %address, "target already exists"),
                Err(e) => {
                    warn!(address = %address, error = %e, "failed to create target");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Makes sure the service exists and forwards to `upstream`.
    async fn ensure_service(
        &self,
        key: &GatewayKey,
        upstream: &str,
        current: Option<Service>,
        actions: &mut Vec<Action>,
    ) -> Result<Service, GatewayError> {
        let service = match current {
            Some(service) => service,
            None => match self.admin.create_service(&Service::bound_to(key.as_str(), upstream)).await {
                Ok(created) => {
                    info!(service = %created.name, host = %created.host, "created service");
                    actions.push(Action::CreatedService);
                    created
                }
                Err(e) if e.is_already_exists() => {
                    debug!("service already exists, re-reading");
                    self.admin.get_service(key.as_str()).await?
                }
                Err(e) => return Err(e),
            },
        };

        if service.host == upstream {
            return Ok(service);
        }

        let previous_host = service.host.clone();
        let updated = self
            .admin
            .update_service(&Service {
                host: upstream.to_string(),
                ..service
            })
            .await?;
        info!(service = %updated.name, previous_host = %previous_host, host = %updated.host, "re-bound drifted service");
        actions.push(Action::UpdatedService { previous_host });
        Ok(updated)
    }

    fn desired_plugin_fields(&self) -> [(&'static str, &str); 2] {
        [
            (DISCOVERY_URL_FIELD, self.auth.discovery_url.as_str()),
            (CLIENT_ID_FIELD, self.auth.client_id.as_str()),
        ]
    }

    async fn ensure_auth_plugin(
        &self,
        service_id: &str,
        current: Option<Plugin>,
        actions: &mut Vec<Action>,
    ) -> Result<(), GatewayError> {
        let current = match current {
            Some(plugin) => plugin,
            None => {
                let config = self
                    .desired_plugin_fields()
                    .into_iter()
                    .map(|(field, value)| (field.to_string(), Value::from(value)))
                    .collect();
                match self
                    .admin
                    .create_plugin_for_service(service_id, &Plugin::new(&self.auth.plugin_name, config))
                    .await
                {
                    Ok(_) => {
                        info!(plugin = %self.auth.plugin_name, "created auth plugin");
                        actions.push(Action::CreatedAuthPlugin);
                        return Ok(());
                    }
                    Err(e) if e.is_already_exists() => {
                        debug!(plugin = %self.auth.plugin_name, "auth plugin already exists, re-reading");
                        let plugins = self.admin.list_plugins_for_service(service_id).await?;
                        auth_plugin_of(plugins, &self.auth.plugin_name).ok_or_else(|| GatewayError::NotFound {
                            kind: ObjectKind::Plugin,
                            name: self.auth.plugin_name.clone(),
                        })?
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let stale: Vec<&str> = self
            .desired_plugin_fields()
            .into_iter()
            .filter(|(field, value)| current.config_str(field) != Some(*value))
            .map(|(field, _)| field)
            .collect();
        // A disabled plugin leaves the service unprotected.
        let disabled = current.enabled == Some(false);
        if stale.is_empty() && !disabled {
            return Ok(());
        }

        let mut patched = current;
        for (field, value) in self.desired_plugin_fields() {
            patched.config.insert(field.to_string(), Value::from(value));
        }
        if disabled {
            patched.enabled = Some(true);
        }
        self.admin.update_plugin_for_service(service_id, &patched).await?;
        info!(plugin = %patched.name, fields = ?stale, reenabled = disabled, "updated auth plugin config");
        actions.push(Action::UpdatedAuthPlugin);
        Ok(())
    }

    async fn ensure_route(
        &self,
        key: &GatewayKey,
        gateway_path: &str,
        service_id: &str,
        current: Option<Route>,
        actions: &mut Vec<Action>,
    ) -> Result<(), GatewayError> {
        if let Some(route) = current {
            if route.paths() != [gateway_path] {
                warn!(route = %route.name, paths = ?route.paths(), expected = gateway_path, "route paths differ, not updated");
            }
            return Ok(());
        }
        match self
            .admin
            .create_route(&Route::streaming(key.as_str(), gateway_path, service_id))
            .await
        {
            Ok(created) => {
                info!(route = %created.name, path = gateway_path, "created route");
                actions.push(Action::CreatedRoute);
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!("route already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
