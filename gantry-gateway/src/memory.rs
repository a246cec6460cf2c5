use crate::admin::{GatewayAdmin, GatewayInfo, ObjectKind, Result};
use crate::error::GatewayError;
use async_trait::async_trait;
use dashmap::DashMap;
use gantry_core::service::ForeignRef;
use gantry_core::{Plugin, Route, Service, Target, Upstream};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Admin operations, used to inject faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetUpstream,
    CreateUpstream,
    ListTargets,
    CreateTarget,
    DeleteTarget,
    GetService,
    CreateService,
    UpdateService,
    GetRoute,
    CreateRoute,
    ListPlugins,
    CreatePlugin,
    UpdatePlugin,
}

/// Injected outcome for an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The admin API answers 503.
    Unavailable,
    /// The lookup reports the object as absent even if it exists.
    NotFound,
}

/// A write that reached the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateUpstream { name: String },
    CreateTarget { upstream: String, target: String },
    DeleteTarget { upstream: String, target: String },
    CreateService { name: String, host: String },
    UpdateService { name: String, host: String },
    CreateRoute { name: String, paths: Vec<String> },
    CreatePlugin { service: String, name: String },
    UpdatePlugin { service: String, name: String },
}

/// In-process gateway holding admin objects in memory.
///
/// Behaves like the admin API for the operations in [`GatewayAdmin`]:
/// ids are assigned on create, duplicate names conflict, and unknown names
/// are not found. Every successful write is recorded in order.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    upstreams: Arc<DashMap<String, Upstream>>,
    targets: Arc<DashMap<String, Vec<Target>>>,
    services: Arc<DashMap<String, Service>>,
    routes: Arc<DashMap<String, Route>>,
    /// Keyed by service id.
    plugins: Arc<DashMap<String, Vec<Plugin>>>,
    mutations: Arc<Mutex<Vec<Mutation>>>,
    faults: Arc<Mutex<HashMap<Operation, Fault>>>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Seeding (not recorded as mutations) ─────────────────────

    pub fn insert_upstream(&self, name: &str) -> Upstream {
        let upstream = Upstream {
            id: Some(new_id()),
            ..Upstream::named(name)
        };
        self.upstreams.insert(name.to_string(), upstream.clone());
        upstream
    }

    pub fn insert_target(&self, upstream: &str, address: &str) -> Target {
        let target = Target {
            id: Some(new_id()),
            ..Target::new(address)
        };
        self.targets
            .entry(upstream.to_string())
            .or_default()
            .push(target.clone());
        target
    }

    pub fn insert_service(&self, name: &str, host: &str) -> Service {
        let service = Service {
            id: Some(new_id()),
            ..Service::bound_to(name, host)
        };
        self.services.insert(name.to_string(), service.clone());
        service
    }

    pub fn insert_route(&self, name: &str, path: &str, service_id: &str) -> Route {
        let route = Route {
            id: Some(new_id()),
            ..Route::streaming(name, path, service_id)
        };
        self.routes.insert(name.to_string(), route.clone());
        route
    }

    pub fn insert_plugin(&self, service_id: &str, plugin: Plugin) -> Plugin {
        let plugin = Plugin {
            id: Some(new_id()),
            service: Some(ForeignRef::new(service_id)),
            ..plugin
        };
        self.plugins
            .entry(service_id.to_string())
            .or_default()
            .push(plugin.clone());
        plugin
    }

    // ── Inspection ──────────────────────────────────────────────

    pub fn upstream(&self, name: &str) -> Option<Upstream> {
        self.upstreams.get(name).map(|u| u.value().clone())
    }

    pub fn upstream_count(&self) -> usize {
        self.upstreams.len()
    }

    /// Target addresses of `upstream`, sorted.
    pub fn target_addresses(&self, upstream: &str) -> Vec<String> {
        let mut addrs: Vec<String> = self
            .targets
            .get(upstream)
            .map(|t| t.iter().map(|t| t.target.clone()).collect())
            .unwrap_or_default();
        addrs.sort();
        addrs
    }

    pub fn service(&self, name: &str) -> Option<Service> {
        self.services.get(name).map(|s| s.value().clone())
    }

    pub fn route(&self, name: &str) -> Option<Route> {
        self.routes.get(name).map(|r| r.value().clone())
    }

    pub fn route_names(&self) -> HashSet<String> {
        self.routes.iter().map(|r| r.key().clone()).collect()
    }

    pub fn plugins(&self, service_id: &str) -> Vec<Plugin> {
        self.plugins
            .get(service_id)
            .map(|p| p.value().clone())
            .unwrap_or_default()
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        lock(&self.mutations).clone()
    }

    /// Returns and clears the recorded writes.
    pub fn take_mutations(&self) -> Vec<Mutation> {
        std::mem::take(&mut *lock(&self.mutations))
    }

    // ── Fault injection ─────────────────────────────────────────

    pub fn inject(&self, op: Operation, fault: Fault) {
        lock(&self.faults).insert(op, fault);
    }

    pub fn clear_faults(&self) {
        lock(&self.faults).clear();
    }

    fn check(&self, op: Operation, kind: ObjectKind, name: &str) -> Result<()> {
        match lock(&self.faults).get(&op) {
            None => Ok(()),
            Some(Fault::Unavailable) => Err(GatewayError::Status {
                kind,
                name: name.to_string(),
                status: 503,
                body: "injected failure".into(),
            }),
            Some(Fault::NotFound) => Err(not_found(kind, name)),
        }
    }

    fn record(&self, mutation: Mutation) {
        lock(&self.mutations).push(mutation);
    }

    fn service_by_id(&self, id: &str) -> Option<Service> {
        self.services
            .iter()
            .find(|s| s.id.as_deref() == Some(id))
            .map(|s| s.value().clone())
    }

    fn service_name_for(&self, id: &str) -> String {
        self.service_by_id(id).map(|s| s.name).unwrap_or_else(|| id.to_string())
    }
}

fn not_found(kind: ObjectKind, name: &str) -> GatewayError {
    GatewayError::NotFound {
        kind,
        name: name.to_string(),
    }
}

fn conflict(kind: ObjectKind, name: &str) -> GatewayError {
    GatewayError::AlreadyExists {
        kind,
        name: name.to_string(),
    }
}

#[async_trait]
impl GatewayAdmin for MemoryGateway {
    async fn info(&self) -> Result<GatewayInfo> {
        Ok(GatewayInfo {
            version: "memory".into(),
            hostname: None,
        })
    }

    async fn get_upstream(&self, name: &str) -> Result<Upstream> {
        self.check(Operation::GetUpstream, ObjectKind::Upstream, name)?;
        self.upstream(name).ok_or_else(|| not_found(ObjectKind::Upstream, name))
    }

    async fn create_upstream(&self, upstream: &Upstream) -> Result<Upstream> {
        self.check(Operation::CreateUpstream, ObjectKind::Upstream, &upstream.name)?;
        if self.upstreams.contains_key(&upstream.name) {
            return Err(conflict(ObjectKind::Upstream, &upstream.name));
        }
        let created = Upstream {
            id: Some(new_id()),
            ..upstream.clone()
        };
        self.upstreams.insert(created.name.clone(), created.clone());
        self.record(Mutation::CreateUpstream {
            name: created.name.clone(),
        });
        Ok(created)
    }

    async fn list_targets(&self, upstream: &str) -> Result<Vec<Target>> {
        self.check(Operation::ListTargets, ObjectKind::Upstream, upstream)?;
        if !self.upstreams.contains_key(upstream) {
            return Err(not_found(ObjectKind::Upstream, upstream));
        }
        Ok(self
            .targets
            .get(upstream)
            .map(|t| t.value().clone())
            .unwrap_or_default())
    }

    async fn create_target(&self, upstream: &str, target: &Target) -> Result<Target> {
        self.check(Operation::CreateTarget, ObjectKind::Target, &target.target)?;
        if !self.upstreams.contains_key(upstream) {
            return Err(not_found(ObjectKind::Upstream, upstream));
        }
        let mut targets = self.targets.entry(upstream.to_string()).or_default();
        if targets.iter().any(|t| t.target == target.target) {
            return Err(conflict(ObjectKind::Target, &target.target));
        }
        let created = Target {
            id: Some(new_id()),
            ..target.clone()
        };
        targets.push(created.clone());
        drop(targets);
        self.record(Mutation::CreateTarget {
            upstream: upstream.to_string(),
            target: created.target.clone(),
        });
        Ok(created)
    }

    async fn delete_target(&self, upstream: &str, target: &str) -> Result<()> {
        self.check(Operation::DeleteTarget, ObjectKind::Target, target)?;
        let removed = self.targets.get_mut(upstream).and_then(|mut targets| {
            let pos = targets
                .iter()
                .position(|t| t.id.as_deref() == Some(target) || t.target == target)?;
            Some(targets.remove(pos))
        });
        if let Some(removed) = removed {
            self.record(Mutation::DeleteTarget {
                upstream: upstream.to_string(),
                target: removed.target,
            });
        }
        Ok(())
    }

    async fn get_service(&self, name: &str) -> Result<Service> {
        self.check(Operation::GetService, ObjectKind::Service, name)?;
        self.service(name).ok_or_else(|| not_found(ObjectKind::Service, name))
    }

    async fn create_service(&self, service: &Service) -> Result<Service> {
        self.check(Operation::CreateService, ObjectKind::Service, &service.name)?;
        if self.services.contains_key(&service.name) {
            return Err(conflict(ObjectKind::Service, &service.name));
        }
        let created = Service {
            id: Some(new_id()),
            ..service.clone()
        };
        self.services.insert(created.name.clone(), created.clone());
        self.record(Mutation::CreateService {
            name: created.name.clone(),
            host: created.host.clone(),
        });
        Ok(created)
    }

    async fn update_service(&self, service: &Service) -> Result<Service> {
        self.check(Operation::UpdateService, ObjectKind::Service, &service.name)?;
        let id = service.id.as_deref().ok_or_else(|| GatewayError::MissingId {
            kind: ObjectKind::Service,
            name: service.name.clone(),
        })?;
        let current = self
            .service_by_id(id)
            .ok_or_else(|| not_found(ObjectKind::Service, id))?;
        let updated = Service {
            id: current.id.clone(),
            name: current.name.clone(),
            ..service.clone()
        };
        self.services.insert(updated.name.clone(), updated.clone());
        self.record(Mutation::UpdateService {
            name: updated.name.clone(),
            host: updated.host.clone(),
        });
        Ok(updated)
    }

    async fn get_route(&self, name: &str) -> Result<Route> {
        self.check(Operation::GetRoute, ObjectKind::Route, name)?;
        self.route(name).ok_or_else(|| not_found(ObjectKind::Route, name))
    }

    async fn create_route(&self, route: &Route) -> Result<Route> {
        self.check(Operation::CreateRoute, ObjectKind::Route, &route.name)?;
        if self.routes.contains_key(&route.name) {
            return Err(conflict(ObjectKind::Route, &route.name));
        }
        if let Some(service) = &route.service
            && self.service_by_id(&service.id).is_none()
        {
            return Err(not_found(ObjectKind::Service, &service.id));
        }
        let created = Route {
            id: Some(new_id()),
            ..route.clone()
        };
        self.routes.insert(created.name.clone(), created.clone());
        self.record(Mutation::CreateRoute {
            name: created.name.clone(),
            paths: created.paths().to_vec(),
        });
        Ok(created)
    }

    async fn list_plugins_for_service(&self, service: &str) -> Result<Vec<Plugin>> {
        self.check(Operation::ListPlugins, ObjectKind::Service, service)?;
        if self.service_by_id(service).is_none() {
            return Err(not_found(ObjectKind::Service, service));
        }
        Ok(self.plugins(service))
    }

    async fn create_plugin_for_service(&self, service: &str, plugin: &Plugin) -> Result<Plugin> {
        self.check(Operation::CreatePlugin, ObjectKind::Plugin, &plugin.name)?;
        if self.service_by_id(service).is_none() {
            return Err(not_found(ObjectKind::Service, service));
        }
        let mut plugins = self.plugins.entry(service.to_string()).or_default();
        if plugins.iter().any(|p| p.name == plugin.name) {
            return Err(conflict(ObjectKind::Plugin, &plugin.name));
        }
        let created = Plugin {
            id: Some(new_id()),
            service: Some(ForeignRef::new(service)),
            ..plugin.clone()
        };
        plugins.push(created.clone());
        drop(plugins);
        self.record(Mutation::CreatePlugin {
            service: self.service_name_for(service),
            name: created.name.clone(),
        });
        Ok(created)
    }

    async fn update_plugin_for_service(&self, service: &str, plugin: &Plugin) -> Result<Plugin> {
        self.check(Operation::UpdatePlugin, ObjectKind::Plugin, &plugin.name)?;
        let id = plugin.id.as_deref().ok_or_else(|| GatewayError::MissingId {
            kind: ObjectKind::Plugin,
            name: plugin.name.clone(),
        })?;
        let updated = {
            let mut plugins = self
                .plugins
                .get_mut(service)
                .ok_or_else(|| not_found(ObjectKind::Plugin, id))?;
            let existing = plugins
                .iter_mut()
                .find(|p| p.id.as_deref() == Some(id))
                .ok_or_else(|| not_found(ObjectKind::Plugin, id))?;
            existing.config = plugin.config.clone();
            if plugin.enabled.is_some() {
                existing.enabled = plugin.enabled;
            }
            existing.clone()
        };
        self.record(Mutation::UpdatePlugin {
            service: self.service_name_for(service),
            name: updated.name.clone(),
        });
        Ok(updated)
    }
}
