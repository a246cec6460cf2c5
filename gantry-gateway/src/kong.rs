//! Client for a Kong-compatible admin API.

use crate::admin::{GatewayAdmin, GatewayInfo, ObjectKind, Result};
use crate::error::GatewayError;
use async_trait::async_trait;
use gantry_core::{Plugin, Route, Service, Target, Upstream};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// One page of a list endpoint. `next` is the path of the following page.
#[derive(serde::Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    next: Option<String>,
}

/// HTTP client for the gateway admin API (`http://<gateway>:8001`).
#[derive(Debug, Clone)]
pub struct KongAdminClient {
    base: Url,
    http: Client,
}

impl KongAdminClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| GatewayError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(GatewayError::InvalidUrl {
                url: base_url.to_string(),
                reason: "expected an http(s) base URL".into(),
            });
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { base, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`: the base always has path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        kind: ObjectKind,
        name: &str,
    ) -> Result<T> {
        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        match status {
            s if s.is_success() => Ok(serde_json::from_slice(&body)?),
            StatusCode::NOT_FOUND => Err(GatewayError::NotFound {
                kind,
                name: name.to_string(),
            }),
            StatusCode::CONFLICT => Err(GatewayError::AlreadyExists {
                kind,
                name: name.to_string(),
            }),
            s => Err(GatewayError::Status {
                kind,
                name: name.to_string(),
                status: s.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
        }
    }

    async fn get<T: DeserializeOwned>(&self, kind: ObjectKind, name: &str, segments: &[&str]) -> Result<T> {
        let request = self.http.get(self.url(segments));
        self.send(request, kind, name).await
    }

    async fn write<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        kind: ObjectKind,
        name: &str,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        debug!(%method, kind = %kind, name, "admin write");
        let request = self.http.request(method, self.url(segments)).json(body);
        self.send(request, kind, name).await
    }

    /// Resolves a `next` cursor under the base URL. The admin API reports
    /// cursors as root-relative paths, so a base path prefix is re-applied
    /// unless the cursor already carries it.
    fn next_page(&self, next: &str) -> Result<Url> {
        let resolved = self.base.join(next).map_err(|e| GatewayError::InvalidUrl {
            url: next.to_string(),
            reason: e.to_string(),
        })?;
        let prefix = self.base.path().trim_end_matches('/');
        let path = resolved.path();
        let mut url = self.base.clone();
        if prefix.is_empty() || path.starts_with(&format!("{prefix}/")) {
            url.set_path(path);
        } else {
            url.set_path(&format!("{prefix}{path}"));
        }
        url.set_query(resolved.query());
        Ok(url)
    }

    /// Follows `next` links until the listing is exhausted.
    async fn list_all<T: DeserializeOwned>(&self, kind: ObjectKind, owner: &str, segments: &[&str]) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut url = self.url(segments);
        loop {
            let page: Page<T> = self.send(self.http.get(url.clone()), kind, owner).await?;
            items.extend(page.data);
            match page.next {
                Some(next) if !next.is_empty() => url = self.next_page(&next)?,
                _ => break,
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl GatewayAdmin for KongAdminClient {
    async fn info(&self) -> Result<GatewayInfo> {
        let request = self.http.get(self.base.clone());
        self.send(request, ObjectKind::Node, "admin root").await
    }

    async fn get_upstream(&self, name: &str) -> Result<Upstream> {
        self.get(ObjectKind::Upstream, name, &["upstreams", name]).await
    }

    async fn create_upstream(&self, upstream: &Upstream) -> Result<Upstream> {
        self.write(Method::POST, ObjectKind::Upstream, &upstream.name, &["upstreams"], upstream)
            .await
    }

    async fn list_targets(&self, upstream: &str) -> Result<Vec<Target>> {
        self.list_all(ObjectKind::Upstream, upstream, &["upstreams", upstream, "targets"])
            .await
    }

    async fn create_target(&self, upstream: &str, target: &Target) -> Result<Target> {
        self.write(
            Method::POST,
            ObjectKind::Target,
            &target.target,
            &["upstreams", upstream, "targets"],
            target,
        )
        .await
    }

    async fn delete_target(&self, upstream: &str, target: &str) -> Result<()> {
        let url = self.url(&["upstreams", upstream, "targets", target]);
        debug!(upstream, target, "admin delete target");
        let resp = self.http.delete(url).send().await?;
        match resp.status() {
            s if s.is_success() || s == StatusCode::NOT_FOUND => Ok(()),
            s => Err(GatewayError::Status {
                kind: ObjectKind::Target,
                name: target.to_string(),
                status: s.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn get_service(&self, name: &str) -> Result<Service> {
        self.get(ObjectKind::Service, name, &["services", name]).await
    }

    async fn create_service(&self, service: &Service) -> Result<Service> {
        self.write(Method::POST, ObjectKind::Service, &service.name, &["services"], service)
            .await
    }

    async fn update_service(&self, service: &Service) -> Result<Service> {
        let id = service.id.as_deref().ok_or_else(|| GatewayError::MissingId {
            kind: ObjectKind::Service,
            name: service.name.clone(),
        })?;
        self.write(Method::PATCH, ObjectKind::Service, &service.name, &["services", id], service)
            .await
    }

    async fn get_route(&self, name: &str) -> Result<Route> {
        self.get(ObjectKind::Route, name, &["routes", name]).await
    }

    async fn create_route(&self, route: &Route) -> Result<Route> {
        self.write(Method::POST, ObjectKind::Route, &route.name, &["routes"], route)
            .await
    }

    async fn list_plugins_for_service(&self, service: &str) -> Result<Vec<Plugin>> {
        self.list_all(ObjectKind::Service, service, &["services", service, "plugins"])
            .await
    }

    async fn create_plugin_for_service(&self, service: &str, plugin: &Plugin) -> Result<Plugin> {
        self.write(
            Method::POST,
            ObjectKind::Plugin,
            &plugin.name,
            &["services", service, "plugins"],
            plugin,
        )
        .await
    }

    async fn update_plugin_for_service(&self, service: &str, plugin: &Plugin) -> Result<Plugin> {
        let id = plugin.id.as_deref().ok_or_else(|| GatewayError::MissingId {
            kind: ObjectKind::Plugin,
            name: plugin.name.clone(),
        })?;
        self.write(
            Method::PATCH,
            ObjectKind::Plugin,
            &plugin.name,
            &["services", service, "plugins", id],
            plugin,
        )
        .await
    }
}
