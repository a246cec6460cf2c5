//! Tests for the admin API client against a fake admin server.
//!
//! Each test binds an axum app on an ephemeral port and records the JSON
//! bodies it receives so the requests can be asserted on.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, patch, post};
use axum::Router;
use gantry_core::{Plugin, Route, Service, Target, Upstream};
use gantry_gateway::{GatewayAdmin, GatewayError, KongAdminClient, ObjectKind};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fake admin API ───────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Recorded {
    bodies: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Recorded {
    fn push(&self, what: &str, body: Value) {
        self.bodies.lock().unwrap().push((what.to_string(), body));
    }

    fn bodies(&self) -> Vec<(String, Value)> {
        self.bodies.lock().unwrap().clone()
    }
}

async fn root() -> Json<Value> {
    Json(json!({"version": "3.6.1", "hostname": "kong-1", "plugins": {}}))
}

async fn get_upstream(Path(name): Path<String>) -> Response {
    if name == "_orders" {
        Json(json!({"id": "u1", "name": "_orders", "algorithm": "round-robin"})).into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"message": "Not found"}))).into_response()
    }
}

async fn create_upstream(State(rec): State<Recorded>, Json(body): Json<Value>) -> Response {
    rec.push("create_upstream", body.clone());
    let mut created = body;
    created["id"] = json!("u-new");
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn list_targets(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    match q.get("offset").map(String::as_str) {
        None => Json(json!({
            "data": [{"id": "t1", "target": "a:8080", "weight": 100}],
            "next": "/upstreams/_orders/targets?offset=page2"
        })),
        Some(_) => Json(json!({
            "data": [{"id": "t2", "target": "b:8080", "weight": 100}],
            "next": null
        })),
    }
}

async fn create_target(State(rec): State<Recorded>, Path(_up): Path<String>, Json(body): Json<Value>) -> Response {
    rec.push("create_target", body.clone());
    let mut created = body;
    created["id"] = json!("t-new");
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn delete_target(Path((_up, target)): Path<(String, String)>) -> StatusCode {
    if target == "gone" {
        StatusCode::NOT_FOUND
    } else if target == "locked" {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn patch_service(State(rec): State<Recorded>, Path(id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    rec.push("patch_service", body.clone());
    let mut updated = body;
    updated["id"] = json!(id);
    Json(updated)
}

async fn create_route(State(rec): State<Recorded>, Json(body): Json<Value>) -> Response {
    rec.push("create_route", body.clone());
    if body["name"] == "_taken" {
        return (
            StatusCode::CONFLICT,
            Json(json!({"message": "UNIQUE violation detected on '{name=\"_taken\"}'"})),
        )
            .into_response();
    }
    let mut created = body;
    created["id"] = json!("r-new");
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn list_plugins(Path(_svc): Path<String>) -> Json<Value> {
    Json(json!({
        "data": [{"id": "p1", "name": "oidc", "config": {"clientID": "old"}, "service": {"id": "s1"}}],
        "next": null
    }))
}

async fn patch_plugin(
    State(rec): State<Recorded>,
    Path((_svc, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    rec.push("patch_plugin", body.clone());
    let mut updated = body;
    updated["id"] = json!(id);
    Json(updated)
}

async fn broken() -> Response {
    (StatusCode::BAD_GATEWAY, "upstream admin unavailable").into_response()
}

async fn spawn_fake() -> (KongAdminClient, Recorded) {
    spawn_fake_at("").await
}

/// Serves the fake admin API under `prefix`, the way a reverse proxy
/// mounting the admin API on a sub-path would.
async fn spawn_fake_at(prefix: &str) -> (KongAdminClient, Recorded) {
    let rec = Recorded::default();
    let api = Router::new()
        .route("/", get(root))
        .route("/upstreams", post(create_upstream))
        .route("/upstreams/{name}", get(get_upstream))
        .route("/upstreams/{name}/targets", get(list_targets).post(create_target))
        .route("/upstreams/{name}/targets/{target}", delete(delete_target))
        .route("/services/{id}", patch(patch_service).get(broken))
        .route("/routes", post(create_route))
        .route("/services/{id}/plugins", get(list_plugins))
        .route("/services/{id}/plugins/{plugin}", patch(patch_plugin))
        .with_state(rec.clone());
    let app = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(prefix, api)
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = KongAdminClient::new(&format!("http://{addr}{prefix}/"), Duration::from_secs(5)).unwrap();
    (client, rec)
}

// ── Reads ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn info_reports_gateway_version() {
    let (client, _) = spawn_fake().await;
    let info = client.info().await.unwrap();
    assert_eq!(info.version, "3.6.1");
    assert_eq!(info.hostname.as_deref(), Some("kong-1"));
}

#[tokio::test]
async fn get_upstream_found_and_not_found() {
    let (client, _) = spawn_fake().await;
    let upstream = client.get_upstream("_orders").await.unwrap();
    assert_eq!(upstream.id.as_deref(), Some("u1"));

    let err = client.get_upstream("_missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, GatewayError::NotFound { kind: ObjectKind::Upstream, ref name } if name == "_missing"));
}

#[tokio::test]
async fn list_targets_follows_next_links() {
    let (client, _) = spawn_fake().await;
    let targets = client.list_targets("_orders").await.unwrap();
    let addrs: Vec<&str> = targets.iter().map(|t| t.target.as_str()).collect();
    assert_eq!(addrs, vec!["a:8080", "b:8080"]);
}

#[tokio::test]
async fn list_targets_follows_next_links_under_base_path_prefix() {
    let (client, _) = spawn_fake_at("/admin").await;
    assert_eq!(client.base_url().path(), "/admin/");
    let targets = client.list_targets("_orders").await.unwrap();
    let addrs: Vec<&str> = targets.iter().map(|t| t.target.as_str()).collect();
    assert_eq!(addrs, vec!["a:8080", "b:8080"]);
}

#[tokio::test]
async fn unexpected_status_is_reported_with_body() {
    let (client, _) = spawn_fake().await;
    let err = client.get_service("s1").await.unwrap_err();
    match err {
        GatewayError::Status { status, body, .. } => {
            assert_eq!(status, 502);
            assert_eq!(body, "upstream admin unavailable");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

// ── Writes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_upstream_posts_name_only() {
    let (client, rec) = spawn_fake().await;
    let created = client.create_upstream(&Upstream::named("_billing")).await.unwrap();
    assert_eq!(created.id.as_deref(), Some("u-new"));
    assert_eq!(
        rec.bodies(),
        vec![("create_upstream".to_string(), json!({"name": "_billing"}))]
    );
}

#[tokio::test]
async fn create_target_posts_address() {
    let (client, rec) = spawn_fake().await;
    let created = client
        .create_target("_orders", &Target::new("c0ffee:8080"))
        .await
        .unwrap();
    assert_eq!(created.target, "c0ffee:8080");
    assert_eq!(rec.bodies()[0].1, json!({"target": "c0ffee:8080"}));
}

#[tokio::test]
async fn delete_target_tolerates_already_deleted() {
    let (client, _) = spawn_fake().await;
    client.delete_target("_orders", "t1").await.unwrap();
    client.delete_target("_orders", "gone").await.unwrap();
    let err = client.delete_target("_orders", "locked").await.unwrap_err();
    assert!(matches!(err, GatewayError::Status { status: 500, .. }));
}

#[tokio::test]
async fn update_service_patches_by_id() {
    let (client, rec) = spawn_fake().await;
    let service = Service {
        id: Some("s1".into()),
        ..Service::bound_to("_orders", "_orders")
    };
    let updated = client.update_service(&service).await.unwrap();
    assert_eq!(updated.id.as_deref(), Some("s1"));
    assert_eq!(rec.bodies()[0].1["host"], "_orders");
}

#[tokio::test]
async fn update_service_without_id_is_rejected_locally() {
    let (client, rec) = spawn_fake().await;
    let err = client
        .update_service(&Service::bound_to("_orders", "_orders"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::MissingId { kind: ObjectKind::Service, .. }));
    assert!(rec.bodies().is_empty());
}

#[tokio::test]
async fn create_route_sends_streaming_route() {
    let (client, rec) = spawn_fake().await;
    client
        .create_route(&Route::streaming("_orders", "/orders", "s1"))
        .await
        .unwrap();
    let (_, body) = &rec.bodies()[0];
    assert_eq!(body["paths"], json!(["/orders"]));
    assert_eq!(body["service"], json!({"id": "s1"}));
    assert_eq!(body["request_buffering"], json!(false));
    assert_eq!(body["response_buffering"], json!(false));
}

#[tokio::test]
async fn conflict_maps_to_already_exists() {
    let (client, _) = spawn_fake().await;
    let err = client
        .create_route(&Route::streaming("_taken", "/taken", "s1"))
        .await
        .unwrap_err();
    assert!(err.is_already_exists());
}

#[tokio::test]
async fn plugins_list_and_update() {
    let (client, rec) = spawn_fake().await;
    let mut plugins = client.list_plugins_for_service("s1").await.unwrap();
    assert_eq!(plugins.len(), 1);

    let mut plugin: Plugin = plugins.remove(0);
    plugin.config.insert("clientID".into(), json!("gateway"));
    let updated = client.update_plugin_for_service("s1", &plugin).await.unwrap();
    assert_eq!(updated.id.as_deref(), Some("p1"));
    assert_eq!(updated.config_str("clientID"), Some("gateway"));
    assert_eq!(rec.bodies()[0].0, "patch_plugin");
}
