use gantry_core::config::LabelConfig;
use gantry_core::plugin::Plugin;
use gantry_core::route::Route;
use gantry_core::service::{ForeignRef, Service};
use gantry_core::spec::{GatewayKey, SpecBuilder};
use gantry_core::upstream::{Target, Upstream};
use std::collections::HashMap;

// =============================================================================
// Admin payload decoding
// =============================================================================

#[test]
fn test_target_page_entry_decodes() {
    let json = r#"{
        "id": "0f1c",
        "target": "c0ffee:8080",
        "weight": 100,
        "upstream": {"id": "u1"},
        "created_at": 1700000000.123,
        "tags": null
    }"#;
    let target: Target = serde_json::from_str(json).unwrap();
    assert_eq!(target.id.as_deref(), Some("0f1c"));
    assert_eq!(target.target, "c0ffee:8080");
    assert_eq!(target.weight, Some(100));
    assert_eq!(target.host(), "c0ffee");
}

#[test]
fn test_route_decodes_service_reference() {
    let json = r#"{
        "id": "r1",
        "name": "_orders",
        "paths": ["/orders"],
        "service": {"id": "s1"},
        "request_buffering": false,
        "response_buffering": false,
        "strip_path": true
    }"#;
    let route: Route = serde_json::from_str(json).unwrap();
    assert_eq!(route.paths(), ["/orders".to_string()]);
    assert_eq!(route.service, Some(ForeignRef::new("s1")));
    assert_eq!(route.request_buffering, Some(false));
}

#[test]
fn test_plugin_roundtrip_keeps_config() {
    let mut config = serde_json::Map::new();
    config.insert("discoveryUri".into(), "https://idp/.well-known".into());
    config.insert("clientID".into(), "gateway".into());
    let plugin = Plugin::new("oidc", config);

    let json = serde_json::to_string(&plugin).unwrap();
    let decoded: Plugin = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded.name, "oidc");
    assert_eq!(decoded.config_str("clientID"), Some("gateway"));
    assert!(decoded.id.is_none());
}

#[test]
fn test_new_objects_omit_server_assigned_fields() {
    let upstream = serde_json::to_value(Upstream::named("_orders")).unwrap();
    assert!(upstream.get("id").is_none());

    let service = serde_json::to_value(Service::bound_to("_orders", "_orders")).unwrap();
    assert!(service.get("id").is_none());
    assert!(service.get("port").is_none());

    let target = serde_json::to_value(Target::new("c1:8080")).unwrap();
    assert_eq!(target, serde_json::json!({"target": "c1:8080"}));
}

// =============================================================================
// ServiceSpec derivation
// =============================================================================

#[test]
fn test_orders_container_yields_expected_spec() {
    let labels = HashMap::from([
        ("gantry.service".to_string(), "true".to_string()),
        ("gantry.service.gateway-path".to_string(), "/orders".to_string()),
    ]);
    let spec = SpecBuilder::new(LabelConfig::default())
        .build("10.0.0.5", &labels)
        .unwrap();
    assert_eq!(spec.instance_address, "10.0.0.5:8080");
    assert_eq!(spec.gateway_key(), GatewayKey::from_path("/orders"));
    assert_eq!(spec.gateway_key().as_str(), "_orders");
    assert!(spec.require_authentication);
}

#[test]
fn test_replicas_share_a_gateway_key() {
    let builder = SpecBuilder::new(LabelConfig::default());
    let labels = HashMap::from([(
        "gantry.service.gateway-path".to_string(),
        "/orders".to_string(),
    )]);
    let a = builder.build("a", &labels).unwrap();
    let b = builder.build("b", &labels).unwrap();
    assert_eq!(a.gateway_key(), b.gateway_key());
    assert_ne!(a.instance_address, b.instance_address);
}
