use serde::{Deserialize, Serialize};

/// Gateway service: names the upstream that backs a logical service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    /// Upstream name (or plain hostname) the gateway forwards to.
    pub host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Service {
    /// A new service bound to `upstream`.
    pub fn bound_to(name: impl Into<String>, upstream: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: upstream.into(),
            ..Default::default()
        }
    }
}

/// Reference to another gateway object by id, as embedded in routes and plugins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignRef {
    pub id: String,
}

impl ForeignRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_admin_service_deserializes() {
        let json = r#"{"id":"s1","name":"_orders","host":"_orders","port":80,"protocol":"http","path":null}"#;
        let svc: Service = serde_json::from_str(json).unwrap();
        assert_eq!(svc.id.as_deref(), Some("s1"));
        assert_eq!(svc.host, "_orders");
        assert_eq!(svc.port, Some(80));
    }

    #[test]
    fn bound_to_sets_host_to_upstream() {
        let svc = Service::bound_to("_orders", "_orders");
        assert_eq!(svc.name, "_orders");
        assert_eq!(svc.host, "_orders");
        assert!(svc.id.is_none());
        let json = serde_json::to_value(&svc).unwrap();
        assert_eq!(json, serde_json::json!({"name": "_orders", "host": "_orders"}));
    }
}
