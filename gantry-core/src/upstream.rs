use serde::{Deserialize, Serialize};

/// Named pool of backend targets at the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Upstream {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Upstream name. Services reference it through their `host`.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Upstream {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            tags: None,
        }
    }
}

/// One `host:port` member of an upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Backend address, `host:port`.
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
}

impl Target {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            id: None,
            target: address.into(),
            weight: None,
        }
    }

    /// Host part of the address (everything before the last `:`).
    pub fn host(&self) -> &str {
        match self.target.rsplit_once(':') {
            Some((host, _)) => host,
            None => &self.target,
        }
    }

    /// Identifier used when deleting the target; falls back to the address,
    /// which the admin API also accepts.
    pub fn handle(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_host_strips_port() {
        assert_eq!(Target::new("10.0.0.5:8080").host(), "10.0.0.5");
        assert_eq!(Target::new("3f2a9c:9000").host(), "3f2a9c");
    }

    #[test]
    fn target_host_without_port_is_whole_address() {
        assert_eq!(Target::new("backend").host(), "backend");
    }

    #[test]
    fn target_handle_prefers_id() {
        let mut t = Target::new("a:80");
        assert_eq!(t.handle(), "a:80");
        t.id = Some("t-1".into());
        assert_eq!(t.handle(), "t-1");
    }

    #[test]
    fn upstream_ignores_unknown_admin_fields() {
        let json = r#"{"id":"u1","name":"_orders","algorithm":"round-robin","slots":10000,"tags":null}"#;
        let us: Upstream = serde_json::from_str(json).unwrap();
        assert_eq!(us.id.as_deref(), Some("u1"));
        assert_eq!(us.name, "_orders");
        assert!(us.tags.is_none());
    }

    #[test]
    fn new_upstream_serializes_without_id() {
        let json = serde_json::to_value(Upstream::named("_orders")).unwrap();
        assert_eq!(json, serde_json::json!({"name": "_orders"}));
    }
}
