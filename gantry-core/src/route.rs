use crate::service::ForeignRef;
use serde::{Deserialize, Serialize};

/// Gateway route: maps public paths to a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub paths: Option<Vec<String>>,

    /// Owning service.
    #[serde(default)]
    pub service: Option<ForeignRef>,

    /// Buffer the request body before proxying. Disabled for streaming backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_buffering: Option<bool>,

    /// Buffer the response body before returning it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_buffering: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Route {
    /// Streaming route for `path` owned by `service_id`: both buffering
    /// directions are switched off.
    pub fn streaming(name: impl Into<String>, path: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            paths: Some(vec![path.into()]),
            service: Some(ForeignRef::new(service_id)),
            request_buffering: Some(false),
            response_buffering: Some(false),
            tags: None,
        }
    }

    pub fn paths(&self) -> &[String] {
        self.paths.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_route_disables_buffering() {
        let route = Route::streaming("_orders", "/orders", "svc-1");
        assert_eq!(route.paths(), ["/orders".to_string()]);
        assert_eq!(route.service, Some(ForeignRef::new("svc-1")));
        assert_eq!(route.request_buffering, Some(false));
        assert_eq!(route.response_buffering, Some(false));
    }

    #[test]
    fn null_paths_read_as_empty() {
        let json = r#"{"id":"r1","name":"_orders","paths":null,"service":null,"hosts":["a"]}"#;
        let route: Route = serde_json::from_str(json).unwrap();
        assert!(route.paths().is_empty());
        assert!(route.service.is_none());
    }
}
