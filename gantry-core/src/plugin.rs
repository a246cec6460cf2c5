use crate::service::ForeignRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Plugin instance attached to a gateway object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Plugin type, e.g. `oidc`.
    pub name: String,

    #[serde(default)]
    pub config: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ForeignRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl Plugin {
    pub fn new(name: impl Into<String>, config: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            config,
            ..Default::default()
        }
    }

    /// String value of a config field, if present and a string.
    pub fn config_str(&self, field: &str) -> Option<&str> {
        self.config.get(field).and_then(Value::as_str)
    }
}
