//! Desired-state record for one backend instance, and the builder that
//! derives it from a discovered container's labels.
//!
//! Labels are parsed exactly once, here. Everything downstream works on
//! [`ServiceSpec`] and never looks at raw label maps again.

use crate::config::LabelConfig;
use crate::error::SpecError;
use std::collections::HashMap;
use std::fmt;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REQUIRE_AUTHENTICATION: bool = true;

/// Stable gateway object name derived from a gateway path: every `/` is
/// replaced by `_`, so `/orders` becomes `_orders`.
///
/// The same key names the upstream, the service and the route.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GatewayKey(String);

impl GatewayKey {
    pub fn from_path(path: &str) -> Self {
        Self(path.replace('/', "_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GatewayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Desired gateway configuration for one backend instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    /// Public route path, never empty.
    pub gateway_path: String,
    pub port: u16,
    pub require_authentication: bool,
    /// `host:port` reachable from the gateway network.
    pub instance_address: String,
}

impl ServiceSpec {
    pub fn gateway_key(&self) -> GatewayKey {
        GatewayKey::from_path(&self.gateway_path)
    }
}

/// Turns a container's label map and runtime identity into a [`ServiceSpec`].
///
/// Label keys come from configuration. A label that is present but
/// malformed rejects the container instead of falling back to the default,
/// so a typo in `use-auth` can never switch authentication off.
#[derive(Debug, Clone)]
pub struct SpecBuilder {
    labels: LabelConfig,
}

impl SpecBuilder {
    pub fn new(labels: LabelConfig) -> Self {
        Self { labels }
    }

    pub fn build(
        &self,
        identity: &str,
        labels: &HashMap<String, String>,
    ) -> Result<ServiceSpec, SpecError> {
        let path = labels
            .get(&self.labels.gateway_path)
            .ok_or(SpecError::GatewayPathUnset)?
            .trim();
        if path.is_empty() {
            return Err(SpecError::GatewayPathEmpty);
        }

        let port = match labels.get(&self.labels.port) {
            Some(raw) => parse_port(raw)?,
            None => DEFAULT_PORT,
        };

        let require_authentication = match labels.get(&self.labels.use_auth) {
            Some(raw) => parse_bool(raw).ok_or_else(|| SpecError::InvalidAuthDirective {
                value: raw.clone(),
            })?,
            None => DEFAULT_REQUIRE_AUTHENTICATION,
        };

        Ok(ServiceSpec {
            gateway_path: path.to_string(),
            port,
            require_authentication,
            instance_address: format!("{identity}:{port}"),
        })
    }
}

/// Unsigned decimal only. `str::parse` on its own would take `+8081`.
fn parse_port(raw: &str) -> Result<u16, SpecError> {
    if raw.starts_with(['+', '-']) {
        return Err(SpecError::InvalidPort {
            value: raw.to_string(),
            source: None,
        });
    }
    raw.parse::<u16>().map_err(|source| SpecError::InvalidPort {
        value: raw.to_string(),
        source: Some(source),
    })
}

/// Accepts the usual spellings: `1 t T true TRUE True` and `0 f F false FALSE False`.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
