use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level watcher configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GantryConfig {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Scan loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// Container runtime (Docker Engine API) connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_runtime_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Gateway admin API connection.
///
/// When `admin_url` is unset the gateway is located on the container host:
/// exactly one container must carry `locator_label`, and it must be attached
/// to `network`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub admin_url: Option<String>,
    #[serde(default = "default_locator_label")]
    pub locator_label: String,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Container label keys. The keys are a deployment contract, not code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    /// Runtime-side filter selecting candidate containers (`key` or `key=value`).
    #[serde(default = "default_service_filter")]
    pub service_filter: String,
    #[serde(default = "default_gateway_path_label")]
    pub gateway_path: String,
    #[serde(default = "default_port_label")]
    pub port: String,
    #[serde(default = "default_use_auth_label")]
    pub use_auth: String,
}

/// Authentication plugin attached to services that require it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_plugin_name")]
    pub plugin_name: String,
    #[serde(default)]
    pub discovery_url: String,
    #[serde(default)]
    pub client_id: String,
}

// ── Defaults ──────────────────────────────────────────────────

fn default_interval_secs() -> u64 { 60 }
fn default_runtime_endpoint() -> String { "http://localhost:2375".into() }
fn default_timeout_ms() -> u64 { 10_000 }
fn default_locator_label() -> String { "gantry.gateway".into() }
fn default_network() -> String { "gantry".into() }
fn default_admin_port() -> u16 { 8001 }
fn default_service_filter() -> String { "gantry.service=true".into() }
fn default_gateway_path_label() -> String { "gantry.service.gateway-path".into() }
fn default_port_label() -> String { "gantry.service.port".into() }
fn default_use_auth_label() -> String { "gantry.service.use-auth".into() }
fn default_plugin_name() -> String { "oidc".into() }

// ── Impls ─────────────────────────────────────────────────────

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_runtime_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            admin_url: None,
            locator_label: default_locator_label(),
            network: default_network(),
            admin_port: default_admin_port(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            service_filter: default_service_filter(),
            gateway_path: default_gateway_path_label(),
            port: default_port_label(),
            use_auth: default_use_auth_label(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            plugin_name: default_plugin_name(),
            discovery_url: String::new(),
            client_id: String::new(),
        }
    }
}

impl ScanConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl RuntimeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl GantryConfig {
    /// Layered sources: defaults, then the YAML file (skipped when missing),
    /// then `GANTRY_`-prefixed variables (`__` nests), then the plain
    /// `OIDC_DISCOVERY_URL` / `OIDC_CLIENT_ID` variables.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(GantryConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("GANTRY_").split("__"))
            .merge(
                Env::raw()
                    .only(&["OIDC_DISCOVERY_URL", "OIDC_CLIENT_ID"])
                    .map(|key| {
                        if key.as_str().eq_ignore_ascii_case("OIDC_DISCOVERY_URL") {
                            "auth.discovery_url".into()
                        } else {
                            "auth.client_id".into()
                        }
                    }),
            )
    }

    /// Load configuration from YAML file + env overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config: GantryConfig = Self::figment(path).extract()?;
        tracing::debug!(path = %path.display(), "configuration extracted");
        Ok(config)
    }

    /// Reject settings the watcher cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "scan.interval_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.labels.service_filter.trim().is_empty() {
            return Err(ConfigError::Missing("labels.service_filter"));
        }
        if self.labels.gateway_path.trim().is_empty() {
            return Err(ConfigError::Missing("labels.gateway_path"));
        }
        if self.auth.plugin_name.trim().is_empty() {
            return Err(ConfigError::Missing("auth.plugin_name"));
        }
        if self.auth.discovery_url.trim().is_empty() {
            return Err(ConfigError::Missing("auth.discovery_url"));
        }
        if self.auth.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("auth.client_id"));
        }
        if let Some(url) = &self.gateway.admin_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid {
                field: "gateway.admin_url",
                reason: format!("{url:?} is not an http(s) URL"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::io::Write;

    fn valid() -> GantryConfig {
        let mut cfg = GantryConfig::default();
        cfg.auth.discovery_url = "https://idp.example/.well-known/openid-configuration".into();
        cfg.auth.client_id = "gateway".into();
        cfg
    }

    // ── Default values ────────────────────────────────────────────

    #[test]
    fn defaults_have_expected_values() {
        let cfg = GantryConfig::default();
        assert_eq!(cfg.scan.interval(), Duration::from_secs(60));
        assert_eq!(cfg.runtime.endpoint, "http://localhost:2375");
        assert_eq!(cfg.runtime.timeout(), Duration::from_secs(10));
        assert!(cfg.gateway.admin_url.is_none());
        assert_eq!(cfg.gateway.locator_label, "gantry.gateway");
        assert_eq!(cfg.gateway.network, "gantry");
        assert_eq!(cfg.gateway.admin_port, 8001);
        assert_eq!(cfg.labels.service_filter, "gantry.service=true");
        assert_eq!(cfg.labels.gateway_path, "gantry.service.gateway-path");
        assert_eq!(cfg.labels.port, "gantry.service.port");
        assert_eq!(cfg.labels.use_auth, "gantry.service.use-auth");
        assert_eq!(cfg.auth.plugin_name, "oidc");
    }

    // ── validate() ────────────────────────────────────────────────

    #[test]
    fn defaults_fail_validation_without_auth_settings() {
        let err = GantryConfig::default().validate().unwrap_err();
        assert_eq!(err, ConfigError::Missing("auth.discovery_url"));
    }

    #[test]
    fn complete_config_validates() {
        assert_eq!(valid().validate(), Ok(()));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut cfg = valid();
        cfg.scan.interval_secs = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "scan.interval_secs", .. })
        ));
    }

    #[test]
    fn missing_client_id_is_rejected() {
        let mut cfg = valid();
        cfg.auth.client_id = "  ".into();
        assert_eq!(cfg.validate(), Err(ConfigError::Missing("auth.client_id")));
    }

    #[test]
    fn non_http_admin_url_is_rejected() {
        let mut cfg = valid();
        cfg.gateway.admin_url = Some("htp://10.0.0.2:8001".into());
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "gateway.admin_url", .. })
        ));
        cfg.gateway.admin_url = Some("http://10.0.0.2:8001".into());
        assert_eq!(cfg.validate(), Ok(()));
    }

    // ── load() ────────────────────────────────────────────────────

    #[test]
    fn load_from_valid_yaml_overrides_defaults() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmpfile,
            "scan:\n  interval_secs: 15\ngateway:\n  admin_url: \"http://kong:8001\"\n"
        )
        .unwrap();
        let cfg = GantryConfig::load(tmpfile.path()).unwrap();
        assert_eq!(cfg.scan.interval_secs, 15);
        assert_eq!(cfg.gateway.admin_url.as_deref(), Some("http://kong:8001"));
        // Defaults still apply for unspecified fields
        assert_eq!(cfg.gateway.admin_port, 8001);
        assert_eq!(cfg.labels.port, "gantry.service.port");
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let cfg = GantryConfig::load(Path::new("does-not-exist.yaml"))
                .map_err(|e| e.to_string())?;
            assert_eq!(cfg.scan.interval_secs, 60);
            Ok(())
        });
    }

    #[test]
    fn prefixed_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("gantry.yaml", "scan:\n  interval_secs: 15\n")?;
            jail.set_env("GANTRY_SCAN__INTERVAL_SECS", "30");
            jail.set_env("GANTRY_LABELS__GATEWAY_PATH", "acme.path");
            let cfg = GantryConfig::load(Path::new("gantry.yaml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.scan.interval_secs, 30);
            assert_eq!(cfg.labels.gateway_path, "acme.path");
            Ok(())
        });
    }

    #[test]
    fn oidc_variables_fill_auth_section() {
        Jail::expect_with(|jail| {
            jail.set_env("OIDC_DISCOVERY_URL", "https://idp/.well-known/openid-configuration");
            jail.set_env("OIDC_CLIENT_ID", "gateway");
            let cfg = GantryConfig::load(Path::new("none.yaml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.auth.discovery_url, "https://idp/.well-known/openid-configuration");
            assert_eq!(cfg.auth.client_id, "gateway");
            assert_eq!(cfg.auth.plugin_name, "oidc");
            Ok(())
        });
    }
}
