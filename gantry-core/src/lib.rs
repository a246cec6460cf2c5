pub mod config;
pub mod error;
pub mod plugin;
pub mod route;
pub mod service;
pub mod spec;
pub mod upstream;

pub use config::GantryConfig;
pub use error::{ConfigError, SpecError};
pub use plugin::Plugin;
pub use route::Route;
pub use service::Service;
pub use spec::{GatewayKey, ServiceSpec, SpecBuilder};
pub use upstream::{Target, Upstream};
