pub mod container;
pub mod docker;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod fixed;
pub mod locator;

pub use container::{ContainerDiscovery, ContainerRef, Health, LabelFilter, RuntimeInfo};
pub use docker::DockerClient;
pub use error::DiscoveryError;
#[cfg(any(test, feature = "test-util"))]
pub use fixed::StaticDiscovery;
pub use locator::locate_gateway;
