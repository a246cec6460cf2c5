pub mod admin;
pub mod error;
pub mod kong;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use admin::{GatewayAdmin, GatewayInfo, ObjectKind};
pub use error::GatewayError;
pub use kong::KongAdminClient;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryGateway;
