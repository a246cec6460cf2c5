use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("unsupported runtime endpoint {0:?}: expected http://, https:// or tcp://")]
    UnsupportedEndpoint(String),

    #[error("container runtime request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("container runtime returned {status} for {path}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("container runtime response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no gateway container found with label {label:?}")]
    NoGatewayContainer { label: String },

    #[error("{count} gateway containers found with label {label:?}, expected exactly one")]
    MultipleGatewayContainers { label: String, count: usize },

    #[error("gateway container {container} is not attached to network {network:?}")]
    GatewayNotInNetwork { container: String, network: String },
}
