use crate::container::{ContainerDiscovery, LabelFilter};
use crate::error::DiscoveryError;
use tracing::info;

/// Finds the single gateway container carrying `label` and returns its admin
/// API URL on `network`.
pub async fn locate_gateway(
    discovery: &dyn ContainerDiscovery,
    label: &str,
    network: &str,
    admin_port: u16,
) -> Result<String, DiscoveryError> {
    let mut found = discovery.list(&LabelFilter::parse(label)).await?;
    let gateway = match found.len() {
        0 => {
            return Err(DiscoveryError::NoGatewayContainer {
                label: label.to_string(),
            });
        }
        1 => found.remove(0),
        count => {
            return Err(DiscoveryError::MultipleGatewayContainers {
                label: label.to_string(),
                count,
            });
        }
    };

    let Some(ip) = gateway.networks.get(network) else {
        return Err(DiscoveryError::GatewayNotInNetwork {
            container: gateway.identity().to_string(),
            network: network.to_string(),
        });
    };

    let url = format!("http://{ip}:{admin_port}");
    info!(container_id = gateway.identity(), admin_url = %url, "located gateway container");
    Ok(url)
}
