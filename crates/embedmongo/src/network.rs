//! Installs proxy routing for artifact downloads.

use embedmongo_engine::{ArtifactRetrievalConfig, NetworkEnvironment, ProxyRoute};
use tracing::info;

use crate::errors::ConfigurationError;

const NETWORK_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::network");

/// Routes requests for the download host through the configured proxy.
///
/// Does nothing when no proxy is configured. Other destinations keep using
/// whatever proxy the environment already selects.
///
/// # Errors
///
/// Returns [`ConfigurationError::DownloadPathWithoutHost`] when a proxy is
/// configured but the download location names no host.
pub fn configure_network(
    artifacts: &ArtifactRetrievalConfig,
    network: &dyn NetworkEnvironment,
) -> Result<(), ConfigurationError> {
    let Some(proxy) = artifacts.proxy.clone() else {
        return Ok(());
    };
    let target_host = artifacts
        .download_host()
        .ok_or_else(|| ConfigurationError::DownloadPathWithoutHost {
            location: artifacts.download_base.to_string(),
        })?
        .to_owned();
    info!(
        target: NETWORK_TARGET,
        host = %target_host,
        proxy_host = %proxy.host,
        proxy_port = proxy.port,
        authenticated = proxy.credentials.is_some(),
        "routing downloads through proxy"
    );
    network.install_proxy(ProxyRoute { target_host, proxy });
    Ok(())
}
