//! Proxy routing for artifact downloads.
//!
//! [`NetworkEnvironment`] is the seam between the orchestrator, which decides
//! whether a proxy applies, and the downloader, which builds HTTP clients.

use std::env;
use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use reqwest::Proxy;
use url::Url;

use crate::error::EngineError;

/// Proxy server used for downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// Proxy host name.
    pub host: String,
    /// Proxy port.
    pub port: u16,
    /// Basic credentials presented to the proxy.
    pub credentials: Option<ProxyCredentials>,
}

/// User name and password presented to a proxy.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyCredentials {
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
}

impl std::fmt::Debug for ProxyCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Routes requests for one host through a proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    /// Host whose requests use the proxy.
    pub target_host: String,
    /// Proxy to use.
    pub proxy: ProxySettings,
}

impl ProxyRoute {
    fn proxy_url(&self) -> Result<Url, EngineError> {
        let location = format!("http://{}:{}", self.proxy.host, self.proxy.port);
        Url::parse(&location).map_err(|source| EngineError::InvalidUrl { location, source })
    }

    fn to_proxy(&self) -> Result<Proxy, EngineError> {
        let proxy_url = self.proxy_url()?;
        let target_host = self.target_host.clone();
        let proxy = Proxy::custom(move |url| {
            if url.host_str() == Some(target_host.as_str()) {
                Some(proxy_url.clone())
            } else {
                environment_proxy(url)
            }
        });
        Ok(match &self.proxy.credentials {
            Some(credentials) => proxy.basic_auth(&credentials.user, &credentials.password),
            None => proxy,
        })
    }
}

/// Proxy advertised by the conventional environment variables for `url`.
fn environment_proxy(url: &Url) -> Option<Url> {
    let scheme_keys: &[&str] = match url.scheme() {
        "https" => &["https_proxy", "HTTPS_PROXY"],
        _ => &["http_proxy", "HTTP_PROXY"],
    };
    scheme_keys
        .iter()
        .chain(["all_proxy", "ALL_PROXY"].iter())
        .find_map(|key| env::var(key).ok())
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| Url::parse(&value).ok())
}

/// Process networking state consulted by the artifact downloader.
pub trait NetworkEnvironment: Send + Sync {
    /// Installs a proxy route; later installs replace earlier ones.
    fn install_proxy(&self, route: ProxyRoute);

    /// Builds an HTTP client honouring the installed route.
    ///
    /// # Errors
    ///
    /// Returns an error when the route or client cannot be built.
    fn http_client(&self) -> Result<Client, EngineError>;
}

static INSTALLED_ROUTE: Lazy<RwLock<Option<ProxyRoute>>> = Lazy::new(|| RwLock::new(None));

/// Network environment shared by the whole process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemNetworkEnvironment;

impl SystemNetworkEnvironment {
    /// The currently installed route, if any.
    #[must_use]
    pub fn installed_route() -> Option<ProxyRoute> {
        INSTALLED_ROUTE
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl NetworkEnvironment for SystemNetworkEnvironment {
    fn install_proxy(&self, route: ProxyRoute) {
        *INSTALLED_ROUTE
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(route);
    }

    fn http_client(&self) -> Result<Client, EngineError> {
        build_client(Self::installed_route().as_ref())
    }
}

pub(crate) fn build_client(route: Option<&ProxyRoute>) -> Result<Client, EngineError> {
    let mut builder = Client::builder();
    if let Some(active) = route {
        builder = builder.proxy(active.to_proxy()?);
    }
    builder
        .build()
        .map_err(|error| EngineError::HttpClient(std::sync::Arc::new(error)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn route(credentials: Option<ProxyCredentials>) -> ProxyRoute {
        ProxyRoute {
            target_host: "fastdl.mongodb.org".to_owned(),
            proxy: ProxySettings {
                host: "proxy.internal".to_owned(),
                port: 3128,
                credentials,
            },
        }
    }

    #[rstest]
    fn proxy_url_combines_host_and_port() {
        let url = route(None).proxy_url().expect("valid proxy url");
        assert_eq!(url.as_str(), "http://proxy.internal:3128/");
    }

    #[rstest]
    fn clients_build_with_and_without_credentials() {
        let credentials = ProxyCredentials {
            user: "builder".to_owned(),
            password: "secret".to_owned(),
        };
        assert!(build_client(Some(&route(Some(credentials)))).is_ok());
        assert!(build_client(None).is_ok());
    }

    #[rstest]
    fn credentials_are_redacted_in_debug_output() {
        let credentials = ProxyCredentials {
            user: "builder".to_owned(),
            password: "secret".to_owned(),
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("builder"));
        assert!(!rendered.contains("secret"));
    }
}
