//! Network boundary between routines and the outside world.
//!
//! Routines never open connections themselves; they ask the [`NetworkShim`]
//! they were constructed with. Which behavior they get depends on why the
//! routine was instantiated:
//!
//! - `Discovery`: filter listing and introspection. Fetches return empty
//!   content without touching the network.
//! - `Injected`: replay of a captured page. Every fetch returns that page.
//! - `Live`: production calls. The fetch is delegated to a [`Transport`]
//!   supplied by the enclosing environment; with none supplied the call
//!   fails instead of going out on its own.

mod transport;
pub mod user_agent;

pub use transport::HttpTransport;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::proxy::{ProxyError, ProxyIdentity};

/// Errors from the network boundary.
#[derive(Debug, thiserror::Error)]
pub enum ShimError {
    #[error("No outbound transport available for {0}")]
    Disabled(String),
    #[error("Fetch failed: {0}")]
    Fetch(String),
    #[error("Upstream returned HTTP {0}")]
    Status(u16),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

/// Fetch capability provided by the enclosing environment.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` through `proxy` and return the body.
    async fn fetch(&self, proxy: &ProxyIdentity, url: &str) -> Result<String, ShimError>;
}

/// Per-call network behavior handed to a routine.
#[derive(Clone)]
pub enum NetworkShim {
    Discovery,
    Injected(String),
    Live(Option<Arc<dyn Transport>>),
}

impl NetworkShim {
    /// Shim for a live call with no transport: every fetch is refused.
    pub fn offline() -> Self {
        Self::Live(None)
    }

    pub fn live(transport: Arc<dyn Transport>) -> Self {
        Self::Live(Some(transport))
    }

    /// Fetch `url` according to the shim's mode.
    pub async fn get(&self, proxy: &ProxyIdentity, url: &str) -> Result<String, ShimError> {
        match self {
            Self::Discovery => {
                debug!("Discovery fetch of {} suppressed", url);
                Ok(String::new())
            }
            Self::Injected(content) => Ok(content.clone()),
            Self::Live(Some(transport)) => transport.fetch(proxy, url).await,
            Self::Live(None) => Err(ShimError::Disabled(url.to_string())),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Injected(_) => "injected",
            Self::Live(_) => "live",
        }
    }
}

impl fmt::Debug for NetworkShim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovery => f.write_str("Discovery"),
            Self::Injected(content) => f
                .debug_tuple("Injected")
                .field(&format_args!("{} bytes", content.len()))
                .finish(),
            Self::Live(transport) => f
                .debug_tuple("Live")
                .field(&transport.is_some())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport that counts calls instead of fetching.
    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn fetch(&self, proxy: &ProxyIdentity, url: &str) -> Result<String, ShimError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{} via {}", url, proxy))
        }
    }

    #[tokio::test]
    async fn test_discovery_returns_empty() {
        let body = NetworkShim::Discovery
            .get(&ProxyIdentity::Direct, "https://example.com")
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_injected_ignores_url() {
        let shim = NetworkShim::Injected("<html>captured</html>".to_string());
        for url in ["https://a.example", "https://b.example/next"] {
            assert_eq!(
                shim.get(&ProxyIdentity::Direct, url).await.unwrap(),
                "<html>captured</html>"
            );
        }
    }

    #[tokio::test]
    async fn test_live_without_transport_refuses() {
        let err = NetworkShim::offline()
            .get(&ProxyIdentity::Direct, "https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ShimError::Disabled(_)));
    }

    #[tokio::test]
    async fn test_live_delegates_to_transport() {
        let transport = Arc::new(CountingTransport::default());
        let shim = NetworkShim::live(transport.clone());
        let proxy = ProxyIdentity::parse("h:1").unwrap();

        let body = shim.get(&proxy, "https://example.com").await.unwrap();
        assert_eq!(body, "https://example.com via h:1");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
