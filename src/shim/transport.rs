//! reqwest-backed fetch capability for the enclosing environment.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{ShimError, Transport};
use crate::proxy::{ProxyIdentity, ProxySelector};

/// Performs real GET requests, one client per call so each call can go out
/// through its own proxy.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    user_agent: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            timeout,
        }
    }

    fn build_client(&self, proxy: &ProxyIdentity) -> Result<Client, ShimError> {
        let builder = Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .gzip(true)
            .brotli(true)
            .cookie_store(true);

        ProxySelector::configure(builder, proxy)?
            .build()
            .map_err(|e| ShimError::Fetch(e.to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, proxy: &ProxyIdentity, url: &str) -> Result<String, ShimError> {
        let client = self.build_client(proxy)?;
        debug!("GET {} via {}", url, proxy);

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| ShimError::Fetch(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ShimError::Fetch(e.to_string()))?;

        // 429 pages still carry markers that routines inspect
        if !status.is_success() && status.as_u16() != 429 {
            return Err(ShimError::Status(status.as_u16()));
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_with_proxy() {
        let transport = HttpTransport::new("test/1.0", Duration::from_secs(5));
        assert!(transport.build_client(&ProxyIdentity::Direct).is_ok());

        let proxy = ProxyIdentity::parse("socks5h://127.0.0.1:9050").unwrap();
        assert!(transport.build_client(&proxy).is_ok());
    }
}
