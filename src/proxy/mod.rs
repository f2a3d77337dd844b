//! Outbound network identity selection.
//!
//! A scraping call goes out either directly or through one proxy picked from
//! an environment-supplied list or the configured static pool. The selector
//! never performs I/O; it decides the identity and applies it to a
//! caller-provided `reqwest::ClientBuilder`.

use std::fmt;

use rand::seq::IndexedRandom;
use reqwest::{ClientBuilder, Proxy};
use tracing::{debug, warn};

/// Sentinel for a direct connection.
pub const DIRECT: &str = "direct";

/// Errors from proxy parsing and configuration.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid proxy format {0:?} (expected host:port or host:port:user:pass)")]
    InvalidFormat(String),
    #[error("Invalid proxy port in {0:?}")]
    InvalidPort(String),
    #[error("Proxy transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Proxy protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyScheme {
    #[default]
    Http,
    Https,
    Socks5,
    Socks5h,
}

impl ProxyScheme {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "socks5" => Some(Self::Socks5),
            "socks5h" => Some(Self::Socks5h),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Socks5 => "socks5",
            Self::Socks5h => "socks5h",
        }
    }
}

/// A single proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
    pub credentials: Option<(String, String)>,
}

impl ProxyEndpoint {
    /// URL form without credentials, suitable for `reqwest::Proxy::all`.
    pub fn proxy_url(&self) -> String {
        format!("{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

/// Outbound identity for one scraping call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProxyIdentity {
    #[default]
    Direct,
    Proxy(ProxyEndpoint),
}

impl ProxyIdentity {
    /// Parse `direct`, `host:port` or `host:port:user:pass`, each optionally
    /// prefixed with `http://`, `https://`, `socks5://` or `socks5h://`.
    pub fn parse(s: &str) -> Result<Self, ProxyError> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case(DIRECT) {
            return Ok(Self::Direct);
        }

        let (scheme, rest) = match s.split_once("://") {
            Some((scheme, rest)) => (
                ProxyScheme::parse(scheme).ok_or_else(|| ProxyError::InvalidFormat(s.to_string()))?,
                rest,
            ),
            None => (ProxyScheme::default(), s),
        };

        let parts: Vec<&str> = rest.split(':').collect();
        let (host, port, credentials) = match parts.as_slice() {
            [host, port] => (*host, *port, None),
            [host, port, user, pass] => (
                *host,
                *port,
                Some((user.to_string(), pass.to_string())),
            ),
            _ => return Err(ProxyError::InvalidFormat(s.to_string())),
        };

        if host.is_empty() {
            return Err(ProxyError::InvalidFormat(s.to_string()));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| ProxyError::InvalidPort(s.to_string()))?;

        Ok(Self::Proxy(ProxyEndpoint {
            scheme,
            host: host.to_string(),
            port,
            credentials,
        }))
    }

    /// Parse, falling back to a direct connection on malformed input.
    pub fn parse_or_direct(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|e| {
            warn!("{}; using direct connection", e);
            Self::Direct
        })
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct)
    }
}

impl fmt::Display for ProxyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str(DIRECT),
            Self::Proxy(p) => {
                if p.scheme != ProxyScheme::Http {
                    write!(f, "{}://", p.scheme.as_str())?;
                }
                write!(f, "{}:{}", p.host, p.port)?;
                if let Some((ref user, ref pass)) = p.credentials {
                    write!(f, ":{}:{}", user, pass)?;
                }
                Ok(())
            }
        }
    }
}

/// Parse pool entries, dropping blanks and logging the ones that do not parse.
fn parse_pool<'a>(entries: impl IntoIterator<Item = &'a str>, source: &str) -> Vec<ProxyIdentity> {
    entries
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|entry| match ProxyIdentity::parse(entry) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!("Skipping proxy entry from {}: {}", source, e);
                None
            }
        })
        .collect()
}

/// Chooses an outbound identity per call.
#[derive(Debug, Clone, Default)]
pub struct ProxySelector {
    env_pool: Vec<ProxyIdentity>,
    static_pool: Vec<ProxyIdentity>,
}

impl ProxySelector {
    /// Selector over a static pool only.
    pub fn new(static_pool: Vec<String>) -> Self {
        Self {
            env_pool: Vec::new(),
            static_pool: parse_pool(static_pool.iter().map(String::as_str), "config"),
        }
    }

    /// Add the comma-separated list found in environment variable `var`.
    pub fn with_env(mut self, var: &str) -> Self {
        if let Ok(raw) = std::env::var(var) {
            self.env_pool = parse_pool(raw.split(','), var);
            if !self.env_pool.is_empty() {
                debug!("Loaded {} proxies from {}", self.env_pool.len(), var);
            }
        }
        self
    }

    /// Set the environment-supplied pool directly.
    pub fn with_env_list(mut self, raw: &str) -> Self {
        self.env_pool = parse_pool(raw.split(','), "proxy list");
        self
    }

    /// Pick an identity: env pool, then static pool, then direct.
    pub fn select(&self) -> ProxyIdentity {
        let pool = if !self.env_pool.is_empty() {
            &self.env_pool
        } else {
            &self.static_pool
        };

        pool.choose(&mut rand::rng())
            .cloned()
            .unwrap_or(ProxyIdentity::Direct)
    }

    /// Apply an identity to a client builder. Direct is a no-op.
    pub fn configure(
        builder: ClientBuilder,
        identity: &ProxyIdentity,
    ) -> Result<ClientBuilder, ProxyError> {
        match identity {
            ProxyIdentity::Direct => Ok(builder),
            ProxyIdentity::Proxy(endpoint) => {
                let mut proxy = Proxy::all(endpoint.proxy_url())?;
                if let Some((ref user, ref pass)) = endpoint.credentials {
                    proxy = proxy.basic_auth(user, pass);
                }
                Ok(builder.proxy(proxy))
            }
        }
    }
}
