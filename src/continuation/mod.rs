//! Continuation store: keeps "next page" state alive between requests.
//!
//! Every store call mints a fresh token mapping to `{resource_locator,
//! proxy_identity, cookie_jar}`. When the caller knows which engine, query
//! and offset it is serving, a second entry keyed by a hash of
//! `(engine, query, next_offset)` points at that token so a later request
//! that only carries an offset can find it again.

mod backend;
mod memory;
#[cfg(feature = "redis-backend")]
mod redis;

pub use backend::{BackendStats, ContinuationBackend, StoreError, StoreResult};
pub use memory::InMemoryBackend;
#[cfg(feature = "redis-backend")]
pub use self::redis::RedisBackend;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::DEFAULT_CONTINUATION_TTL_SECS;
use crate::proxy::ProxyIdentity;

const TOKEN_PREFIX: &str = "npt:";
const POSITION_PREFIX: &str = "pos:";

/// Case-insensitive markers of an anti-automation page.
const BLOCK_MARKERS: &[&str] = &["captcha", "unusual traffic", "429 too many requests"];

/// Check fetched content for signs of a bot wall.
pub fn looks_blocked(content: &str) -> bool {
    let lowered = content.to_lowercase();
    BLOCK_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Whether `token` has the shape of a token this store issues.
pub fn is_valid_token(token: &str) -> bool {
    token.len() == 32
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

fn new_token() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Stored value behind a token. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationRecord {
    pub resource_locator: String,
    #[serde(default)]
    pub resource_kind: String,
    pub proxy_identity: String,
    #[serde(default)]
    pub cookie_jar: BTreeMap<String, String>,
}

/// What a routine gets back for a token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContinuationState {
    /// `None` when the token is unknown or expired.
    pub resource_locator: Option<String>,
    pub resource_kind: Option<String>,
    pub proxy: ProxyIdentity,
    pub cookie_jar: BTreeMap<String, String>,
}

impl ContinuationState {
    /// State lost: no locator, direct connection.
    pub fn lost() -> Self {
        Self::default()
    }

    pub fn is_lost(&self) -> bool {
        self.resource_locator.is_none()
    }
}

impl From<ContinuationRecord> for ContinuationState {
    fn from(record: ContinuationRecord) -> Self {
        Self {
            resource_locator: Some(record.resource_locator),
            resource_kind: (!record.resource_kind.is_empty()).then_some(record.resource_kind),
            proxy: ProxyIdentity::parse_or_direct(&record.proxy_identity),
            cookie_jar: record.cookie_jar,
        }
    }
}

/// The engine/query/offset a call is serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreContext {
    pub engine: String,
    pub query: String,
    pub offset: u64,
    pub page_size: u64,
}

impl StoreContext {
    pub fn new(engine: &str, query: &str, offset: u64, page_size: u64) -> Self {
        Self {
            engine: engine.to_string(),
            query: query.to_string(),
            offset,
            page_size,
        }
    }

    /// Offset of the page a token stored during this call leads to, or
    /// `None` when it does not fit in a `u64`.
    pub fn next_offset(&self) -> Option<u64> {
        self.offset.checked_add(self.page_size)
    }
}

/// Health of the backing cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheHealth {
    pub backend: &'static str,
    pub shared: bool,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<BackendStats>,
}

/// TTL-bounded token store with a positional index.
#[derive(Clone)]
pub struct ContinuationStore {
    primary: Arc<dyn ContinuationBackend>,
    /// Process-local fallback used when the primary rejects a write.
    ephemeral: InMemoryBackend,
    ttl: Duration,
}

impl ContinuationStore {
    pub fn new(primary: Arc<dyn ContinuationBackend>) -> Self {
        Self {
            primary,
            ephemeral: InMemoryBackend::new(),
            ttl: Duration::from_secs(DEFAULT_CONTINUATION_TTL_SECS),
        }
    }

    /// Store backed by process memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Build a store from a backend URL (`memory`, `redis://...`).
    ///
    /// Falls back to memory when the backend cannot be reached so that
    /// routines keep working with continuity limited to this process.
    pub async fn from_backend_url(url: Option<&str>) -> Self {
        match url {
            None | Some("") | Some("memory") => Self::in_memory(),
            Some(url) if url.starts_with("redis://") || url.starts_with("rediss://") => {
                Self::connect_redis(url).await
            }
            Some(other) => {
                warn!("Unknown cache backend {:?}, using in-memory", other);
                Self::in_memory()
            }
        }
    }

    #[cfg(feature = "redis-backend")]
    async fn connect_redis(url: &str) -> Self {
        match RedisBackend::new(url).await {
            Ok(backend) => {
                debug!("Using Redis continuation backend");
                Self::new(Arc::new(backend))
            }
            Err(e) => {
                warn!("{}; continuation state will not be shared", e);
                Self::in_memory()
            }
        }
    }

    #[cfg(not(feature = "redis-backend"))]
    async fn connect_redis(_url: &str) -> Self {
        warn!("Built without redis-backend feature; using in-memory continuation store");
        Self::in_memory()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn backend_name(&self) -> &'static str {
        self.primary.name()
    }

    pub fn is_shared(&self) -> bool {
        self.primary.is_shared()
    }

    /// Index key for `(engine, query, offset)`.
    pub fn position_key(engine: &str, query: &str, offset: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(engine.as_bytes());
        hasher.update([0x1f]);
        hasher.update(query.as_bytes());
        hasher.update([0x1f]);
        hasher.update(offset.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Mint a token for `resource_locator` and return it.
    ///
    /// With a context, also points the index entry for the next offset at
    /// the new token. Never fails: if the primary backend rejects the write
    /// the state is kept in process memory instead.
    pub async fn put(
        &self,
        resource_locator: &str,
        resource_kind: &str,
        proxy: &ProxyIdentity,
        context: Option<&StoreContext>,
    ) -> String {
        let token = new_token();
        let record = ContinuationRecord {
            resource_locator: resource_locator.to_string(),
            resource_kind: resource_kind.to_string(),
            proxy_identity: proxy.to_string(),
            cookie_jar: BTreeMap::new(),
        };

        let value = match serde_json::to_string(&record) {
            Ok(v) => v,
            Err(e) => {
                warn!("Could not encode continuation record: {}", e);
                return token;
            }
        };

        self.write(&format!("{}{}", TOKEN_PREFIX, token), value).await;

        if let Some(ctx) = context {
            match ctx.next_offset() {
                Some(next) => {
                    let key = Self::position_key(&ctx.engine, &ctx.query, next);
                    debug!(engine = %ctx.engine, offset = next, "Indexing continuation token");
                    self.write(&format!("{}{}", POSITION_PREFIX, key), token.clone())
                        .await;
                }
                None => warn!(
                    engine = %ctx.engine,
                    offset = ctx.offset,
                    "Offset out of range, continuation token not indexed"
                ),
            }
        }

        token
    }

    /// Look up a token. Unknown, expired or malformed tokens give
    /// [`ContinuationState::lost`].
    pub async fn get(&self, token: &str) -> ContinuationState {
        if !is_valid_token(token) {
            return ContinuationState::lost();
        }

        let Some(raw) = self.read(&format!("{}{}", TOKEN_PREFIX, token)).await else {
            return ContinuationState::lost();
        };

        match serde_json::from_str::<ContinuationRecord>(&raw) {
            Ok(record) => record.into(),
            Err(e) => {
                warn!("Discarding unreadable continuation record: {}", e);
                ContinuationState::lost()
            }
        }
    }

    /// Find the token a previous call produced for this position.
    pub async fn resolve_by_position(&self, engine: &str, query: &str, offset: u64) -> Option<String> {
        let key = Self::position_key(engine, query, offset);
        self.read(&format!("{}{}", POSITION_PREFIX, key))
            .await
            .filter(|t| is_valid_token(t))
    }

    /// Probe the primary backend.
    pub async fn health(&self) -> CacheHealth {
        let (reachable, error) = match self.primary.ping().await {
            Ok(()) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        };
        let stats = if reachable {
            self.primary.stats().await.ok()
        } else {
            None
        };

        CacheHealth {
            backend: self.primary.name(),
            shared: self.primary.is_shared(),
            reachable,
            error,
            stats,
        }
    }

    async fn write(&self, key: &str, value: String) {
        if let Err(e) = self.primary.put(key, value.clone(), self.ttl).await {
            warn!(
                backend = self.primary.name(),
                "Continuation write failed, keeping it in process: {}", e
            );
            // In-memory writes cannot fail
            let _ = self.ephemeral.put(key, value, self.ttl).await;
        }
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.primary.get(key).await {
            Ok(Some(v)) => return Some(v),
            Ok(None) => {}
            Err(e) => warn!(backend = self.primary.name(), "Continuation read failed: {}", e),
        }
        self.ephemeral.get(key).await.ok().flatten()
    }
}
