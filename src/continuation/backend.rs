//! Pluggable backend trait for continuation storage.
//!
//! Allows swapping between in-memory (single process) and Redis
//! (shared across processes) storage for continuation tokens.

use std::time::Duration;

use async_trait::async_trait;

/// Result type for continuation backend operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from continuation backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Usage figures reported by a backend.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct BackendStats {
    /// Live (unexpired) entries, when the backend can count them.
    pub entries: Option<u64>,
    /// Bytes used by the backend, when reported.
    pub used_bytes: Option<u64>,
}

/// Trait for continuation storage backends.
///
/// Values are opaque strings; every write carries its own TTL. Creation is
/// the only mutation, so implementations need single-key atomic set/get and
/// nothing more.
#[async_trait]
pub trait ContinuationBackend: Send + Sync {
    /// Short name for logs and health output.
    fn name(&self) -> &'static str;

    /// Whether state written here is visible to other processes.
    fn is_shared(&self) -> bool;

    /// Store `value` under `key`, expiring after `ttl`. Overwrites.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()>;

    /// Fetch a live value.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Check the backend is reachable.
    async fn ping(&self) -> StoreResult<()>;

    /// Report usage for the liveness endpoint.
    async fn stats(&self) -> StoreResult<BackendStats>;
}
