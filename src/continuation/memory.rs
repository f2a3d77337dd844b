//! In-memory continuation backend for single-process operation.
//!
//! State is not shared with other processes and does not survive restarts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::backend::{BackendStats, ContinuationBackend, StoreResult};

/// Prune expired entries once the map grows past this size.
const PRUNE_THRESHOLD: usize = 100;

/// A stored value with expiration time.
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory continuation backend.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| !e.is_expired())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ContinuationBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_shared(&self) -> bool {
        false
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), CacheEntry::new(value, ttl));

        if entries.len() > PRUNE_THRESHOLD {
            entries.retain(|_, e| !e.is_expired());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.value.clone()))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn stats(&self) -> StoreResult<BackendStats> {
        let entries = self.entries.read().await;
        let (count, bytes) = entries
            .iter()
            .filter(|(_, e)| !e.is_expired())
            .fold((0u64, 0u64), |(n, b), (k, e)| {
                (n + 1, b + (k.len() + e.value.len()) as u64)
            });

        Ok(BackendStats {
            entries: Some(count),
            used_bytes: Some(bytes),
        })
    }
}
