//! Liveness report.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::continuation::BackendStats;
use crate::dispatcher::Dispatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: String,
    pub checks: BTreeMap<&'static str, String>,
    pub engine_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_memory: Option<BackendStats>,
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}

fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KIB * KIB {
        format!("{:.1} MiB", b / (KIB * KIB))
    } else if b >= KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{} B", bytes)
    }
}

/// Check each subsystem and roll the results up into one status.
pub async fn check(dispatcher: &Dispatcher) -> HealthReport {
    let mut checks = BTreeMap::new();
    let mut status = HealthStatus::Ok;

    let cache = dispatcher.store().health().await;
    let cache_check = match (cache.shared, cache.reachable) {
        (true, true) => "ok",
        (false, true) => "local",
        (_, false) => {
            status = status.max(HealthStatus::Degraded);
            "unavailable"
        }
    };
    checks.insert("cache", cache_check.to_string());

    let catalog_check = if dispatcher.catalog().is_empty() {
        status = HealthStatus::Error;
        "missing"
    } else {
        "ok"
    };
    checks.insert("routine_catalog", catalog_check.to_string());

    let registry = dispatcher.registry();
    let engine_count = registry.len();
    let manifest_check = if !registry.exists() {
        status = HealthStatus::Error;
        "missing"
    } else if engine_count == 0 {
        status = HealthStatus::Error;
        "invalid"
    } else {
        "ok"
    };
    checks.insert("manifest", manifest_check.to_string());

    let memory = cache
        .stats
        .as_ref()
        .and_then(|s| s.used_bytes)
        .map(format_bytes)
        .unwrap_or_else(|| "unknown".to_string());
    checks.insert("memory", memory);

    HealthReport {
        status,
        timestamp: chrono::Utc::now().to_rfc3339(),
        checks,
        engine_count,
        cache_memory: cache.stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuation::ContinuationStore;
    use crate::manifest::{EngineDescriptor, ManifestRegistry};
    use crate::routines::RoutineCatalog;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }

    #[tokio::test]
    async fn test_healthy_in_memory() {
        let dispatcher = Dispatcher::new(
            ManifestRegistry::from_descriptors(vec![EngineDescriptor::new(
                "mojeek",
                "routines/mojeek",
                "mojeek",
            )]),
            RoutineCatalog::builtin(),
            ContinuationStore::in_memory(),
        );
        let report = check(&dispatcher).await;

        assert!(report.is_ok());
        assert_eq!(report.checks["cache"], "local");
        assert_eq!(report.checks["manifest"], "ok");
        assert_eq!(report.engine_count, 1);
        assert_eq!(report.checks["memory"], "0 B");
    }

    #[tokio::test]
    async fn test_missing_manifest_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(
            ManifestRegistry::from_path(dir.path().join("manifest.json")),
            RoutineCatalog::new(),
            ContinuationStore::in_memory(),
        );
        let report = check(&dispatcher).await;

        assert_eq!(report.status, HealthStatus::Error);
        assert_eq!(report.checks["manifest"], "missing");
        assert_eq!(report.checks["routine_catalog"], "missing");
        assert_eq!(report.engine_count, 0);
    }
}
