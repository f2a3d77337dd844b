//! Configuration management for engine-sidecar using the prefer crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default manifest filename, resolved relative to the config file or CWD.
pub const DEFAULT_MANIFEST_FILENAME: &str = "manifest.json";

/// Default lifetime of continuation tokens (one hour).
pub const DEFAULT_CONTINUATION_TTL_SECS: u64 = 3600;

/// Default environment variable holding a comma-separated proxy list.
pub const DEFAULT_PROXY_ENV_VAR: &str = "PROXY_LIST";

/// Application settings.
///
/// Built once at startup and passed down explicitly; nothing reads
/// configuration from global state after this point.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Address the HTTP server binds to.
    pub host: String,
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Path to the engine manifest (`{identifier: {file, class}}`).
    pub manifest_path: PathBuf,
    /// Continuation cache backend (None or "memory" = in-process, "redis://..." = Redis).
    pub cache_backend: Option<String>,
    /// Lifetime of continuation tokens and their position index entries.
    pub continuation_ttl: Duration,
    /// Static proxy pool (`host:port` or `host:port:user:pass`).
    pub proxies: Vec<String>,
    /// Environment variable consulted for a proxy list before the static pool.
    pub proxy_env_var: String,
    /// Return underlying error messages to callers instead of generic ones.
    pub expose_errors: bool,
    /// Let live requests fetch through the built-in HTTP transport.
    pub outbound_fetch: bool,
    /// User agent for outbound requests ("impersonate" picks a browser agent).
    pub user_agent: Option<String>,
    /// Outbound request timeout in seconds.
    pub request_timeout: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_FILENAME),
            cache_backend: None, // In-memory by default
            continuation_ttl: Duration::from_secs(DEFAULT_CONTINUATION_TTL_SECS),
            proxies: Vec::new(),
            proxy_env_var: DEFAULT_PROXY_ENV_VAR.to_string(),
            expose_errors: false,
            outbound_fetch: false,
            user_agent: None,
            request_timeout: 10,
        }
    }
}

impl Settings {
    /// Check whether the continuation cache is shared across processes.
    pub fn has_shared_cache(&self) -> bool {
        self.cache_backend
            .as_deref()
            .is_some_and(|b| b.starts_with("redis://") || b.starts_with("rediss://"))
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Manifest path; relative paths resolve against the config file directory.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "manifest")]
    pub manifest_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_ttl_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proxies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_env_var: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose_errors: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound_fetch: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers engine-sidecar config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("engine-sidecar").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref host) = self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(ref manifest) = self.manifest_path {
            settings.manifest_path = self.resolve_path(manifest, base_dir);
        }
        if let Some(ref backend) = self.cache_backend {
            settings.cache_backend = Some(backend.clone());
        }
        if let Some(ttl) = self.continuation_ttl_secs {
            settings.continuation_ttl = Duration::from_secs(ttl);
        }
        if !self.proxies.is_empty() {
            settings.proxies = self.proxies.clone();
        }
        if let Some(ref var) = self.proxy_env_var {
            settings.proxy_env_var = var.clone();
        }
        if let Some(expose) = self.expose_errors {
            settings.expose_errors = expose;
        }
        if let Some(outbound) = self.outbound_fetch {
            settings.outbound_fetch = outbound;
        }
        if let Some(ref ua) = self.user_agent {
            settings.user_agent = Some(ua.clone());
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
}

/// Check a boolean environment flag ("1" or "true").
fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Load config from file sources only.
async fn load_file_config(options: &LoadOptions) -> Config {
    // Priority 1: Explicit --config flag
    if let Some(ref config_path) = options.config_path {
        return match Config::load_from_path(config_path).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}; using defaults", e);
                Config::default()
            }
        };
    }

    // Priority 2: Auto-discover via prefer
    Config::load().await
}

/// Apply environment overrides on top of file configuration.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Some(manifest) = std::env::var("SIDECAR_MANIFEST")
        .ok()
        .filter(|s| !s.is_empty())
    {
        tracing::debug!("Using SIDECAR_MANIFEST from environment: {}", manifest);
        settings.manifest_path = PathBuf::from(manifest);
    }

    // CACHE_BACKEND environment variable takes precedence over config
    if let Some(backend) = std::env::var("CACHE_BACKEND")
        .ok()
        .filter(|s| !s.is_empty())
    {
        tracing::debug!("Using CACHE_BACKEND from environment: {}", backend);
        settings.cache_backend = Some(backend);
    }

    if let Some(expose) = env_flag("SIDECAR_EXPOSE_ERRORS") {
        settings.expose_errors = expose;
    }

    if let Some(outbound) = env_flag("SIDECAR_OUTBOUND") {
        settings.outbound_fetch = outbound;
    }
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = load_file_config(&options).await;

    let mut settings = Settings::default();

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = if options.use_cwd {
        cwd
    } else {
        config.base_dir().unwrap_or(cwd)
    };

    config.apply_to_settings(&mut settings, &base_dir);
    apply_env_overrides(&mut settings);

    (settings, config)
}
