//! Request dispatcher.
//!
//! Turns one inbound request into one response:
//! validate -> resolve the engine -> execute the routine -> normalize.
//! Every failure along the way becomes a response value; nothing
//! propagates to the transport layer.

mod error;
mod request;

pub use error::{DispatchError, Stage, GENERIC_FAULT_MESSAGE};
pub use request::{DispatchRequest, FilterRequest};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::continuation::{ContinuationStore, StoreContext};
use crate::manifest::{EngineDescriptor, ManifestRegistry, RegistryError};
use crate::proxy::ProxySelector;
use crate::routines::{
    self, LoadedRoutine, Operation, RoutineCatalog, RoutineContext, RoutineError, SearchParams,
};
use crate::shim::user_agent::resolve_user_agent;
use crate::shim::{HttpTransport, NetworkShim, Transport};

/// Result of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The routine's result, normalized.
    Results(Value),
    /// No page exists at the requested position.
    Exhausted,
    Failed { message: String },
}

impl DispatchOutcome {
    pub fn into_json(self) -> Value {
        match self {
            Self::Results(v) => v,
            Self::Exhausted => json!([]),
            Self::Failed { message } => json!({"status": "error", "message": message}),
        }
    }
}

/// Routes requests to routines. Holds no per-request state.
pub struct Dispatcher {
    registry: Arc<ManifestRegistry>,
    catalog: Arc<RoutineCatalog>,
    proxies: ProxySelector,
    store: ContinuationStore,
    transport: Option<Arc<dyn Transport>>,
    expose_errors: bool,
}

impl Dispatcher {
    pub fn new(registry: ManifestRegistry, catalog: RoutineCatalog, store: ContinuationStore) -> Self {
        Self {
            registry: Arc::new(registry),
            catalog: Arc::new(catalog),
            proxies: ProxySelector::default(),
            store,
            transport: None,
            expose_errors: false,
        }
    }

    pub fn with_proxies(mut self, proxies: ProxySelector) -> Self {
        self.proxies = proxies;
        self
    }

    /// Fetch capability handed to live routines.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn expose_errors(mut self, expose: bool) -> Self {
        self.expose_errors = expose;
        self
    }

    /// Wire a dispatcher from runtime settings.
    pub async fn from_settings(settings: &Settings) -> Self {
        let store = ContinuationStore::from_backend_url(settings.cache_backend.as_deref())
            .await
            .with_ttl(settings.continuation_ttl);
        let proxies = ProxySelector::new(settings.proxies.clone()).with_env(&settings.proxy_env_var);

        let mut dispatcher = Self::new(
            ManifestRegistry::from_path(&settings.manifest_path),
            RoutineCatalog::builtin(),
            store,
        )
        .with_proxies(proxies)
        .expose_errors(settings.expose_errors);

        if settings.outbound_fetch {
            info!("Outbound fetching enabled");
            dispatcher = dispatcher.with_transport(Arc::new(HttpTransport::new(
                resolve_user_agent(settings.user_agent.as_deref()),
                Duration::from_secs(settings.request_timeout),
            )));
        }

        dispatcher
    }

    pub fn registry(&self) -> &ManifestRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &RoutineCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &ContinuationStore {
        &self.store
    }

    /// Handle a raw JSON request body.
    pub async fn dispatch_json(&self, body: &str) -> Value {
        let outcome = match DispatchRequest::from_json(body) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => self.fail(None, e),
        };
        outcome.into_json()
    }

    /// Handle a validated request.
    pub async fn dispatch(&self, request: DispatchRequest) -> DispatchOutcome {
        let engine = request.engine.clone();
        match self.execute(request).await {
            Ok(value) => DispatchOutcome::Results(value),
            Err(DispatchError::NoContinuationAvailable) => {
                info!(engine = %engine, "No continuation for requested position");
                DispatchOutcome::Exhausted
            }
            Err(e) => self.fail(Some(&engine), e),
        }
    }

    fn fail(&self, engine: Option<&str>, e: DispatchError) -> DispatchOutcome {
        warn!(
            engine = engine.unwrap_or("-"),
            stage = %e.stage(),
            "Dispatch failed: {}",
            e
        );
        DispatchOutcome::Failed {
            message: e.client_message(self.expose_errors),
        }
    }

    fn resolve(&self, engine: &str) -> Result<(EngineDescriptor, LoadedRoutine), DispatchError> {
        let descriptor = self.registry.resolve(engine).map_err(|e| match e {
            RegistryError::InvalidIdentifier(raw) => DispatchError::EngineNotFound(raw),
            RegistryError::NotFound(id) => DispatchError::EngineNotFound(id),
            RegistryError::ManifestUnavailable(reason) => {
                DispatchError::InternalFault(format!("manifest unavailable: {}", reason))
            }
        })?;

        let loaded = self
            .catalog
            .load(&descriptor)
            .map_err(|e| DispatchError::ModuleLoadFailure {
                engine: descriptor.identifier.clone(),
                reason: e.to_string(),
            })?;

        Ok((descriptor, loaded))
    }

    async fn execute(&self, request: DispatchRequest) -> Result<Value, DispatchError> {
        let (descriptor, loaded) = self.resolve(&request.engine)?;
        let engine = descriptor.identifier;

        let unsupported = || DispatchError::OperationNotSupported {
            engine: engine.clone(),
            operation: request.operation.clone(),
        };
        let operation = Operation::parse(&request.operation).ok_or_else(unsupported)?;

        let network = match request.html {
            Some(html) => NetworkShim::Injected(html),
            None => NetworkShim::Live(self.transport.clone()),
        };
        let ctx = Arc::new(RoutineContext::new(
            network,
            self.proxies.clone(),
            self.store.clone(),
        ));
        let routine = loaded.instantiate(Arc::clone(&ctx));
        if !routine.operations().contains(&operation) {
            return Err(unsupported());
        }

        let offset_given = request.params.get("offset").is_some_and(|v| !v.is_null());
        let mut params = SearchParams::merged(request.params);
        let offset = params.offset();
        let query = params.query().to_string();

        // A token followed without an offset serves an unknown page, so its
        // successor must not be indexed under this offset.
        if params.npt().is_none() || offset_given {
            ctx.bind_position(StoreContext::new(&engine, &query, offset, routine.page_size()));
        }

        if offset > 0 && params.npt().is_none() {
            let token = self
                .store
                .resolve_by_position(&engine, &query, offset)
                .await
                .ok_or(DispatchError::NoContinuationAvailable)?;
            debug!(engine = %engine, offset, "Resolved continuation by position");
            params.set_npt(&token);
        }

        // Run on its own task so a panicking routine cannot take the handler down
        let handle = tokio::spawn(async move {
            routines::invoke(routine.as_ref(), operation, &params).await
        });

        let result = match handle.await {
            Ok(Ok(value)) => value,
            Ok(Err(RoutineError::NotSupported(_))) => return Err(unsupported()),
            Ok(Err(RoutineError::ContinuationLost)) => {
                return Err(DispatchError::NoContinuationAvailable)
            }
            Ok(Err(e)) => return Err(DispatchError::InternalFault(e.to_string())),
            Err(join_err) => {
                let detail = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    "routine cancelled".to_string()
                };
                return Err(DispatchError::InternalFault(detail));
            }
        };

        Ok(normalize(&engine, operation, result, ctx.issued_token()))
    }

    /// Handle a raw filter-discovery body. Always returns an object.
    pub fn discover_filters_json(&self, body: &str) -> Value {
        match FilterRequest::from_json(body) {
            Ok(request) => self.discover_filters(&request.engine, &request.page),
            Err(e) => {
                error!("Filter discovery failed: {}", e);
                json!({})
            }
        }
    }

    /// Filters an engine offers on `page`, or `{}` on any failure.
    pub fn discover_filters(&self, engine: &str, page: &str) -> Value {
        match std::panic::catch_unwind(AssertUnwindSafe(|| self.filters(engine, page))) {
            Ok(Ok(filters)) => filters,
            Ok(Err(e)) => {
                error!(engine, stage = %e.stage(), "Filter discovery failed: {}", e);
                json!({})
            }
            Err(payload) => {
                error!(engine, "Filter discovery panicked: {}", panic_message(payload));
                json!({})
            }
        }
    }

    fn filters(&self, engine: &str, page: &str) -> Result<Value, DispatchError> {
        let (descriptor, loaded) = self.resolve(engine)?;
        let operation =
            Operation::parse(page).ok_or_else(|| DispatchError::OperationNotSupported {
                engine: descriptor.identifier.clone(),
                operation: page.to_string(),
            })?;

        let routine = loaded.instantiate(Arc::new(RoutineContext::discovery()));
        let filters = routine.filters(operation);
        Ok(if filters.is_object() { filters } else { json!({}) })
    }
}

/// Attach the call's issued token and log empty result sets.
fn normalize(engine: &str, operation: Operation, mut result: Value, issued: Option<String>) -> Value {
    let items = match result {
        Value::Object(ref mut map) => {
            if let Some(token) = issued {
                let entry = map.entry("npt").or_insert(Value::Null);
                if entry.is_null() {
                    *entry = Value::String(token);
                }
            }
            map.get(operation.result_key())
                .and_then(Value::as_array)
                .map(Vec::len)
        }
        Value::Array(ref a) => Some(a.len()),
        _ => None,
    };

    if items == Some(0) {
        info!(engine, operation = %operation, "Empty result set");
    }
    result
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("routine panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("routine panicked: {}", s)
    } else {
        "routine panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routines::{empty_results, web_item, RoutineResult, SearchRoutine};
    use async_trait::async_trait;

    /// Pages through `page-N` locators without fetching.
    struct Pager {
        ctx: Arc<RoutineContext>,
    }

    #[async_trait]
    impl SearchRoutine for Pager {
        fn name(&self) -> &'static str {
            "pager"
        }

        fn operations(&self) -> &'static [Operation] {
            &[Operation::Web, Operation::News]
        }

        fn filters(&self, page: Operation) -> Value {
            json!({"page": page.as_str()})
        }

        async fn web(&self, params: &SearchParams) -> RoutineResult {
            let current = match params.npt() {
                Some(token) => self
                    .ctx
                    .restore(token)
                    .await
                    .resource_locator
                    .ok_or(RoutineError::ContinuationLost)?,
                None => "page-0".to_string(),
            };
            let proxy = self.ctx.select_proxy();
            let offset = self
                .ctx
                .position()
                .and_then(|p| p.next_offset())
                .unwrap_or(0);
            self.ctx
                .store(&format!("page-{}", offset), "web", &proxy)
                .await;

            let mut out = empty_results();
            out.as_object_mut().unwrap().remove("npt");
            out["web"] = json!([web_item(&current, "", "https://example.com")]);
            Ok(out)
        }

        async fn news(&self, _params: &SearchParams) -> RoutineResult {
            Ok(empty_results())
        }
    }

    struct Panicker;

    #[async_trait]
    impl SearchRoutine for Panicker {
        fn name(&self) -> &'static str {
            "panicker"
        }

        fn filters(&self, _page: Operation) -> Value {
            panic!("filters exploded")
        }

        async fn web(&self, _params: &SearchParams) -> RoutineResult {
            panic!("web exploded at src/secret.rs:42")
        }
    }

    fn dispatcher() -> Dispatcher {
        let mut catalog = RoutineCatalog::builtin();
        catalog.register("test/pager", "Pager", |ctx| Box::new(Pager { ctx }));
        catalog.register("test/panicker", "Panicker", |_| Box::new(Panicker));

        let registry = ManifestRegistry::from_descriptors(vec![
            EngineDescriptor::new("my_pager", "test/pager", "Pager"),
            EngineDescriptor::new("panicker", "test/panicker", "Panicker"),
            EngineDescriptor::new("broken", "test/missing", "Missing"),
            EngineDescriptor::new("mojeek", "routines/mojeek", "mojeek"),
        ]);

        Dispatcher::new(registry, catalog, ContinuationStore::in_memory())
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let out = dispatcher().dispatch_json("{not json").await;
        assert_eq!(out["status"], "error");
        assert!(out["message"].as_str().unwrap().starts_with("Malformed input"));
    }

    #[tokio::test]
    async fn test_unknown_engine() {
        let out = dispatcher().dispatch_json(r#"{"engine": "nope"}"#).await;
        assert_eq!(out, json!({"status": "error", "message": "Engine nope not found"}));

        let out = dispatcher().dispatch_json(r#"{"engine": "../../etc"}"#).await;
        assert_eq!(out["status"], "error");
    }

    #[tokio::test]
    async fn test_module_load_failure() {
        let out = dispatcher().dispatch_json(r#"{"engine": "broken"}"#).await;
        assert_eq!(out["message"], "Failed to load engine broken");
    }

    #[tokio::test]
    async fn test_unsupported_operation() {
        let d = dispatcher();
        let out = d
            .dispatch_json(r#"{"engine": "my-pager", "operation": "images", "params": {"s": "q"}}"#)
            .await;
        assert_eq!(out["message"], "Engine my_pager does not support images");

        let out = d
            .dispatch_json(r#"{"engine": "my_pager", "operation": "maps"}"#)
            .await;
        assert_eq!(out["status"], "error");
    }

    #[tokio::test]
    async fn test_issued_token_attached() {
        let out = dispatcher()
            .dispatch_json(r#"{"engine": "my-pager", "params": {"s": "rust"}}"#)
            .await;
        assert_eq!(out["web"][0]["title"], "page-0");
        assert_eq!(out["npt"].as_str().unwrap().len(), 32);
    }

    #[tokio::test]
    async fn test_offset_follows_index() {
        let d = dispatcher();
        d.dispatch_json(r#"{"engine": "my_pager", "params": {"s": "rust"}}"#)
            .await;

        let out = d
            .dispatch_json(r#"{"engine": "my_pager", "params": {"s": "rust", "offset": 10}}"#)
            .await;
        assert_eq!(out["web"][0]["title"], "page-10");

        let out = d
            .dispatch_json(r#"{"engine": "my_pager", "params": {"s": "rust", "offset": "20"}}"#)
            .await;
        assert_eq!(out["web"][0]["title"], "page-20");
    }

    #[tokio::test]
    async fn test_unknown_position_is_exhausted() {
        let out = dispatcher()
            .dispatch_json(r#"{"engine": "my_pager", "params": {"s": "rust", "offset": 20}}"#)
            .await;
        assert_eq!(out, json!([]));
    }

    #[tokio::test]
    async fn test_expired_token_is_exhausted() {
        let out = dispatcher()
            .dispatch_json(
                r#"{"engine": "my_pager", "params": {"npt": "0123456789abcdef0123456789abcdef"}}"#,
            )
            .await;
        assert_eq!(out, json!([]));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let out = dispatcher().dispatch_json(r#"{"engine": "panicker"}"#).await;
        assert_eq!(out, json!({"status": "error", "message": GENERIC_FAULT_MESSAGE}));

        let exposed = dispatcher().expose_errors(true);
        let out = exposed.dispatch_json(r#"{"engine": "panicker"}"#).await;
        assert!(out["message"].as_str().unwrap().contains("web exploded"));
    }

    #[tokio::test]
    async fn test_live_without_transport_fails_cleanly() {
        let out = dispatcher()
            .dispatch_json(r#"{"engine": "mojeek", "params": {"s": "rust"}}"#)
            .await;
        assert_eq!(out["status"], "error");
        assert_eq!(out["message"], GENERIC_FAULT_MESSAGE);
    }

    #[tokio::test]
    async fn test_injected_replay() {
        let html = r#"<ul class="results-standard"><li><a class="title" href="https://a.test/">A</a><p class="s">first</p></li></ul>"#;
        let body = json!({"scraper": "mojeek", "params": {"s": "a"}, "html": html}).to_string();
        let out = dispatcher().dispatch_json(&body).await;

        assert_eq!(out["status"], "ok");
        assert_eq!(out["web"][0]["url"], "https://a.test/");
        assert!(out["npt"].is_null());
    }

    #[test]
    fn test_filters() {
        let d = dispatcher();
        assert_eq!(d.discover_filters("my-pager", "news"), json!({"page": "news"}));
        assert_eq!(
            d.discover_filters_json(r#"{"engine": "my_pager"}"#),
            json!({"page": "web"})
        );
        assert!(d.discover_filters("mojeek", "web")["nsfw"].is_object());
    }

    #[test]
    fn test_filters_never_fail() {
        let d = dispatcher();
        assert_eq!(d.discover_filters("broken", "web"), json!({}));
        assert_eq!(d.discover_filters("nope", "web"), json!({}));
        assert_eq!(d.discover_filters("panicker", "web"), json!({}));
        assert_eq!(d.discover_filters("my_pager", "maps"), json!({}));
        assert_eq!(d.discover_filters_json("garbage"), json!({}));
    }

    #[test]
    fn test_normalize_keeps_existing_npt() {
        let result = json!({"npt": "theirs", "web": []});
        let out = normalize("e", Operation::Web, result, Some("ours".to_string()));
        assert_eq!(out["npt"], "theirs");
    }
}
