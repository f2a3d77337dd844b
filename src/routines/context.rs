//! Dependency set a routine is constructed with.

use std::sync::{Mutex, OnceLock};

use tracing::debug;

use crate::continuation::{ContinuationState, ContinuationStore, StoreContext};
use crate::proxy::{ProxyIdentity, ProxySelector};
use crate::shim::{NetworkShim, ShimError};

/// Network, proxy and continuation capabilities for one call.
///
/// Created per request and dropped with it; nothing here outlives the call
/// except what is written to the continuation store.
pub struct RoutineContext {
    network: NetworkShim,
    proxies: ProxySelector,
    store: ContinuationStore,
    position: OnceLock<StoreContext>,
    issued: Mutex<Option<String>>,
}

impl RoutineContext {
    pub fn new(network: NetworkShim, proxies: ProxySelector, store: ContinuationStore) -> Self {
        Self {
            network,
            proxies,
            store,
            position: OnceLock::new(),
            issued: Mutex::new(None),
        }
    }

    /// Context for filter listing: no network, no shared state.
    pub fn discovery() -> Self {
        Self::new(
            NetworkShim::Discovery,
            ProxySelector::default(),
            ContinuationStore::in_memory(),
        )
    }

    pub fn network(&self) -> &NetworkShim {
        &self.network
    }

    pub fn select_proxy(&self) -> ProxyIdentity {
        self.proxies.select()
    }

    /// Fetch through the network shim.
    pub async fn fetch(&self, proxy: &ProxyIdentity, url: &str) -> Result<String, ShimError> {
        self.network.get(proxy, url).await
    }

    /// Record which engine/query/offset this call serves. First bind wins.
    pub fn bind_position(&self, position: StoreContext) {
        if self.position.set(position).is_err() {
            debug!("Call position already bound");
        }
    }

    pub fn position(&self) -> Option<&StoreContext> {
        self.position.get()
    }

    /// Save continuation state and return the token for the client.
    pub async fn store(
        &self,
        resource_locator: &str,
        resource_kind: &str,
        proxy: &ProxyIdentity,
    ) -> String {
        let token = self
            .store
            .put(resource_locator, resource_kind, proxy, self.position.get())
            .await;

        if let Ok(mut issued) = self.issued.lock() {
            *issued = Some(token.clone());
        }
        token
    }

    /// Load continuation state for a token supplied by the client.
    pub async fn restore(&self, token: &str) -> ContinuationState {
        self.store.get(token).await
    }

    /// Last token minted during this call.
    pub fn issued_token(&self) -> Option<String> {
        self.issued.lock().ok().and_then(|t| t.clone())
    }
}
