use std::time::Duration;

use log::debug;

use acproxy_bridge::{ProxyRequest, build_backend_request};
use acproxy_discovery::StateReader;
use acproxy_transport::{BackendResponse, ForwardingPool};

use crate::{ProviderKind, ProviderStats, error::ProxyError};

/// State and pool shared by every provider implementation.
pub struct ProviderCore {
    kind: ProviderKind,
    state: StateReader,
    pool: ForwardingPool,
    request_timeout: Duration,
}

impl ProviderCore {
    pub fn new(
        kind: ProviderKind,
        state: StateReader,
        pool: ForwardingPool,
        request_timeout: Duration,
    ) -> Self {
        Self {
            kind,
            state,
            pool,
            request_timeout,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn state(&self) -> &StateReader {
        &self.state
    }

    pub fn pool(&self) -> &ForwardingPool {
        &self.pool
    }

    /// Sends `request` to the active backend through the pool.
    ///
    /// Fails fast without touching the pool when no backend is routable.
    /// Admission and the call itself share one `request_timeout` budget; on
    /// expiry the worker is left to finish on its own.
    pub async fn forward(&self, request: &ProxyRequest) -> Result<BackendResponse, ProxyError> {
        let snapshot = self.state.snapshot();
        let Some(address) = snapshot.routable() else {
            return Err(ProxyError::Unavailable(self.kind));
        };

        let target = address.authority();
        let backend_request = build_backend_request(&target, request)?;
        debug!("{} {} -> {}", request.method, request.path_and_query(), target);

        let call = async {
            let pending = self.pool.submit(target.clone(), backend_request).await?;
            pending.await.map_err(ProxyError::from)
        };

        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProxyError::Timeout(request.path_and_query().to_string())),
        }
    }

    pub fn stats(&self) -> ProviderStats {
        self.state.state().into()
    }
}
