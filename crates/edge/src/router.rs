use std::sync::Arc;

use acproxy_provider::Provider;

pub const STATES_PATH: &str = "/states";
pub const STATISTICS_PATH: &str = "/statistics";

/// What the front door does with an inbound path.
pub enum Route<'a> {
    States,
    Statistics,
    Provider(&'a Arc<dyn Provider>),
    Unmatched,
}

pub fn route<'a>(providers: &'a [Arc<dyn Provider>], path: &str) -> Route<'a> {
    if path.starts_with(STATES_PATH) {
        return Route::States;
    }
    if path.starts_with(STATISTICS_PATH) {
        return Route::Statistics;
    }

    // Longest matching prefix wins.
    let mut best_match: Option<(&Arc<dyn Provider>, usize)> = None;
    for provider in providers {
        let prefix = provider.kind().prefix();
        if !path.starts_with(prefix) {
            continue;
        }
        match best_match {
            Some((_, len)) if len >= prefix.len() => {}
            _ => best_match = Some((provider, prefix.len())),
        }
    }

    match best_match {
        Some((provider, _)) => Route::Provider(provider),
        None => Route::Unmatched,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use acproxy_bridge::ProxyRequest;
    use acproxy_discovery::AvailabilityState;
    use acproxy_provider::{ProviderKind, ProviderStats, ProxyError};
    use acproxy_transport::BackendResponse;

    use super::*;

    struct Idle;

    #[async_trait]
    impl Provider for Idle {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Hdfs
        }

        async fn proxy(&self, _request: &ProxyRequest) -> Result<BackendResponse, ProxyError> {
            Err(ProxyError::Unavailable(ProviderKind::Hdfs))
        }

        fn stats(&self) -> ProviderStats {
            AvailabilityState::Initializing.into()
        }
    }

    fn providers() -> Vec<Arc<dyn Provider>> {
        vec![Arc::new(Idle) as Arc<dyn Provider>]
    }

    #[test]
    fn webhdfs_paths_go_to_the_provider() {
        let providers = providers();
        assert!(matches!(
            route(&providers, "/webhdfs/v1/tmp"),
            Route::Provider(_)
        ));
        assert!(matches!(route(&providers, "/webhdfs/v1"), Route::Provider(_)));
    }

    #[test]
    fn diagnostics_paths_are_served_locally() {
        let providers = providers();
        assert!(matches!(route(&providers, "/states"), Route::States));
        assert!(matches!(route(&providers, "/statistics"), Route::Statistics));
    }

    #[test]
    fn other_paths_are_unmatched() {
        let providers = providers();
        assert!(matches!(route(&providers, "/webhdfs/v2/tmp"), Route::Unmatched));
        assert!(matches!(route(&providers, "/"), Route::Unmatched));
        assert!(matches!(route(&[], "/webhdfs/v1/tmp"), Route::Unmatched));
    }
}
