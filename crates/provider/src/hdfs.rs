use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio::task::JoinHandle;

use acproxy_bridge::ProxyRequest;
use acproxy_config::config::HdfsConfig;
use acproxy_discovery::{
    Coordinator, ReconnectingCoordinator, ResolutionError, state::StateOwner,
    watcher::CoordinationWatcher,
};
use acproxy_transport::{BackendResponse, ForwardingPool};

use crate::{Provider, ProviderCore, ProviderKind, ProviderStats, error::ProxyError};

/// Proxies WebHDFS traffic to whichever NameNode holds the active lock.
pub struct HdfsProvider {
    core: ProviderCore,
    watcher: JoinHandle<()>,
    owner: JoinHandle<()>,
}

impl HdfsProvider {
    /// Connects to the configured ZooKeeper ensemble and resolves the active
    /// NameNode. A failed connection is returned as an error.
    pub async fn connect(config: &HdfsConfig) -> Result<Self, ResolutionError> {
        // reads get the same bound as establishing a session
        let coordinator = ReconnectingCoordinator::zookeeper(
            &config.zk_cluster(),
            config.zk_connect_timeout(),
            config.zk_connect_timeout(),
        )
        .await?;
        Ok(Self::with_coordinator(Arc::new(coordinator), config).await)
    }

    /// Returns once the first resolve has been applied.
    pub async fn with_coordinator(coordinator: Arc<dyn Coordinator>, config: &HdfsConfig) -> Self {
        let kind = ProviderKind::Hdfs;
        let (owner, reader, sender) = StateOwner::spawn(kind.name());
        let pool = ForwardingPool::new(config.max_connections, config.cancel_on_timeout);

        let watcher = CoordinationWatcher::new(
            coordinator,
            config.zk_lock_path.clone(),
            config.webhdfs_port,
            config.poll_interval(),
            sender,
        )
        .start()
        .await;

        let core = ProviderCore::new(kind, reader, pool, config.request_timeout());
        info!(
            "{} watching {} (max connections {}), initial state {}",
            kind,
            config.zk_lock_path,
            config.max_connections,
            core.state().state()
        );

        Self {
            core,
            watcher,
            owner,
        }
    }

    pub fn core(&self) -> &ProviderCore {
        &self.core
    }
}

impl Drop for HdfsProvider {
    fn drop(&mut self) {
        self.watcher.abort();
        self.owner.abort();
    }
}

#[async_trait]
impl Provider for HdfsProvider {
    fn kind(&self) -> ProviderKind {
        self.core.kind()
    }

    async fn proxy(&self, request: &ProxyRequest) -> Result<BackendResponse, ProxyError> {
        self.core.forward(request).await
    }

    fn stats(&self) -> ProviderStats {
        self.core.stats()
    }
}
