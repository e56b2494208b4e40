use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use log::{info, warn};
use parking_lot::RwLock;

use crate::coordinator::{Coordinator, WatchedRead};
use crate::error::ResolutionError;
use crate::zookeeper::ZkCoordinator;

/// Opens a new coordination session.
pub type Connect =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn Coordinator>, ResolutionError>> + Send + Sync>;

/// [`Coordinator`] that replaces its session once the service has expired it.
///
/// Every read is bounded by `read_timeout`. A read failing with
/// [`ResolutionError::SessionExpired`] opens a fresh session and is retried
/// once on it; if reconnecting fails the error is returned and the next read
/// tries again.
pub struct ReconnectingCoordinator {
    connect: Connect,
    session: RwLock<Arc<dyn Coordinator>>,
    read_timeout: Duration,
}

impl ReconnectingCoordinator {
    /// Opens the first session. Failing here is returned to the caller.
    pub async fn connect(connect: Connect, read_timeout: Duration) -> Result<Self, ResolutionError> {
        let session = connect().await?;
        Ok(Self {
            connect,
            session: RwLock::new(session),
            read_timeout,
        })
    }

    /// Sessions against the ZooKeeper ensemble `cluster`.
    pub async fn zookeeper(
        cluster: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, ResolutionError> {
        let cluster = cluster.to_string();
        let connect: Connect = Arc::new(move || {
            let cluster = cluster.clone();
            async move {
                let session: Arc<dyn Coordinator> =
                    Arc::new(ZkCoordinator::connect(&cluster, connect_timeout).await?);
                Ok::<_, ResolutionError>(session)
            }
            .boxed()
        });
        Self::connect(connect, read_timeout).await
    }

    async fn timed_read(
        &self,
        session: &Arc<dyn Coordinator>,
        path: &str,
    ) -> Result<WatchedRead, ResolutionError> {
        match tokio::time::timeout(self.read_timeout, session.watched_read(path)).await {
            Ok(result) => result,
            Err(_) => Err(ResolutionError::Read {
                path: path.to_string(),
                reason: format!("no reply within {}ms", self.read_timeout.as_millis()),
            }),
        }
    }
}

#[async_trait]
impl Coordinator for ReconnectingCoordinator {
    async fn watched_read(&self, path: &str) -> Result<WatchedRead, ResolutionError> {
        let session = self.session.read().clone();
        match self.timed_read(&session, path).await {
            Err(ResolutionError::SessionExpired(reason)) => {
                warn!("Coordination session lost ({}), reconnecting", reason);
                let fresh = (self.connect)().await?;
                *self.session.write() = fresh.clone();
                info!("Coordination session re-established");
                self.timed_read(&fresh, path).await
            }
            other => other,
        }
    }
}
