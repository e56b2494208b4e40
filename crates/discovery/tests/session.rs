use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::future::FutureExt;

use acproxy_discovery::{
    Coordinator, ReconnectingCoordinator, ResolutionError, Watch, WatchedRead, session::Connect,
};

const LOCK_PATH: &str = "/hadoop-ha/ns1/ActiveBreadCrumb";

/// Stand-in ensemble: hands out numbered sessions and can expire every
/// session opened so far, refuse new ones, or stall reads.
#[derive(Default)]
struct Ensemble {
    opened: AtomicU32,
    expired_through: AtomicU32,
    refusing: AtomicBool,
    stalled: AtomicBool,
}

impl Ensemble {
    fn expire_all(&self) {
        self.expired_through
            .store(self.opened.load(Ordering::SeqCst), Ordering::SeqCst);
    }

    fn opened(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }
}

struct Session {
    id: u32,
    ensemble: Arc<Ensemble>,
}

#[async_trait]
impl Coordinator for Session {
    async fn watched_read(&self, _path: &str) -> Result<WatchedRead, ResolutionError> {
        if self.ensemble.stalled.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        if self.id <= self.ensemble.expired_through.load(Ordering::SeqCst) {
            return Err(ResolutionError::SessionExpired(format!("session {}", self.id)));
        }
        Ok(WatchedRead {
            data: Some(format!("session-{}", self.id).into_bytes()),
            watch: Watch::never(),
        })
    }
}

fn connector(ensemble: Arc<Ensemble>) -> Connect {
    Arc::new(move || {
        let ensemble = ensemble.clone();
        async move {
            if ensemble.refusing.load(Ordering::SeqCst) {
                return Err(ResolutionError::Connect {
                    cluster: "zk1:2181".to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            let id = ensemble.opened.fetch_add(1, Ordering::SeqCst) + 1;
            let session: Arc<dyn Coordinator> = Arc::new(Session { id, ensemble });
            Ok(session)
        }
        .boxed()
    })
}

async fn read(coordinator: &ReconnectingCoordinator) -> Result<String, ResolutionError> {
    let read = coordinator.watched_read(LOCK_PATH).await?;
    Ok(String::from_utf8(read.data.unwrap_or_default()).unwrap())
}

#[tokio::test]
async fn expired_session_is_replaced_and_read_retried() {
    let ensemble = Arc::new(Ensemble::default());
    let coordinator =
        ReconnectingCoordinator::connect(connector(ensemble.clone()), Duration::from_secs(1))
            .await
            .unwrap();

    assert_eq!(read(&coordinator).await.unwrap(), "session-1");
    assert_eq!(ensemble.opened(), 1);

    ensemble.expire_all();
    assert_eq!(read(&coordinator).await.unwrap(), "session-2");
    assert_eq!(read(&coordinator).await.unwrap(), "session-2");
    assert_eq!(ensemble.opened(), 2);
}

#[tokio::test]
async fn failed_reconnect_is_retried_on_next_read() {
    let ensemble = Arc::new(Ensemble::default());
    let coordinator =
        ReconnectingCoordinator::connect(connector(ensemble.clone()), Duration::from_secs(1))
            .await
            .unwrap();

    ensemble.expire_all();
    ensemble.refusing.store(true, Ordering::SeqCst);
    let err = read(&coordinator).await.unwrap_err();
    assert!(matches!(err, ResolutionError::Connect { .. }));

    ensemble.refusing.store(false, Ordering::SeqCst);
    assert_eq!(read(&coordinator).await.unwrap(), "session-2");
}

#[tokio::test]
async fn first_connect_failure_is_returned() {
    let ensemble = Arc::new(Ensemble::default());
    ensemble.refusing.store(true, Ordering::SeqCst);

    let result = ReconnectingCoordinator::connect(connector(ensemble), Duration::from_secs(1)).await;
    assert!(matches!(result, Err(ResolutionError::Connect { .. })));
}

#[tokio::test]
async fn stalled_read_is_bounded() {
    let ensemble = Arc::new(Ensemble::default());
    let coordinator =
        ReconnectingCoordinator::connect(connector(ensemble.clone()), Duration::from_millis(50))
            .await
            .unwrap();

    ensemble.stalled.store(true, Ordering::SeqCst);
    let started = std::time::Instant::now();
    let err = read(&coordinator).await.unwrap_err();

    assert!(matches!(err, ResolutionError::Read { .. }));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(ensemble.opened(), 1);
}
