use std::{sync::Arc, time::Duration};

use log::{debug, warn};
use tokio::task::JoinHandle;

use crate::coordinator::{Coordinator, Watch, WatchEvent, WatchedRead};
use crate::leader_info::decode_leader;
use crate::state::{BackendAddress, StateEvent, StateSender};

/// Follows the leader record at one coordination path.
///
/// Wakes on whichever comes first: the armed watch or the poll interval.
/// Every wake re-reads the path and re-arms the watch, so a missed
/// notification costs at most one poll interval.
pub struct CoordinationWatcher {
    coordinator: Arc<dyn Coordinator>,
    path: String,
    backend_port: u16,
    poll_interval: Duration,
    events: StateSender,
}

impl CoordinationWatcher {
    pub fn new(
        coordinator: Arc<dyn Coordinator>,
        path: impl Into<String>,
        backend_port: u16,
        poll_interval: Duration,
        events: StateSender,
    ) -> Self {
        Self {
            coordinator,
            path: path.into(),
            backend_port,
            poll_interval,
            events,
        }
    }

    /// Performs the first resolve, waits until the state owner has applied
    /// it, then continues watching on a background task.
    pub async fn start(self) -> JoinHandle<()> {
        let (event, watch) = self.resolve().await;
        if !self.events.send_and_wait(event).await {
            warn!("State owner for {} stopped before the first resolve", self.path);
        }
        tokio::spawn(self.run(watch))
    }

    async fn run(self, mut watch: Watch) {
        loop {
            tokio::select! {
                event = &mut watch => {
                    debug!("Watch on {} fired: {:?}", self.path, event);
                    if event == WatchEvent::Deleted && !self.events.send(StateEvent::Lost) {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            let (event, next) = self.resolve().await;
            watch = next;
            if !self.events.send(event) {
                break;
            }
        }
        debug!("Stopped watching {}", self.path);
    }

    /// One watched read of the path, turned into a state event.
    pub async fn resolve(&self) -> (StateEvent, Watch) {
        match self.coordinator.watched_read(&self.path).await {
            Ok(WatchedRead {
                data: Some(data),
                watch,
            }) if !data.is_empty() => match decode_leader(&data) {
                Ok(info) => {
                    let address = BackendAddress::new(info.hostname, self.backend_port);
                    (StateEvent::Resolved(address), watch)
                }
                Err(err) => {
                    warn!("Ignoring leader record at {}: {}", self.path, err);
                    (StateEvent::Lost, watch)
                }
            },
            Ok(WatchedRead { watch, .. }) => {
                debug!("No active leader recorded at {}", self.path);
                (StateEvent::Lost, watch)
            }
            Err(err) => {
                warn!("Failed to resolve leader: {}", err);
                (StateEvent::Lost, Watch::never())
            }
        }
    }
}
