use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::coordinator::{Coordinator, Watch, WatchEvent, WatchedRead};
use crate::error::ResolutionError;

/// In-process coordination store with one-shot watches.
///
/// Behaves like a single ZooKeeper node space: every watched read arms a
/// watch on the path that fires once on the next create, update or delete.
#[derive(Clone, Default)]
pub struct MemoryCoordinator {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    nodes: HashMap<String, Vec<u8>>,
    watchers: HashMap<String, Vec<oneshot::Sender<WatchEvent>>>,
    failing: bool,
    reads: u64,
}

impl Inner {
    fn fire(&mut self, path: &str, event: WatchEvent) {
        if let Some(watchers) = self.watchers.remove(path) {
            for watcher in watchers {
                let _ = watcher.send(event);
            }
        }
    }
}

impl MemoryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, path: &str, data: Vec<u8>) {
        let mut inner = self.inner.lock();
        let event = match inner.nodes.insert(path.to_string(), data) {
            Some(_) => WatchEvent::DataChanged,
            None => WatchEvent::Created,
        };
        inner.fire(path, event);
    }

    pub fn delete(&self, path: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.nodes.remove(path).is_none() {
            return false;
        }
        inner.fire(path, WatchEvent::Deleted);
        true
    }

    /// Makes every subsequent read fail until switched off again.
    pub fn fail_reads(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }

    pub fn reads(&self) -> u64 {
        self.inner.lock().reads
    }

    /// Number of watches currently armed on `path`.
    pub fn armed_watches(&self, path: &str) -> usize {
        let mut inner = self.inner.lock();
        match inner.watchers.get_mut(path) {
            Some(watchers) => {
                watchers.retain(|watcher| !watcher.is_closed());
                watchers.len()
            }
            None => 0,
        }
    }
}

#[async_trait]
impl Coordinator for MemoryCoordinator {
    async fn watched_read(&self, path: &str) -> Result<WatchedRead, ResolutionError> {
        let mut inner = self.inner.lock();
        inner.reads += 1;

        if inner.failing {
            return Err(ResolutionError::Read {
                path: path.to_string(),
                reason: "connection loss".to_string(),
            });
        }

        let (tx, rx) = oneshot::channel();
        let watchers = inner.watchers.entry(path.to_string()).or_default();
        watchers.retain(|watcher| !watcher.is_closed());
        watchers.push(tx);

        Ok(WatchedRead {
            data: inner.nodes.get(path).cloned(),
            watch: Watch::new(async move { rx.await.unwrap_or(WatchEvent::Other) }),
        })
    }
}
