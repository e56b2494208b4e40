use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use zookeeper_client as zk;

use crate::coordinator::{Coordinator, Watch, WatchEvent, WatchedRead};
use crate::error::ResolutionError;

/// [`Coordinator`] backed by a ZooKeeper ensemble.
pub struct ZkCoordinator {
    client: zk::Client,
}

impl ZkCoordinator {
    /// Connects to `cluster` (`host:port,host:port`), giving up after `timeout`.
    pub async fn connect(cluster: &str, timeout: Duration) -> Result<Self, ResolutionError> {
        let client = tokio::time::timeout(timeout, zk::Client::connect(cluster))
            .await
            .map_err(|_| ResolutionError::Connect {
                cluster: cluster.to_string(),
                reason: format!("no session established within {}ms", timeout.as_millis()),
            })?
            .map_err(|err| ResolutionError::Connect {
                cluster: cluster.to_string(),
                reason: err.to_string(),
            })?;

        info!("Connected to ZooKeeper ensemble {}", cluster);
        Ok(Self { client })
    }

    /// Writes `data` to `path`, creating the node and its parents as needed.
    pub async fn publish(&self, path: &str, data: &[u8]) -> Result<(), ResolutionError> {
        let options = zk::CreateMode::Persistent.with_acls(zk::Acls::anyone_all());

        let mut parent = String::new();
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        for component in components.iter().take(components.len().saturating_sub(1)) {
            parent.push('/');
            parent.push_str(component);
            match self.client.create(&parent, &[], &options).await {
                Ok(_) | Err(zk::Error::NodeExists) => {}
                Err(err) => return Err(write_error(&parent, err)),
            }
        }

        match self.client.create(path, data, &options).await {
            Ok(_) => Ok(()),
            Err(zk::Error::NodeExists) => self
                .client
                .set_data(path, data, None)
                .await
                .map(|_| ())
                .map_err(|err| write_error(path, err)),
            Err(err) => Err(write_error(path, err)),
        }
    }

    /// Deletes `path`. Returns false when it did not exist.
    pub async fn remove(&self, path: &str) -> Result<bool, ResolutionError> {
        match self.client.delete(path, None).await {
            Ok(()) => Ok(true),
            Err(zk::Error::NoNode) => Ok(false),
            Err(err) => Err(write_error(path, err)),
        }
    }
}

#[async_trait]
impl Coordinator for ZkCoordinator {
    async fn watched_read(&self, path: &str) -> Result<WatchedRead, ResolutionError> {
        // The node may appear between the failed get and the existence check;
        // one more get picks that up, anything beyond is left to the next poll.
        for _ in 0..2 {
            match self.client.get_and_watch_data(path).await {
                Ok((data, _stat, watcher)) => {
                    return Ok(WatchedRead {
                        data: Some(data),
                        watch: oneshot_watch(watcher),
                    });
                }
                Err(zk::Error::NoNode) => {
                    let (stat, watcher) = self
                        .client
                        .check_and_watch_stat(path)
                        .await
                        .map_err(|err| read_error(path, err))?;
                    if stat.is_none() {
                        return Ok(WatchedRead {
                            data: None,
                            watch: oneshot_watch(watcher),
                        });
                    }
                    debug!("{} was created while being read, reading again", path);
                }
                Err(err) => return Err(read_error(path, err)),
            }
        }

        Ok(WatchedRead {
            data: None,
            watch: Watch::never(),
        })
    }
}

fn oneshot_watch(watcher: zk::OneshotWatcher) -> Watch {
    Watch::new(async move {
        let event = watcher.changed().await;
        match event.event_type {
            zk::EventType::NodeCreated => WatchEvent::Created,
            zk::EventType::NodeDeleted => WatchEvent::Deleted,
            zk::EventType::NodeDataChanged => WatchEvent::DataChanged,
            _ => WatchEvent::Other,
        }
    })
}

fn read_error(path: &str, err: zk::Error) -> ResolutionError {
    // the client never recovers from these, only a new session does
    if matches!(err, zk::Error::SessionExpired | zk::Error::ClientClosed) {
        return ResolutionError::SessionExpired(err.to_string());
    }
    ResolutionError::Read {
        path: path.to_string(),
        reason: err.to_string(),
    }
}

fn write_error(path: &str, err: zk::Error) -> ResolutionError {
    ResolutionError::Write {
        path: path.to_string(),
        reason: err.to_string(),
    }
}
