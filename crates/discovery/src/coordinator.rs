use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};

use crate::error::ResolutionError;

/// Change notification delivered by a one-shot watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    Created,
    Deleted,
    DataChanged,
    // session events and anything else that is not about the node itself
    Other,
}

/// A one-shot watch armed by [`Coordinator::watched_read`].
pub struct Watch {
    inner: BoxFuture<'static, WatchEvent>,
}

impl Watch {
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = WatchEvent> + Send + 'static,
    {
        Self { inner: fut.boxed() }
    }

    /// A watch that never fires. Used when the read failed and nothing was armed.
    pub fn never() -> Self {
        Self::new(futures::future::pending())
    }
}

impl Future for Watch {
    type Output = WatchEvent;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl fmt::Debug for Watch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Watch")
    }
}

#[derive(Debug)]
pub struct WatchedRead {
    /// `None` when the node does not exist.
    pub data: Option<Vec<u8>>,
    pub watch: Watch,
}

/// Client side of the coordination service.
///
/// A watched read returns the current payload of `path` and arms a watch
/// that fires on the next change to that node, including its creation when
/// it is absent.
#[async_trait]
pub trait Coordinator: Send + Sync {
    async fn watched_read(&self, path: &str) -> Result<WatchedRead, ResolutionError>;
}
