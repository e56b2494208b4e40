use std::{
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    task::{Context, Poll},
};

use http_body_util::Full;
use hyper::Request;
use hyper::body::Bytes;
use log::debug;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, oneshot};

use crate::http_client::{BackendClient, BackendResponse};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("forwarding pool is shut down")]
    Closed,

    #[error("send failed: {0}")]
    Send(#[from] hyper_util::client::legacy::Error),

    #[error("reading backend body failed: {0}")]
    Body(#[from] hyper::Error),
}

pub type ForwardResult = Result<BackendResponse, PoolError>;

struct ForwardTask {
    target: String,
    request: Request<Full<Bytes>>,
    respond_to: oneshot::Sender<ForwardResult>,
}

// a task together with the capacity unit it was admitted under
struct Admitted {
    task: ForwardTask,
    permit: OwnedSemaphorePermit,
}

/// Result of a submitted task. Dropping it abandons the result, not the call.
pub struct PendingResult {
    rx: oneshot::Receiver<ForwardResult>,
}

impl Future for PendingResult {
    type Output = ForwardResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(PoolError::Closed)))
    }
}

/// Bounded-concurrency executor for backend calls.
///
/// At most `limit` tasks are outstanding at any time. A task holds its unit
/// from admission until its worker has finished, whether or not anyone is
/// still waiting for the result. With `cancel_on_abandon` set, a worker
/// whose caller has gone away stops the backend call instead of running it
/// to completion.
pub struct ForwardingPool {
    capacity: Arc<Semaphore>,
    limit: usize,
    submitted: AtomicU64,
    queue: mpsc::Sender<Admitted>,
}

impl ForwardingPool {
    pub fn new(limit: usize, cancel_on_abandon: bool) -> Self {
        Self::with_client(limit, cancel_on_abandon, BackendClient::new())
    }

    /// Must be called inside a Tokio runtime; the dispatcher is spawned here.
    pub fn with_client(limit: usize, cancel_on_abandon: bool, client: BackendClient) -> Self {
        let limit = limit.max(1);
        let (queue, tasks) = mpsc::channel(limit);

        tokio::spawn(dispatch(tasks, client, cancel_on_abandon));

        Self {
            capacity: Arc::new(Semaphore::new(limit)),
            limit,
            submitted: AtomicU64::new(0),
            queue,
        }
    }

    /// Admits a call to `target`, waiting while the pool is full.
    pub async fn submit(
        &self,
        target: impl Into<String>,
        request: Request<Full<Bytes>>,
    ) -> Result<PendingResult, PoolError> {
        let permit = self
            .capacity
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let (respond_to, rx) = oneshot::channel();
        let task = ForwardTask {
            target: target.into(),
            request,
            respond_to,
        };

        self.queue
            .send(Admitted { task, permit })
            .await
            .map_err(|_| PoolError::Closed)?;
        self.submitted.fetch_add(1, Ordering::Relaxed);

        Ok(PendingResult { rx })
    }

    /// Tasks admitted and not yet finished.
    pub fn outstanding(&self) -> usize {
        self.limit - self.capacity.available_permits()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Tasks admitted over the pool's lifetime.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
}

async fn dispatch(mut tasks: mpsc::Receiver<Admitted>, client: BackendClient, cancel_on_abandon: bool) {
    while let Some(Admitted { task, permit }) = tasks.recv().await {
        let client = client.clone();
        tokio::spawn(async move {
            let ForwardTask {
                target,
                request,
                mut respond_to,
            } = task;

            let outcome = if cancel_on_abandon {
                tokio::select! {
                    outcome = client.send(request) => Some(outcome),
                    _ = respond_to.closed() => None,
                }
            } else {
                Some(client.send(request).await)
            };

            match outcome {
                Some(outcome) => {
                    if respond_to.send(outcome).is_err() {
                        debug!("Result from {} discarded, caller stopped waiting", target);
                    }
                }
                None => debug!("Call to {} cancelled, caller stopped waiting", target),
            }

            drop(permit);
        });
    }
}
