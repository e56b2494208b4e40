//! The client-facing HTTP front door: routing, retries and request statistics.

use std::{
    collections::BTreeMap, convert::Infallible, fmt::Display, future::Future, sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use http::{Request, Response, StatusCode, header};
use http_body_util::{BodyExt, Full};
use hyper::{body::Body, body::Incoming, service::service_fn};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use log::{debug, error, info};
use tokio::net::TcpListener;

use acproxy_bridge::ProxyRequest;
use acproxy_provider::{Provider, ProviderStats};

pub mod retry;
pub mod router;
pub mod statistics;

pub use retry::{RetryPolicy, forward_with_retry};
pub use router::{Route, STATES_PATH, STATISTICS_PATH};
pub use statistics::{RequestRecord, Statistics, StatisticsSnapshot};

use retry::simple_response;

const NO_PROVIDER: &str = "cannot find corresponding proxy provider\n";

pub struct ProxyServer {
    providers: Vec<Arc<dyn Provider>>,
    retry: RetryPolicy,
    statistics: Statistics,
}

impl ProxyServer {
    pub fn new(providers: Vec<Arc<dyn Provider>>, retry: RetryPolicy, recent_requests: usize) -> Self {
        Self {
            providers,
            retry,
            statistics: Statistics::new(recent_requests),
        }
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Serves one inbound request. Diagnostics endpoints are not counted.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        let provider = match router::route(&self.providers, req.uri().path()) {
            Route::States => return self.states(),
            Route::Statistics => return self.statistics_response(),
            Route::Provider(provider) => Some(provider.clone()),
            Route::Unmatched => None,
        };

        let started = Instant::now();
        let method = req.method().to_string();
        let path = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| req.uri().authority().map(|a| a.as_str()))
            .unwrap_or_default()
            .to_string();

        let response = match provider {
            Some(provider) => self.proxy(provider.as_ref(), req).await,
            None => simple_response(StatusCode::NOT_FOUND, NO_PROVIDER),
        };

        let status = response.status();
        let latency_ms = started.elapsed().as_millis() as u64;
        debug!("{} {} -> {} in {}ms", method, path, status.as_u16(), latency_ms);
        self.statistics.record(RequestRecord {
            method,
            host,
            path,
            status_code: status.as_u16(),
            status: status.canonical_reason().unwrap_or_default().to_string(),
            latency_ms,
        });
        response
    }

    async fn proxy<B>(&self, provider: &dyn Provider, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        let (parts, body) = req.into_parts();
        // Buffered once so every retry resends the same bytes.
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                return simple_response(
                    StatusCode::BAD_REQUEST,
                    format!("failed to read request body: {err}\n"),
                );
            }
        };

        let request = ProxyRequest::new(parts.method, parts.uri, parts.headers, body);
        forward_with_retry(provider, &request, self.retry).await
    }

    fn states(&self) -> Response<Full<Bytes>> {
        let states: BTreeMap<&'static str, ProviderStats> = self
            .providers
            .iter()
            .map(|provider| (provider.kind().name(), provider.stats()))
            .collect();
        json_response(serde_json::to_vec(&states))
    }

    fn statistics_response(&self) -> Response<Full<Bytes>> {
        json_response(serde_json::to_vec(&self.statistics.snapshot()))
    }

    /// Accepts connections until `shutdown` resolves.
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Proxy listening on {}", listener.local_addr()?);

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = &mut shutdown => {
                    info!("Shutting down proxy listener");
                    return Ok(());
                }
            };

            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(err) => {
                    error!("Failed to accept connection: {err}");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            };

            let server = self.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let server = server.clone();
                    async move { Ok::<_, Infallible>(server.handle(req).await) }
                });

                let builder = auto::Builder::new(TokioExecutor::new());
                if let Err(err) = builder
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!("Connection from {peer} ended: {err}");
                }
            });
        }
    }
}

fn json_response(encoded: serde_json::Result<Vec<u8>>) -> Response<Full<Bytes>> {
    match encoded {
        Ok(body) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("application/json"),
            );
            response
        }
        Err(err) => {
            error!("Failed to encode diagnostics: {err}");
            simple_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error\n")
        }
    }
}
