use std::time::Duration;

use bytes::Bytes;
use http::{Response, StatusCode, header};
use http_body_util::Full;
use log::{debug, warn};

use acproxy_bridge::{ProxyRequest, forward::is_hop_header};
use acproxy_config::config::GlobalConfig;
use acproxy_provider::{Provider, ProxyError};
use acproxy_transport::BackendResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(global: &GlobalConfig) -> Self {
        Self {
            attempts: global.retry_attempts,
            delay: global.retry_delay(),
        }
    }
}

/// Calls `provider` until it yields a status below 400 or the attempts run
/// out, sleeping `delay` between attempts. The client gets the outcome of
/// the last attempt.
pub async fn forward_with_retry(
    provider: &dyn Provider,
    request: &ProxyRequest,
    policy: RetryPolicy,
) -> Response<Full<Bytes>> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        let failure = match provider.proxy(request).await {
            Ok(response) if response.status.as_u16() < 400 => return backend_response(response),
            other => other,
        };

        if attempt >= attempts {
            warn!(
                "Request {} still failed after retrying {} times.",
                request.path_and_query(),
                attempts
            );
            return match failure {
                Ok(response) => backend_response(response),
                Err(err) => error_response(&err),
            };
        }

        match &failure {
            Ok(response) => debug!(
                "Attempt {}/{} for {} got status {}",
                attempt,
                attempts,
                request.path_and_query(),
                response.status
            ),
            Err(err) => debug!(
                "Attempt {}/{} for {} failed: {}",
                attempt,
                attempts,
                request.path_and_query(),
                err
            ),
        }

        attempt += 1;
        tokio::time::sleep(policy.delay).await;
    }
}

pub fn error_status(err: &ProxyError) -> StatusCode {
    match err {
        ProxyError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ProxyError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        ProxyError::Bridge(_) | ProxyError::Upstream(_) => StatusCode::BAD_REQUEST,
    }
}

fn error_response(err: &ProxyError) -> Response<Full<Bytes>> {
    simple_response(error_status(err), format!("{err}\n"))
}

pub fn simple_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn backend_response(backend: BackendResponse) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(backend.body));
    *response.status_mut() = backend.status;

    let headers = response.headers_mut();
    for (name, value) in backend.headers.iter() {
        if is_hop_header(name.as_str()) || name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name, value.clone());
    }
    response
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::atomic::{AtomicU32, Ordering},
    };

    use async_trait::async_trait;
    use http::{HeaderMap, Method, Uri};
    use http_body_util::BodyExt;
    use parking_lot::Mutex;

    use acproxy_provider::{ProviderKind, ProviderStats};
    use acproxy_transport::PoolError;

    use super::*;

    type Scripted = Result<BackendResponse, ProxyError>;

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Ok,
        NotFound,
        ServerError,
        Unavailable,
        Timeout,
        Transport,
    }

    impl Step {
        fn outcome(self) -> Scripted {
            match self {
                Step::Ok => status(200, "listing"),
                Step::NotFound => status(404, "FileNotFoundException"),
                Step::ServerError => status(500, "StandbyException"),
                Step::Unavailable => Err(ProxyError::Unavailable(ProviderKind::Hdfs)),
                Step::Timeout => Err(ProxyError::Timeout("/webhdfs/v1/tmp".to_string())),
                Step::Transport => Err(ProxyError::Upstream(PoolError::Closed)),
            }
        }
    }

    /// Replays scripted outcomes; the last one repeats forever.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Step>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Step>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Hdfs
        }

        async fn proxy(&self, _request: &ProxyRequest) -> Result<BackendResponse, ProxyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut script = self.script.lock();
                if script.len() > 1 {
                    script.pop_front()
                } else {
                    script.front().copied()
                }
            };
            next.unwrap_or(Step::Unavailable).outcome()
        }

        fn stats(&self) -> ProviderStats {
            acproxy_discovery::AvailabilityState::Available.into()
        }
    }

    fn status(code: u16, body: &'static str) -> Scripted {
        let mut headers = HeaderMap::new();
        headers.insert("x-backend", header::HeaderValue::from_static("nn1"));
        headers.insert(header::CONNECTION, header::HeaderValue::from_static("close"));
        Ok(BackendResponse {
            status: StatusCode::from_u16(code).unwrap(),
            headers,
            body: Bytes::from_static(body.as_bytes()),
        })
    }

    fn request() -> ProxyRequest {
        ProxyRequest::new(
            Method::GET,
            Uri::from_static("/webhdfs/v1/tmp?op=LISTSTATUS"),
            HeaderMap::new(),
            Bytes::new(),
        )
    }

    fn policy(attempts: u32, delay_ms: u64) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::from_millis(delay_ms),
        }
    }

    async fn body(response: Response<Full<Bytes>>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn first_success_is_written_through() {
        let provider = ScriptedProvider::new(vec![Step::Ok]);
        let response = forward_with_retry(&provider, &request(), policy(5, 1)).await;

        assert_eq!(provider.calls(), 1);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-backend"], "nn1");
        assert!(response.headers().get(header::CONNECTION).is_none());
        assert_eq!(body(response).await, Bytes::from_static(b"listing"));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let provider = ScriptedProvider::new(vec![Step::Unavailable, Step::ServerError, Step::Ok]);
        let response = forward_with_retry(&provider, &request(), policy(5, 1)).await;

        assert_eq!(provider.calls(), 3);
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unavailable_exhausts_budget_with_delays() {
        let provider = ScriptedProvider::new(vec![Step::Unavailable]);
        let started = std::time::Instant::now();
        let response = forward_with_retry(&provider, &request(), policy(5, 20)).await;

        assert_eq!(provider.calls(), 5);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn last_backend_failure_is_surfaced_with_its_body() {
        let provider = ScriptedProvider::new(vec![Step::ServerError]);
        let response = forward_with_retry(&provider, &request(), policy(3, 1)).await;

        assert_eq!(provider.calls(), 3);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(response).await, Bytes::from_static(b"StandbyException"));
    }

    #[tokio::test]
    async fn final_response_matches_final_attempt() {
        let provider = ScriptedProvider::new(vec![Step::Unavailable, Step::NotFound]);
        let response = forward_with_retry(&provider, &request(), policy(2, 1)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let provider = ScriptedProvider::new(vec![Step::NotFound, Step::Timeout]);
        let response = forward_with_retry(&provider, &request(), policy(2, 1)).await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn transport_failure_without_response_is_bad_request() {
        let provider = ScriptedProvider::new(vec![Step::Transport]);
        let response = forward_with_retry(&provider, &request(), policy(1, 1)).await;

        assert_eq!(provider.calls(), 1);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let provider = ScriptedProvider::new(vec![Step::Ok]);
        forward_with_retry(&provider, &request(), policy(0, 1)).await;
        assert_eq!(provider.calls(), 1);
    }
}
