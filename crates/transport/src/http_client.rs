use http::{HeaderMap, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper::body::Bytes;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;

use crate::pool::PoolError;

/// A backend reply with its body fully read.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl BackendClient {
    pub fn new() -> Self {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(http);

        Self { client }
    }

    /// Performs the round trip and drains the body so the connection can be reused.
    pub async fn send(&self, req: Request<Full<Bytes>>) -> Result<BackendResponse, PoolError> {
        let response = self.client.request(req).await?;
        let (parts, body) = response.into_parts();
        let body = body.collect().await?.to_bytes();

        Ok(BackendResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

impl Default for BackendClient {
    fn default() -> Self {
        Self::new()
    }
}
