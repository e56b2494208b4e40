use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, Request, Uri, header};
use http_body_util::Full;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid uri: {0}")]
    InvalidUri(String),

    #[error("invalid header value for host {0}")]
    InvalidHost(String),

    #[error("request build error: {0}")]
    Build(#[from] http::Error),
}

pub fn is_hop_header(name: &str) -> bool {
    matches!(
        name,
        "connection"
            | "keep-alive"
            | "proxy-connection"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// An inbound request with its body already read, so it can be replayed
/// against the backend on every attempt.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
        }
    }

    /// Path plus query, `/` when the request carried neither.
    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .filter(|pq| !pq.is_empty())
            .unwrap_or("/")
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn host(&self) -> Option<&str> {
        self.uri
            .authority()
            .map(|authority| authority.as_str())
            .or_else(|| self.headers.get(header::HOST).and_then(|v| v.to_str().ok()))
    }
}

/// Rewrites `req` to target `backend` (`host:port`), keeping method, path,
/// query, end-to-end headers and body.
pub fn build_backend_request(
    backend: &str,
    req: &ProxyRequest,
) -> Result<Request<Full<Bytes>>, BridgeError> {
    let uri = format!("http://{}{}", backend, req.path_and_query());
    let uri = Uri::try_from(uri.as_str()).map_err(|_| BridgeError::InvalidUri(uri.clone()))?;

    let mut builder = Request::builder().method(req.method.clone()).uri(uri);

    for (name, value) in req.headers.iter() {
        if is_hop_header(name.as_str())
            || name == header::HOST
            || name == header::CONTENT_LENGTH
        {
            continue;
        }
        builder = builder.header(name, value);
    }

    let host =
        HeaderValue::from_str(backend).map_err(|_| BridgeError::InvalidHost(backend.to_string()))?;
    builder = builder.header(header::HOST, host);

    if !req.body.is_empty() {
        builder = builder.header(header::CONTENT_LENGTH, req.body.len());
    }

    Ok(builder.body(Full::new(req.body.clone()))?)
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    fn inbound(method: Method, uri: &str, body: &'static str) -> ProxyRequest {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("proxy.local:8080"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("x-request-id", HeaderValue::from_static("abc"));
        ProxyRequest::new(method, uri.parse().unwrap(), headers, Bytes::from_static(body.as_bytes()))
    }

    #[tokio::test]
    async fn rewrites_target_and_keeps_payload() {
        let req = inbound(Method::PUT, "/webhdfs/v1/tmp/f?op=CREATE&overwrite=true", "data");
        let out = build_backend_request("nn1:50070", &req).unwrap();

        assert_eq!(out.method(), Method::PUT);
        assert_eq!(
            out.uri().to_string(),
            "http://nn1:50070/webhdfs/v1/tmp/f?op=CREATE&overwrite=true"
        );
        assert_eq!(out.headers()[header::HOST], "nn1:50070");
        assert_eq!(out.headers()["x-request-id"], "abc");
        assert_eq!(out.headers()[header::CONTENT_LENGTH], "4");
        assert!(out.headers().get(header::CONNECTION).is_none());

        let body = out.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"data"));
    }

    #[test]
    fn empty_path_becomes_root() {
        let req = ProxyRequest::new(
            Method::GET,
            Uri::from_static("http://proxy.local"),
            HeaderMap::new(),
            Bytes::new(),
        );
        assert_eq!(req.path_and_query(), "/");
        let out = build_backend_request("nn1:50070", &req).unwrap();
        assert_eq!(out.uri().to_string(), "http://nn1:50070/");
        assert!(out.headers().get(header::CONTENT_LENGTH).is_none());
    }

    #[test]
    fn host_falls_back_to_header() {
        let req = inbound(Method::GET, "/webhdfs/v1/", "");
        assert_eq!(req.host(), Some("proxy.local:8080"));
    }

    #[test]
    fn hop_headers_are_recognised() {
        assert!(is_hop_header("transfer-encoding"));
        assert!(is_hop_header("upgrade"));
        assert!(!is_hop_header("content-type"));
    }
}
