//! # OffKit Net
//!
//! The network boundary for the OffKit offline-support worker.
//!
//! ## Design Goals
//!
//! 1. **Trait seam**: the worker talks to [`Network`], never to a concrete
//!    client, so tests can script failures and offline states
//! 2. **Cache-bypass fetches**: [`FetchMode::Reload`] forces revalidation
//!    against origin, ignoring intermediate HTTP caches
//! 3. **Whole-body responses**: cache entries store complete bodies, so
//!    [`Response`] carries `Bytes`, not a stream

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Errors that can occur at the network boundary.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Unique identifier for a request, for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// An outgoing request as seen by the fetch interceptor.
///
/// Bodies are deliberately absent: the worker only ever issues GET fetches
/// of its own, and requests it does not intercept pass through untouched.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: RequestId,
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    /// Whether this is a page navigation (top-level document load).
    pub is_navigation: bool,
}

impl Request {
    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a request with an arbitrary method.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            id: RequestId::new(),
            url,
            method,
            headers: HeaderMap::new(),
            is_navigation: false,
        }
    }

    /// Mark this request as a page navigation.
    pub fn navigation(mut self) -> Self {
        self.is_navigation = true;
        self
    }
}

/// Cache semantics for an outgoing fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Normal fetch; intermediate HTTP caches may answer.
    #[default]
    Default,
    /// Force a full reload from origin, bypassing intermediate caches.
    Reload,
}

/// Add the cache-bypassing headers implied by [`FetchMode::Reload`].
pub fn apply_reload_headers(headers: &mut HeaderMap) {
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
}

/// A complete HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL after any redirects.
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Whether one or more redirects were followed.
    pub redirected: bool,
}

impl Response {
    /// Create a plain-text response, e.g. a synthesized failure.
    pub fn text(url: Url, status: StatusCode, body: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain"),
        );
        Self {
            url,
            status,
            headers,
            body: Bytes::from(body.into()),
            redirected: false,
        }
    }

    /// Check if the status is 2xx.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }
}

/// The network collaborator the worker fetches through.
///
/// A fetch either yields a well-formed [`Response`] (any status) or fails
/// with a [`NetError`] (connection-level failure). The worker's strategies
/// are built on exactly that distinction.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request, mode: FetchMode) -> Result<Response, NetError>;
}

/// [`Network`] implementation over a shared `reqwest` client.
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    /// Create a network with the given user agent.
    pub fn new(user_agent: &str) -> Result<Self, NetError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| NetError::RequestFailed(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request, mode: FetchMode) -> Result<Response, NetError> {
        let mut headers = request.headers.clone();
        if mode == FetchMode::Reload {
            apply_reload_headers(&mut headers);
        }

        debug!(id = request.id.raw(), url = %request.url, mode = ?mode, "fetching");

        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(headers)
            .send()
            .await?;

        let final_url = response.url().clone();
        let redirected = final_url != request.url;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(Response {
            url: final_url,
            status,
            headers,
            body,
            redirected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_request_get() {
        let req = Request::get(Url::parse("https://shop.example/page").unwrap());
        assert_eq!(req.method, Method::GET);
        assert!(!req.is_navigation);
    }

    #[test]
    fn test_request_navigation() {
        let req = Request::get(Url::parse("https://shop.example/").unwrap()).navigation();
        assert!(req.is_navigation);
    }

    #[test]
    fn test_request_id_unique() {
        let a = Request::get(Url::parse("https://shop.example/").unwrap());
        let b = Request::get(Url::parse("https://shop.example/").unwrap());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_reload_headers() {
        let mut headers = HeaderMap::new();
        apply_reload_headers(&mut headers);
        assert_eq!(headers.get(http::header::CACHE_CONTROL).unwrap(), "no-cache");
        assert_eq!(headers.get(http::header::PRAGMA).unwrap(), "no-cache");
    }

    #[test]
    fn test_response_text() {
        let url = Url::parse("https://shop.example/api").unwrap();
        let resp = Response::text(url, StatusCode::REQUEST_TIMEOUT, "Network error");
        assert_eq!(resp.status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            resp.headers.get(http::header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        assert_eq!(&resp.body[..], b"Network error");
        assert!(!resp.ok());
    }

    #[tokio::test]
    async fn test_http_network_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hi"))
            .mount(&server)
            .await;

        let net = HttpNetwork::new("offkit-test/0.1").unwrap();
        let url = Url::parse(&format!("{}/hello", server.uri())).unwrap();
        let resp = net
            .fetch(&Request::get(url), FetchMode::Default)
            .await
            .unwrap();

        assert_eq!(resp.status, StatusCode::OK);
        assert!(!resp.redirected);
        assert_eq!(&resp.body[..], b"hi");
    }

    #[tokio::test]
    async fn test_http_network_reload_sends_no_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/manifest.webmanifest"))
            .and(header("cache-control", "no-cache"))
            .and(header("pragma", "no-cache"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let net = HttpNetwork::new("offkit-test/0.1").unwrap();
        let url = Url::parse(&format!("{}/manifest.webmanifest", server.uri())).unwrap();
        let resp = net
            .fetch(&Request::get(url), FetchMode::Reload)
            .await
            .unwrap();

        assert_eq!(resp.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_http_network_connection_error() {
        // Nothing listens on this port.
        let net = HttpNetwork::new("offkit-test/0.1").unwrap();
        let url = Url::parse("http://127.0.0.1:9/down").unwrap();
        let result = net.fetch(&Request::get(url), FetchMode::Default).await;
        assert!(matches!(result, Err(NetError::HttpError(_))));
    }
}
