//! HTTP client for the upstream event service.
//!
//! # Responsibilities
//! - Resolve upstream paths against the configured base URL
//! - Send JSON requests over a pooled connection
//! - Classify every failure as an `UpstreamError`

use axum::body::Body;
use axum::http::{header, Method, Request, Response, Uri};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::UpstreamConfig;
use crate::upstream::error::UpstreamError;

/// Client bound to one upstream base URL. Cheap to clone; clones share the
/// connection pool.
#[derive(Clone)]
pub struct UpstreamClient {
    base_url: Url,
    client: Client<HttpConnector, Body>,
    max_body_bytes: usize,
}

impl UpstreamClient {
    /// Create a client for the upstream described by `config`.
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            UpstreamError::Request(format!("invalid base URL '{}': {}", config.base_url, e))
        })?;
        if base_url.scheme() != "http" || base_url.cannot_be_a_base() {
            return Err(UpstreamError::Request(format!(
                "base URL '{}' must be an http URL",
                config.base_url
            )));
        }

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            base_url,
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET` the path made of `segments` and decode the JSON response.
    pub async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, UpstreamError> {
        let request = self.request(Method::GET, segments, None)?;
        self.send(request).await
    }

    /// `POST` `body` as JSON to the path made of `segments` and decode the
    /// JSON response.
    pub async fn post_json<B, T>(&self, segments: &[&str], body: &B) -> Result<T, UpstreamError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)?;
        let request = self.request(Method::POST, segments, Some(payload))?;
        self.send(request).await
    }

    /// Append `segments` to the base path, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Uri, UpstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::Request(format!("'{}' cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);

        url.as_str()
            .parse::<Uri>()
            .map_err(|e| UpstreamError::Request(format!("invalid URI '{}': {}", url, e)))
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        json: Option<Vec<u8>>,
    ) -> Result<Request<Body>, UpstreamError> {
        let builder = Request::builder()
            .method(method)
            .uri(self.endpoint(segments)?)
            .header(header::ACCEPT, "application/json");

        let request = match json {
            Some(payload) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload)),
            None => builder.body(Body::empty()),
        };
        request.map_err(|e| UpstreamError::Request(e.to_string()))
    }

    async fn send<T: DeserializeOwned>(&self, request: Request<Body>) -> Result<T, UpstreamError> {
        let method = request.method().clone();
        let uri = request.uri().clone();

        let response: Response<Incoming> = self.client.request(request).await.map_err(|e| {
            tracing::debug!(method = %method, uri = %uri, error = %e, "Upstream unreachable");
            UpstreamError::from(e)
        })?;

        let status = response.status();
        let bytes = axum::body::to_bytes(Body::new(response.into_body()), self.max_body_bytes)
            .await
            .map_err(UpstreamError::Body)?;

        if !status.is_success() {
            tracing::debug!(method = %method, uri = %uri, status = %status, "Upstream returned error status");
            return Err(UpstreamError::from_response(status, &bytes));
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> UpstreamClient {
        UpstreamClient::new(&UpstreamConfig {
            base_url: base_url.to_string(),
            ..UpstreamConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let uri = client("http://events.local:3001").endpoint(&["getUserById", "42"]).unwrap();
        assert_eq!(uri.to_string(), "http://events.local:3001/getUserById/42");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let uri = client("http://events.local/api/v1/").endpoint(&["getEvents"]).unwrap();
        assert_eq!(uri.path(), "/api/v1/getEvents");
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let uri = client("http://events.local").endpoint(&["getUserById", "a/b c"]).unwrap();
        assert_eq!(uri.path(), "/getUserById/a%2Fb%20c");
    }

    #[test]
    fn test_rejects_non_http_base() {
        let config = UpstreamConfig {
            base_url: "https://events.local".to_string(),
            ..UpstreamConfig::default()
        };
        assert!(matches!(UpstreamClient::new(&config), Err(UpstreamError::Request(_))));
    }

    async fn serve(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_response_body_is_decoded_or_classified() {
        use axum::{http::StatusCode, routing::get, Json};
        use serde_json::{json, Value};

        let base = serve(
            axum::Router::new()
                .route("/ok", get(|| async { Json(json!({"id": 1})) }))
                .route("/big", get(|| async { "x".repeat(64) }))
                .route("/gone", get(|| async { (StatusCode::NOT_FOUND, "no such user") })),
        )
        .await;
        let upstream = UpstreamClient::new(&UpstreamConfig {
            base_url: base,
            max_body_bytes: 32,
            ..UpstreamConfig::default()
        })
        .unwrap();

        let value: Value = upstream.get_json(&["ok"]).await.unwrap();
        assert_eq!(value, json!({"id": 1}));

        let err = upstream.get_json::<Value>(&["big"]).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Body(_)), "got {err:?}");

        let err = upstream.get_json::<Value>(&["gone"]).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
