//! Transport contract consumed by the broker.
//!
//! The broker treats requests as opaque descriptors: it only needs to execute
//! them and read back a status code and body. The [`Transport`] trait is the
//! seam between the worker and the concrete HTTP client, which also makes the
//! broker testable without a network.

pub mod reqwest_client;

use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use thiserror::Error;
use url::Url;

pub use reqwest_client::ReqwestTransport;

/// Errors raised while executing a transport request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http transport error: {0}")]
    Transport(String),
    #[error("failed to convert header '{0}'")]
    InvalidHeader(String),
}

/// Opaque outbound request descriptor.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl TransportRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn post(url: Url, body: String) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Status code and body read back from the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

/// Contract that abstracts the underlying HTTP transport.
///
/// Implementations perform exactly one synchronous exchange per call; all
/// pacing and serialization happens in the broker above this seam.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{CONTENT_TYPE, COOKIE};

    #[test]
    fn get_builder_defaults() {
        let url = Url::parse("https://adventofcode.com/2015/day/1/input").unwrap();
        let request = TransportRequest::get(url.clone());
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.url, url);
        assert!(request.headers.is_empty());
        assert!(request.body.is_none());
    }

    #[test]
    fn post_builder_carries_body_and_headers() {
        let url = Url::parse("https://adventofcode.com/2015/day/1/answer").unwrap();
        let request = TransportRequest::post(url, "level=1&answer=42".to_string())
            .with_header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .with_header(COOKIE, HeaderValue::from_static("session=abc"));

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body.as_deref(), Some("level=1&answer=42"));
        assert_eq!(
            request.headers.get(CONTENT_TYPE).unwrap(),
            "application/x-www-form-urlencoded"
        );
        assert_eq!(request.headers.get(COOKIE).unwrap(), "session=abc");
    }
}
