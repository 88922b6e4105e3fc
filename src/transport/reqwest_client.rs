//! Reqwest-based implementation of the [`Transport`] trait.
//!
//! A thin adapter around `reqwest::Client`; reqwest 0.12 shares the `http`
//! crate's header and method types, so requests pass through without
//! conversion.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{Transport, TransportError, TransportRequest, TransportResponse};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Reqwest-backed transport used for real calls to adventofcode.com.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|err| TransportError::Transport(err.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client, keeping its timeouts and proxy
    /// settings.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::Transport(err.to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|err| TransportError::Transport(err.to_string()))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
