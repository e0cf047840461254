//! Transport abstraction.
//!
//! The `Transport` trait decouples the facade from the HTTP stack so tests can
//! script backend behavior. Implementations report network-level problems as
//! `UnityError::Transport` and hand back every HTTP answer, success or not,
//! as a [`TransportResponse`]; classifying status codes is the facade's job.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, UnityError};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Raw HTTP answer from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Contract for backend transports.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// POST a JSON body.
    ///
    /// # Errors
    /// `UnityError::Transport` when no HTTP answer was received (DNS, TLS,
    /// connection reset, timeout).
    async fn post_json(
        &self,
        url: &str,
        api_key: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse>;

    /// GET a JSON resource.
    async fn get_json(&self, url: &str, api_key: &str) -> Result<TransportResponse>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UnityError::Transport(format!("client build failed: {e}")))?;
        Ok(Self { client })
    }

    async fn finish(response: reqwest::Response) -> Result<TransportResponse> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| UnityError::Transport(format!("reading response body failed: {e}")))?;
        debug!(status, bytes = body.len(), "backend responded");
        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        api_key: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse> {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .json(body)
            .send()
            .await
            .map_err(request_error)?;
        Self::finish(response).await
    }

    async fn get_json(&self, url: &str, api_key: &str) -> Result<TransportResponse> {
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(request_error)?;
        Self::finish(response).await
    }
}

fn request_error(e: reqwest::Error) -> UnityError {
    if e.is_timeout() {
        UnityError::Transport(format!("request timed out: {e}"))
    } else {
        UnityError::Transport(format!("request failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range_is_2xx() {
        assert!(TransportResponse::new(200, "").is_success());
        assert!(TransportResponse::new(204, "").is_success());
        assert!(!TransportResponse::new(301, "").is_success());
        assert!(!TransportResponse::new(429, "").is_success());
    }

    #[tokio::test]
    async fn unreachable_host_maps_to_transport_error() {
        let transport = HttpTransport::new(Duration::from_millis(500)).expect("client");
        let err = transport
            .get_json("http://127.0.0.1:9/unreachable", "key")
            .await
            .expect_err("nothing listens on the discard port");
        assert!(matches!(err, UnityError::Transport(_)));
    }
}
