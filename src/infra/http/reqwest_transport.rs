use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::warn;

use crate::core::moderation::{HttpReply, HttpTransport, TransportError};

/// `HttpTransport` backed by one shared reqwest `Client`.
///
/// The client pools connections internally; build it once at startup and hand
/// the same instance (behind an `Arc`) to every service.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// `timeout` caps each request end to end. `None` keeps reqwest's default.
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self { client })
    }

    fn map_error(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }

    /// A body that fails mid-read is reported as missing rather than as a
    /// transport failure; the status line already arrived.
    async fn into_reply(response: Response) -> HttpReply {
        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                warn!(status, error = %e, "Failed to read response body");
                None
            }
        };

        HttpReply { status, body }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        payload: String,
    ) -> Result<HttpReply, TransportError> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.body(payload).send().await.map_err(Self::map_error)?;
        Ok(Self::into_reply(response).await)
    }

    async fn get(&self, url: &str) -> Result<HttpReply, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Self::map_error)?;
        Ok(Self::into_reply(response).await)
    }
}
