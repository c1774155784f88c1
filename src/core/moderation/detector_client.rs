// Detector client - translates a moderation request into the content analysis
// protocol and the reply back into typed results.
//
// The network is behind the `HttpTransport` port so this module stays free of
// any particular HTTP library. `infra::http` holds the reqwest implementation.
//
// **Protocol:**
// - POST `{endpoint}/contentsafety/{text|image}:analyze?api-version=2024-09-01`
// - Auth: `Ocp-Apim-Subscription-Key` header
// - Errors come back as `{"error": {"code": ..., "message": ...}}`

use super::moderation_models::{
    DetectionErrorResponse, DetectionRequest, DetectionResult, ImageContent,
    ImageDetectionResult, MediaType, ModerationError, TextDetectionResult, API_VERSION,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

// ============================================================================
// TRANSPORT (PORT)
// ============================================================================

/// Failure to get any HTTP response at all.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("HTTP error: {0}")]
    Other(String),
}

/// Status plus raw body. `body` is `None` when the transport could not read one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Option<Vec<u8>>,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: Some(body.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Minimal HTTP surface the moderation pipeline needs.
///
/// Implementations must be stateless per call; one instance is shared by every
/// concurrent moderation request.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST a JSON payload with the given extra headers.
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        payload: String,
    ) -> Result<HttpReply, TransportError>;

    /// GET a resource (used to download images by URL).
    async fn get(&self, url: &str) -> Result<HttpReply, TransportError>;
}

// ============================================================================
// CLIENT
// ============================================================================

/// Stateless client for the content analysis API. Safe to share across tasks.
pub struct ContentSafetyClient<T: HttpTransport> {
    endpoint: String,
    subscription_key: String,
    transport: Arc<T>,
}

impl<T: HttpTransport> ContentSafetyClient<T> {
    pub fn new(
        endpoint: impl Into<String>,
        subscription_key: impl Into<String>,
        transport: Arc<T>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            subscription_key: subscription_key.into(),
            transport,
        }
    }

    pub fn build_endpoint(&self, media_type: MediaType) -> String {
        format!(
            "{}/contentsafety/{}?api-version={}",
            self.endpoint.trim_end_matches('/'),
            media_type.analyze_path(),
            API_VERSION
        )
    }

    /// `content` must already be base64 for images.
    pub fn build_request_body(
        media_type: MediaType,
        content: &str,
        blocklist_names: &[String],
    ) -> DetectionRequest {
        match media_type {
            MediaType::Text => DetectionRequest::Text {
                text: content.to_string(),
                blocklist_names: blocklist_names.to_vec(),
            },
            MediaType::Image => DetectionRequest::Image {
                image: ImageContent {
                    content: content.to_string(),
                },
            },
        }
    }

    /// Parse a success body with the schema for `media_type`.
    /// A literal `null` body yields `Ok(None)`.
    pub fn parse_detection_result(
        media_type: MediaType,
        body: &str,
    ) -> Result<Option<DetectionResult>, serde_json::Error> {
        match media_type {
            MediaType::Text => serde_json::from_str::<Option<TextDetectionResult>>(body)
                .map(|r| r.map(DetectionResult::Text)),
            MediaType::Image => serde_json::from_str::<Option<ImageDetectionResult>>(body)
                .map(|r| r.map(DetectionResult::Image)),
        }
    }

    /// Run one analysis round trip. No retries.
    pub async fn detect(
        &self,
        media_type: MediaType,
        content: &str,
        blocklist_names: &[String],
    ) -> Result<DetectionResult, ModerationError> {
        let url = self.build_endpoint(media_type);
        let request = Self::build_request_body(media_type, content, blocklist_names);
        let payload = serde_json::to_string(&request).map_err(|e| {
            ModerationError::InvalidArgument(format!("Unserializable request body: {}", e))
        })?;

        debug!(
            %media_type,
            %url,
            payload_len = payload.len(),
            "Sending content analysis request"
        );

        let reply = self
            .transport
            .post_json(
                &url,
                &[(SUBSCRIPTION_KEY_HEADER, self.subscription_key.as_str())],
                payload,
            )
            .await?;
        let status = reply.status;
        debug!(status, "Received content analysis response");

        let Some(body) = reply.text() else {
            error!(status, "Content analysis response body is null");
            return Err(ModerationError::Detection {
                code: status.to_string(),
                message: "Response body is null.".to_string(),
            });
        };

        if !reply.is_success() {
            return Err(Self::parse_error_response(status, &body));
        }

        match Self::parse_detection_result(media_type, &body) {
            Ok(Some(result)) => {
                debug!(%media_type, "Parsed content analysis result");
                Ok(result)
            }
            Ok(None) => {
                error!(status, body = %body, "Content analysis result is null");
                Err(ModerationError::Detection {
                    code: status.to_string(),
                    message: format!("HttpResponse is null. Response text is {}", body),
                })
            }
            Err(source) => {
                error!(status, error = %source, "Failed to parse content analysis result");
                Err(ModerationError::MalformedResponse { source, body })
            }
        }
    }

    /// Turn a non-2xx body into a `Detection` error. Bodies that are not a
    /// complete error envelope keep the raw status and embed the text.
    fn parse_error_response(status: u16, body: &str) -> ModerationError {
        let envelope = serde_json::from_str::<DetectionErrorResponse>(body)
            .ok()
            .and_then(|response| response.error);

        match envelope {
            Some(err) if err.code.is_some() && err.message.is_some() => {
                error!(
                    status,
                    code = ?err.code,
                    message = ?err.message,
                    target = ?err.target,
                    innererror = ?err.innererror,
                    "Content analysis API returned an error"
                );
                ModerationError::Detection {
                    code: err.code.unwrap_or_default(),
                    message: err.message.unwrap_or_default(),
                }
            }
            _ => {
                error!(status, body = %body, "Failed to parse content analysis error response");
                ModerationError::Detection {
                    code: status.to_string(),
                    message: format!("Error is null. Response text is {}", body),
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::moderation_models::{Category, CategoryAnalysis, ErrorKind};
    use crate::core::moderation::test_support::{MockTransport, TEST_ENDPOINT, TEST_KEY};

    fn client(transport: &Arc<MockTransport>) -> ContentSafetyClient<MockTransport> {
        ContentSafetyClient::new(TEST_ENDPOINT, TEST_KEY, Arc::clone(transport))
    }

    #[test]
    fn test_build_endpoint_per_media_type() {
        let transport = Arc::new(MockTransport::new());
        let client = client(&transport);

        assert_eq!(
            client.build_endpoint(MediaType::Text),
            "https://cs.example.com/contentsafety/text:analyze?api-version=2024-09-01"
        );
        assert_eq!(
            client.build_endpoint(MediaType::Image),
            "https://cs.example.com/contentsafety/image:analyze?api-version=2024-09-01"
        );
    }

    #[test]
    fn test_build_endpoint_trims_trailing_slash() {
        let transport = Arc::new(MockTransport::new());
        let client = ContentSafetyClient::new("https://cs.example.com/", TEST_KEY, transport);

        assert_eq!(
            client.build_endpoint(MediaType::Text),
            "https://cs.example.com/contentsafety/text:analyze?api-version=2024-09-01"
        );
    }

    #[test]
    fn test_image_body_keeps_base64_verbatim() {
        let request =
            ContentSafetyClient::<MockTransport>::build_request_body(MediaType::Image, "QUJD", &[]);

        assert_eq!(
            request,
            DetectionRequest::Image {
                image: ImageContent {
                    content: "QUJD".to_string()
                }
            }
        );
    }

    #[tokio::test]
    async fn test_detect_text_success() {
        let transport = Arc::new(MockTransport::new());
        transport.reply_json(
            &transport.text_url(),
            200,
            serde_json::json!({
                "categoriesAnalysis": [
                    {"category": "Hate", "severity": 2},
                    {"category": "SelfHarm", "severity": 0},
                    {"category": "Sexual", "severity": 0},
                    {"category": "Violence", "severity": 0}
                ],
                "blocklistsMatch": []
            }),
        );

        let result = client(&transport)
            .detect(MediaType::Text, "hello", &["profanity".to_string()])
            .await
            .unwrap();

        assert_eq!(result.media_type(), MediaType::Text);
        assert_eq!(
            result.categories_analysis().unwrap()[0],
            CategoryAnalysis::new(Category::Hate, 2)
        );

        // The request carried the key header and the text payload
        let sent = transport.last_post(&transport.text_url()).unwrap();
        assert_eq!(sent.subscription_key.as_deref(), Some(TEST_KEY));
        let payload: serde_json::Value = serde_json::from_str(&sent.payload).unwrap();
        assert_eq!(
            payload,
            serde_json::json!({"text": "hello", "blocklistNames": ["profanity"]})
        );
    }

    #[tokio::test]
    async fn test_detect_image_success() {
        let transport = Arc::new(MockTransport::new());
        transport.reply_json(
            &transport.image_url(),
            200,
            serde_json::json!({"categoriesAnalysis": [{"category": "Sexual", "severity": 6}]}),
        );

        let result = client(&transport)
            .detect(MediaType::Image, "QUJD", &[])
            .await
            .unwrap();

        assert_eq!(result.media_type(), MediaType::Image);
        let sent = transport.last_post(&transport.image_url()).unwrap();
        assert_eq!(sent.payload, r#"{"image":{"content":"QUJD"}}"#);
    }

    #[tokio::test]
    async fn test_detect_structured_error() {
        let transport = Arc::new(MockTransport::new());
        transport.reply_json(
            &transport.text_url(),
            401,
            serde_json::json!({"error": {"code": "Unauthorized", "message": "bad key"}}),
        );

        let err = client(&transport)
            .detect(MediaType::Text, "hello", &[])
            .await
            .unwrap_err();

        match err {
            ModerationError::Detection { code, message } => {
                assert_eq!(code, "Unauthorized");
                assert_eq!(message, "bad key");
            }
            other => panic!("expected detection error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_detect_error_without_code_keeps_status() {
        let transport = Arc::new(MockTransport::new());
        transport.reply(
            &transport.text_url(),
            HttpReply::new(500, r#"{"error": {"message": "boom"}}"#),
        );

        let err = client(&transport)
            .detect(MediaType::Text, "hello", &[])
            .await
            .unwrap_err();

        match err {
            ModerationError::Detection { code, message } => {
                assert_eq!(code, "500");
                assert!(message.starts_with("Error is null. Response text is"));
                assert!(message.contains("boom"));
            }
            other => panic!("expected detection error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_detect_error_with_unparsable_body() {
        let transport = Arc::new(MockTransport::new());
        transport.reply(&transport.text_url(), HttpReply::new(503, "Service Unavailable"));

        let err = client(&transport)
            .detect(MediaType::Text, "hello", &[])
            .await
            .unwrap_err();

        match err {
            ModerationError::Detection { code, message } => {
                assert_eq!(code, "503");
                assert!(message.contains("Service Unavailable"));
            }
            other => panic!("expected detection error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_detect_missing_body() {
        let transport = Arc::new(MockTransport::new());
        transport.reply(
            &transport.text_url(),
            HttpReply {
                status: 200,
                body: None,
            },
        );

        let err = client(&transport)
            .detect(MediaType::Text, "hello", &[])
            .await
            .unwrap_err();

        match err {
            ModerationError::Detection { code, message } => {
                assert_eq!(code, "200");
                assert_eq!(message, "Response body is null.");
            }
            other => panic!("expected detection error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_detect_null_result() {
        let transport = Arc::new(MockTransport::new());
        transport.reply(&transport.image_url(), HttpReply::new(200, "null"));

        let err = client(&transport)
            .detect(MediaType::Image, "QUJD", &[])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Detection);
        assert!(err.to_string().contains("HttpResponse is null"));
    }

    #[tokio::test]
    async fn test_detect_malformed_success_body() {
        let transport = Arc::new(MockTransport::new());
        transport.reply(&transport.text_url(), HttpReply::new(200, "<html>oops</html>"));

        let err = client(&transport)
            .detect(MediaType::Text, "hello", &[])
            .await
            .unwrap_err();

        match err {
            ModerationError::MalformedResponse { body, .. } => {
                assert_eq!(body, "<html>oops</html>")
            }
            other => panic!("expected malformed response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_detect_transport_failure() {
        let transport = Arc::new(MockTransport::new());
        transport.fail(&transport.text_url(), "connection refused");

        let err = client(&transport)
            .detect(MediaType::Text, "hello", &[])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(transport.post_count(&transport.text_url()), 1);
    }
}
