// Moderation service - the entry point the rest of the system calls.
//
// This service:
// - Skips moderation entirely when the detector is not configured
// - Runs detect -> decide for text and images (bytes, base64 or URL)
// - Collapses every internal failure into one `ContentModerationError`
//
// A rejected verdict is `Ok(false)`, not an error.

use super::decision_engine::{default_reject_thresholds, make_decision};
use super::detector_client::{ContentSafetyClient, HttpTransport};
use super::moderation_models::{
    Decision, ErrorKind, MediaType, ModerationConfig, ModerationError, RejectThresholds,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

// ============================================================================
// ERRORS
// ============================================================================

/// Moderation could not reach a verdict. The internal failure, if any, is the source.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ContentModerationError {
    message: String,
    #[source]
    source: Option<ModerationError>,
}

impl ContentModerationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: ModerationError) -> Self {
        Self {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&ModerationError> {
        self.source.as_ref()
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.source.as_ref().map(ModerationError::kind)
    }

    /// Detector error code, when the failure was a structured detector error.
    pub fn detection_code(&self) -> Option<&str> {
        match &self.source {
            Some(ModerationError::Detection { code, .. }) => Some(code),
            _ => None,
        }
    }
}

// ============================================================================
// LISTING SCREENING
// ============================================================================

/// Outcome of screening a listing before anything is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingScreening {
    Accepted,
    RejectedImage,
    RejectedText,
}

impl fmt::Display for ListingScreening {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingScreening::Accepted => write!(f, "Accepted"),
            ListingScreening::RejectedImage => {
                write!(f, "Listing contains inappropriate image content")
            }
            ListingScreening::RejectedText => {
                write!(f, "Listing contains inappropriate text content")
            }
        }
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Moderation facade. Holds only immutable state, so one instance serves all tasks.
pub struct ModerationService<T: HttpTransport> {
    config: ModerationConfig,
    detector: ContentSafetyClient<T>,
    transport: Arc<T>,
    reject_thresholds: RejectThresholds,
}

impl<T: HttpTransport> ModerationService<T> {
    /// Create the facade. `transport` is shared with the detector client.
    pub fn new(config: ModerationConfig, transport: Arc<T>) -> Self {
        let detector = ContentSafetyClient::new(
            config.endpoint.clone(),
            config.subscription_key.clone(),
            Arc::clone(&transport),
        );

        Self {
            config,
            detector,
            transport,
            reject_thresholds: default_reject_thresholds(),
        }
    }

    /// Replace the default thresholds (4 on every category).
    pub fn with_reject_thresholds(mut self, reject_thresholds: RejectThresholds) -> Self {
        self.reject_thresholds = reject_thresholds;
        self
    }

    pub fn reject_thresholds(&self) -> &RejectThresholds {
        &self.reject_thresholds
    }

    /// True iff both endpoint and key are configured. Checked on every call.
    pub fn is_enabled(&self) -> bool {
        let enabled = self.config.is_enabled();
        if !enabled {
            debug!(
                endpoint_configured = !self.config.endpoint.is_empty(),
                key_configured = !self.config.subscription_key.is_empty(),
                "Content moderation disabled"
            );
        }
        enabled
    }

    /// Returns `Ok(true)` if the text is acceptable.
    pub async fn moderate_text(&self, text: &str) -> Result<bool, ContentModerationError> {
        if !self.is_enabled() {
            return Ok(true);
        }

        let decision = self
            .evaluate(MediaType::Text, text, &self.config.blocklist_names)
            .await
            .map_err(|e| {
                error!(error = %e, "Text moderation failed");
                ContentModerationError::with_source(
                    format!("Failed to moderate text content: {}", e),
                    e,
                )
            })?;

        Ok(decision.is_accepted())
    }

    /// Moderate an image that is already base64 encoded.
    pub async fn moderate_image_base64(
        &self,
        base64_image: &str,
    ) -> Result<bool, ContentModerationError> {
        debug!(base64_len = base64_image.len(), "Starting image moderation");

        if !self.is_enabled() {
            return Ok(true);
        }

        let decision = self
            .evaluate(MediaType::Image, base64_image, &[])
            .await
            .map_err(|e| {
                error!(error = %e, kind = ?e.kind(), "Image moderation failed");
                ContentModerationError::with_source(
                    format!("Failed to moderate image content: {}", e),
                    e,
                )
            })?;

        let accepted = decision.is_accepted();
        info!(
            "Image moderation {}",
            if accepted { "ACCEPTED" } else { "REJECTED" }
        );
        debug!(per_category = ?decision.action_by_category, "Image moderation decisions");
        Ok(accepted)
    }

    /// Moderate raw image bytes. Empty input has nothing to moderate and passes.
    pub async fn moderate_image_from_bytes(
        &self,
        image_bytes: &[u8],
    ) -> Result<bool, ContentModerationError> {
        if !self.is_enabled() {
            return Ok(true);
        }
        if image_bytes.is_empty() {
            debug!("Image bytes are empty - accepting without moderation");
            return Ok(true);
        }

        let base64_image = STANDARD.encode(image_bytes);
        debug!(
            bytes = image_bytes.len(),
            base64_len = base64_image.len(),
            "Encoded image bytes"
        );
        self.moderate_image_base64(&base64_image).await
    }

    /// Download an image and moderate it. An empty URL passes.
    pub async fn moderate_image_from_url(
        &self,
        image_url: &str,
    ) -> Result<bool, ContentModerationError> {
        if !self.is_enabled() {
            return Ok(true);
        }
        if image_url.is_empty() {
            debug!("Image URL is empty - accepting without moderation");
            return Ok(true);
        }

        debug!(url = %image_url, "Downloading image");
        let reply = self.transport.get(image_url).await.map_err(|e| {
            error!(url = %image_url, error = %e, "Failed to download image");
            ContentModerationError::with_source(
                format!("Failed to download or moderate image from URL: {}", image_url),
                ModerationError::Transport(e),
            )
        })?;

        let status = reply.status;
        let success = reply.is_success();
        match reply.body {
            Some(bytes) if success => {
                debug!(bytes = bytes.len(), "Downloaded image");
                self.moderate_image_from_bytes(&bytes).await
            }
            body => {
                error!(
                    url = %image_url,
                    status,
                    body_missing = body.is_none(),
                    "Failed to download image"
                );
                Err(ContentModerationError::new(format!(
                    "Failed to download image from URL: {}",
                    image_url
                )))
            }
        }
    }

    /// Pre-storage check for a new listing: image first, then title + description.
    pub async fn screen_listing(
        &self,
        title: &str,
        description: &str,
        image: Option<&[u8]>,
    ) -> Result<ListingScreening, ContentModerationError> {
        if let Some(bytes) = image.filter(|b| !b.is_empty()) {
            if !self.moderate_image_from_bytes(bytes).await? {
                info!("Listing rejected for image content");
                return Ok(ListingScreening::RejectedImage);
            }
        }

        let text = format!("{} {}", title, description);
        if !text.trim().is_empty() && !self.moderate_text(&text).await? {
            info!("Listing rejected for text content");
            return Ok(ListingScreening::RejectedText);
        }

        Ok(ListingScreening::Accepted)
    }

    async fn evaluate(
        &self,
        media_type: MediaType,
        content: &str,
        blocklist_names: &[String],
    ) -> Result<Decision, ModerationError> {
        let result = self
            .detector
            .detect(media_type, content, blocklist_names)
            .await?;
        debug!(
            categories = result.categories_analysis().map(|c| c.len()).unwrap_or(0),
            "Detection result received"
        );
        make_decision(&result, &self.reject_thresholds)
    }
}

// ============================================================================
// TESTS
// ============================================================================
