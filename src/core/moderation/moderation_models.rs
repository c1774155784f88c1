// Moderation domain models - data structures for the content analysis pipeline.
//
// These are pure domain types with no HTTP dependencies. Request and response
// shapes mirror the analysis API's JSON so they can be (de)serialized directly.
// Everything here is built fresh per call and never persisted.

use super::detector_client::TransportError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Version of the analysis API every request is pinned to.
pub const API_VERSION: &str = "2024-09-01";

/// The only values a reject threshold may take.
/// -1 disables a category, any other value N rejects at severity >= N.
pub const VALID_THRESHOLD_VALUES: [i32; 5] = [-1, 0, 2, 4, 6];

/// Severity score reported by the detector (0, 2, 4, 6 in practice).
pub type Severity = i32;

/// Category -> reject threshold. Iteration over this map drives the decision.
pub type RejectThresholds = HashMap<Category, i32>;

// ============================================================================
// ERRORS
// ============================================================================

/// Coarse classification of a `ModerationError`, for callers that only need to branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Transport,
    Detection,
    MalformedResponse,
}

#[derive(Debug, Error)]
pub enum ModerationError {
    /// Programming or configuration error in the caller. Never retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The detector (or an image host) could not be reached.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Structured failure reported by the detector.
    #[error("Error Code: {code}, Message: {message}")]
    Detection { code: String, message: String },

    /// A success response whose body is not an analysis document.
    #[error("Malformed detector response ({source}). Response text is {body}")]
    MalformedResponse {
        #[source]
        source: serde_json::Error,
        body: String,
    },
}

impl ModerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModerationError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ModerationError::Transport(_) => ErrorKind::Transport,
            ModerationError::Detection { .. } => ErrorKind::Detection,
            ModerationError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
        }
    }
}

// ============================================================================
// ENUMS
// ============================================================================

/// Which analysis endpoint and response schema a call uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Text,
    Image,
}

impl MediaType {
    /// Versioned path segment under `/contentsafety/`.
    pub fn analyze_path(&self) -> &'static str {
        match self {
            MediaType::Text => "text:analyze",
            MediaType::Image => "image:analyze",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Text => write!(f, "Text"),
            MediaType::Image => write!(f, "Image"),
        }
    }
}

impl FromStr for MediaType {
    type Err = ModerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(MediaType::Text),
            "image" => Ok(MediaType::Image),
            _ => Err(ModerationError::InvalidArgument(format!(
                "Invalid Media Type {}",
                s
            ))),
        }
    }
}

/// Harm categories defined by the detector's taxonomy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, Eq, PartialEq, PartialOrd, Ord)]
#[serde(rename_all = "PascalCase")]
pub enum Category {
    Hate,
    SelfHarm,
    Sexual,
    Violence,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Hate,
        Category::SelfHarm,
        Category::Sexual,
        Category::Violence,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Hate => write!(f, "Hate"),
            Category::SelfHarm => write!(f, "SelfHarm"),
            Category::Sexual => write!(f, "Sexual"),
            Category::Violence => write!(f, "Violence"),
        }
    }
}

/// Suggested action. Declaration order matters: `Reject > Accept`, so the
/// overall action is just the max across categories.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    Accept,
    Reject,
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    /// Base64 of the raw image bytes. Sent as-is, never re-encoded.
    pub content: String,
}

/// JSON body for an analyze call. Untagged: the variant is implied by the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetectionRequest {
    #[serde(rename_all = "camelCase")]
    Text {
        text: String,
        blocklist_names: Vec<String>,
    },
    Image { image: ImageContent },
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAnalysis {
    pub category: Category,
    #[serde(default)]
    pub severity: Option<Severity>,
}

impl CategoryAnalysis {
    pub fn new(category: Category, severity: Severity) -> Self {
        Self {
            category,
            severity: Some(severity),
        }
    }
}

/// One blocklist item that matched the analyzed text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlocklistMatch {
    pub blocklist_name: Option<String>,
    pub blocklist_item_id: Option<String>,
    pub blocklist_item_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDetectionResult {
    #[serde(default)]
    pub categories_analysis: Option<Vec<CategoryAnalysis>>,
    #[serde(default)]
    pub blocklists_match: Option<Vec<BlocklistMatch>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDetectionResult {
    #[serde(default)]
    pub categories_analysis: Option<Vec<CategoryAnalysis>>,
}

/// The detector's findings for a single call, scoped to the media type's schema.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionResult {
    Text(TextDetectionResult),
    Image(ImageDetectionResult),
}

impl DetectionResult {
    pub fn media_type(&self) -> MediaType {
        match self {
            DetectionResult::Text(_) => MediaType::Text,
            DetectionResult::Image(_) => MediaType::Image,
        }
    }

    /// `None` when the detector sent no (or a null) `categoriesAnalysis`.
    pub fn categories_analysis(&self) -> Option<&[CategoryAnalysis]> {
        match self {
            DetectionResult::Text(r) => r.categories_analysis.as_deref(),
            DetectionResult::Image(r) => r.categories_analysis.as_deref(),
        }
    }

    /// Blocklist hits. Always empty for images.
    pub fn blocklists_match(&self) -> &[BlocklistMatch] {
        match self {
            DetectionResult::Text(r) => r.blocklists_match.as_deref().unwrap_or(&[]),
            DetectionResult::Image(_) => &[],
        }
    }
}

/// `{"error": {...}}` envelope returned with non-2xx statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionErrorResponse {
    #[serde(default)]
    pub error: Option<DetectionErrorBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionErrorBody {
    pub code: Option<String>,
    pub message: Option<String>,
    pub target: Option<String>,
    pub details: Option<serde_json::Value>,
    pub innererror: Option<serde_json::Value>,
}

// ============================================================================
// DECISION
// ============================================================================

/// Output of the decision engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Max over all per-category actions, forced to Reject on any blocklist hit.
    pub suggested_action: Action,
    /// Per-category actions, for observability.
    pub action_by_category: HashMap<Category, Action>,
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        self.suggested_action == Action::Accept
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

pub const ENDPOINT_VAR: &str = "CONTENT_SAFETY_ENDPOINT";
pub const SUBSCRIPTION_KEY_VAR: &str = "CONTENT_SAFETY_SUBSCRIPTION_KEY";
pub const TIMEOUT_SECS_VAR: &str = "CONTENT_SAFETY_TIMEOUT_SECS";
pub const BLOCKLISTS_VAR: &str = "CONTENT_SAFETY_BLOCKLISTS";

/// Process-wide detector settings. Empty endpoint or key means "not configured".
#[derive(Clone, Default)]
pub struct ModerationConfig {
    pub endpoint: String,
    pub subscription_key: String,
    /// Request timeout. `None` leaves the HTTP client's default in charge.
    pub timeout: Option<Duration>,
    /// Blocklists checked on text requests.
    pub blocklist_names: Vec<String>,
}

impl ModerationConfig {
    pub fn new(endpoint: impl Into<String>, subscription_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            subscription_key: subscription_key.into(),
            ..Default::default()
        }
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup (the environment, a map in tests...).
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout = lookup(TIMEOUT_SECS_VAR)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let blocklist_names = lookup(BLOCKLISTS_VAR)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            endpoint: lookup(ENDPOINT_VAR).unwrap_or_default(),
            subscription_key: lookup(SUBSCRIPTION_KEY_VAR).unwrap_or_default(),
            timeout,
            blocklist_names,
        }
    }

    /// True iff both endpoint and key are non-empty.
    pub fn is_enabled(&self) -> bool {
        !self.endpoint.is_empty() && !self.subscription_key.is_empty()
    }
}

// Hand-written so the subscription key never ends up in logs.
impl fmt::Debug for ModerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModerationConfig")
            .field("endpoint", &self.endpoint)
            .field("subscription_key_set", &!self.subscription_key.is_empty())
            .field("timeout", &self.timeout)
            .field("blocklist_names", &self.blocklist_names)
            .finish()
    }
}
