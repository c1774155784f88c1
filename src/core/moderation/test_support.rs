// In-memory transport for testing the detector client and the facade.

use super::detector_client::{HttpReply, HttpTransport, TransportError, SUBSCRIPTION_KEY_HEADER};
use super::moderation_models::{MediaType, API_VERSION};
use async_trait::async_trait;
use dashmap::DashMap;

pub const TEST_ENDPOINT: &str = "https://cs.example.com";
pub const TEST_KEY: &str = "test-key";

/// What a POST looked like when it reached the transport.
#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub subscription_key: Option<String>,
    pub payload: String,
}

/// Replays canned replies keyed by exact URL and records every call.
pub struct MockTransport {
    replies: DashMap<String, HttpReply>,
    failures: DashMap<String, String>,
    posts: DashMap<String, Vec<RecordedPost>>,
    gets: DashMap<String, usize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            replies: DashMap::new(),
            failures: DashMap::new(),
            posts: DashMap::new(),
            gets: DashMap::new(),
        }
    }

    pub fn analyze_url(media_type: MediaType) -> String {
        format!(
            "{}/contentsafety/{}?api-version={}",
            TEST_ENDPOINT,
            media_type.analyze_path(),
            API_VERSION
        )
    }

    pub fn text_url(&self) -> String {
        Self::analyze_url(MediaType::Text)
    }

    pub fn image_url(&self) -> String {
        Self::analyze_url(MediaType::Image)
    }

    pub fn reply(&self, url: &str, reply: HttpReply) {
        self.replies.insert(url.to_string(), reply);
    }

    pub fn reply_json(&self, url: &str, status: u16, body: serde_json::Value) {
        self.reply(url, HttpReply::new(status, body.to_string()));
    }

    pub fn fail(&self, url: &str, message: &str) {
        self.failures.insert(url.to_string(), message.to_string());
    }

    pub fn last_post(&self, url: &str) -> Option<RecordedPost> {
        self.posts.get(url).and_then(|calls| calls.last().cloned())
    }

    pub fn post_count(&self, url: &str) -> usize {
        self.posts.get(url).map(|calls| calls.len()).unwrap_or(0)
    }

    pub fn get_count(&self, url: &str) -> usize {
        self.gets.get(url).map(|count| *count).unwrap_or(0)
    }

    /// Total number of calls of any kind.
    pub fn total_calls(&self) -> usize {
        let posts: usize = self.posts.iter().map(|entry| entry.value().len()).sum();
        let gets: usize = self.gets.iter().map(|entry| *entry.value()).sum();
        posts + gets
    }

    fn canned(&self, url: &str) -> Result<HttpReply, TransportError> {
        if let Some(message) = self.failures.get(url) {
            return Err(TransportError::Connect(message.clone()));
        }
        self.replies
            .get(url)
            .map(|reply| reply.clone())
            .ok_or_else(|| TransportError::Connect(format!("no canned reply for {}", url)))
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        payload: String,
    ) -> Result<HttpReply, TransportError> {
        let subscription_key = headers
            .iter()
            .find(|(name, _)| *name == SUBSCRIPTION_KEY_HEADER)
            .map(|(_, value)| value.to_string());

        self.posts
            .entry(url.to_string())
            .or_insert_with(Vec::new)
            .push(RecordedPost {
                subscription_key,
                payload,
            });

        self.canned(url)
    }

    async fn get(&self, url: &str) -> Result<HttpReply, TransportError> {
        *self.gets.entry(url.to_string()).or_insert(0) += 1;
        self.canned(url)
    }
}
