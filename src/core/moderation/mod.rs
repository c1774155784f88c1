// Core moderation module - detector protocol, decision engine and the facade
// the rest of the system calls.

pub mod decision_engine;
pub mod detector_client;
pub mod moderation_models;
pub mod moderation_service;

#[cfg(test)]
pub(crate) mod test_support;

pub use decision_engine::{default_reject_thresholds, make_decision, severity_for};
pub use detector_client::{ContentSafetyClient, HttpReply, HttpTransport, TransportError};
pub use moderation_models::*;
pub use moderation_service::{ContentModerationError, ListingScreening, ModerationService};
