// Content moderation engine.
//
// **Architecture Overview:**
// - `core/` = Decision logic and the ports it depends on (platform-agnostic)
// - `infra/` = Implementations of core ports (HTTP)
//
// The listing workflow, object storage and the HTTP front door call into
// `core::moderation::ModerationService`; nothing in here depends on them.

// Same trick as the binary: point each layer at a descriptive root file.
#[path = "core/core_layer.rs"]
pub mod core;
#[path = "infra/infra_layer.rs"]
pub mod infra;
