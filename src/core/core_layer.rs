// The core module contains all moderation logic.
// Each feature gets its own submodule.

#[path = "moderation/mod.rs"]
pub mod moderation;
