// The infra module contains implementations of core traits.
// Each implementation goes in its own submodule.

#[path = "http/mod.rs"]
pub mod http;
