// HTTP infra layer.
// - `reqwest_transport.rs` implements the core `HttpTransport` port on reqwest.

#[path = "reqwest_transport.rs"]
pub mod reqwest_transport;

pub use reqwest_transport::ReqwestTransport;
