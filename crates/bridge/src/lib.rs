pub mod forward;

pub use forward::{BridgeError, ProxyRequest, build_backend_request};
