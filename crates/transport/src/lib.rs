pub mod http_client;
pub mod pool;

pub use http_client::{BackendClient, BackendResponse};
pub use pool::{ForwardingPool, PendingResult, PoolError};
