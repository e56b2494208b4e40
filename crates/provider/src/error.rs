use thiserror::Error;

use acproxy_bridge::BridgeError;
use acproxy_transport::PoolError;

use crate::ProviderKind;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0} not in service temporarily")]
    Unavailable(ProviderKind),

    #[error("request {0} timeout")]
    Timeout(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Upstream(#[from] PoolError),
}
