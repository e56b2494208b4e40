//! Backend providers: one per leader-elected cluster the proxy fronts.

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use acproxy_bridge::ProxyRequest;
use acproxy_discovery::AvailabilityState;
use acproxy_transport::BackendResponse;

pub mod base;
pub mod error;
pub mod hdfs;

pub use base::ProviderCore;
pub use error::ProxyError;
pub use hdfs::HdfsProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Hdfs,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Hdfs => "hdfs_proxy_provider",
        }
    }

    /// Request paths under this prefix belong to the provider.
    pub fn prefix(&self) -> &'static str {
        match self {
            ProviderKind::Hdfs => "/webhdfs/v1",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "hdfs" => Ok(ProviderKind::Hdfs),
            _ => Err(format!("unsupported proxy provider type: {value}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStats {
    pub state: String,
    pub explanation: String,
}

impl From<AvailabilityState> for ProviderStats {
    fn from(state: AvailabilityState) -> Self {
        Self {
            state: state.as_str().to_string(),
            explanation: state.explanation().to_string(),
        }
    }
}

/// What the front door needs from a backend cluster.
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Forwards one attempt of `request` to the current active backend.
    ///
    /// Backend error statuses come back as `Ok`; retry policy is the caller's.
    async fn proxy(&self, request: &ProxyRequest) -> Result<BackendResponse, ProxyError>;

    fn stats(&self) -> ProviderStats;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_type() {
        assert_eq!("hdfs".parse::<ProviderKind>(), Ok(ProviderKind::Hdfs));
        assert_eq!("HDFS".parse::<ProviderKind>(), Ok(ProviderKind::Hdfs));
        assert!("yarn".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn stats_explain_each_state() {
        let available = ProviderStats::from(AvailabilityState::Available);
        assert_eq!(available.state, "available");
        assert_eq!(available.explanation, "in service");

        let unavailable = ProviderStats::from(AvailabilityState::Unavailable);
        assert_eq!(
            unavailable.explanation,
            "election in progress or all backends down"
        );

        let initializing = ProviderStats::from(AvailabilityState::Initializing);
        assert_eq!(initializing.explanation, "not yet resolved");
    }
}
