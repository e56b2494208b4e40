use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("cannot connect to coordination service {cluster}: {reason}")]
    Connect { cluster: String, reason: String },

    #[error("watched read of {path} failed: {reason}")]
    Read { path: String, reason: String },

    #[error("coordination session expired: {0}")]
    SessionExpired(String),

    #[error("write to {path} failed: {reason}")]
    Write { path: String, reason: String },

    #[error("malformed leader record: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("leader record carries no hostname")]
    EmptyHostname,
}
