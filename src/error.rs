use thiserror::Error;

/// Rejection of a port specification. Raised before any network activity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("malformed port token: {token:?}")]
    Malformed { token: String },

    #[error("port out of range ({low}-{high}): {token}")]
    OutOfRange { token: String, low: u16, high: u16 },

    #[error("port specification is empty")]
    EmptyPortSet,
}

/// Fatal problems detected before the first probe is dispatched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("timeout must be greater than zero")]
    InvalidTimeout,

    #[error("unable to resolve target {host:?}: {reason}")]
    Resolve { host: String, reason: String },
}
