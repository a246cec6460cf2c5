use crate::admin::ObjectKind;
use thiserror::Error;

/// Errors raised by a gateway admin collaborator.
///
/// `NotFound` is not a failure for the reconciler: it is the signal to
/// create the object. Everything else is retryable on the next cycle.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: ObjectKind, name: String },

    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: ObjectKind, name: String },

    #[error("{kind} {name}: admin API returned {status}: {body}")]
    Status {
        kind: ObjectKind,
        name: String,
        status: u16,
        body: String,
    },

    #[error("{kind} {name} has no id")]
    MissingId { kind: ObjectKind, name: String },

    #[error("invalid admin URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("admin API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("admin API response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, GatewayError::AlreadyExists { .. })
    }
}
