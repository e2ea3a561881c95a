//! Error taxonomy shared by the list registry and the task tree manager.

use std::time::Duration;

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::models::TaskId;

/// Errors surfaced by registry and tree operations.
///
/// Local validation failures (`InvalidName`, `InvalidMove`, `ParentNotFound`
/// when the parent is missing from the forest) are raised before any gateway
/// call. None of these are retried automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Parent task {0} not found")]
    ParentNotFound(TaskId),

    #[error("Name must not be empty")]
    InvalidName,

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Rejected by server: {0}")]
    Rejected(String),

    #[error("Sync failed: {0}")]
    SyncFailure(String),

    #[error("Gateway did not respond within {0:?}")]
    Timeout(Duration),

    #[error("No list is loaded")]
    NoListLoaded,

    #[error("Response discarded: the loaded list changed while the request was in flight")]
    Superseded,
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<GatewayError> for Error {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Unauthenticated => Error::Unauthenticated,
            GatewayError::NotFound(msg) => Error::NotFound(msg),
            GatewayError::Rejected(msg) => Error::Rejected(msg),
            GatewayError::Server(msg) => Error::SyncFailure(msg),
            GatewayError::Unavailable(msg) => Error::SyncFailure(msg),
            GatewayError::Decode(msg) => Error::SyncFailure(format!("bad response: {}", msg)),
        }
    }
}

/// Trim a user-supplied name, rejecting empty or whitespace-only input.
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(Error::InvalidName)
    } else {
        Ok(trimmed.to_string())
    }
}
