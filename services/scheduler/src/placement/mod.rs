//! Client-side placement protocol.
//!
//! A placement shows up in the local view at once under a temporary id,
//! then the backend is asked to create it:
//!
//! - success swaps the temporary entry for the server record in place
//! - failure removes the entry and reports the error
//! - cancellation removes the entry and discards any later answer
//!
//! Updates and removals follow the same shape: apply locally, send, keep on
//! success, restore the previous state on failure. The backend's own writes
//! are atomic, so the only thing that can diverge is the local view.

mod backend;
mod client;
mod http;
mod state;
mod view;

pub use backend::{AllocationBackend, BackendError, ServiceBackend};
pub use client::{PlacementClient, PlacementHandle};
pub use http::HttpBackend;
pub use state::{InvalidTransition, LocalKey, PlacementState};
pub use view::{LocalAllocation, LocalView, Slot, ViewEntry};

use std::time::Duration;

use crewboard_id::TempAllocationId;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementConfig {
    /// How long to wait for the backend before rolling back. `None` waits
    /// indefinitely.
    pub confirm_timeout: Option<Duration>,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            confirm_timeout: Some(Duration::from_secs(10)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// The request failed in transit or on the server. Safe to retry.
    #[error("sync failure: {message}")]
    SyncFailure { message: String },

    /// The server refused the request as invalid.
    #[error("rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("placement cancelled")]
    Cancelled,

    #[error("no allocation {0} in the local view")]
    NotFound(LocalKey),

    #[error("placement {0} has not been confirmed yet")]
    NotConfirmed(TempAllocationId),
}

impl PlacementError {
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SyncFailure { .. })
    }
}

impl From<BackendError> for PlacementError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Transport(message) => Self::SyncFailure { message },
            e @ BackendError::Timeout(_) => Self::SyncFailure {
                message: e.to_string(),
            },
            BackendError::Rejected { code, message } => Self::Rejected { code, message },
            BackendError::NotFound(id) => Self::NotFound(LocalKey::Server(id)),
        }
    }
}
