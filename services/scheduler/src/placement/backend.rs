//! Where placement requests are sent.

use std::time::Duration;

use async_trait::async_trait;
use crewboard_id::AllocationId;
use thiserror::Error;

use crate::db::StoreError;
use crate::model::{Allocation, AllocationPatch, NewAllocation};
use crate::scheduler::{SchedulerError, SchedulerService};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The request may not have reached the server, or the server failed.
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The server understood the request and refused it.
    #[error("rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("allocation not found: {0}")]
    NotFound(AllocationId),
}

impl BackendError {
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// The authoritative allocation store as seen by a placement client.
#[async_trait]
pub trait AllocationBackend: Send + Sync {
    async fn create(&self, new: NewAllocation) -> Result<Allocation, BackendError>;

    async fn update(
        &self,
        id: AllocationId,
        patch: AllocationPatch,
    ) -> Result<Allocation, BackendError>;

    /// Deleting an absent allocation succeeds.
    async fn delete(&self, id: AllocationId) -> Result<(), BackendError>;
}

/// Backend that calls a [`SchedulerService`] in the same process.
#[derive(Clone)]
pub struct ServiceBackend {
    service: SchedulerService,
}

impl ServiceBackend {
    pub fn new(service: SchedulerService) -> Self {
        Self { service }
    }
}

impl From<SchedulerError> for BackendError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Store(StoreError::NotFound(id)) => Self::NotFound(id),
            SchedulerError::Store(
                e @ (StoreError::InvalidRange(_)
                | StoreError::UnknownResource(_)
                | StoreError::UnknownProject(_)),
            ) => Self::rejected(e.code(), e.to_string()),
            e @ (SchedulerError::InvalidRange(_)
            | SchedulerError::RangeTooLarge(_)
            | SchedulerError::InvalidWeekStart(_)) => {
                Self::rejected("invalid_request", e.to_string())
            }
            e => Self::Transport(e.to_string()),
        }
    }
}

#[async_trait]
impl AllocationBackend for ServiceBackend {
    async fn create(&self, new: NewAllocation) -> Result<Allocation, BackendError> {
        Ok(self.service.create_allocation(new).await?)
    }

    async fn update(
        &self,
        id: AllocationId,
        patch: AllocationPatch,
    ) -> Result<Allocation, BackendError> {
        Ok(self.service.update_allocation(id, patch).await?)
    }

    async fn delete(&self, id: AllocationId) -> Result<(), BackendError> {
        self.service.delete_allocation(id).await?;
        Ok(())
    }
}
