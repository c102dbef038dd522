//! Allocation store error types.

use crewboard_id::{AllocationId, ProjectId, ResourceId};
use thiserror::Error;

use crate::model::InvalidRange;

/// Allocation store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Start date after end date.
    #[error(transparent)]
    InvalidRange(#[from] InvalidRange),

    /// The resource is not in the catalog, or has a different kind.
    #[error("unknown resource: {0}")]
    UnknownResource(ResourceId),

    /// The project is not in the project directory.
    #[error("unknown project: {0}")]
    UnknownProject(ProjectId),

    #[error("allocation not found: {0}")]
    NotFound(AllocationId),

    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// A stored row could not be mapped back into an allocation.
    #[error("corrupt allocation row {id}: {reason}")]
    CorruptRow { id: String, reason: String },

    /// Failed to run migrations.
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    /// Migration directory not found in the current environment.
    #[error("migration directory not found; tried {tried}. Last error: {last_error}. Run from repo root or services/scheduler.")]
    MigrationDirNotFound { tried: String, last_error: String },
}

impl StoreError {
    /// Whether the same call may succeed if retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Query(_))
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRange(_) => "invalid_range",
            Self::UnknownResource(_) => "unknown_resource",
            Self::UnknownProject(_) => "unknown_project",
            Self::NotFound(_) => "allocation_not_found",
            Self::Connect(_) | Self::Query(_) => "store_unavailable",
            Self::CorruptRow { .. } => "corrupt_record",
            Self::Migration(_) | Self::MigrationDirNotFound { .. } => "migration_failed",
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_codes_and_retryability() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let inverted = StoreError::from(InvalidRange {
            start: day,
            end: day.pred_opt().unwrap(),
        });
        assert_eq!(inverted.code(), "invalid_range");
        assert!(!inverted.is_retryable());

        let missing = StoreError::UnknownProject(ProjectId::new());
        assert_eq!(missing.code(), "unknown_project");
        assert!(!missing.is_retryable());

        let down = StoreError::Query(sqlx::Error::PoolTimedOut);
        assert_eq!(down.code(), "store_unavailable");
        assert!(down.is_retryable());
    }
}
