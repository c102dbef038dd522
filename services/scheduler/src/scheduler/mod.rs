//! Read-side scheduling: conflicts, costs, and the week timeline.
//!
//! The computations in [`conflicts`], [`costs`] and [`timeline`] are pure
//! functions over already-fetched allocations. [`SchedulerService`] is the
//! async facade that fetches from the store and the catalog, validates
//! writes, and delegates to them.

pub mod conflicts;
pub mod costs;
mod service;
pub mod timeline;

pub use conflicts::ConflictRecord;
pub use costs::{DailyCost, RateTable};
pub use service::SchedulerService;
pub use timeline::{AllocationView, DayCell, ProjectRow, WeekMatrix};

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::db::StoreError;
use crate::model::{InvalidRange, InvalidWeekStart, RangeTooLarge};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A query range with `from` after `to`.
    #[error(transparent)]
    InvalidRange(#[from] InvalidRange),

    /// A conflict or cost query over more days than it will scan.
    #[error(transparent)]
    RangeTooLarge(#[from] RangeTooLarge),

    #[error(transparent)]
    InvalidWeekStart(#[from] InvalidWeekStart),
}

impl SchedulerError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Catalog(CatalogError::Unavailable(_)) => true,
            _ => false,
        }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
