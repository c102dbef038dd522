//! The allocation store contract.

use async_trait::async_trait;
use crewboard_id::{AllocationId, ProjectId, ResourceId};

use super::StoreResult;
use crate::model::{Allocation, AllocationPatch, DateRange, NewAllocation};

/// Persistent home of allocation records.
///
/// Implementations reject inverted date ranges on create and update, assign
/// ids and timestamps, and make every mutation visible to the next read.
/// Catalog membership of the referenced resource and project is checked by
/// the caller before `create`.
///
/// Range queries return allocations of any status whose span intersects the
/// inclusive range, ordered by `(start_date, id)`.
#[async_trait]
pub trait AllocationStore: Send + Sync {
    async fn create(&self, new: NewAllocation) -> StoreResult<Allocation>;

    async fn get(&self, id: AllocationId) -> StoreResult<Option<Allocation>>;

    /// Applies `patch` and bumps `updated_at`. Fails with `NotFound` when the
    /// id is unknown.
    async fn update(&self, id: AllocationId, patch: AllocationPatch) -> StoreResult<Allocation>;

    /// Removes the record. Returns `false` when nothing was stored under
    /// `id`, which is not an error.
    async fn delete(&self, id: AllocationId) -> StoreResult<bool>;

    async fn list_by_resource(&self, resource_id: ResourceId) -> StoreResult<Vec<Allocation>>;

    async fn list_by_resource_and_range(
        &self,
        resource_id: ResourceId,
        range: DateRange,
    ) -> StoreResult<Vec<Allocation>>;

    async fn list_by_project_and_range(
        &self,
        project_id: ProjectId,
        range: DateRange,
    ) -> StoreResult<Vec<Allocation>>;

    async fn list_in_range(&self, range: DateRange) -> StoreResult<Vec<Allocation>>;

    async fn health_check(&self) -> StoreResult<()>;
}
