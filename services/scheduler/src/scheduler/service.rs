//! Scheduler facade over the store and the catalog.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use crewboard_id::{AllocationId, ProjectId, ResourceId};
use tracing::{debug, info, instrument, warn};

use super::conflicts::{self, ConflictRecord};
use super::costs::{self, DailyCost, RateTable};
use super::timeline::{TimelineBuilder, WeekMatrix};
use super::{SchedulerError, SchedulerResult};
use crate::catalog::{ProjectDirectory, ResourceCatalog};
use crate::db::{AllocationStore, StoreError};
use crate::model::{
    Allocation, AllocationPatch, DateRange, Money, NewAllocation, Project, Resource, WeekStart,
    MAX_QUERY_DAYS,
};

/// Entry point for every scheduling operation.
///
/// Writes go through here so referenced resources and projects are checked
/// against the catalog before the store sees them. Reads fetch from the
/// store and hand the results to the pure conflict, cost and timeline code.
#[derive(Clone)]
pub struct SchedulerService {
    store: Arc<dyn AllocationStore>,
    resources: Arc<dyn ResourceCatalog>,
    projects: Arc<dyn ProjectDirectory>,
}

impl SchedulerService {
    pub fn new(
        store: Arc<dyn AllocationStore>,
        resources: Arc<dyn ResourceCatalog>,
        projects: Arc<dyn ProjectDirectory>,
    ) -> Self {
        Self {
            store,
            resources,
            projects,
        }
    }

    pub fn store(&self) -> &Arc<dyn AllocationStore> {
        &self.store
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    pub async fn list_resources(&self) -> SchedulerResult<Vec<Resource>> {
        Ok(self.resources.list_resources().await?)
    }

    pub async fn list_projects(&self) -> SchedulerResult<Vec<Project>> {
        Ok(self.projects.list_projects().await?)
    }

    async fn rate_table(&self) -> SchedulerResult<RateTable> {
        let resources = self.resources.list_resources().await?;
        Ok(RateTable::from_resources(&resources))
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    #[instrument(skip(self, new), fields(resource_id = %new.resource_id, project_id = %new.project_id))]
    pub async fn create_allocation(&self, new: NewAllocation) -> SchedulerResult<Allocation> {
        if let Err(e) = new.validate() {
            warn!(error = %e, "Rejected allocation");
            return Err(StoreError::from(e).into());
        }

        match self.resources.get_resource(new.resource_id).await? {
            Some(resource) if resource.kind() == new.resource_type => {}
            _ => {
                warn!("Rejected allocation for unknown resource");
                return Err(StoreError::UnknownResource(new.resource_id).into());
            }
        }

        if self.projects.get_project(new.project_id).await?.is_none() {
            warn!("Rejected allocation for unknown project");
            return Err(StoreError::UnknownProject(new.project_id).into());
        }

        let allocation = self.store.create(new).await?;
        info!(
            allocation_id = %allocation.id,
            start_date = %allocation.start_date,
            end_date = %allocation.end_date,
            "Allocation created"
        );
        Ok(allocation)
    }

    #[instrument(skip(self, patch), fields(allocation_id = %id))]
    pub async fn update_allocation(
        &self,
        id: AllocationId,
        patch: AllocationPatch,
    ) -> SchedulerResult<Allocation> {
        let allocation = self.store.update(id, patch).await?;
        info!(
            start_date = %allocation.start_date,
            end_date = %allocation.end_date,
            status = %allocation.status,
            "Allocation updated"
        );
        Ok(allocation)
    }

    /// Removes an allocation. Missing ids are not an error; the return value
    /// only says whether anything was removed.
    #[instrument(skip(self), fields(allocation_id = %id))]
    pub async fn delete_allocation(&self, id: AllocationId) -> SchedulerResult<bool> {
        let removed = self.store.delete(id).await?;
        if removed {
            info!("Allocation deleted");
        } else {
            debug!("Delete of absent allocation");
        }
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub async fn get_allocation(&self, id: AllocationId) -> SchedulerResult<Allocation> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id).into())
    }

    pub async fn list_by_resource(&self, resource_id: ResourceId) -> SchedulerResult<Vec<Allocation>> {
        Ok(self.store.list_by_resource(resource_id).await?)
    }

    pub async fn list_by_project(
        &self,
        project_id: ProjectId,
        range: DateRange,
    ) -> SchedulerResult<Vec<Allocation>> {
        Ok(self
            .store
            .list_by_project_and_range(project_id, range)
            .await?)
    }

    pub async fn conflict_count(
        &self,
        resource_id: ResourceId,
        date: NaiveDate,
    ) -> SchedulerResult<usize> {
        let allocations = self
            .store
            .list_by_resource_and_range(resource_id, DateRange::single(date))
            .await?;
        Ok(conflicts::conflict_count(&allocations, date))
    }

    pub async fn is_conflicted(
        &self,
        resource_id: ResourceId,
        date: NaiveDate,
    ) -> SchedulerResult<bool> {
        Ok(self.conflict_count(resource_id, date).await? > 1)
    }

    /// Days in `range` on which the resource is double-booked.
    #[instrument(skip(self))]
    pub async fn conflicts_for_resource(
        &self,
        resource_id: ResourceId,
        range: DateRange,
    ) -> SchedulerResult<Vec<NaiveDate>> {
        let range = range.limit(MAX_QUERY_DAYS)?;
        let allocations = self
            .store
            .list_by_resource_and_range(resource_id, range)
            .await?;
        Ok(conflicts::conflict_dates(&allocations, range))
    }

    #[instrument(skip(self))]
    pub async fn conflict_report(&self, range: DateRange) -> SchedulerResult<Vec<ConflictRecord>> {
        let range = range.limit(MAX_QUERY_DAYS)?;
        let allocations = self.store.list_in_range(range).await?;
        let report = conflicts::conflict_report(&allocations, range);
        debug!(conflicts = report.len(), "Built conflict report");
        Ok(report)
    }

    pub async fn daily_cost(&self, project_id: ProjectId, date: NaiveDate) -> SchedulerResult<Money> {
        let allocations = self
            .store
            .list_by_project_and_range(project_id, DateRange::single(date))
            .await?;
        let rates = self.rate_table().await?;
        Ok(costs::daily_cost(&allocations, project_id, date, &rates))
    }

    pub async fn weekly_cost(&self, project_id: ProjectId, week: WeekStart) -> SchedulerResult<Money> {
        let allocations = self
            .store
            .list_by_project_and_range(project_id, week.range())
            .await?;
        let rates = self.rate_table().await?;
        Ok(costs::weekly_cost(&allocations, project_id, week, &rates))
    }

    pub async fn daily_costs(
        &self,
        project_id: ProjectId,
        range: DateRange,
    ) -> SchedulerResult<Vec<DailyCost>> {
        let range = range.limit(MAX_QUERY_DAYS)?;
        let allocations = self
            .store
            .list_by_project_and_range(project_id, range)
            .await?;
        let rates = self.rate_table().await?;
        Ok(costs::daily_costs(&allocations, project_id, range, &rates))
    }

    /// Builds the week matrix for `project_ids`, or for every active project
    /// when the list is empty.
    #[instrument(skip(self, project_ids), fields(week_start = %week, requested = project_ids.len()))]
    pub async fn build_week(
        &self,
        week: WeekStart,
        project_ids: &[ProjectId],
    ) -> SchedulerResult<WeekMatrix> {
        let projects = self.resolve_projects(project_ids).await?;
        let resources = self.resources.list_resources().await?;
        let range = week.range();

        let mut per_project = Vec::with_capacity(projects.len());
        let mut involved = BTreeSet::new();
        for project in &projects {
            let allocations = self
                .store
                .list_by_project_and_range(project.id, range)
                .await?;
            involved.extend(allocations.iter().map(|a| a.resource_id));
            per_project.push(allocations);
        }

        let mut builder = TimelineBuilder::new(week, &resources);
        for resource_id in involved {
            let allocations = self
                .store
                .list_by_resource_and_range(resource_id, range)
                .await?;
            builder.with_resource_allocations(resource_id, allocations);
        }

        let rows = projects
            .iter()
            .zip(&per_project)
            .map(|(project, allocations)| builder.project_row(project, allocations))
            .collect();
        let matrix = builder.finish(rows);

        debug!(
            projects = matrix.projects.len(),
            total_cost = %matrix.total_cost,
            "Built week matrix"
        );
        Ok(matrix)
    }

    async fn resolve_projects(&self, project_ids: &[ProjectId]) -> SchedulerResult<Vec<Project>> {
        if project_ids.is_empty() {
            let mut active: Vec<Project> = self
                .projects
                .list_projects()
                .await?
                .into_iter()
                .filter(Project::is_active)
                .collect();
            active.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            return Ok(active);
        }

        let mut projects = Vec::with_capacity(project_ids.len());
        let mut seen = BTreeSet::new();
        for id in project_ids {
            if !seen.insert(*id) {
                continue;
            }
            match self.projects.get_project(*id).await? {
                Some(project) => projects.push(project),
                None => return Err(SchedulerError::Store(StoreError::UnknownProject(*id))),
            }
        }
        Ok(projects)
    }

    pub async fn health_check(&self) -> SchedulerResult<()> {
        Ok(self.store.health_check().await?)
    }
}
