//! Week matrix assembly.
//!
//! The builder works on allocations the caller has already fetched: one list
//! per requested project, plus one list per resource appearing in them so
//! double bookings on other projects are visible. Conflict counts are
//! memoized per `(resource, day)` for the life of one build.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use crewboard_id::{ProjectId, ResourceId};
use serde::Serialize;

use super::conflicts::conflict_count;
use super::costs::{daily_cost, RateTable};
use crate::model::{Allocation, Money, Project, Resource, ResourceKind, WeekStart};

/// Display name for allocations whose resource left the catalog.
pub const UNKNOWN_RESOURCE: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekMatrix {
    pub week_start: WeekStart,
    pub days: [NaiveDate; 7],
    pub projects: Vec<ProjectRow>,
    pub total_cost: Money,
}

impl WeekMatrix {
    pub fn project(&self, project_id: ProjectId) -> Option<&ProjectRow> {
        self.projects.iter().find(|row| row.project_id == project_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRow {
    pub project_id: ProjectId,
    pub project_name: String,
    pub cells: Vec<DayCell>,
    pub weekly_cost: Money,
}

impl ProjectRow {
    pub fn cell(&self, date: NaiveDate) -> Option<&DayCell> {
        self.cells.iter().find(|cell| cell.date == date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCell {
    pub date: NaiveDate,
    pub allocations: Vec<AllocationView>,
    pub daily_cost: Money,
    /// Resources double-booked on this day, sorted and de-duplicated.
    pub conflicts: Vec<ResourceId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationView {
    #[serde(flatten)]
    pub allocation: Allocation,
    pub resource_name: String,
    pub resource_kind: ResourceKind,
    pub conflicted: bool,
}

pub struct TimelineBuilder<'a> {
    week: WeekStart,
    resources: HashMap<ResourceId, &'a Resource>,
    rates: RateTable,
    by_resource: HashMap<ResourceId, Vec<Allocation>>,
    conflict_memo: HashMap<(ResourceId, NaiveDate), usize>,
    evaluations: usize,
}

impl<'a> TimelineBuilder<'a> {
    pub fn new(week: WeekStart, resources: &'a [Resource]) -> Self {
        Self {
            week,
            resources: resources.iter().map(|r| (r.id(), r)).collect(),
            rates: RateTable::from_resources(resources),
            by_resource: HashMap::new(),
            conflict_memo: HashMap::new(),
            evaluations: 0,
        }
    }

    /// Registers every allocation of `resource_id` overlapping the week,
    /// across all projects.
    pub fn with_resource_allocations(
        &mut self,
        resource_id: ResourceId,
        mut allocations: Vec<Allocation>,
    ) -> &mut Self {
        allocations.sort_by_key(|a| (a.start_date, a.id));
        self.by_resource.insert(resource_id, allocations);
        self
    }

    /// How many conflict counts were actually computed.
    pub fn conflict_evaluations(&self) -> usize {
        self.evaluations
    }

    fn conflict_count(&mut self, resource_id: ResourceId, date: NaiveDate) -> usize {
        if let Some(count) = self.conflict_memo.get(&(resource_id, date)) {
            return *count;
        }

        let count = self
            .by_resource
            .get(&resource_id)
            .map(|allocations| conflict_count(allocations, date))
            .unwrap_or(0);
        self.evaluations += 1;
        self.conflict_memo.insert((resource_id, date), count);
        count
    }

    fn view(&mut self, allocation: &Allocation, date: NaiveDate) -> AllocationView {
        let (resource_name, resource_kind) = match self.resources.get(&allocation.resource_id) {
            Some(resource) => (resource.name().to_string(), resource.kind()),
            None => (UNKNOWN_RESOURCE.to_string(), allocation.resource_type),
        };
        let conflicted =
            allocation.is_active() && self.conflict_count(allocation.resource_id, date) > 1;

        AllocationView {
            allocation: allocation.clone(),
            resource_name,
            resource_kind,
            conflicted,
        }
    }

    /// Builds one project row from the project's allocations for the week.
    pub fn project_row(&mut self, project: &Project, allocations: &[Allocation]) -> ProjectRow {
        let mut cells = Vec::with_capacity(7);

        for date in self.week.days() {
            let mut views = Vec::new();
            let mut conflicts = BTreeSet::new();

            for allocation in allocations
                .iter()
                .filter(|a| a.project_id == project.id && a.contains(date))
            {
                let view = self.view(allocation, date);
                if view.conflicted {
                    conflicts.insert(allocation.resource_id);
                }
                views.push(view);
            }

            cells.push(DayCell {
                date,
                allocations: views,
                daily_cost: daily_cost(allocations, project.id, date, &self.rates),
                conflicts: conflicts.into_iter().collect(),
            });
        }

        let weekly_cost = cells.iter().map(|cell| cell.daily_cost).sum();
        ProjectRow {
            project_id: project.id,
            project_name: project.name.clone(),
            cells,
            weekly_cost,
        }
    }

    pub fn finish(self, projects: Vec<ProjectRow>) -> WeekMatrix {
        let total_cost = projects.iter().map(|row| row.weekly_cost).sum();
        WeekMatrix {
            week_start: self.week,
            days: self.week.days(),
            projects,
            total_cost,
        }
    }
}
