//! Conflict detection.
//!
//! A conflict is a day on which one resource is claimed by more than one
//! non-cancelled allocation. Nothing is persisted: every answer is computed
//! from the allocations handed in, so it can never go stale.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use crewboard_id::{AllocationId, ProjectId, ResourceId};
use serde::Serialize;

use crate::model::{Allocation, DateRange};

/// Number of active allocations in `allocations` that claim `date`.
///
/// `allocations` must belong to a single resource and be sorted by start
/// date, as the store returns them; the scan stops at the first allocation
/// starting after `date`.
pub fn conflict_count(allocations: &[Allocation], date: NaiveDate) -> usize {
    allocations
        .iter()
        .take_while(|a| a.start_date <= date)
        .filter(|a| a.is_active() && a.end_date >= date)
        .count()
}

pub fn is_conflicted(allocations: &[Allocation], date: NaiveDate) -> bool {
    conflict_count(allocations, date) > 1
}

/// Days in `range` on which the resource is double-booked, ascending.
///
/// `allocations` must belong to a single resource; order does not matter.
pub fn conflict_dates(allocations: &[Allocation], range: DateRange) -> Vec<NaiveDate> {
    double_booked_days(allocations, range)
}

/// Sweeps enter/exit events clipped to `range`. Work and memory grow with
/// the number of allocations, not with the length of the range.
fn double_booked_days<'a>(
    allocations: impl IntoIterator<Item = &'a Allocation>,
    range: DateRange,
) -> Vec<NaiveDate> {
    // (day offset from range.from, change in claim count)
    let mut events: Vec<(i64, i64)> = Vec::new();
    for a in allocations
        .into_iter()
        .filter(|a| a.is_active() && a.overlaps(&range))
    {
        events.push(((a.start_date.max(range.from) - range.from).num_days(), 1));
        events.push(((a.end_date.min(range.to) - range.from).num_days() + 1, -1));
    }
    events.sort_unstable();

    let mut days = Vec::new();
    let mut claims = 0i64;
    let mut events = events.into_iter().peekable();
    while let Some((offset, change)) = events.next() {
        claims += change;
        while let Some((_, change)) = events.next_if(|(next, _)| *next == offset) {
            claims += change;
        }
        if claims > 1 {
            // An exit event always follows while claims are open.
            let until = events.peek().map_or(offset, |(next, _)| *next);
            days.extend((offset..until).map(|day| range.from + Days::new(day as u64)));
        }
    }
    days
}

/// One resource double-booked on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub resource_id: ResourceId,
    pub date: NaiveDate,
    pub allocation_ids: Vec<AllocationId>,
    /// Distinct projects involved, sorted.
    pub project_ids: Vec<ProjectId>,
}

impl ConflictRecord {
    pub fn claim_count(&self) -> usize {
        self.allocation_ids.len()
    }
}

/// Every double booking within `range` across all resources, ordered by
/// date and then resource.
pub fn conflict_report(allocations: &[Allocation], range: DateRange) -> Vec<ConflictRecord> {
    let mut by_resource: BTreeMap<ResourceId, Vec<&Allocation>> = BTreeMap::new();
    for a in allocations.iter().filter(|a| a.is_active() && a.overlaps(&range)) {
        by_resource.entry(a.resource_id).or_default().push(a);
    }

    let mut report = Vec::new();
    for (resource_id, claims) in by_resource {
        if claims.len() < 2 {
            continue;
        }
        for date in double_booked_days(claims.iter().copied(), range) {
            let claimants: Vec<&Allocation> =
                claims.iter().copied().filter(|a| a.contains(date)).collect();
            let mut allocation_ids: Vec<_> = claimants.iter().map(|a| a.id).collect();
            allocation_ids.sort();
            let mut project_ids: Vec<_> = claimants.iter().map(|a| a.project_id).collect();
            project_ids.sort();
            project_ids.dedup();

            report.push(ConflictRecord {
                resource_id,
                date,
                allocation_ids,
                project_ids,
            });
        }
    }

    report.sort_by_key(|r| (r.date, r.resource_id));
    report
}
