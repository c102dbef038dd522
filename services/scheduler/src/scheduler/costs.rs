//! Planning-level cost rollups.
//!
//! Every active allocation costs its resource's base hourly rate times the
//! nominal day for each day it covers. Weekly and range figures are sums of
//! daily figures and nothing else.

use std::collections::HashMap;

use chrono::NaiveDate;
use crewboard_id::{ProjectId, ResourceId};
use serde::Serialize;

use crate::model::{Allocation, DateRange, Money, Resource, WeekStart};

/// Nominal day cost per resource.
///
/// Resources absent from the catalog cost nothing.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    day_rates: HashMap<ResourceId, Money>,
}

impl RateTable {
    pub fn from_resources<'a>(resources: impl IntoIterator<Item = &'a Resource>) -> Self {
        Self {
            day_rates: resources
                .into_iter()
                .map(|r| (r.id(), r.rates().nominal_day()))
                .collect(),
        }
    }

    pub fn day_rate(&self, resource_id: ResourceId) -> Money {
        self.day_rates
            .get(&resource_id)
            .copied()
            .unwrap_or(Money::ZERO)
    }

    pub fn knows(&self, resource_id: ResourceId) -> bool {
        self.day_rates.contains_key(&resource_id)
    }
}

/// Cost of `project_id` on `date`.
pub fn daily_cost(
    allocations: &[Allocation],
    project_id: ProjectId,
    date: NaiveDate,
    rates: &RateTable,
) -> Money {
    allocations
        .iter()
        .filter(|a| a.project_id == project_id && a.is_active() && a.contains(date))
        .map(|a| rates.day_rate(a.resource_id))
        .sum()
}

/// Sum of the seven daily costs from Monday to Sunday.
pub fn weekly_cost(
    allocations: &[Allocation],
    project_id: ProjectId,
    week: WeekStart,
    rates: &RateTable,
) -> Money {
    week.days()
        .into_iter()
        .map(|day| daily_cost(allocations, project_id, day, rates))
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyCost {
    pub date: NaiveDate,
    pub cost: Money,
}

/// Daily costs for every day in `range`, in order.
pub fn daily_costs(
    allocations: &[Allocation],
    project_id: ProjectId,
    range: DateRange,
    rates: &RateTable,
) -> Vec<DailyCost> {
    range
        .days()
        .map(|date| DailyCost {
            date,
            cost: daily_cost(allocations, project_id, date, rates),
        })
        .collect()
}

pub fn range_cost(
    allocations: &[Allocation],
    project_id: ProjectId,
    range: DateRange,
    rates: &RateTable,
) -> Money {
    daily_costs(allocations, project_id, range, rates)
        .into_iter()
        .map(|d| d.cost)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AllocationStatus, RateCard, ResourceKind, StaffMember};
    use chrono::{Days, Utc};
    use crewboard_id::AllocationId;
    use proptest::prelude::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn staff(base_major: i64) -> Resource {
        Resource::Staff(StaffMember {
            id: ResourceId::new(),
            name: "Crew".to_string(),
            role: "Labourer".to_string(),
            rates: RateCard {
                base: Money::from_major(base_major),
                overtime1: Money::from_major(base_major * 2),
                overtime2: Money::from_major(base_major * 3),
            },
        })
    }

    fn claim(
        resource_id: ResourceId,
        project_id: ProjectId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Allocation {
        let now = Utc::now();
        Allocation {
            id: AllocationId::new(),
            resource_id,
            resource_type: ResourceKind::Staff,
            project_id,
            start_date: start,
            end_date: end,
            status: AllocationStatus::Confirmed,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_daily_cost_is_base_rate_times_eight() {
        let s1 = staff(50);
        let p1 = ProjectId::new();
        let rates = RateTable::from_resources([&s1]);
        let allocations = vec![claim(s1.id(), p1, date("2024-01-01"), date("2024-01-01"))];

        assert_eq!(
            daily_cost(&allocations, p1, date("2024-01-01"), &rates),
            Money::from_major(400)
        );
        assert_eq!(
            daily_cost(&allocations, p1, date("2024-01-02"), &rates),
            Money::ZERO
        );
    }

    #[test]
    fn test_other_projects_and_cancelled_are_excluded() {
        let s1 = staff(50);
        let s2 = staff(30);
        let p1 = ProjectId::new();
        let p2 = ProjectId::new();
        let rates = RateTable::from_resources([&s1, &s2]);
        let day = date("2024-01-01");

        let mut cancelled = claim(s2.id(), p1, day, day);
        cancelled.status = AllocationStatus::Cancelled;
        let allocations = vec![
            claim(s1.id(), p1, day, day),
            claim(s2.id(), p2, day, day),
            cancelled,
        ];

        assert_eq!(daily_cost(&allocations, p1, day, &rates), Money::from_major(400));
        assert_eq!(daily_cost(&allocations, p2, day, &rates), Money::from_major(240));
    }

    #[test]
    fn test_unknown_resource_costs_nothing() {
        let p1 = ProjectId::new();
        let ghost = ResourceId::new();
        let rates = RateTable::default();
        let day = date("2024-01-01");
        let allocations = vec![claim(ghost, p1, day, day)];

        assert!(!rates.knows(ghost));
        assert_eq!(daily_cost(&allocations, p1, day, &rates), Money::ZERO);
    }

    #[test]
    fn test_range_cost_lists_each_day() {
        let s1 = staff(50);
        let p1 = ProjectId::new();
        let rates = RateTable::from_resources([&s1]);
        let allocations = vec![claim(s1.id(), p1, date("2024-01-01"), date("2024-01-03"))];
        let range = DateRange::new(date("2023-12-31"), date("2024-01-04")).unwrap();

        let days = daily_costs(&allocations, p1, range, &rates);
        assert_eq!(days.len(), 5);
        assert_eq!(days[0].cost, Money::ZERO);
        assert_eq!(days[1].cost, Money::from_major(400));
        assert_eq!(range_cost(&allocations, p1, range, &rates), Money::from_major(1200));
    }

    proptest! {
        #[test]
        fn prop_weekly_cost_is_sum_of_days(
            spans in prop::collection::vec((0u64..14, 0u64..6, 0usize..3, 1i64..200), 0..15),
        ) {
            let base = date("2024-01-01");
            let project = ProjectId::new();
            let other = ProjectId::new();
            let resources: Vec<Resource> = spans.iter().map(|(_, _, _, rate)| staff(*rate)).collect();
            let rates = RateTable::from_resources(&resources);

            let allocations: Vec<Allocation> = spans
                .iter()
                .zip(&resources)
                .map(|((offset, len, owner, _), resource)| {
                    let start = base + Days::new(*offset);
                    let project_id = if *owner == 0 { other } else { project };
                    claim(resource.id(), project_id, start, start + Days::new(*len))
                })
                .collect();

            for week in [base, base + Days::new(7)] {
                let week = WeekStart::new(week).unwrap();
                let summed: Money = week
                    .days()
                    .into_iter()
                    .map(|d| daily_cost(&allocations, project, d, &rates))
                    .sum();
                prop_assert_eq!(weekly_cost(&allocations, project, week, &rates), summed);
                prop_assert_eq!(range_cost(&allocations, project, week.range(), &rates), summed);
            }
        }
    }
}
