//! End-to-end scheduling scenarios against the in-memory store.
//!
//! Each test walks the same timeline a planner would: place a resource,
//! double-book it, stretch an allocation, then take a booking away, checking
//! costs and conflict flags after every step.

mod common;

use chrono::Duration;
use common::{date, Fixture};
use crewboard_scheduler::{
    db::StoreError,
    model::{
        AllocationPatch, AllocationStatus, DateRange, Money, NewAllocation, WeekStart,
        MAX_QUERY_DAYS,
    },
    scheduler::SchedulerError,
};

fn monday() -> WeekStart {
    WeekStart::new(date(2024, 1, 1)).unwrap()
}

#[tokio::test]
async fn single_day_placement_costs_one_nominal_day() {
    let fx = Fixture::new();
    let day = date(2024, 1, 1);

    fx.service
        .create_allocation(NewAllocation::single_day(&fx.staff, fx.p1.id, day))
        .await
        .unwrap();

    let cost = fx.service.daily_cost(fx.p1.id, day).await.unwrap();
    assert_eq!(cost, Money::from_major(400));

    // Nothing was placed on P2.
    let other = fx.service.daily_cost(fx.p2.id, day).await.unwrap();
    assert_eq!(other, Money::ZERO);
}

#[tokio::test]
async fn double_booking_is_flagged_on_both_projects() {
    let fx = Fixture::new();
    let day = date(2024, 1, 1);
    let staff_id = fx.staff.id();

    fx.service
        .create_allocation(NewAllocation::single_day(&fx.staff, fx.p1.id, day))
        .await
        .unwrap();
    fx.service
        .create_allocation(NewAllocation::single_day(&fx.staff, fx.p2.id, day))
        .await
        .unwrap();

    assert_eq!(fx.service.conflict_count(staff_id, day).await.unwrap(), 2);
    assert!(fx.service.is_conflicted(staff_id, day).await.unwrap());

    let matrix = fx
        .service
        .build_week(monday(), &[fx.p1.id, fx.p2.id])
        .await
        .unwrap();

    for project_id in [fx.p1.id, fx.p2.id] {
        let row = matrix.project(project_id).expect("row for project");
        let cell = row.cell(day).expect("cell for day");
        assert_eq!(cell.allocations.len(), 1);
        assert!(cell.allocations[0].conflicted);
        assert_eq!(cell.conflicts, vec![staff_id]);

        // The next day is clear.
        let next = row.cell(day + Duration::days(1)).unwrap();
        assert!(next.allocations.is_empty());
        assert!(next.conflicts.is_empty());
    }

    // Both projects pay for the day; double booking is not deduplicated.
    assert_eq!(matrix.total_cost, Money::from_major(800));
}

#[tokio::test]
async fn extending_an_allocation_adds_whole_days_to_the_week() {
    let fx = Fixture::new();
    let day = date(2024, 1, 1);

    let allocation = fx
        .service
        .create_allocation(NewAllocation::single_day(&fx.staff, fx.p1.id, day))
        .await
        .unwrap();
    let before = fx.service.weekly_cost(fx.p1.id, monday()).await.unwrap();
    assert_eq!(before, Money::from_major(400));

    let updated = fx
        .service
        .update_allocation(
            allocation.id,
            AllocationPatch::dates(day, date(2024, 1, 3)),
        )
        .await
        .unwrap();
    assert_eq!(updated.id, allocation.id);
    assert_eq!(updated.created_at, allocation.created_at);
    assert!(updated.updated_at > allocation.updated_at);

    for offset in 0..3 {
        let d = day + Duration::days(offset);
        let cost = fx.service.daily_cost(fx.p1.id, d).await.unwrap();
        assert_eq!(cost, Money::from_major(400), "cost on {d}");
    }
    let after_day = fx.service.daily_cost(fx.p1.id, date(2024, 1, 4)).await.unwrap();
    assert_eq!(after_day, Money::ZERO);

    let after = fx.service.weekly_cost(fx.p1.id, monday()).await.unwrap();
    assert_eq!(after, before + Money::from_major(800));
}

#[tokio::test]
async fn removing_the_second_booking_clears_the_conflict() {
    let fx = Fixture::new();
    let day = date(2024, 1, 1);
    let staff_id = fx.staff.id();

    fx.service
        .create_allocation(NewAllocation::single_day(&fx.staff, fx.p1.id, day))
        .await
        .unwrap();
    let second = fx
        .service
        .create_allocation(NewAllocation::single_day(&fx.staff, fx.p2.id, day))
        .await
        .unwrap();
    assert!(fx.service.is_conflicted(staff_id, day).await.unwrap());

    assert!(fx.service.delete_allocation(second.id).await.unwrap());

    assert_eq!(fx.service.conflict_count(staff_id, day).await.unwrap(), 1);
    assert!(!fx.service.is_conflicted(staff_id, day).await.unwrap());

    let report = fx
        .service
        .conflict_report(monday().range())
        .await
        .unwrap();
    assert!(report.is_empty());
}

#[tokio::test]
async fn delete_is_idempotent() {
    let fx = Fixture::new();
    let allocation = fx
        .service
        .create_allocation(NewAllocation::single_day(
            &fx.excavator,
            fx.p1.id,
            date(2024, 1, 2),
        ))
        .await
        .unwrap();

    assert!(fx.service.delete_allocation(allocation.id).await.unwrap());
    assert!(!fx.service.delete_allocation(allocation.id).await.unwrap());
    assert!(fx.store.is_empty().await);

    let err = fx.service.get_allocation(allocation.id).await.unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Store(StoreError::NotFound(id)) if id == allocation.id
    ));
}

#[tokio::test]
async fn inverted_range_is_rejected_and_nothing_is_stored() {
    let fx = Fixture::new();
    let new = NewAllocation {
        start_date: date(2024, 1, 5),
        end_date: date(2024, 1, 2),
        ..NewAllocation::single_day(&fx.staff, fx.p1.id, date(2024, 1, 5))
    };

    let err = fx.service.create_allocation(new).await.unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Store(StoreError::InvalidRange(_))
    ));
    assert!(fx.store.is_empty().await);
}

#[tokio::test]
async fn inverted_patch_leaves_allocation_untouched() {
    let fx = Fixture::new();
    let allocation = fx
        .service
        .create_allocation(NewAllocation::single_day(&fx.staff, fx.p1.id, date(2024, 1, 3)))
        .await
        .unwrap();

    let patch = AllocationPatch {
        end_date: Some(date(2024, 1, 1)),
        ..Default::default()
    };
    let err = fx
        .service
        .update_allocation(allocation.id, patch)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Store(StoreError::InvalidRange(_))
    ));

    let stored = fx.service.get_allocation(allocation.id).await.unwrap();
    assert_eq!(stored, allocation);
}

#[tokio::test]
async fn unknown_resource_and_project_are_rejected() {
    let fx = Fixture::new();
    let day = date(2024, 1, 1);

    let stranger = common::project("Nowhere");
    let err = fx
        .service
        .create_allocation(NewAllocation::single_day(&fx.staff, stranger.id, day))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Store(StoreError::UnknownProject(id)) if id == stranger.id
    ));

    // Right id, wrong kind.
    let mismatched = NewAllocation {
        resource_type: crewboard_scheduler::model::ResourceKind::Equipment,
        ..NewAllocation::single_day(&fx.staff, fx.p1.id, day)
    };
    let err = fx.service.create_allocation(mismatched).await.unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Store(StoreError::UnknownResource(_))
    ));

    assert!(fx.store.is_empty().await);
}

#[tokio::test]
async fn cancelled_allocations_neither_conflict_nor_cost() {
    let fx = Fixture::new();
    let day = date(2024, 1, 1);
    let staff_id = fx.staff.id();

    fx.service
        .create_allocation(NewAllocation::single_day(&fx.staff, fx.p1.id, day))
        .await
        .unwrap();
    let second = fx
        .service
        .create_allocation(NewAllocation::single_day(&fx.staff, fx.p2.id, day))
        .await
        .unwrap();

    fx.service
        .update_allocation(
            second.id,
            AllocationPatch {
                status: Some(AllocationStatus::Cancelled),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(fx.service.conflict_count(staff_id, day).await.unwrap(), 1);
    assert_eq!(
        fx.service.daily_cost(fx.p2.id, day).await.unwrap(),
        Money::ZERO
    );
}

#[tokio::test]
async fn week_defaults_to_active_projects_by_name() {
    let fx = Fixture::new();

    let matrix = fx.service.build_week(monday(), &[]).await.unwrap();

    let names: Vec<&str> = matrix
        .projects
        .iter()
        .map(|row| row.project_name.as_str())
        .collect();
    assert_eq!(names, ["Airport Terminal", "Harbour Bridge"]);
    assert_eq!(matrix.days[0], date(2024, 1, 1));
    assert_eq!(matrix.days[6], date(2024, 1, 7));
    assert_eq!(matrix.total_cost, Money::ZERO);
}

#[tokio::test]
async fn week_rejects_unknown_project() {
    let fx = Fixture::new();
    let stranger = common::project("Nowhere");

    let err = fx
        .service
        .build_week(monday(), &[fx.p1.id, stranger.id])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Store(StoreError::UnknownProject(id)) if id == stranger.id
    ));
}

#[tokio::test]
async fn range_costs_sum_to_the_weekly_cost() {
    let fx = Fixture::new();

    fx.service
        .create_allocation(NewAllocation {
            end_date: date(2024, 1, 5),
            ..NewAllocation::single_day(&fx.staff, fx.p1.id, date(2024, 1, 1))
        })
        .await
        .unwrap();
    fx.service
        .create_allocation(NewAllocation {
            end_date: date(2024, 1, 9),
            ..NewAllocation::single_day(&fx.excavator, fx.p1.id, date(2024, 1, 4))
        })
        .await
        .unwrap();

    let days = fx
        .service
        .daily_costs(fx.p1.id, monday().range())
        .await
        .unwrap();
    assert_eq!(days.len(), 7);

    let summed: Money = days.iter().map(|d| d.cost).sum();
    let weekly = fx.service.weekly_cost(fx.p1.id, monday()).await.unwrap();
    assert_eq!(summed, weekly);

    // 5 staff days at 400 plus 4 in-week excavator days at 960.
    assert_eq!(weekly, Money::from_major(5 * 400 + 4 * 960));
}

#[tokio::test]
async fn day_by_day_reads_refuse_oversized_ranges() {
    let fx = Fixture::new();
    let too_long = DateRange::new(date(2024, 1, 1), date(2025, 1, 1)).unwrap();
    assert_eq!(too_long.len_days(), MAX_QUERY_DAYS + 1);

    let err = fx.service.daily_costs(fx.p1.id, too_long).await.unwrap_err();
    assert!(matches!(err, SchedulerError::RangeTooLarge(ref e) if e.days == 367));
    assert!(matches!(
        fx.service.conflict_report(too_long).await,
        Err(SchedulerError::RangeTooLarge(_))
    ));
    assert!(matches!(
        fx.service.conflicts_for_resource(fx.staff.id(), too_long).await,
        Err(SchedulerError::RangeTooLarge(_))
    ));

    let year = DateRange::new(date(2024, 1, 1), date(2024, 12, 31)).unwrap();
    assert_eq!(fx.service.daily_costs(fx.p1.id, year).await.unwrap().len(), 366);
}
