//! Scheduling domain model.
//!
//! Resources and projects are owned by external directories and only read
//! here. Allocations are the one mutable entity: a claim on a resource for a
//! project over an inclusive range of calendar days.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeDelta, Utc, Weekday};
use crewboard_id::{AllocationId, ProjectId, ResourceId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hours in the planning day used for cost estimates.
pub const NOMINAL_DAY_HOURS: i64 = 8;

// =============================================================================
// Money
// =============================================================================

/// A currency amount in minor units (cents).
///
/// Integer arithmetic keeps repeated aggregation exact, so a weekly figure is
/// always the exact sum of its days. Arithmetic saturates at the `i64` bounds
/// instead of wrapping.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Self = Self(0);

    /// Creates an amount from minor units.
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Creates an amount from whole major units.
    #[must_use]
    pub const fn from_major(major: i64) -> Self {
        Self(major.saturating_mul(100))
    }

    #[must_use]
    pub const fn minor_units(&self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self {
        Self(self.0.saturating_mul(rhs))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

// =============================================================================
// Resources
// =============================================================================

/// Hourly billing rates for a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateCard {
    pub base: Money,
    pub overtime1: Money,
    pub overtime2: Money,
}

impl RateCard {
    /// A rate card that bills `base` per hour with no overtime uplift.
    #[must_use]
    pub const fn flat(base: Money) -> Self {
        Self {
            base,
            overtime1: base,
            overtime2: base,
        }
    }

    /// Planning cost of one nominal work day. Overtime is never applied.
    #[must_use]
    pub fn nominal_day(&self) -> Money {
        self.base * NOMINAL_DAY_HOURS
    }

    pub fn has_negative_rate(&self) -> bool {
        self.base.is_negative() || self.overtime1.is_negative() || self.overtime2.is_negative()
    }

    pub fn exceeds(&self, limit: Money) -> bool {
        self.base > limit || self.overtime1 > limit || self.overtime2 > limit
    }
}

/// Which directory a resource comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Staff,
    Equipment,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::Equipment => "equipment",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staff" => Ok(Self::Staff),
            "equipment" => Ok(Self::Equipment),
            other => Err(UnknownVariant::new("resource kind", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    pub id: ResourceId,
    pub name: String,
    pub role: String,
    pub rates: RateCard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentUnit {
    pub id: ResourceId,
    pub name: String,
    pub category: String,
    pub rates: RateCard,
}

/// A schedulable unit: a person or a piece of equipment.
///
/// Both variants expose the same surface so cost and timeline code never
/// needs to match on the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Resource {
    Staff(StaffMember),
    Equipment(EquipmentUnit),
}

impl Resource {
    pub fn id(&self) -> ResourceId {
        match self {
            Self::Staff(s) => s.id,
            Self::Equipment(e) => e.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Staff(s) => &s.name,
            Self::Equipment(e) => &e.name,
        }
    }

    /// Role for staff, category for equipment.
    pub fn label(&self) -> &str {
        match self {
            Self::Staff(s) => &s.role,
            Self::Equipment(e) => &e.category,
        }
    }

    pub fn rates(&self) -> &RateCard {
        match self {
            Self::Staff(s) => &s.rates,
            Self::Equipment(e) => &e.rates,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Staff(_) => ResourceKind::Staff,
            Self::Equipment(_) => ResourceKind::Equipment,
        }
    }
}

// =============================================================================
// Projects
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    OnHold,
    Completed,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
}

impl Project {
    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }
}

// =============================================================================
// Allocations
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    #[default]
    Scheduled,
    Confirmed,
    Cancelled,
}

impl AllocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllocationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownVariant::new("allocation status", other)),
        }
    }
}

/// A claim on one resource for one project over `[start_date, end_date]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub id: AllocationId,
    pub resource_id: ResourceId,
    pub resource_type: ResourceKind,
    pub project_id: ProjectId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: AllocationStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Allocation {
    /// Cancelled allocations stay stored but claim nothing.
    pub fn is_active(&self) -> bool {
        self.status != AllocationStatus::Cancelled
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn overlaps(&self, range: &DateRange) -> bool {
        self.start_date <= range.to && range.from <= self.end_date
    }

    pub fn range(&self) -> DateRange {
        DateRange {
            from: self.start_date,
            to: self.end_date,
        }
    }

    /// Number of days claimed, counting both ends.
    pub fn days(&self) -> i64 {
        self.range().len_days()
    }
}

/// Input for creating an allocation. The server assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAllocation {
    pub resource_id: ResourceId,
    pub resource_type: ResourceKind,
    pub project_id: ProjectId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub status: AllocationStatus,
    #[serde(default)]
    pub notes: String,
}

impl NewAllocation {
    /// A scheduled single-day allocation.
    pub fn single_day(resource: &Resource, project_id: ProjectId, date: NaiveDate) -> Self {
        Self {
            resource_id: resource.id(),
            resource_type: resource.kind(),
            project_id,
            start_date: date,
            end_date: date,
            status: AllocationStatus::Scheduled,
            notes: String::new(),
        }
    }

    pub fn validate(&self) -> Result<DateRange, InvalidRange> {
        DateRange::new(self.start_date, self.end_date)
    }

    /// Materializes the stored record.
    pub fn into_allocation(self, id: AllocationId, now: DateTime<Utc>) -> Allocation {
        Allocation {
            id,
            resource_id: self.resource_id,
            resource_type: self.resource_type,
            project_id: self.project_id,
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of an allocation's dates, status, or notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AllocationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AllocationPatch {
    pub fn dates(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date: Some(start_date),
            end_date: Some(end_date),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start_date.is_none()
            && self.end_date.is_none()
            && self.status.is_none()
            && self.notes.is_none()
    }

    /// Returns the patched record. `updated_at` is left to the store.
    pub fn apply(&self, current: &Allocation) -> Result<Allocation, InvalidRange> {
        let start_date = self.start_date.unwrap_or(current.start_date);
        let end_date = self.end_date.unwrap_or(current.end_date);
        DateRange::new(start_date, end_date)?;

        Ok(Allocation {
            start_date,
            end_date,
            status: self.status.unwrap_or(current.status),
            notes: self.notes.clone().unwrap_or_else(|| current.notes.clone()),
            ..current.clone()
        })
    }
}

/// Next `updated_at` for a record last written at `previous`.
///
/// Strictly later than `previous` at microsecond precision, which is what
/// Postgres keeps.
pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    let floor = previous + TimeDelta::microseconds(1);
    if now < floor {
        floor
    } else {
        now
    }
}

// =============================================================================
// Dates
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("start date {start} is after end date {end}")]
pub struct InvalidRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, InvalidRange> {
        if from > to {
            return Err(InvalidRange {
                start: from,
                end: to,
            });
        }
        Ok(Self { from, to })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            from: date,
            to: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    pub fn len_days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    /// Rejects ranges longer than `max_days`.
    pub fn limit(self, max_days: i64) -> Result<Self, RangeTooLarge> {
        let days = self.len_days();
        if days > max_days {
            return Err(RangeTooLarge {
                from: self.from,
                to: self.to,
                days,
                max_days,
            });
        }
        Ok(self)
    }

    /// Every day in the range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let to = self.to;
        self.from.iter_days().take_while(move |d| *d <= to)
    }
}

/// Longest range, in days, that conflict and cost queries will scan.
pub const MAX_QUERY_DAYS: i64 = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("range {from}..{to} covers {days} days, at most {max_days} allowed")]
pub struct RangeTooLarge {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days: i64,
    pub max_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidWeekStart {
    #[error("week start {date} is a {weekday}, expected a Monday")]
    NotMonday { date: NaiveDate, weekday: Weekday },

    #[error("week starting {0} ends past the last representable date")]
    OutOfRange(NaiveDate),
}

/// The Monday that opens a timeline week. All seven days are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "NaiveDate", into = "NaiveDate")]
pub struct WeekStart(NaiveDate);

impl WeekStart {
    pub fn new(date: NaiveDate) -> Result<Self, InvalidWeekStart> {
        match date.weekday() {
            Weekday::Mon => {}
            weekday => return Err(InvalidWeekStart::NotMonday { date, weekday }),
        }
        date.checked_add_days(Days::new(6))
            .ok_or(InvalidWeekStart::OutOfRange(date))?;
        Ok(Self(date))
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Monday through Sunday.
    pub fn days(&self) -> [NaiveDate; 7] {
        let mut days = [self.0; 7];
        for (day, date) in days.iter_mut().zip(self.0.iter_days()) {
            *day = date;
        }
        days
    }

    pub fn range(&self) -> DateRange {
        DateRange {
            from: self.0,
            to: self.days()[6],
        }
    }
}

impl TryFrom<NaiveDate> for WeekStart {
    type Error = InvalidWeekStart;

    fn try_from(date: NaiveDate) -> Result<Self, Self::Error> {
        Self::new(date)
    }
}

impl From<WeekStart> for NaiveDate {
    fn from(week: WeekStart) -> Self {
        week.0
    }
}

impl fmt::Display for WeekStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored string did not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn allocation(start: &str, end: &str) -> Allocation {
        let now = Utc::now();
        Allocation {
            id: AllocationId::new(),
            resource_id: ResourceId::new(),
            resource_type: ResourceKind::Staff,
            project_id: ProjectId::new(),
            start_date: date(start),
            end_date: date(end),
            status: AllocationStatus::Scheduled,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_money_display_and_sum() {
        assert_eq!(Money::from_minor(40_000).to_string(), "400.00");
        assert_eq!(Money::from_minor(-5).to_string(), "-0.05");
        let total: Money = [Money::from_major(1), Money::from_minor(50)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_minor(150));
    }

    #[test]
    fn test_nominal_day_ignores_overtime() {
        let rates = RateCard {
            base: Money::from_major(50),
            overtime1: Money::from_major(75),
            overtime2: Money::from_major(100),
        };
        assert_eq!(rates.nominal_day(), Money::from_major(400));
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        let err = DateRange::new(date("2024-01-03"), date("2024-01-01")).unwrap_err();
        assert_eq!(err.start, date("2024-01-03"));
        assert!(DateRange::new(date("2024-01-01"), date("2024-01-01")).is_ok());
    }

    #[test]
    fn test_date_range_days() {
        let range = DateRange::new(date("2024-02-27"), date("2024-03-01")).unwrap();
        let days: Vec<_> = range.days().collect();
        assert_eq!(days.len(), 4);
        assert_eq!(range.len_days(), 4);
        assert_eq!(days[2], date("2024-02-29"));
    }

    #[test]
    fn test_week_start_requires_monday() {
        assert!(WeekStart::new(date("2024-01-01")).is_ok());
        let err = WeekStart::new(date("2024-01-03")).unwrap_err();
        assert!(matches!(
            err,
            InvalidWeekStart::NotMonday {
                weekday: Weekday::Wed,
                ..
            }
        ));
    }

    #[test]
    fn test_week_start_near_max_date_is_rejected() {
        // The last Monday whose Sunday still exists.
        let last = NaiveDate::MAX - Days::new(6);
        let last_monday = last - Days::new(u64::from(last.weekday().num_days_from_monday()));
        let week = WeekStart::new(last_monday).unwrap();
        assert_eq!(week.range().len_days(), 7);

        if let Some(too_late) = last_monday.checked_add_days(Days::new(7)) {
            assert_eq!(
                WeekStart::new(too_late),
                Err(InvalidWeekStart::OutOfRange(too_late))
            );
        }

        let json: NaiveDate = serde_json::from_str("\"+262142-12-31\"").unwrap();
        assert!(WeekStart::new(json).is_err());
        assert!(serde_json::from_str::<WeekStart>("\"+262142-12-31\"").is_err());
    }

    #[test]
    fn test_range_limit() {
        let year = DateRange::new(date("2024-01-01"), date("2024-12-31")).unwrap();
        assert_eq!(year.limit(MAX_QUERY_DAYS), Ok(year));

        let huge = DateRange::new(date("0001-01-01"), date("9999-12-31")).unwrap();
        let err = huge.limit(MAX_QUERY_DAYS).unwrap_err();
        assert_eq!(err.days, 3_652_059);
        assert_eq!(err.max_days, MAX_QUERY_DAYS);
    }

    #[test]
    fn test_money_saturates_instead_of_overflowing() {
        let big = Money::from_minor(i64::MAX / 2);
        assert_eq!(big * NOMINAL_DAY_HOURS, Money::from_minor(i64::MAX));
        let total: Money = [big, big, big].into_iter().sum();
        assert_eq!(total, Money::from_minor(i64::MAX));
        assert_eq!(Money::from_major(i64::MAX), Money::from_minor(i64::MAX));
    }

    #[test]
    fn test_week_days_span_monday_to_sunday() {
        let week = WeekStart::new(date("2024-01-29")).unwrap();
        let days = week.days();
        assert_eq!(days[0], date("2024-01-29"));
        assert_eq!(days[6], date("2024-02-04"));
        assert_eq!(week.range().to, days[6]);
    }

    #[test]
    fn test_week_start_deserialize_rejects_non_monday() {
        assert!(serde_json::from_str::<WeekStart>("\"2024-01-01\"").is_ok());
        assert!(serde_json::from_str::<WeekStart>("\"2024-01-02\"").is_err());
    }

    #[test]
    fn test_allocation_contains_is_inclusive() {
        let a = allocation("2024-01-01", "2024-01-03");
        assert!(a.contains(date("2024-01-01")));
        assert!(a.contains(date("2024-01-03")));
        assert!(!a.contains(date("2024-01-04")));
        assert_eq!(a.days(), 3);
    }

    #[test]
    fn test_patch_apply_validates_resulting_range() {
        let a = allocation("2024-01-01", "2024-01-03");
        let patch = AllocationPatch {
            start_date: Some(date("2024-01-05")),
            ..Default::default()
        };
        assert!(patch.apply(&a).is_err());

        let patched = AllocationPatch::dates(date("2024-01-02"), date("2024-01-05"))
            .apply(&a)
            .unwrap();
        assert_eq!(patched.id, a.id);
        assert_eq!(patched.end_date, date("2024-01-05"));
        assert_eq!(patched.notes, a.notes);
    }

    #[test]
    fn test_allocation_json_shape() {
        let a = allocation("2024-01-01", "2024-01-01");
        let value = serde_json::to_value(&a).unwrap();
        assert_eq!(value["startDate"], "2024-01-01");
        assert_eq!(value["resourceType"], "staff");
        assert_eq!(value["status"], "scheduled");
        assert!(value["resourceId"].as_str().unwrap().starts_with("res_"));
    }

    #[test]
    fn test_resource_uniform_surface() {
        let unit = Resource::Equipment(EquipmentUnit {
            id: ResourceId::new(),
            name: "Excavator 3".to_string(),
            category: "Earthmoving".to_string(),
            rates: RateCard::flat(Money::from_major(120)),
        });
        assert_eq!(unit.kind(), ResourceKind::Equipment);
        assert_eq!(unit.label(), "Earthmoving");
        assert_eq!(unit.rates().nominal_day(), Money::from_major(960));
        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["type"], "equipment");
    }

    #[test]
    fn test_next_timestamp_is_strictly_increasing() {
        let future = Utc::now() + TimeDelta::seconds(60);
        let next = next_timestamp(future);
        assert!(next > future);
    }
}
