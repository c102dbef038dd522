//! In-process allocation store.
//!
//! Records live in a map keyed by id. Each resource also keeps a vector of
//! `(start_date, id)` entries sorted ascending, so a range query is a binary
//! search plus a short forward scan instead of a walk over every record.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use crewboard_id::{AllocationId, ProjectId, ResourceId};
use tokio::sync::RwLock;
use tracing::debug;

use super::{AllocationStore, StoreError, StoreResult};
use crate::model::{next_timestamp, Allocation, AllocationPatch, DateRange, NewAllocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IndexEntry {
    start: NaiveDate,
    end: NaiveDate,
    id: AllocationId,
}

impl IndexEntry {
    fn of(allocation: &Allocation) -> Self {
        Self {
            start: allocation.start_date,
            end: allocation.end_date,
            id: allocation.id,
        }
    }

    fn key(&self) -> (NaiveDate, AllocationId) {
        (self.start, self.id)
    }

    fn span_days(&self) -> u64 {
        (self.end - self.start).num_days().unsigned_abs()
    }
}

/// Per-resource entries ordered by `(start, id)`.
///
/// End dates are not monotonic in start order, so the scan starts at the
/// first entry that could still reach `from`: anything starting more than
/// `longest_span` days before `from` has ended before it.
#[derive(Debug, Default)]
struct ResourceIndex {
    entries: Vec<IndexEntry>,
    longest_span: u64,
}

impl ResourceIndex {
    fn insert(&mut self, entry: IndexEntry) {
        let pos = self.entries.partition_point(|e| e.key() < entry.key());
        self.entries.insert(pos, entry);
        self.longest_span = self.longest_span.max(entry.span_days());
    }

    fn remove(&mut self, start: NaiveDate, id: AllocationId) -> bool {
        let pos = self.entries.partition_point(|e| e.key() < (start, id));
        match self.entries.get(pos) {
            Some(e) if e.id == id => {
                let removed = self.entries.remove(pos);
                if removed.span_days() == self.longest_span {
                    self.longest_span = self
                        .entries
                        .iter()
                        .map(IndexEntry::span_days)
                        .max()
                        .unwrap_or(0);
                }
                true
            }
            _ => false,
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn overlapping(&self, range: DateRange) -> impl Iterator<Item = AllocationId> + '_ {
        let earliest = range
            .from
            .checked_sub_days(Days::new(self.longest_span))
            .unwrap_or(NaiveDate::MIN);
        let first = self.entries.partition_point(|e| e.start < earliest);

        self.entries[first..]
            .iter()
            .take_while(move |e| e.start <= range.to)
            .filter(move |e| e.end >= range.from)
            .map(|e| e.id)
    }

    fn ids(&self) -> impl Iterator<Item = AllocationId> + '_ {
        self.entries.iter().map(|e| e.id)
    }
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<AllocationId, Allocation>,
    by_resource: HashMap<ResourceId, ResourceIndex>,
}

impl Inner {
    fn index(&mut self, allocation: &Allocation) {
        self.by_resource
            .entry(allocation.resource_id)
            .or_default()
            .insert(IndexEntry::of(allocation));
    }

    fn unindex(&mut self, allocation: &Allocation) {
        if let Some(index) = self.by_resource.get_mut(&allocation.resource_id) {
            index.remove(allocation.start_date, allocation.id);
            if index.is_empty() {
                self.by_resource.remove(&allocation.resource_id);
            }
        }
    }

    fn collect(&self, ids: impl Iterator<Item = AllocationId>) -> Vec<Allocation> {
        ids.filter_map(|id| self.records.get(&id).cloned()).collect()
    }
}

fn sort_by_start(allocations: &mut [Allocation]) {
    allocations.sort_by(|a, b| (a.start_date, a.id).cmp(&(b.start_date, b.id)));
}

/// Allocation store held entirely in memory. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryAllocationStore {
    inner: RwLock<Inner>,
}

impl MemoryAllocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AllocationStore for MemoryAllocationStore {
    async fn create(&self, new: NewAllocation) -> StoreResult<Allocation> {
        new.validate()?;
        let allocation = new.into_allocation(AllocationId::new(), Utc::now());

        let mut inner = self.inner.write().await;
        inner.index(&allocation);
        inner.records.insert(allocation.id, allocation.clone());

        debug!(allocation_id = %allocation.id, resource_id = %allocation.resource_id, "Stored allocation");
        Ok(allocation)
    }

    async fn get(&self, id: AllocationId) -> StoreResult<Option<Allocation>> {
        Ok(self.inner.read().await.records.get(&id).cloned())
    }

    async fn update(&self, id: AllocationId, patch: AllocationPatch) -> StoreResult<Allocation> {
        let mut inner = self.inner.write().await;
        let current = inner.records.get(&id).ok_or(StoreError::NotFound(id))?;

        let mut next = patch.apply(current)?;
        next.updated_at = next_timestamp(current.updated_at);

        if next.start_date != current.start_date || next.end_date != current.end_date {
            let previous = current.clone();
            inner.unindex(&previous);
            inner.index(&next);
        }
        inner.records.insert(id, next.clone());

        Ok(next)
    }

    async fn delete(&self, id: AllocationId) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.records.remove(&id) {
            Some(removed) => {
                inner.unindex(&removed);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_by_resource(&self, resource_id: ResourceId) -> StoreResult<Vec<Allocation>> {
        let inner = self.inner.read().await;
        Ok(match inner.by_resource.get(&resource_id) {
            Some(index) => inner.collect(index.ids()),
            None => Vec::new(),
        })
    }

    async fn list_by_resource_and_range(
        &self,
        resource_id: ResourceId,
        range: DateRange,
    ) -> StoreResult<Vec<Allocation>> {
        let inner = self.inner.read().await;
        Ok(match inner.by_resource.get(&resource_id) {
            Some(index) => inner.collect(index.overlapping(range)),
            None => Vec::new(),
        })
    }

    async fn list_by_project_and_range(
        &self,
        project_id: ProjectId,
        range: DateRange,
    ) -> StoreResult<Vec<Allocation>> {
        let inner = self.inner.read().await;
        let mut found: Vec<Allocation> = inner
            .records
            .values()
            .filter(|a| a.project_id == project_id && a.overlaps(&range))
            .cloned()
            .collect();
        sort_by_start(&mut found);
        Ok(found)
    }

    async fn list_in_range(&self, range: DateRange) -> StoreResult<Vec<Allocation>> {
        let inner = self.inner.read().await;
        let mut found: Vec<Allocation> = inner
            .by_resource
            .values()
            .flat_map(|index| index.overlapping(range))
            .filter_map(|id| inner.records.get(&id).cloned())
            .collect();
        sort_by_start(&mut found);
        Ok(found)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
