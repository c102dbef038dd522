//! The client's local picture of allocations.
//!
//! Entries sit in a `BTreeMap` under a slot number handed out at insertion,
//! so display order is stable while keys change underneath. Confirming a
//! pending placement overwrites its entry in place: readers see either the
//! temporary record or the server record, never neither.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use crewboard_id::{AllocationId, ProjectId, ResourceId, TempAllocationId};
use serde::Serialize;

use super::state::LocalKey;
use crate::model::{
    Allocation, AllocationPatch, AllocationStatus, DateRange, InvalidRange, NewAllocation,
    ResourceKind,
};

/// Position of an entry in the view. Never reused.
pub type Slot = u64;

/// The fields a view shows for an allocation, pending or confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalAllocation {
    pub resource_id: ResourceId,
    pub resource_type: ResourceKind,
    pub project_id: ProjectId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: AllocationStatus,
    pub notes: String,
}

impl LocalAllocation {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn apply(&self, patch: &AllocationPatch) -> Result<Self, InvalidRange> {
        let start_date = patch.start_date.unwrap_or(self.start_date);
        let end_date = patch.end_date.unwrap_or(self.end_date);
        DateRange::new(start_date, end_date)?;

        Ok(Self {
            start_date,
            end_date,
            status: patch.status.unwrap_or(self.status),
            notes: patch.notes.clone().unwrap_or_else(|| self.notes.clone()),
            ..self.clone()
        })
    }
}

impl From<&Allocation> for LocalAllocation {
    fn from(a: &Allocation) -> Self {
        Self {
            resource_id: a.resource_id,
            resource_type: a.resource_type,
            project_id: a.project_id,
            start_date: a.start_date,
            end_date: a.end_date,
            status: a.status,
            notes: a.notes.clone(),
        }
    }
}

impl From<&NewAllocation> for LocalAllocation {
    fn from(a: &NewAllocation) -> Self {
        Self {
            resource_id: a.resource_id,
            resource_type: a.resource_type,
            project_id: a.project_id,
            start_date: a.start_date,
            end_date: a.end_date,
            status: a.status,
            notes: a.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewEntry {
    pub slot: Slot,
    pub key: LocalKey,
    pub allocation: LocalAllocation,
}

impl ViewEntry {
    /// Still waiting on the server.
    pub fn is_pending(&self) -> bool {
        matches!(self.key, LocalKey::Temp(_))
    }
}

#[derive(Debug, Default)]
pub struct LocalView {
    entries: BTreeMap<Slot, ViewEntry>,
    slots: HashMap<LocalKey, Slot>,
    next_slot: Slot,
}

impl LocalView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_pending()).count()
    }

    pub fn get(&self, key: LocalKey) -> Option<&ViewEntry> {
        self.slots.get(&key).and_then(|slot| self.entries.get(slot))
    }

    /// Every entry in slot order.
    pub fn snapshot(&self) -> Vec<ViewEntry> {
        self.entries.values().cloned().collect()
    }

    /// Entries claiming `date`, in slot order.
    pub fn on_date(&self, date: NaiveDate) -> Vec<ViewEntry> {
        self.entries
            .values()
            .filter(|e| e.allocation.contains(date))
            .cloned()
            .collect()
    }

    fn push(&mut self, key: LocalKey, allocation: LocalAllocation) -> Slot {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.entries.insert(
            slot,
            ViewEntry {
                slot,
                key,
                allocation,
            },
        );
        self.slots.insert(key, slot);
        slot
    }

    pub fn insert_pending(&mut self, temp_id: TempAllocationId, allocation: LocalAllocation) -> Slot {
        self.push(LocalKey::Temp(temp_id), allocation)
    }

    /// Inserts or overwrites the entry for a server record.
    pub fn upsert_confirmed(&mut self, allocation: &Allocation) -> Slot {
        let key = LocalKey::Server(allocation.id);
        match self.slots.get(&key).copied() {
            Some(slot) => {
                if let Some(entry) = self.entries.get_mut(&slot) {
                    entry.allocation = allocation.into();
                }
                slot
            }
            None => self.push(key, allocation.into()),
        }
    }

    /// Swaps a pending entry for the server record in the same slot.
    ///
    /// Returns `false` when the pending entry is gone, i.e. the placement was
    /// cancelled or rolled back first.
    pub fn confirm(&mut self, temp_id: TempAllocationId, allocation: &Allocation) -> bool {
        let Some(slot) = self.slots.remove(&LocalKey::Temp(temp_id)) else {
            return false;
        };

        let server_key = LocalKey::Server(allocation.id);
        if let Some(existing) = self.slots.get(&server_key).copied() {
            // A refresh already brought the server record in.
            if let Some(entry) = self.entries.get_mut(&existing) {
                entry.allocation = allocation.into();
            }
            self.entries.remove(&slot);
            return true;
        }

        match self.entries.get_mut(&slot) {
            Some(entry) => {
                entry.key = server_key;
                entry.allocation = allocation.into();
                self.slots.insert(server_key, slot);
                true
            }
            None => false,
        }
    }

    /// Drops a pending entry. Returns it if it was still there.
    pub fn roll_back(&mut self, temp_id: TempAllocationId) -> Option<ViewEntry> {
        self.remove(LocalKey::Temp(temp_id))
    }

    /// Overwrites the shown fields, returning what was there before.
    pub fn replace(&mut self, key: LocalKey, allocation: LocalAllocation) -> Option<LocalAllocation> {
        let slot = self.slots.get(&key)?;
        let entry = self.entries.get_mut(slot)?;
        Some(std::mem::replace(&mut entry.allocation, allocation))
    }

    /// Overwrites the entry with `next` only if it still shows `expected`,
    /// so a late response cannot clobber a newer local edit.
    pub fn replace_if(
        &mut self,
        key: LocalKey,
        expected: &LocalAllocation,
        next: LocalAllocation,
    ) -> bool {
        let Some(entry) = self
            .slots
            .get(&key)
            .and_then(|slot| self.entries.get_mut(slot))
        else {
            return false;
        };
        if &entry.allocation != expected {
            return false;
        }
        entry.allocation = next;
        true
    }

    pub fn remove(&mut self, key: LocalKey) -> Option<ViewEntry> {
        let slot = self.slots.remove(&key)?;
        self.entries.remove(&slot)
    }

    /// Puts a removed entry back in its original slot. Does nothing if the
    /// key has reappeared since.
    pub fn reinsert(&mut self, entry: ViewEntry) -> bool {
        if self.slots.contains_key(&entry.key) || self.entries.contains_key(&entry.slot) {
            return false;
        }
        self.slots.insert(entry.key, entry.slot);
        self.entries.insert(entry.slot, entry);
        true
    }

    /// Makes confirmed entries match `allocations` exactly. Pending entries
    /// are left alone.
    pub fn sync_confirmed(&mut self, allocations: &[Allocation]) {
        let fresh: HashMap<AllocationId, &Allocation> =
            allocations.iter().map(|a| (a.id, a)).collect();

        let stale: Vec<LocalKey> = self
            .slots
            .keys()
            .filter(|key| match key {
                LocalKey::Server(id) => !fresh.contains_key(id),
                LocalKey::Temp(_) => false,
            })
            .copied()
            .collect();
        for key in stale {
            self.remove(key);
        }

        let mut ordered: Vec<&Allocation> = fresh.into_values().collect();
        ordered.sort_by_key(|a| (a.start_date, a.id));
        for allocation in ordered {
            self.upsert_confirmed(allocation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn draft(day: &str) -> NewAllocation {
        NewAllocation {
            resource_id: ResourceId::new(),
            resource_type: ResourceKind::Staff,
            project_id: ProjectId::new(),
            start_date: date(day),
            end_date: date(day),
            status: AllocationStatus::Scheduled,
            notes: String::new(),
        }
    }

    fn server_copy(new: &NewAllocation) -> Allocation {
        new.clone().into_allocation(AllocationId::new(), Utc::now())
    }

    #[test]
    fn test_confirm_keeps_slot_and_order() {
        let mut view = LocalView::new();
        let first = draft("2024-01-01");
        let second = draft("2024-01-02");
        let t1 = TempAllocationId::new();
        let t2 = TempAllocationId::new();
        let slot1 = view.insert_pending(t1, (&first).into());
        view.insert_pending(t2, (&second).into());

        let confirmed = server_copy(&first);
        assert!(view.confirm(t1, &confirmed));

        let snapshot = view.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].slot, slot1);
        assert_eq!(snapshot[0].key, LocalKey::Server(confirmed.id));
        assert!(!snapshot[0].is_pending());
        assert!(snapshot[1].is_pending());
        assert!(view.get(LocalKey::Temp(t1)).is_none());
    }

    #[test]
    fn test_confirm_after_rollback_is_ignored() {
        let mut view = LocalView::new();
        let new = draft("2024-01-01");
        let temp = TempAllocationId::new();
        view.insert_pending(temp, (&new).into());

        assert!(view.roll_back(temp).is_some());
        assert!(!view.confirm(temp, &server_copy(&new)));
        assert!(view.is_empty());
    }

    #[test]
    fn test_confirm_merges_with_refreshed_record() {
        let mut view = LocalView::new();
        let new = draft("2024-01-01");
        let temp = TempAllocationId::new();
        view.insert_pending(temp, (&new).into());

        let server = server_copy(&new);
        view.sync_confirmed(std::slice::from_ref(&server));
        assert_eq!(view.len(), 2);

        assert!(view.confirm(temp, &server));
        assert_eq!(view.len(), 1);
        assert!(view.get(LocalKey::Server(server.id)).is_some());
    }

    #[test]
    fn test_replace_if_respects_newer_edit() {
        let mut view = LocalView::new();
        let server = server_copy(&draft("2024-01-01"));
        view.upsert_confirmed(&server);
        let key = LocalKey::Server(server.id);

        let original: LocalAllocation = (&server).into();
        let edit = original
            .apply(&AllocationPatch::dates(date("2024-01-02"), date("2024-01-03")))
            .unwrap();
        view.replace(key, edit.clone());

        let newer = original
            .apply(&AllocationPatch::dates(date("2024-01-05"), date("2024-01-05")))
            .unwrap();
        view.replace(key, newer.clone());

        assert!(!view.replace_if(key, &edit, original.clone()));
        assert_eq!(view.get(key).unwrap().allocation, newer);
        assert!(view.replace_if(key, &newer, original.clone()));
        assert_eq!(view.get(key).unwrap().allocation, original);
    }

    #[test]
    fn test_reinsert_restores_original_position() {
        let mut view = LocalView::new();
        let a = server_copy(&draft("2024-01-01"));
        let b = server_copy(&draft("2024-01-02"));
        view.upsert_confirmed(&a);
        view.upsert_confirmed(&b);

        let removed = view.remove(LocalKey::Server(a.id)).unwrap();
        assert_eq!(view.len(), 1);
        assert!(view.reinsert(removed.clone()));
        assert_eq!(view.snapshot()[0].key, LocalKey::Server(a.id));
        assert!(!view.reinsert(removed));
    }

    #[test]
    fn test_sync_confirmed_keeps_pending() {
        let mut view = LocalView::new();
        let stale = server_copy(&draft("2024-01-01"));
        view.upsert_confirmed(&stale);
        let temp = TempAllocationId::new();
        view.insert_pending(temp, (&draft("2024-01-03")).into());

        let fresh = server_copy(&draft("2024-01-02"));
        view.sync_confirmed(&[fresh.clone()]);

        assert!(view.get(LocalKey::Server(stale.id)).is_none());
        assert!(view.get(LocalKey::Server(fresh.id)).is_some());
        assert!(view.get(LocalKey::Temp(temp)).is_some());
        assert_eq!(view.pending_count(), 1);
        assert_eq!(view.on_date(date("2024-01-02")).len(), 1);
    }
}
