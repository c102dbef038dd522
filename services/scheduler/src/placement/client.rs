//! Optimistic placement client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use crewboard_id::{AllocationId, ProjectId, TempAllocationId};
use tokio::sync::{watch, RwLock};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, instrument, warn};

use super::backend::{AllocationBackend, BackendError};
use super::state::{InvalidTransition, LocalKey, PlacementState};
use super::view::{LocalAllocation, LocalView, ViewEntry};
use super::{PlacementConfig, PlacementError};
use crate::model::{Allocation, AllocationPatch, NewAllocation, Resource};

type StateCell = Arc<watch::Sender<PlacementState>>;

struct Inflight {
    abort: AbortHandle,
    state: StateCell,
}

/// View and in-flight requests share one lock, so a confirmation and a
/// cancellation of the same placement are strictly ordered.
#[derive(Default)]
struct Shared {
    view: LocalView,
    inflight: HashMap<TempAllocationId, Inflight>,
}

impl Shared {
    /// Rolls back a pending placement and stops its request. Returns `false`
    /// when the placement had already settled.
    fn cancel(&mut self, temp_id: TempAllocationId) -> bool {
        let Some(inflight) = self.inflight.remove(&temp_id) else {
            return false;
        };
        inflight.abort.abort();
        self.view.roll_back(temp_id);
        advance(&inflight.state, PlacementState::roll_back);
        true
    }
}

fn advance(
    state: &watch::Sender<PlacementState>,
    transition: impl FnOnce(PlacementState) -> Result<PlacementState, InvalidTransition>,
) {
    state.send_if_modified(|current| match transition(*current) {
        Ok(next) => {
            *current = next;
            true
        }
        Err(e) => {
            debug!(error = %e, "Ignored placement transition");
            false
        }
    });
}

/// Applies allocation changes to a local view first and reconciles them with
/// the backend afterwards.
#[derive(Clone)]
pub struct PlacementClient {
    shared: Arc<RwLock<Shared>>,
    backend: Arc<dyn AllocationBackend>,
    config: PlacementConfig,
}

impl PlacementClient {
    pub fn new(backend: Arc<dyn AllocationBackend>, config: PlacementConfig) -> Self {
        Self {
            shared: Arc::new(RwLock::new(Shared::default())),
            backend,
            config,
        }
    }

    /// Every visible entry in display order.
    pub async fn snapshot(&self) -> Vec<ViewEntry> {
        self.shared.read().await.view.snapshot()
    }

    pub async fn entry(&self, key: impl Into<LocalKey>) -> Option<ViewEntry> {
        self.shared.read().await.view.get(key.into()).cloned()
    }

    pub async fn on_date(&self, date: NaiveDate) -> Vec<ViewEntry> {
        self.shared.read().await.view.on_date(date)
    }

    pub async fn pending_count(&self) -> usize {
        self.shared.read().await.inflight.len()
    }

    /// Places `resource` on `project_id` for a single day.
    pub async fn place(
        &self,
        resource: &Resource,
        project_id: ProjectId,
        date: NaiveDate,
    ) -> PlacementHandle {
        self.place_draft(NewAllocation::single_day(resource, project_id, date))
            .await
    }

    /// Shows `new` immediately under a temporary id and confirms it in the
    /// background.
    #[instrument(skip(self, new), fields(resource_id = %new.resource_id, project_id = %new.project_id))]
    pub async fn place_draft(&self, new: NewAllocation) -> PlacementHandle {
        let temp_id = TempAllocationId::new();
        let state: StateCell = Arc::new(watch::channel(PlacementState::Pending { temp_id }).0);
        let pending = LocalAllocation::from(&new);

        let mut shared = self.shared.write().await;
        shared.view.insert_pending(temp_id, pending.clone());

        // The task cannot reconcile before this lock is released.
        let task = tokio::spawn(confirm_placement(
            self.shared.clone(),
            self.backend.clone(),
            self.config.confirm_timeout,
            temp_id,
            new,
            state.clone(),
        ));
        shared.inflight.insert(
            temp_id,
            Inflight {
                abort: task.abort_handle(),
                state: state.clone(),
            },
        );
        drop(shared);

        debug!(%temp_id, "Placement pending");

        PlacementHandle {
            temp_id,
            pending,
            state,
            task,
            shared: self.shared.clone(),
        }
    }

    /// Cancels a pending placement. Returns `false` if it already settled.
    pub async fn cancel(&self, temp_id: TempAllocationId) -> bool {
        self.shared.write().await.cancel(temp_id)
    }

    /// Patches a confirmed allocation locally, then on the backend. A failed
    /// request restores the previous fields.
    pub async fn update(
        &self,
        key: impl Into<LocalKey>,
        patch: AllocationPatch,
    ) -> Result<Allocation, PlacementError> {
        let key = key.into();
        let id = match key {
            LocalKey::Temp(temp_id) => return Err(PlacementError::NotConfirmed(temp_id)),
            LocalKey::Server(id) => id,
        };

        let (prior, optimistic) = {
            let mut shared = self.shared.write().await;
            let current = shared
                .view
                .get(key)
                .map(|entry| entry.allocation.clone())
                .ok_or(PlacementError::NotFound(key))?;
            let optimistic = current
                .apply(&patch)
                .map_err(|e| PlacementError::rejected("invalid_range", e.to_string()))?;
            shared.view.replace(key, optimistic.clone());
            (current, optimistic)
        };

        match self.backend.update(id, patch).await {
            Ok(allocation) => {
                self.shared
                    .write()
                    .await
                    .view
                    .replace_if(key, &optimistic, (&allocation).into());
                info!(%key, "Update confirmed");
                Ok(allocation)
            }
            Err(e) => {
                let reverted = self
                    .shared
                    .write()
                    .await
                    .view
                    .replace_if(key, &optimistic, prior);
                warn!(%key, error = %e, reverted, "Update failed");
                Err(e.into())
            }
        }
    }

    /// Removes an allocation locally, then on the backend. A pending
    /// placement is cancelled instead. Removing something the backend no
    /// longer has succeeds.
    pub async fn remove(&self, key: impl Into<LocalKey>) -> Result<(), PlacementError> {
        let key = key.into();
        let id: AllocationId = match key {
            LocalKey::Temp(temp_id) => {
                return if self.cancel(temp_id).await {
                    Ok(())
                } else {
                    Err(PlacementError::NotFound(key))
                };
            }
            LocalKey::Server(id) => id,
        };

        let removed = self.shared.write().await.view.remove(key);

        match self.backend.delete(id).await {
            Ok(()) | Err(BackendError::NotFound(_)) => {
                info!(%key, "Removal confirmed");
                Ok(())
            }
            Err(e) => {
                if let Some(entry) = removed {
                    self.shared.write().await.view.reinsert(entry);
                }
                warn!(%key, error = %e, "Removal failed, restored");
                Err(e.into())
            }
        }
    }

    /// Replaces confirmed entries with a fresh server listing. Pending
    /// placements stay.
    pub async fn refresh(&self, allocations: &[Allocation]) {
        self.shared.write().await.view.sync_confirmed(allocations);
    }
}

async fn confirm_placement(
    shared: Arc<RwLock<Shared>>,
    backend: Arc<dyn AllocationBackend>,
    confirm_timeout: Option<Duration>,
    temp_id: TempAllocationId,
    new: NewAllocation,
    state: StateCell,
) -> Result<Allocation, PlacementError> {
    let request = backend.create(new);
    let result = match confirm_timeout {
        Some(limit) => tokio::time::timeout(limit, request)
            .await
            .unwrap_or(Err(BackendError::Timeout(limit))),
        None => request.await,
    };

    let mut shared = shared.write().await;
    if shared.inflight.remove(&temp_id).is_none() {
        debug!(%temp_id, "Discarding response for cancelled placement");
        return Err(PlacementError::Cancelled);
    }

    match result {
        Ok(allocation) => {
            shared.view.confirm(temp_id, &allocation);
            advance(&state, |s| s.confirm(allocation.id));
            info!(%temp_id, allocation_id = %allocation.id, "Placement confirmed");
            Ok(allocation)
        }
        Err(e) => {
            shared.view.roll_back(temp_id);
            advance(&state, PlacementState::roll_back);
            warn!(%temp_id, error = %e, "Placement rolled back");
            Err(e.into())
        }
    }
}

/// A placement in flight.
pub struct PlacementHandle {
    temp_id: TempAllocationId,
    pending: LocalAllocation,
    state: StateCell,
    task: JoinHandle<Result<Allocation, PlacementError>>,
    shared: Arc<RwLock<Shared>>,
}

impl PlacementHandle {
    pub fn temp_id(&self) -> TempAllocationId {
        self.temp_id
    }

    /// The optimistic record shown while the request is in flight.
    pub fn pending(&self) -> &LocalAllocation {
        &self.pending
    }

    pub fn state(&self) -> PlacementState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlacementState> {
        self.state.subscribe()
    }

    /// Rolls the placement back now and ignores any later server answer.
    /// Returns `false` if it had already settled.
    pub async fn cancel(&self) -> bool {
        self.shared.write().await.cancel(self.temp_id)
    }

    /// Waits for the placement to settle.
    pub async fn outcome(self) -> Result<Allocation, PlacementError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(PlacementError::Cancelled),
            Err(e) => Err(PlacementError::SyncFailure {
                message: format!("placement task failed: {e}"),
            }),
        }
    }
}
