//! Application state shared across request handlers.

use std::sync::Arc;

use crate::scheduler::SchedulerService;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    scheduler: SchedulerService,
    store_kind: &'static str,
}

impl AppState {
    /// Create a new application state.
    pub fn new(scheduler: SchedulerService, store_kind: &'static str) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                scheduler,
                store_kind,
            }),
        }
    }

    pub fn scheduler(&self) -> &SchedulerService {
        &self.inner.scheduler
    }

    /// Name of the configured allocation store, reported by `/readyz`.
    pub fn store_kind(&self) -> &'static str {
        self.inner.store_kind
    }
}
