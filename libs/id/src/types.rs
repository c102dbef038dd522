//! Identifier types used by the scheduler.

use crate::define_id;

// =============================================================================
// Catalog
// =============================================================================

define_id!(
    /// A schedulable resource: a staff member or an equipment unit.
    ResourceId,
    "res"
);
define_id!(
    /// A project that can receive allocations.
    ProjectId,
    "prj"
);

// =============================================================================
// Allocations
// =============================================================================

define_id!(
    /// Server-assigned allocation id, issued when a create is confirmed.
    AllocationId,
    "alc"
);
define_id!(
    /// Client-generated id for an optimistic placement awaiting confirmation.
    TempAllocationId,
    "tmp"
);

// =============================================================================
// Requests
// =============================================================================

define_id!(
    /// Correlates an HTTP request with its log lines and error bodies.
    RequestId,
    "req"
);
