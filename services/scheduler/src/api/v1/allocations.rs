//! Allocation API endpoints.
//!
//! Create, read, patch and delete single allocations. Deletes are idempotent.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use crewboard_id::AllocationId;

use super::{body, parse_id};
use crate::api::{ApiError, RequestContext};
use crate::model::{Allocation, AllocationPatch, NewAllocation};
use crate::state::AppState;

/// Create allocation routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(create_allocation)).route(
        "/{allocation_id}",
        get(get_allocation)
            .patch(update_allocation)
            .delete(delete_allocation),
    )
}

/// POST /v1/allocations
async fn create_allocation(
    State(state): State<AppState>,
    ctx: RequestContext,
    req: Result<Json<NewAllocation>, JsonRejection>,
) -> Result<(StatusCode, Json<Allocation>), ApiError> {
    let new = body(req, &ctx)?;
    let allocation = state
        .scheduler()
        .create_allocation(new)
        .await
        .map_err(|e| ctx.error(e))?;

    Ok((StatusCode::CREATED, Json(allocation)))
}

/// GET /v1/allocations/{allocation_id}
async fn get_allocation(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(allocation_id): Path<String>,
) -> Result<Json<Allocation>, ApiError> {
    let id: AllocationId = parse_id(&allocation_id, "allocation", &ctx)?;
    let allocation = state
        .scheduler()
        .get_allocation(id)
        .await
        .map_err(|e| ctx.error(e))?;

    Ok(Json(allocation))
}

/// PATCH /v1/allocations/{allocation_id}
async fn update_allocation(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(allocation_id): Path<String>,
    req: Result<Json<AllocationPatch>, JsonRejection>,
) -> Result<Json<Allocation>, ApiError> {
    let id: AllocationId = parse_id(&allocation_id, "allocation", &ctx)?;
    let patch = body(req, &ctx)?;
    let allocation = state
        .scheduler()
        .update_allocation(id, patch)
        .await
        .map_err(|e| ctx.error(e))?;

    Ok(Json(allocation))
}

/// DELETE /v1/allocations/{allocation_id}
///
/// Returns 204 whether or not the allocation existed.
async fn delete_allocation(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(allocation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: AllocationId = parse_id(&allocation_id, "allocation", &ctx)?;
    state
        .scheduler()
        .delete_allocation(id)
        .await
        .map_err(|e| ctx.error(e))?;

    Ok(StatusCode::NO_CONTENT)
}
