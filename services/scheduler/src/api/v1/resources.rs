//! Resource API endpoints.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use crewboard_id::ResourceId;
use serde::Serialize;

use super::{parse_id, query, ItemsResponse, RangeQuery};
use crate::api::{ApiError, RequestContext};
use crate::model::{Allocation, Resource};
use crate::state::AppState;

/// Create resource routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_resources))
        .route("/{resource_id}/allocations", get(list_resource_allocations))
        .route("/{resource_id}/conflicts", get(resource_conflicts))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConflictsResponse {
    pub resource_id: ResourceId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Days on which the resource is double-booked.
    pub dates: Vec<NaiveDate>,
}

/// GET /v1/resources
async fn list_resources(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<ItemsResponse<Resource>>, ApiError> {
    let resources = state
        .scheduler()
        .list_resources()
        .await
        .map_err(|e| ctx.error(e))?;

    Ok(Json(resources.into()))
}

/// GET /v1/resources/{resource_id}/allocations
async fn list_resource_allocations(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(resource_id): Path<String>,
) -> Result<Json<ItemsResponse<Allocation>>, ApiError> {
    let resource_id: ResourceId = parse_id(&resource_id, "resource", &ctx)?;
    let allocations = state
        .scheduler()
        .list_by_resource(resource_id)
        .await
        .map_err(|e| ctx.error(e))?;

    Ok(Json(allocations.into()))
}

/// GET /v1/resources/{resource_id}/conflicts?from=..&to=..
async fn resource_conflicts(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(resource_id): Path<String>,
    params: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<ResourceConflictsResponse>, ApiError> {
    let resource_id: ResourceId = parse_id(&resource_id, "resource", &ctx)?;
    let range = query(params, &ctx)?.scan_range(&ctx)?;
    let dates = state
        .scheduler()
        .conflicts_for_resource(resource_id, range)
        .await
        .map_err(|e| ctx.error(e))?;

    Ok(Json(ResourceConflictsResponse {
        resource_id,
        from: range.from,
        to: range.to,
        dates,
    }))
}
