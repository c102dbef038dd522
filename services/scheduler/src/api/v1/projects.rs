//! Project API endpoints: listing, per-project allocations, and cost rollups.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use crewboard_id::ProjectId;
use serde::{Deserialize, Serialize};

use super::{parse_id, query, ItemsResponse, RangeQuery};
use crate::api::{ApiError, RequestContext};
use crate::model::{Allocation, Money, Project, WeekStart};
use crate::scheduler::DailyCost;
use crate::state::AppState;

/// Create project routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects))
        .route("/{project_id}/allocations", get(list_project_allocations))
        .route("/{project_id}/cost", get(range_cost))
        .route("/{project_id}/cost/daily", get(daily_cost))
        .route("/{project_id}/cost/weekly", get(weekly_cost))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub week_start: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCostResponse {
    pub project_id: ProjectId,
    pub date: NaiveDate,
    pub cost: Money,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyCostResponse {
    pub project_id: ProjectId,
    pub week_start: WeekStart,
    pub cost: Money,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeCostResponse {
    pub project_id: ProjectId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days: Vec<DailyCost>,
    pub total: Money,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /v1/projects
async fn list_projects(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<ItemsResponse<Project>>, ApiError> {
    let projects = state
        .scheduler()
        .list_projects()
        .await
        .map_err(|e| ctx.error(e))?;

    Ok(Json(projects.into()))
}

/// GET /v1/projects/{project_id}/allocations?from=..&to=..
async fn list_project_allocations(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(project_id): Path<String>,
    params: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<ItemsResponse<Allocation>>, ApiError> {
    let project_id: ProjectId = parse_id(&project_id, "project", &ctx)?;
    let range = query(params, &ctx)?.range(&ctx)?;
    let allocations = state
        .scheduler()
        .list_by_project(project_id, range)
        .await
        .map_err(|e| ctx.error(e))?;

    Ok(Json(allocations.into()))
}

/// GET /v1/projects/{project_id}/cost/daily?date=..
async fn daily_cost(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(project_id): Path<String>,
    params: Result<Query<DateQuery>, QueryRejection>,
) -> Result<Json<DailyCostResponse>, ApiError> {
    let project_id: ProjectId = parse_id(&project_id, "project", &ctx)?;
    let DateQuery { date } = query(params, &ctx)?;
    let cost = state
        .scheduler()
        .daily_cost(project_id, date)
        .await
        .map_err(|e| ctx.error(e))?;

    Ok(Json(DailyCostResponse {
        project_id,
        date,
        cost,
    }))
}

/// GET /v1/projects/{project_id}/cost/weekly?week_start=..
///
/// `week_start` must be a Monday.
async fn weekly_cost(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(project_id): Path<String>,
    params: Result<Query<WeekQuery>, QueryRejection>,
) -> Result<Json<WeeklyCostResponse>, ApiError> {
    let project_id: ProjectId = parse_id(&project_id, "project", &ctx)?;
    let WeekQuery { week_start } = query(params, &ctx)?;
    let week = WeekStart::new(week_start)
        .map_err(|e| ctx.error(crate::scheduler::SchedulerError::from(e)))?;
    let cost = state
        .scheduler()
        .weekly_cost(project_id, week)
        .await
        .map_err(|e| ctx.error(e))?;

    Ok(Json(WeeklyCostResponse {
        project_id,
        week_start: week,
        cost,
    }))
}

/// GET /v1/projects/{project_id}/cost?from=..&to=..
async fn range_cost(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(project_id): Path<String>,
    params: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<RangeCostResponse>, ApiError> {
    let project_id: ProjectId = parse_id(&project_id, "project", &ctx)?;
    let range = query(params, &ctx)?.scan_range(&ctx)?;
    let days = state
        .scheduler()
        .daily_costs(project_id, range)
        .await
        .map_err(|e| ctx.error(e))?;
    let total = days.iter().map(|d| d.cost).sum();

    Ok(Json(RangeCostResponse {
        project_id,
        from: range.from,
        to: range.to,
        days,
        total,
    }))
}
