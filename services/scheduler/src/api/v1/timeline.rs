//! Week timeline endpoint.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use crewboard_id::ProjectId;
use serde::Deserialize;

use super::{parse_id, query};
use crate::api::{ApiError, RequestContext};
use crate::model::WeekStart;
use crate::scheduler::{SchedulerError, WeekMatrix};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(build_week))
}

#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    pub week_start: NaiveDate,
    /// Comma-separated project ids. Omitted or empty means every active
    /// project.
    #[serde(default)]
    pub project_ids: Option<String>,
}

/// GET /v1/timeline?week_start=..&project_ids=prj_a,prj_b
async fn build_week(
    State(state): State<AppState>,
    ctx: RequestContext,
    params: Result<Query<TimelineQuery>, QueryRejection>,
) -> Result<Json<WeekMatrix>, ApiError> {
    let params = query(params, &ctx)?;
    let week = WeekStart::new(params.week_start).map_err(|e| ctx.error(SchedulerError::from(e)))?;

    let project_ids = params
        .project_ids
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(|raw| parse_id::<ProjectId>(raw, "project", &ctx))
        .collect::<Result<Vec<_>, _>>()?;

    let matrix = state
        .scheduler()
        .build_week(week, &project_ids)
        .await
        .map_err(|e| ctx.error(e))?;

    Ok(Json(matrix))
}
