//! Cross-resource conflict report.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};

use super::{query, ItemsResponse, RangeQuery};
use crate::api::{ApiError, RequestContext};
use crate::scheduler::ConflictRecord;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(conflict_report))
}

/// GET /v1/conflicts?from=..&to=..
async fn conflict_report(
    State(state): State<AppState>,
    ctx: RequestContext,
    params: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<ItemsResponse<ConflictRecord>>, ApiError> {
    let range = query(params, &ctx)?.scan_range(&ctx)?;
    let report = state
        .scheduler()
        .conflict_report(range)
        .await
        .map_err(|e| ctx.error(e))?;

    Ok(Json(report.into()))
}
