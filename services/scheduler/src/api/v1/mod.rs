//! API v1 routes.

mod allocations;
mod conflicts;
mod projects;
mod resources;
mod timeline;

use std::str::FromStr;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Json, Query};
use axum::Router;
use chrono::NaiveDate;
use crewboard_id::IdError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::api::{ApiError, RequestContext};
use crate::model::{DateRange, MAX_QUERY_DAYS};
use crate::state::AppState;

/// Create API v1 routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/allocations", allocations::routes())
        .nest("/resources", resources::routes())
        .nest("/projects", projects::routes())
        .nest("/timeline", timeline::routes())
        .nest("/conflicts", conflicts::routes())
}

// =============================================================================
// Shared request helpers
// =============================================================================

/// Wrapper for list responses.
#[derive(Debug, Serialize)]
pub struct ItemsResponse<T> {
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for ItemsResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

/// Inclusive `from`/`to` query parameters.
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl RangeQuery {
    fn range(&self, ctx: &RequestContext) -> Result<DateRange, ApiError> {
        DateRange::new(self.from, self.to)
            .map_err(|e| ctx.error(ApiError::bad_request("invalid_range", e.to_string())))
    }

    /// Like [`RangeQuery::range`], for endpoints that walk every day.
    fn scan_range(&self, ctx: &RequestContext) -> Result<DateRange, ApiError> {
        self.range(ctx)?
            .limit(MAX_QUERY_DAYS)
            .map_err(|e| ctx.error(ApiError::bad_request("range_too_large", e.to_string())))
    }
}

fn parse_id<T>(raw: &str, kind: &str, ctx: &RequestContext) -> Result<T, ApiError>
where
    T: FromStr<Err = IdError>,
{
    raw.parse().map_err(|e: IdError| {
        ctx.error(ApiError::bad_request(
            format!("invalid_{kind}_id"),
            format!("invalid {kind} id '{raw}': {e}"),
        ))
    })
}

fn query<T: DeserializeOwned>(
    query: Result<Query<T>, QueryRejection>,
    ctx: &RequestContext,
) -> Result<T, ApiError> {
    query
        .map(|Query(q)| q)
        .map_err(|e| ctx.error(ApiError::bad_request("invalid_query", e.body_text())))
}

fn body<T: DeserializeOwned>(
    body: Result<Json<T>, JsonRejection>,
    ctx: &RequestContext,
) -> Result<T, ApiError> {
    body.map(|Json(b)| b)
        .map_err(|e| ctx.error(ApiError::bad_request("invalid_body", e.body_text())))
}
