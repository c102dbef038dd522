//! Postgres-backed allocation store.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use crewboard_id::{AllocationId, ProjectId, ResourceId};
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::{Postgres, Row};
use tracing::{debug, instrument};

use super::{AllocationStore, StoreError, StoreResult};
use crate::model::{next_timestamp, Allocation, AllocationPatch, DateRange, NewAllocation};

const COLUMNS: &str = "id, resource_id, resource_type, project_id, start_date, end_date, \
                       status, notes, created_at, updated_at";

/// Raw row as stored. Ids and enums are text columns.
#[derive(Debug, Clone)]
struct AllocationRow {
    id: String,
    resource_id: String,
    resource_type: String,
    project_id: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
    notes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for AllocationRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            resource_id: row.try_get("resource_id")?,
            resource_type: row.try_get("resource_type")?,
            project_id: row.try_get("project_id")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            status: row.try_get("status")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<AllocationRow> for Allocation {
    type Error = StoreError;

    fn try_from(row: AllocationRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::CorruptRow {
            id: row.id.clone(),
            reason,
        };

        Ok(Self {
            id: row.id.parse().map_err(|e| corrupt(format!("id: {e}")))?,
            resource_id: row
                .resource_id
                .parse()
                .map_err(|e| corrupt(format!("resource_id: {e}")))?,
            resource_type: row
                .resource_type
                .parse()
                .map_err(|e| corrupt(format!("{e}")))?,
            project_id: row
                .project_id
                .parse()
                .map_err(|e| corrupt(format!("project_id: {e}")))?,
            start_date: row.start_date,
            end_date: row.end_date,
            status: row.status.parse().map_err(|e| corrupt(format!("{e}")))?,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

type RowQuery<'q> = sqlx::query::QueryAs<'q, Postgres, AllocationRow, PgArguments>;

fn into_allocations(rows: Vec<AllocationRow>) -> StoreResult<Vec<Allocation>> {
    rows.into_iter().map(Allocation::try_from).collect()
}

/// Allocation store over the `allocations` table.
#[derive(Clone)]
pub struct PgAllocationStore {
    pool: PgPool,
}

impl PgAllocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, query: RowQuery<'_>) -> StoreResult<Vec<Allocation>> {
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        into_allocations(rows)
    }
}

#[async_trait]
impl AllocationStore for PgAllocationStore {
    #[instrument(skip(self, new), fields(resource_id = %new.resource_id, project_id = %new.project_id))]
    async fn create(&self, new: NewAllocation) -> StoreResult<Allocation> {
        new.validate()?;
        let allocation = new.into_allocation(AllocationId::new(), Utc::now());

        let sql = format!(
            r#"
            INSERT INTO allocations ({COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING {COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, AllocationRow>(&sql)
            .bind(allocation.id.to_string())
            .bind(allocation.resource_id.to_string())
            .bind(allocation.resource_type.as_str())
            .bind(allocation.project_id.to_string())
            .bind(allocation.start_date)
            .bind(allocation.end_date)
            .bind(allocation.status.as_str())
            .bind(&allocation.notes)
            .bind(allocation.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::Query)?;

        debug!(allocation_id = %allocation.id, "Inserted allocation");
        row.try_into()
    }

    async fn get(&self, id: AllocationId) -> StoreResult<Option<Allocation>> {
        let sql = format!("SELECT {COLUMNS} FROM allocations WHERE id = $1");
        let row = sqlx::query_as::<_, AllocationRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Query)?;

        row.map(Allocation::try_from).transpose()
    }

    #[instrument(skip(self, patch), fields(allocation_id = %id))]
    async fn update(&self, id: AllocationId, patch: AllocationPatch) -> StoreResult<Allocation> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Query)?;

        let select = format!("SELECT {COLUMNS} FROM allocations WHERE id = $1 FOR UPDATE");
        let current: Allocation = sqlx::query_as::<_, AllocationRow>(&select)
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::Query)?
            .ok_or(StoreError::NotFound(id))?
            .try_into()?;

        let mut next = patch.apply(&current)?;
        next.updated_at = next_timestamp(current.updated_at);

        let update = format!(
            r#"
            UPDATE allocations
            SET start_date = $2, end_date = $3, status = $4, notes = $5, updated_at = $6
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, AllocationRow>(&update)
            .bind(id.to_string())
            .bind(next.start_date)
            .bind(next.end_date)
            .bind(next.status.as_str())
            .bind(&next.notes)
            .bind(next.updated_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(StoreError::Query)?;

        tx.commit().await.map_err(StoreError::Query)?;
        row.try_into()
    }

    async fn delete(&self, id: AllocationId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM allocations WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_resource(&self, resource_id: ResourceId) -> StoreResult<Vec<Allocation>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM allocations WHERE resource_id = $1 ORDER BY start_date, id"
        );
        self.fetch(sqlx::query_as(&sql).bind(resource_id.to_string()))
            .await
    }

    async fn list_by_resource_and_range(
        &self,
        resource_id: ResourceId,
        range: DateRange,
    ) -> StoreResult<Vec<Allocation>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM allocations
            WHERE resource_id = $1 AND start_date <= $3 AND end_date >= $2
            ORDER BY start_date, id
            "#
        );
        self.fetch(
            sqlx::query_as(&sql)
                .bind(resource_id.to_string())
                .bind(range.from)
                .bind(range.to),
        )
        .await
    }

    async fn list_by_project_and_range(
        &self,
        project_id: ProjectId,
        range: DateRange,
    ) -> StoreResult<Vec<Allocation>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM allocations
            WHERE project_id = $1 AND start_date <= $3 AND end_date >= $2
            ORDER BY start_date, id
            "#
        );
        self.fetch(
            sqlx::query_as(&sql)
                .bind(project_id.to_string())
                .bind(range.from)
                .bind(range.to),
        )
        .await
    }

    async fn list_in_range(&self, range: DateRange) -> StoreResult<Vec<Allocation>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM allocations
            WHERE start_date <= $2 AND end_date >= $1
            ORDER BY start_date, id
            "#
        );
        self.fetch(sqlx::query_as(&sql).bind(range.from).bind(range.to))
            .await
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(())
    }
}
