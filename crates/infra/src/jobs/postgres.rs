//! Postgres-backed batch job store.
//!
//! Jobs, items and logs live in three tables so item outcome writes touch a
//! single row and the log cap can be enforced in SQL.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | JobStoreError |
//! |------------|----------------------|---------------|
//! | Database (unique violation) | `23505` | `AlreadyExists` (on create) / `Conflict` |
//! | Database (foreign key violation) | `23503` | `NotFound` |
//! | anything else | | `Storage` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use catalogsync_batch::{
    BatchItem, BatchJob, ItemRef, ItemResult, ItemStatus, ItemType, JobKind, JobParams, JobStatus,
    LogEntry, LogLevel, Priority, Progress, MAX_LOG_ENTRIES,
};
use catalogsync_core::{ItemEntryId, JobId, UserId};

use super::store::{
    ItemFilter, ItemUpdate, JobFields, JobFilter, JobStore, JobStoreError, JobSummary, Page,
    Pagination,
};

/// Schema for the three batch tables. Idempotent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS batch_jobs (
    id            UUID PRIMARY KEY,
    name          TEXT NOT NULL,
    description   TEXT NOT NULL DEFAULT '',
    job_type      TEXT NOT NULL,
    params        JSONB NOT NULL,
    status        TEXT NOT NULL,
    priority      SMALLINT NOT NULL DEFAULT 1 CHECK (priority BETWEEN 1 AND 3),
    total         BIGINT NOT NULL DEFAULT 0,
    processed     BIGINT NOT NULL DEFAULT 0,
    succeeded     BIGINT NOT NULL DEFAULT 0,
    failed        BIGINT NOT NULL DEFAULT 0,
    created_by    UUID NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL,
    updated_at    TIMESTAMPTZ NOT NULL,
    started_at    TIMESTAMPTZ,
    completed_at  TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS batch_jobs_created_at_idx ON batch_jobs (created_at DESC);
CREATE INDEX IF NOT EXISTS batch_jobs_created_by_idx ON batch_jobs (created_by);

CREATE TABLE IF NOT EXISTS batch_job_items (
    entry_id           UUID PRIMARY KEY,
    job_id             UUID NOT NULL REFERENCES batch_jobs (id) ON DELETE CASCADE,
    position           INTEGER NOT NULL,
    item_id            TEXT NOT NULL,
    item_type          TEXT NOT NULL,
    status             TEXT NOT NULL,
    result             JSONB,
    errors             JSONB NOT NULL DEFAULT '[]'::jsonb,
    processing_time_ms BIGINT,
    retry_count        INTEGER NOT NULL DEFAULT 0,
    last_processed_at  TIMESTAMPTZ,
    UNIQUE (job_id, position)
);
CREATE INDEX IF NOT EXISTS batch_job_items_status_idx ON batch_job_items (job_id, status, position);

CREATE TABLE IF NOT EXISTS batch_job_logs (
    id         BIGSERIAL PRIMARY KEY,
    job_id     UUID NOT NULL REFERENCES batch_jobs (id) ON DELETE CASCADE,
    message    TEXT NOT NULL,
    level      TEXT NOT NULL,
    logged_at  TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS batch_job_logs_job_idx ON batch_job_logs (job_id, id);
"#;

const JOB_COLUMNS: &str = "id, name, description, job_type, params, status, priority, total, \
     processed, succeeded, failed, created_by, created_at, updated_at, started_at, completed_at";

const ITEM_COLUMNS: &str = "entry_id, item_id, item_type, status, result, errors, \
     processing_time_ms, retry_count, last_processed_at";

#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, JobStoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the batch tables if they do not exist.
    pub async fn migrate(&self) -> Result<(), JobStoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn exists(&self, id: JobId) -> Result<bool, JobStoreError> {
        let row = sqlx::query("SELECT 1 FROM batch_jobs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("job_exists", e))?;
        Ok(row.is_some())
    }

    async fn insert_log(
        tx: &mut Transaction<'_, Postgres>,
        id: JobId,
        entry: &LogEntry,
    ) -> Result<(), JobStoreError> {
        sqlx::query(
            "INSERT INTO batch_job_logs (job_id, message, level, logged_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(id.as_uuid())
        .bind(&entry.message)
        .bind(entry.level.as_str())
        .bind(entry.timestamp)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_fk_error(id, "insert_log", e))?;

        sqlx::query(
            r#"
            DELETE FROM batch_job_logs
            WHERE job_id = $1
              AND id NOT IN (
                SELECT id FROM batch_job_logs WHERE job_id = $1 ORDER BY id DESC LIMIT $2
              )
            "#,
        )
        .bind(id.as_uuid())
        .bind(MAX_LOG_ENTRIES as i64)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("trim_logs", e))?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self, job), fields(job_id = %job.id, items = job.items.len()), err)]
    async fn create_job(&self, job: &BatchJob) -> Result<(), JobStoreError> {
        let params = serde_json::to_value(&job.params)
            .map_err(|e| JobStoreError::Storage(format!("failed to encode params: {e}")))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(&format!(
            "INSERT INTO batch_jobs ({JOB_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
        ))
        .bind(job.id.as_uuid())
        .bind(&job.name)
        .bind(&job.description)
        .bind(job.kind().as_str())
        .bind(&params)
        .bind(job.status.as_str())
        .bind(job.priority.get() as i16)
        .bind(job.progress.total as i64)
        .bind(job.progress.processed as i64)
        .bind(job.progress.succeeded as i64)
        .bind(job.progress.failed as i64)
        .bind(job.created_by.as_uuid())
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                JobStoreError::AlreadyExists(job.id)
            } else {
                map_sqlx_error("insert_job", e)
            }
        })?;

        for (position, item) in job.items.iter().enumerate() {
            let result = item
                .result
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(|e| JobStoreError::Storage(format!("failed to encode result: {e}")))?;
            sqlx::query(&format!(
                "INSERT INTO batch_job_items (job_id, position, {ITEM_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
            ))
            .bind(job.id.as_uuid())
            .bind(position as i32)
            .bind(item.entry_id.as_uuid())
            .bind(&item.item_id)
            .bind(item.item_type.as_str())
            .bind(item.status.as_str())
            .bind(result)
            .bind(serde_json::json!(item.errors))
            .bind(item.processing_time_ms.map(|ms| ms as i64))
            .bind(item.retry_count as i32)
            .bind(item.last_processed_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_item", e))?;
        }

        for entry in &job.logs {
            Self::insert_log(&mut tx, job.id, entry).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %id), err)]
    async fn get_job(&self, id: JobId) -> Result<Option<BatchJob>, JobStoreError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM batch_jobs WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_job", e))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let summary = summary_from_row(&row)?;
        let params: serde_json::Value = row.try_get("params").map_err(decode_error)?;
        let params: JobParams = serde_json::from_value(params)
            .map_err(|e| JobStoreError::Storage(format!("failed to decode params: {e}")))?;

        let item_rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM batch_job_items WHERE job_id = $1 ORDER BY position"
        ))
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_items", e))?;
        let items = item_rows
            .iter()
            .map(item_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let logs = self.list_logs(id).await?;

        Ok(Some(BatchJob {
            id: summary.id,
            name: summary.name,
            description: summary.description,
            params,
            status: summary.status,
            items,
            progress: summary.progress,
            priority: summary.priority,
            created_by: summary.created_by,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
            started_at: summary.started_at,
            completed_at: summary.completed_at,
            logs,
        }))
    }

    #[instrument(skip(self, filter), err)]
    async fn list_jobs(
        &self,
        filter: &JobFilter,
        pagination: Pagination,
    ) -> Result<Page<JobSummary>, JobStoreError> {
        const WHERE: &str = "($1::text IS NULL OR job_type = $1) \
             AND ($2::text IS NULL OR status = $2) \
             AND ($3::uuid IS NULL OR created_by = $3) \
             AND ($4::timestamptz IS NULL OR created_at >= $4) \
             AND ($5::timestamptz IS NULL OR created_at <= $5)";

        let kind = filter.kind.map(|k| k.as_str());
        let status = filter.status.map(|s| s.as_str());
        let created_by = filter.created_by.map(Uuid::from);

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM batch_jobs WHERE {WHERE}"))
            .bind(kind)
            .bind(status)
            .bind(created_by)
            .bind(filter.created_from)
            .bind(filter.created_to)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_jobs", e))?
            .try_get("n")
            .map_err(decode_error)?;

        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM batch_jobs WHERE {WHERE} \
             ORDER BY created_at DESC, id DESC LIMIT $6 OFFSET $7"
        ))
        .bind(kind)
        .bind(status)
        .bind(created_by)
        .bind(filter.created_from)
        .bind(filter.created_to)
        .bind(pagination.page_size as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_jobs", e))?;

        let jobs = rows
            .iter()
            .map(summary_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(jobs, pagination, total as u64))
    }

    #[instrument(skip(self, fields), fields(job_id = %id), err)]
    async fn update_job_fields(&self, id: JobId, fields: JobFields) -> Result<(), JobStoreError> {
        let progress = fields.progress;
        let result = sqlx::query(
            r#"
            UPDATE batch_jobs SET
                name        = COALESCE($2, name),
                description = COALESCE($3, description),
                priority    = COALESCE($4, priority),
                total       = COALESCE($5, total),
                processed   = COALESCE($6, processed),
                succeeded   = COALESCE($7, succeeded),
                failed      = COALESCE($8, failed),
                updated_at  = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(fields.name)
        .bind(fields.description)
        .bind(fields.priority.map(|p| p.get() as i16))
        .bind(progress.map(|p| p.total as i64))
        .bind(progress.map(|p| p.processed as i64))
        .bind(progress.map(|p| p.succeeded as i64))
        .bind(progress.map(|p| p.failed as i64))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_job_fields", e))?;

        if result.rows_affected() == 0 {
            return Err(JobStoreError::NotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self, log), fields(job_id = %id, to = %to), err)]
    async fn transition_status(
        &self,
        id: JobId,
        to: JobStatus,
        log: Option<LogEntry>,
    ) -> Result<JobStatus, JobStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(
            "SELECT status, started_at, completed_at FROM batch_jobs WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_job", e))?
        .ok_or(JobStoreError::NotFound(id))?;

        let from = parse_job_status(row.try_get("status").map_err(decode_error)?)?;
        let started_at: Option<DateTime<Utc>> = row.try_get("started_at").map_err(decode_error)?;
        let completed_at: Option<DateTime<Utc>> =
            row.try_get("completed_at").map_err(decode_error)?;

        // Rolls back on drop.
        from.transition(to)?;

        let now = Utc::now();
        let started_at = match (started_at, to) {
            (None, JobStatus::Processing) => Some(now),
            (existing, _) => existing,
        };
        let completed_at = match completed_at {
            None if to.is_terminal() => Some(now),
            existing => existing,
        };

        sqlx::query(
            "UPDATE batch_jobs SET status = $2, started_at = $3, completed_at = $4, updated_at = $5 \
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(to.as_str())
        .bind(started_at)
        .bind(completed_at)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_status", e))?;

        if let Some(entry) = log {
            Self::insert_log(&mut tx, id, &entry).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(from)
    }

    #[instrument(skip(self), fields(job_id = %id), err)]
    async fn claim_pending_items(
        &self,
        id: JobId,
        limit: usize,
    ) -> Result<Vec<ItemRef>, JobStoreError> {
        let rows = sqlx::query(
            r#"
            UPDATE batch_job_items SET status = 'processing'
            WHERE entry_id IN (
                SELECT i.entry_id
                FROM batch_job_items i
                JOIN batch_jobs j ON j.id = i.job_id
                WHERE i.job_id = $1 AND i.status = 'pending' AND j.status = 'processing'
                ORDER BY i.position
                LIMIT $2
                FOR UPDATE OF i SKIP LOCKED
            )
            RETURNING entry_id, item_id, item_type, position
            "#,
        )
        .bind(id.as_uuid())
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("claim_pending_items", e))?;

        let mut claimed = Vec::with_capacity(rows.len());
        for row in &rows {
            let position: i32 = row.try_get("position").map_err(decode_error)?;
            let entry_id: Uuid = row.try_get("entry_id").map_err(decode_error)?;
            let item_type: String = row.try_get("item_type").map_err(decode_error)?;
            claimed.push((
                position,
                ItemRef {
                    entry_id: ItemEntryId::from_uuid(entry_id),
                    item_id: row.try_get("item_id").map_err(decode_error)?,
                    item_type: item_type.parse::<ItemType>().map_err(JobStoreError::Storage)?,
                },
            ));
        }
        claimed.sort_by_key(|(position, _)| *position);
        Ok(claimed.into_iter().map(|(_, item)| item).collect())
    }

    #[instrument(skip(self, update), fields(job_id = %id, entry_id = %entry_id), err)]
    async fn update_item_fields(
        &self,
        id: JobId,
        entry_id: ItemEntryId,
        update: ItemUpdate,
    ) -> Result<(), JobStoreError> {
        let (status, result, errors, elapsed_ms, at) = match update {
            ItemUpdate::Succeeded {
                result,
                elapsed_ms,
                at,
            } => (ItemStatus::Completed, result, Vec::new(), elapsed_ms, at),
            ItemUpdate::Failed {
                message,
                elapsed_ms,
                at,
            } => (
                ItemStatus::Failed,
                ItemResult::rejected(message.clone()),
                vec![message],
                elapsed_ms,
                at,
            ),
        };
        let result = serde_json::to_value(&result)
            .map_err(|e| JobStoreError::Storage(format!("failed to encode result: {e}")))?;

        let updated = sqlx::query(
            r#"
            UPDATE batch_job_items SET
                status = $3,
                result = $4,
                errors = $5,
                processing_time_ms = $6,
                last_processed_at = $7
            WHERE job_id = $1 AND entry_id = $2 AND status = 'processing'
            "#,
        )
        .bind(id.as_uuid())
        .bind(entry_id.as_uuid())
        .bind(status.as_str())
        .bind(result)
        .bind(serde_json::json!(errors))
        .bind(elapsed_ms as i64)
        .bind(at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;

        if updated.rows_affected() == 1 {
            return Ok(());
        }
        let current = sqlx::query("SELECT status FROM batch_job_items WHERE job_id = $1 AND entry_id = $2")
            .bind(id.as_uuid())
            .bind(entry_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("item_status", e))?;
        match current {
            None => Err(JobStoreError::ItemNotFound(entry_id)),
            Some(row) => {
                let status: String = row.try_get("status").map_err(decode_error)?;
                Err(JobStoreError::Conflict(format!(
                    "item {entry_id} is {status}, not processing"
                )))
            }
        }
    }

    #[instrument(skip(self), fields(job_id = %id), err)]
    async fn list_items(
        &self,
        id: JobId,
        filter: ItemFilter,
        pagination: Pagination,
    ) -> Result<Page<BatchItem>, JobStoreError> {
        if !self.exists(id).await? {
            return Err(JobStoreError::NotFound(id));
        }
        let status = filter.status.map(|s| s.as_str());

        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM batch_job_items \
             WHERE job_id = $1 AND ($2::text IS NULL OR status = $2)",
        )
        .bind(id.as_uuid())
        .bind(status)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_items", e))?
        .try_get("n")
        .map_err(decode_error)?;

        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM batch_job_items \
             WHERE job_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY position LIMIT $3 OFFSET $4"
        ))
        .bind(id.as_uuid())
        .bind(status)
        .bind(pagination.page_size as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        let items = rows
            .iter()
            .map(item_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, pagination, total as u64))
    }

    #[instrument(skip(self, entry), fields(job_id = %id), err)]
    async fn append_log(&self, id: JobId, entry: LogEntry) -> Result<(), JobStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Self::insert_log(&mut tx, id, &entry).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn list_logs(&self, id: JobId) -> Result<Vec<LogEntry>, JobStoreError> {
        let rows = sqlx::query(
            "SELECT message, level, logged_at FROM batch_job_logs WHERE job_id = $1 ORDER BY id",
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_logs", e))?;

        if rows.is_empty() && !self.exists(id).await? {
            return Err(JobStoreError::NotFound(id));
        }
        rows.iter()
            .map(|row| {
                let level: String = row.try_get("level").map_err(decode_error)?;
                Ok(LogEntry {
                    message: row.try_get("message").map_err(decode_error)?,
                    level: level.parse::<LogLevel>().map_err(JobStoreError::Storage)?,
                    timestamp: row.try_get("logged_at").map_err(decode_error)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(job_id = %id), err)]
    async fn delete_job(&self, id: JobId) -> Result<(), JobStoreError> {
        let deleted = sqlx::query("DELETE FROM batch_jobs WHERE id = $1 AND status <> 'processing'")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_job", e))?;
        if deleted.rows_affected() == 1 {
            return Ok(());
        }
        if self.exists(id).await? {
            Err(JobStoreError::Conflict(
                "cannot delete a job while it is processing".to_string(),
            ))
        } else {
            Err(JobStoreError::NotFound(id))
        }
    }

    #[instrument(skip(self), fields(job_id = %id), err)]
    async fn refresh_progress(&self, id: JobId) -> Result<Progress, JobStoreError> {
        let row = sqlx::query(
            r#"
            UPDATE batch_jobs j SET
                total = a.total,
                processed = a.processed,
                succeeded = a.succeeded,
                failed = a.failed,
                updated_at = NOW()
            FROM (
                SELECT
                    COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE status IN ('completed', 'failed')) AS processed,
                    COUNT(*) FILTER (
                        WHERE status = 'completed'
                          AND COALESCE((result->>'success')::boolean, false)
                    ) AS succeeded,
                    COUNT(*) FILTER (
                        WHERE status = 'failed'
                           OR (status = 'completed'
                               AND NOT COALESCE((result->>'success')::boolean, false))
                    ) AS failed
                FROM batch_job_items
                WHERE job_id = $1
            ) a
            WHERE j.id = $1
            RETURNING j.total, j.processed, j.succeeded, j.failed
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("refresh_progress", e))?
        .ok_or(JobStoreError::NotFound(id))?;

        Ok(Progress {
            total: count(&row, "total")?,
            processed: count(&row, "processed")?,
            succeeded: count(&row, "succeeded")?,
            failed: count(&row, "failed")?,
        })
    }
}

fn count(row: &PgRow, column: &str) -> Result<u64, JobStoreError> {
    let n: i64 = row.try_get(column).map_err(decode_error)?;
    Ok(n.max(0) as u64)
}

fn summary_from_row(row: &PgRow) -> Result<JobSummary, JobStoreError> {
    let job_type: String = row.try_get("job_type").map_err(decode_error)?;
    let priority: i16 = row.try_get("priority").map_err(decode_error)?;
    let id: Uuid = row.try_get("id").map_err(decode_error)?;
    let created_by: Uuid = row.try_get("created_by").map_err(decode_error)?;
    Ok(JobSummary {
        id: JobId::from_uuid(id),
        name: row.try_get("name").map_err(decode_error)?,
        description: row.try_get("description").map_err(decode_error)?,
        kind: job_type
            .parse::<JobKind>()
            .map_err(|e| JobStoreError::Storage(e.to_string()))?,
        status: parse_job_status(row.try_get("status").map_err(decode_error)?)?,
        progress: Progress {
            total: count(row, "total")?,
            processed: count(row, "processed")?,
            succeeded: count(row, "succeeded")?,
            failed: count(row, "failed")?,
        },
        priority: Priority::new(priority.clamp(0, u8::MAX as i16) as u8)
            .map_err(|e| JobStoreError::Storage(e.to_string()))?,
        created_by: UserId::from_uuid(created_by),
        created_at: row.try_get("created_at").map_err(decode_error)?,
        updated_at: row.try_get("updated_at").map_err(decode_error)?,
        started_at: row.try_get("started_at").map_err(decode_error)?,
        completed_at: row.try_get("completed_at").map_err(decode_error)?,
    })
}

fn item_from_row(row: &PgRow) -> Result<BatchItem, JobStoreError> {
    let entry_id: Uuid = row.try_get("entry_id").map_err(decode_error)?;
    let item_type: String = row.try_get("item_type").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let result: Option<serde_json::Value> = row.try_get("result").map_err(decode_error)?;
    let errors: serde_json::Value = row.try_get("errors").map_err(decode_error)?;
    let processing_time_ms: Option<i64> = row.try_get("processing_time_ms").map_err(decode_error)?;
    let retry_count: i32 = row.try_get("retry_count").map_err(decode_error)?;

    Ok(BatchItem {
        entry_id: ItemEntryId::from_uuid(entry_id),
        item_id: row.try_get("item_id").map_err(decode_error)?,
        item_type: item_type.parse().map_err(JobStoreError::Storage)?,
        status: status.parse().map_err(JobStoreError::Storage)?,
        result: result
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| JobStoreError::Storage(format!("failed to decode result: {e}")))?,
        errors: serde_json::from_value(errors)
            .map_err(|e| JobStoreError::Storage(format!("failed to decode errors: {e}")))?,
        processing_time_ms: processing_time_ms.map(|ms| ms.max(0) as u64),
        retry_count: retry_count.max(0) as u32,
        last_processed_at: row.try_get("last_processed_at").map_err(decode_error)?,
    })
}

fn parse_job_status(raw: String) -> Result<JobStatus, JobStoreError> {
    raw.parse().map_err(JobStoreError::Storage)
}

fn decode_error(err: sqlx::Error) -> JobStoreError {
    JobStoreError::Storage(format!("failed to decode row: {err}"))
}

fn map_fk_error(id: JobId, operation: &str, err: sqlx::Error) -> JobStoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23503") {
            return JobStoreError::NotFound(id);
        }
    }
    map_sqlx_error(operation, err)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> JobStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => JobStoreError::Conflict(msg),
                _ => JobStoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            JobStoreError::Storage(format!("connection pool closed in {operation}"))
        }
        other => JobStoreError::Storage(format!("sqlx error in {operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505");
    }
    false
}
