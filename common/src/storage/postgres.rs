// PostgreSQL storage backend

use crate::db::DbPool;
use crate::errors::StorageError;
use crate::models::{Job, JobUpdate};
use crate::storage::Storage;
use async_trait::async_trait;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const JOB_COLUMNS: &str = "id, name, url, interval_seconds, email, active, state";

/// Job storage backed by a single PostgreSQL table
pub struct PostgresStorage {
    pool: DbPool,
    table: String,
}

impl PostgresStorage {
    /// `table` must be a plain identifier; it is interpolated into statements
    pub fn new(pool: DbPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    async fn create_schema(&self) -> Result<(), StorageError> {
        info!(table = %self.table, "Ensuring job table exists");

        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id UUID PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                interval_seconds BIGINT NOT NULL,
                email TEXT NOT NULL,
                active BOOLEAN NOT NULL,
                state BYTEA NOT NULL
            )
            "#,
            table = self.table
        );
        sqlx::query(&create_table)
            .execute(self.pool.pool())
            .await?;

        let create_index = format!(
            "CREATE INDEX IF NOT EXISTS {table}_interval_active_idx ON {table} (interval_seconds, active)",
            table = self.table
        );
        sqlx::query(&create_index)
            .execute(self.pool.pool())
            .await?;

        Ok(())
    }
}

fn interval_to_db(interval: u64) -> Result<i64, StorageError> {
    i64::try_from(interval)
        .map_err(|_| StorageError::QueryFailed(format!("Interval {} out of range", interval)))
}

#[async_trait]
impl Storage for PostgresStorage {
    #[instrument(skip(self), fields(table = %self.table))]
    async fn init(&self) -> Result<(), StorageError> {
        if self.pool.is_closed() {
            return Err(StorageError::Closed);
        }
        self.pool.health_check().await?;
        self.create_schema().await?;
        info!("Postgres storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.pool.close().await;
        Ok(())
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn save_job(&self, job: &Job) -> Result<(), StorageError> {
        let query = format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            self.table, JOB_COLUMNS
        );

        sqlx::query(&query)
            .bind(job.id)
            .bind(&job.name)
            .bind(&job.url)
            .bind(interval_to_db(job.interval)?)
            .bind(&job.email)
            .bind(job.active)
            .bind(&job.state)
            .execute(self.pool.pool())
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    StorageError::DuplicateKey(job.id)
                }
                other => other.into(),
            })?;

        info!(job_name = %job.name, "Job saved");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_job(&self, id: Uuid) -> Result<Job, StorageError> {
        let query = format!("SELECT {} FROM {} WHERE id = $1", JOB_COLUMNS, self.table);

        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?
            .ok_or(StorageError::NotFound(id))
    }

    #[instrument(skip(self))]
    async fn get_jobs(&self) -> Result<Vec<Job>, StorageError> {
        let query = format!("SELECT {} FROM {} ORDER BY name", JOB_COLUMNS, self.table);

        let jobs = sqlx::query_as::<_, Job>(&query)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(jobs)
    }

    #[instrument(skip(self))]
    async fn get_jobs_by_interval(&self, interval: u64) -> Result<Vec<Job>, StorageError> {
        let query = format!(
            "SELECT {} FROM {} WHERE interval_seconds = $1 AND active",
            JOB_COLUMNS, self.table
        );

        let jobs = sqlx::query_as::<_, Job>(&query)
            .bind(interval_to_db(interval)?)
            .fetch_all(self.pool.pool())
            .await?;

        debug!(count = jobs.len(), "Loaded active jobs for interval");
        Ok(jobs)
    }

    #[instrument(skip(self, update))]
    async fn update_job(&self, id: Uuid, update: &JobUpdate) -> Result<Job, StorageError> {
        let mut tx = self.pool.pool().begin().await?;

        let select = format!(
            "SELECT {} FROM {} WHERE id = $1 FOR UPDATE",
            JOB_COLUMNS, self.table
        );
        let mut job = sqlx::query_as::<_, Job>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StorageError::NotFound(id))?;

        job.apply(update);

        let statement = format!(
            "UPDATE {} SET name = $2, url = $3, interval_seconds = $4, email = $5, active = $6, state = $7 WHERE id = $1",
            self.table
        );
        sqlx::query(&statement)
            .bind(job.id)
            .bind(&job.name)
            .bind(&job.url)
            .bind(interval_to_db(job.interval)?)
            .bind(&job.email)
            .bind(job.active)
            .bind(&job.state)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!("Job updated");
        Ok(job)
    }

    #[instrument(skip(self))]
    async fn delete_job(&self, id: Uuid) -> Result<(), StorageError> {
        let query = format!("DELETE FROM {} WHERE id = $1", self.table);

        let result = sqlx::query(&query)
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id));
        }

        info!("Job deleted");
        Ok(())
    }
}
