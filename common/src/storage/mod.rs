// Storage module: the job persistence contract and its backends

pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;

use crate::errors::StorageError;
use crate::models::{Job, JobUpdate};
use async_trait::async_trait;
use uuid::Uuid;

/// Durable job records consumed by the scheduler, executor and monitor
#[async_trait]
pub trait Storage: Send + Sync {
    /// Prepare connections and schema. Safe to call on an initialized backend.
    async fn init(&self) -> Result<(), StorageError>;

    async fn close(&self) -> Result<(), StorageError>;

    async fn save_job(&self, job: &Job) -> Result<(), StorageError>;

    async fn get_job(&self, id: Uuid) -> Result<Job, StorageError>;

    async fn get_jobs(&self) -> Result<Vec<Job>, StorageError>;

    /// Active jobs polled at `interval`. Inactive jobs are never returned.
    async fn get_jobs_by_interval(&self, interval: u64) -> Result<Vec<Job>, StorageError>;

    /// Apply a partial patch and return the updated job
    async fn update_job(&self, id: Uuid, update: &JobUpdate) -> Result<Job, StorageError>;

    async fn delete_job(&self, id: Uuid) -> Result<(), StorageError>;
}
