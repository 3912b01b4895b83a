// In-memory storage backend

use crate::errors::StorageError;
use crate::models::{Job, JobUpdate};
use crate::storage::Storage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Process-local storage. Jobs do not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    jobs: RwLock<HashMap<Uuid, Job>>,
    closed: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing jobs
    pub fn with_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        Self {
            jobs: RwLock::new(jobs.into_iter().map(|job| (job.id, job)).collect()),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn init(&self) -> Result<(), StorageError> {
        self.ensure_open()?;
        debug!("Memory storage ready");
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.closed.store(true, Ordering::Release);
        debug!("Memory storage closed");
        Ok(())
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn save_job(&self, job: &Job) -> Result<(), StorageError> {
        self.ensure_open()?;
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StorageError::DuplicateKey(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Job, StorageError> {
        self.ensure_open()?;
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound(id))
    }

    async fn get_jobs(&self) -> Result<Vec<Job>, StorageError> {
        self.ensure_open()?;
        Ok(self.jobs.read().await.values().cloned().collect())
    }

    async fn get_jobs_by_interval(&self, interval: u64) -> Result<Vec<Job>, StorageError> {
        self.ensure_open()?;
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.active && job.interval == interval)
            .cloned()
            .collect())
    }

    #[instrument(skip(self, update))]
    async fn update_job(&self, id: Uuid, update: &JobUpdate) -> Result<Job, StorageError> {
        self.ensure_open()?;
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(StorageError::NotFound(id))?;
        job.apply(update);
        Ok(job.clone())
    }

    #[instrument(skip(self))]
    async fn delete_job(&self, id: Uuid) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.jobs
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound(id))
    }
}
