// Monitor: lifecycle of the polling core and the job management surface

use crate::config::SchedulerConfig;
use crate::errors::MonitorError;
use crate::executor::{CheckExecutor, PageFetcher};
use crate::models::{BatchReport, Job, JobUpdate, LoopState, NewJob};
use crate::notifier::Notifier;
use crate::scheduler::{AdmissionGate, BatchRunner, IntervalScheduler, SchedulerContext};
use crate::storage::Storage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Running,
    Stopped,
}

/// Owns the storage, the interval loops and their shared runtime context.
///
/// There is no durable work queue: every tick re-reads its jobs from storage,
/// so a restarted monitor simply resumes polling on the next tick.
pub struct Monitor {
    config: SchedulerConfig,
    storage: Arc<dyn Storage>,
    executor: Arc<CheckExecutor>,
    scheduler: IntervalScheduler,
    context: SchedulerContext,
    phase: Mutex<Phase>,
    loops: std::sync::Mutex<HashMap<u64, watch::Receiver<LoopState>>>,
}

impl Monitor {
    pub fn new(
        config: SchedulerConfig,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        let executor = Arc::new(
            CheckExecutor::new(fetcher, storage.clone(), notifier)
                .with_timeouts(config.fetch_timeout(), config.persist_timeout()),
        );
        let runner = Arc::new(BatchRunner::new(
            storage.clone(),
            executor.clone(),
            config.query_timeout(),
        ));
        let scheduler = IntervalScheduler::new(config.intervals.clone(), runner);
        let context = SchedulerContext::new(config.max_concurrent_checks);

        Self {
            config,
            storage,
            executor,
            scheduler,
            context,
            phase: Mutex::new(Phase::Created),
            loops: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Initialize storage and launch the interval loops.
    ///
    /// Returns as soon as the loops are spawned. A storage init failure leaves
    /// the monitor unstarted and is meant to abort the process.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), MonitorError> {
        let mut phase = self.phase.lock().await;
        match *phase {
            Phase::Running => return Err(MonitorError::AlreadyStarted),
            Phase::Stopped => return Err(MonitorError::AlreadyStopped),
            Phase::Created => {}
        }

        self.storage.init().await.map_err(|e| {
            error!(error = %e, "Storage initialization failed");
            MonitorError::StorageInit(e)
        })?;

        let states = self.scheduler.start(&self.context);
        if let Ok(mut loops) = self.loops.lock() {
            *loops = states;
        }

        *phase = Phase::Running;
        info!(
            intervals = ?self.config.intervals,
            max_concurrent_checks = self.context.gate.capacity(),
            "Monitor started"
        );
        Ok(())
    }

    /// Signal every loop to stop, wait for in-flight batches, then close storage.
    ///
    /// Callable once; later calls return `AlreadyStopped`.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), MonitorError> {
        {
            let mut phase = self.phase.lock().await;
            match *phase {
                Phase::Created => return Err(MonitorError::NotStarted),
                Phase::Stopped => return Err(MonitorError::AlreadyStopped),
                Phase::Running => *phase = Phase::Stopped,
            }
        }

        info!("Stopping monitor, draining in-flight checks");
        self.context.shutdown.cancel();
        self.context.tracker.close();
        self.context.tracker.wait().await;

        self.storage.close().await?;
        info!("Monitor stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.phase.lock().await == Phase::Running
    }

    /// Current state of the loop for `interval`, if one was launched
    pub fn loop_state(&self, interval: u64) -> Option<LoopState> {
        self.loops
            .lock()
            .ok()
            .and_then(|loops| loops.get(&interval).map(|rx| *rx.borrow()))
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.context.gate
    }

    pub fn intervals(&self) -> &[u64] {
        self.scheduler.intervals()
    }

    /// Run a single batch for `interval` outside the timer loop.
    ///
    /// Only allowed while running. The batch waits for any in-flight tick of
    /// the same interval and is drained by `stop` like the loops are.
    #[instrument(skip(self))]
    pub async fn run_batch(&self, interval: u64) -> Result<BatchReport, MonitorError> {
        self.ensure_interval(interval)?;

        // Registered with the tracker under the phase lock so a concurrent
        // stop either rejects this batch or waits for it.
        let batch = {
            let phase = self.phase.lock().await;
            match *phase {
                Phase::Created => return Err(MonitorError::NotStarted),
                Phase::Stopped => return Err(MonitorError::AlreadyStopped),
                Phase::Running => {}
            }
            self.context
                .tracker
                .track_future(self.scheduler.run_exclusive(interval, &self.context))
        };

        match batch.await {
            Some(result) => Ok(result?),
            None => Err(MonitorError::UnsupportedInterval {
                interval,
                allowed: self.config.intervals.clone(),
            }),
        }
    }

    fn ensure_interval(&self, interval: u64) -> Result<(), MonitorError> {
        if self.config.supports_interval(interval) {
            return Ok(());
        }
        Err(MonitorError::UnsupportedInterval {
            interval,
            allowed: self.config.intervals.clone(),
        })
    }

    /// Register a page. The page is fetched once to seed its state.
    #[instrument(skip(self, new_job), fields(url = %new_job.url, interval = new_job.interval))]
    pub async fn add(&self, new_job: NewJob) -> Result<Job, MonitorError> {
        self.ensure_interval(new_job.interval)?;

        let state = self.executor.fetch(&new_job.url).await?;
        let job = Job::from_new(new_job, state);

        self.storage.save_job(&job).await?;
        info!(job_id = %job.id, job_name = %job.name, "Job added");
        Ok(job)
    }

    /// Remove a job; it is absent from every later interval query
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), MonitorError> {
        self.storage.delete_job(id).await?;
        info!("Job deleted");
        Ok(())
    }

    /// Patch a job's settings. The new interval is picked up on the next tick.
    #[instrument(skip(self, update))]
    pub async fn update(&self, id: Uuid, update: JobUpdate) -> Result<Job, MonitorError> {
        if update.state.is_some() {
            return Err(MonitorError::StateNotWritable);
        }
        if let Some(interval) = update.interval {
            self.ensure_interval(interval)?;
        }

        Ok(self.storage.update_job(id, &update).await?)
    }

    pub async fn get_checks(&self) -> Result<Vec<Job>, MonitorError> {
        Ok(self.storage.get_jobs().await?)
    }

    pub async fn get_check(&self, id: Uuid) -> Result<Job, MonitorError> {
        Ok(self.storage.get_job(id).await?)
    }
}
