// Scheduler engine: one polling loop per interval bucket

use crate::errors::StorageError;
use crate::executor::CheckExecutor;
use crate::models::{BatchReport, LoopState};
use crate::scheduler::SchedulerContext;
use crate::storage::Storage;
use crate::telemetry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, Instrument};

/// Loads one interval's active jobs and drives them through the executor
pub struct BatchRunner {
    storage: Arc<dyn Storage>,
    executor: Arc<CheckExecutor>,
    query_timeout: Duration,
}

impl BatchRunner {
    pub fn new(
        storage: Arc<dyn Storage>,
        executor: Arc<CheckExecutor>,
        query_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            executor,
            query_timeout,
        }
    }

    /// Run one batch for `interval` and wait for every dispatched check.
    ///
    /// A storage error means nothing was dispatched. Once shutdown is
    /// requested no further checks are started, but those already running
    /// are still joined before returning.
    #[instrument(skip(self, ctx))]
    pub async fn run_batch(
        &self,
        interval: u64,
        ctx: &SchedulerContext,
    ) -> Result<BatchReport, StorageError> {
        let jobs = match timeout(
            self.query_timeout,
            self.storage.get_jobs_by_interval(interval),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(StorageError::Timeout(self.query_timeout.as_secs())),
        };

        let mut report = BatchReport::new(interval, jobs.len());
        if jobs.is_empty() {
            return Ok(report);
        }

        debug!(job_count = jobs.len(), "Running checks");

        let mut checks = JoinSet::new();
        let mut pending = jobs.into_iter();
        while let Some(job) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = ctx.shutdown.cancelled() => None,
                permit = ctx.gate.acquire() => permit,
            };

            let Some(permit) = permit else {
                let skipped: Vec<_> = std::iter::once(job.id)
                    .chain(pending.by_ref().map(|job| job.id))
                    .collect();
                info!(
                    remaining = skipped.len(),
                    "Shutdown requested, not dispatching remaining checks"
                );
                debug!(job_ids = ?skipped, "Skipped checks");
                break;
            };

            let executor = self.executor.clone();
            checks.spawn(
                async move {
                    let _permit = permit;
                    executor.run(&job).await
                }
                .in_current_span(),
            );
            report.dispatched += 1;
        }

        while let Some(result) = checks.join_next().await {
            match result {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!(error = %e, "Check task failed to complete");
                    report.crashed += 1;
                }
            }
        }

        debug!(
            dispatched = report.dispatched,
            changed = report.changed,
            unchanged = report.unchanged,
            fetch_failed = report.fetch_failed,
            skipped = report.skipped(),
            "Checks finished"
        );

        Ok(report)
    }
}

/// Spawns and owns the per-interval polling loops.
///
/// Each interval has one batch lock: a batch for that interval, whether from
/// the timer loop or `run_exclusive`, only runs while holding it.
pub struct IntervalScheduler {
    intervals: Vec<u64>,
    runner: Arc<BatchRunner>,
    batch_locks: HashMap<u64, Arc<Mutex<()>>>,
}

impl IntervalScheduler {
    pub fn new(intervals: Vec<u64>, runner: Arc<BatchRunner>) -> Self {
        let batch_locks = intervals
            .iter()
            .map(|&interval| (interval, Arc::new(Mutex::new(()))))
            .collect();
        Self {
            intervals,
            runner,
            batch_locks,
        }
    }

    pub fn intervals(&self) -> &[u64] {
        &self.intervals
    }

    pub fn runner(&self) -> &Arc<BatchRunner> {
        &self.runner
    }

    /// Run one batch for `interval` serialized with that interval's loop.
    ///
    /// Returns `None` if `interval` is not one of the scheduled intervals.
    pub async fn run_exclusive(
        &self,
        interval: u64,
        ctx: &SchedulerContext,
    ) -> Option<Result<BatchReport, StorageError>> {
        let lock = self.batch_locks.get(&interval)?;
        let _guard = lock.lock().await;
        Some(self.runner.run_batch(interval, ctx).await)
    }

    /// Launch one loop per interval on the context's tracker.
    ///
    /// Returns immediately; the returned receivers report each loop's state.
    pub fn start(&self, ctx: &SchedulerContext) -> HashMap<u64, watch::Receiver<LoopState>> {
        let mut states = HashMap::with_capacity(self.intervals.len());

        for &interval in &self.intervals {
            let (state_tx, state_rx) = watch::channel(LoopState::Idle);
            states.insert(interval, state_rx);

            let runner = self.runner.clone();
            let batch_lock = self.batch_locks.get(&interval).cloned().unwrap_or_default();
            let loop_ctx = ctx.clone();
            ctx.tracker.spawn(run_interval_loop(
                interval, runner, batch_lock, loop_ctx, state_tx,
            ));
        }

        info!(intervals = ?self.intervals, "Interval loops launched");
        states
    }
}

/// Idle → Running → Idle on every tick, Idle → Stopped on shutdown.
///
/// The batch runs inline, so a slow batch delays this interval's next tick
/// and never overlaps with it.
async fn run_interval_loop(
    interval: u64,
    runner: Arc<BatchRunner>,
    batch_lock: Arc<Mutex<()>>,
    ctx: SchedulerContext,
    state: watch::Sender<LoopState>,
) {
    let period = Duration::from_secs(interval);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(interval, "Interval loop started");

    loop {
        tokio::select! {
            biased;
            _ = ctx.shutdown.cancelled() => {
                debug!(interval, "Shutdown signal received, stopping interval loop");
                break;
            }
            _ = ticker.tick() => {
                state.send_replace(LoopState::Running);

                let guard = batch_lock.lock().await;
                let result = runner.run_batch(interval, &ctx).await;
                drop(guard);

                match result {
                    Ok(report) => {
                        let result = if report.jobs == 0 { "empty" } else { "ok" };
                        telemetry::record_batch(interval, result, report.jobs);
                        if report.changed > 0 {
                            info!(interval, changed = report.changed, "Detected page changes");
                        }
                    }
                    Err(e) => {
                        error!(interval, error = %e, "Failed to load jobs, skipping tick");
                        telemetry::record_batch(interval, "query_failed", 0);
                    }
                }

                state.send_replace(LoopState::Idle);
            }
        }
    }

    state.send_replace(LoopState::Stopped);
    debug!(interval, "Interval loop stopped");
}
