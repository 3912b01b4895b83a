// Check executor: fetch, compare, notify, persist

use crate::config::SchedulerConfig;
use crate::errors::FetchError;
use crate::executor::PageFetcher;
use crate::models::{CheckOutcome, Job, JobUpdate};
use crate::notifier::Notifier;
use crate::storage::Storage;
use crate::telemetry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Runs the check protocol for one job snapshot.
///
/// Each invocation performs at most one notification attempt and at most one
/// state persist, and neither happens unless the fetch succeeded.
pub struct CheckExecutor {
    fetcher: Arc<dyn PageFetcher>,
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    fetch_timeout: Duration,
    persist_timeout: Duration,
}

impl CheckExecutor {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            fetcher,
            storage,
            notifier,
            fetch_timeout: defaults.fetch_timeout(),
            persist_timeout: defaults.persist_timeout(),
        }
    }

    pub fn with_timeouts(mut self, fetch_timeout: Duration, persist_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self.persist_timeout = persist_timeout;
        self
    }

    /// Fetch a page under the executor's fetch timeout
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        match timeout(self.fetch_timeout, self.fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
        }
    }

    /// Check one job against its last known state
    #[instrument(skip(self, job), fields(job_id = %job.id, interval = job.interval))]
    pub async fn run(&self, job: &Job) -> CheckOutcome {
        let started = Instant::now();
        let fetched = self.fetch(&job.url).await;
        telemetry::record_fetch_duration(job.interval, started.elapsed().as_secs_f64());

        let body = match fetched {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), url = %job.url, "Fetch failed, retrying next tick");
                return self.finish(job, CheckOutcome::FetchFailed);
            }
        };

        if body == job.state {
            debug!("Content unchanged");
            return self.finish(job, CheckOutcome::Unchanged);
        }

        info!(url = %job.url, bytes = body.len(), "Content changed");

        // A broken notifier must not block the persist, otherwise every tick re-alerts
        let notified = match self.notifier.notify(job).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to send change notification");
                false
            }
        };
        telemetry::record_notification(notified);

        let update = JobUpdate::state(body);
        let persisted = match timeout(self.persist_timeout, self.storage.update_job(job.id, &update))
            .await
        {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                error!(error = %e, "Failed to persist new state");
                false
            }
            Err(_) => {
                error!(
                    timeout_seconds = self.persist_timeout.as_secs(),
                    "Timed out persisting new state"
                );
                false
            }
        };

        self.finish(
            job,
            CheckOutcome::Changed {
                notified,
                persisted,
            },
        )
    }

    fn finish(&self, job: &Job, outcome: CheckOutcome) -> CheckOutcome {
        telemetry::record_check(job.interval, outcome.as_str());
        outcome
    }
}
