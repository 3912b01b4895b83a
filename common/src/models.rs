use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Job Models
// ============================================================================

/// Job is one monitored page: where to fetch it, how often, who to tell,
/// and the last content seen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    /// Polling interval in seconds, one of the configured buckets
    #[sqlx(rename = "interval_seconds", try_from = "i64")]
    pub interval: u64,
    pub email: String,
    pub active: bool,
    /// Raw body of the last successful fetch. Compared byte-for-byte, never parsed.
    #[serde(skip)]
    pub state: Vec<u8>,
}

impl Job {
    /// Build a job from a creation request and its seeded state
    pub fn from_new(new_job: NewJob, state: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: new_job.name,
            url: new_job.url,
            interval: new_job.interval,
            email: new_job.email,
            active: new_job.active,
            state,
        }
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, update: &JobUpdate) {
        if let Some(url) = &update.url {
            self.url = url.clone();
        }
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(interval) = update.interval {
            self.interval = interval;
        }
        if let Some(email) = &update.email {
            self.email = email.clone();
        }
        if let Some(active) = update.active {
            self.active = active;
        }
        if let Some(state) = &update.state {
            self.state = state.clone();
        }
    }
}

/// Request to register a new page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub name: String,
    pub url: String,
    pub interval: u64,
    pub email: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial patch applied by storage. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip)]
    pub state: Option<Vec<u8>>,
}

impl JobUpdate {
    /// Patch that only replaces the stored content snapshot
    pub fn state(state: Vec<u8>) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }
}

// ============================================================================
// Check Models
// ============================================================================

/// Result of a single check execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The fetch failed; nothing else happened
    FetchFailed,
    /// Fetched content equals the stored state
    Unchanged,
    /// Content differed; records whether notify and persist succeeded
    Changed { notified: bool, persisted: bool },
}

impl CheckOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckOutcome::FetchFailed => "fetch_failed",
            CheckOutcome::Unchanged => "unchanged",
            CheckOutcome::Changed { .. } => "changed",
        }
    }
}

/// Summary of one tick of an interval loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub interval: u64,
    /// Active jobs returned by storage for this tick
    pub jobs: usize,
    /// Checks actually started
    pub dispatched: usize,
    pub unchanged: usize,
    pub changed: usize,
    pub fetch_failed: usize,
    /// Check tasks that panicked or were aborted
    pub crashed: usize,
}

impl BatchReport {
    pub fn new(interval: u64, jobs: usize) -> Self {
        Self {
            interval,
            jobs,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: CheckOutcome) {
        match outcome {
            CheckOutcome::FetchFailed => self.fetch_failed += 1,
            CheckOutcome::Unchanged => self.unchanged += 1,
            CheckOutcome::Changed { .. } => self.changed += 1,
        }
    }

    /// Jobs left undispatched because shutdown was requested mid-batch
    pub fn skipped(&self) -> usize {
        self.jobs - self.dispatched
    }
}

/// Lifecycle state of one interval loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> Job {
        Job::from_new(
            NewJob {
                name: "docs".to_string(),
                url: "https://example.com/docs".to_string(),
                interval: 60,
                email: "owner@example.com".to_string(),
                active: true,
            },
            b"v1".to_vec(),
        )
    }

    #[test]
    fn test_apply_only_touches_present_fields() {
        let mut job = sample_job();
        let original = job.clone();

        job.apply(&JobUpdate {
            name: Some("renamed".to_string()),
            active: Some(false),
            ..JobUpdate::default()
        });

        assert_eq!(job.name, "renamed");
        assert!(!job.active);
        assert_eq!(job.url, original.url);
        assert_eq!(job.interval, original.interval);
        assert_eq!(job.state, original.state);
    }

    #[test]
    fn test_state_update_only_sets_state() {
        let update = JobUpdate::state(b"v2".to_vec());
        assert_eq!(update.state.as_deref(), Some(&b"v2"[..]));
        assert!(update.url.is_none());
        assert!(update.interval.is_none());
        assert!(update.active.is_none());
    }

    #[test]
    fn test_state_is_not_serialized() {
        let job = sample_job();
        let json = serde_json::to_value(&job).unwrap();
        assert!(json.get("state").is_none());
        assert_eq!(json["interval"], 60);
    }

    #[test]
    fn test_new_job_defaults_to_active() {
        let new_job: NewJob = serde_json::from_str(
            r#"{"name":"x","url":"http://x","interval":3,"email":"a@b.c"}"#,
        )
        .unwrap();
        assert!(new_job.active);
    }

    #[test]
    fn test_batch_report_counts() {
        let mut report = BatchReport::new(15, 4);
        report.dispatched = 3;
        report.record(CheckOutcome::Unchanged);
        report.record(CheckOutcome::FetchFailed);
        report.record(CheckOutcome::Changed {
            notified: true,
            persisted: true,
        });

        assert_eq!(report.unchanged, 1);
        assert_eq!(report.fetch_failed, 1);
        assert_eq!(report.changed, 1);
        assert_eq!(report.skipped(), 1);
    }
}
