// Scheduler module: interval loops, batch dispatch and the admission gate

pub mod engine;
pub mod gate;

pub use engine::{BatchRunner, IntervalScheduler};
pub use gate::{AdmissionGate, AdmissionPermit};

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Runtime state shared by every interval loop.
///
/// Owned by the monitor and cloned into each loop: the gate bounds in-flight
/// checks across all intervals, `shutdown` is cancelled exactly once on stop,
/// and `tracker` counts the loops still draining.
#[derive(Debug, Clone)]
pub struct SchedulerContext {
    pub gate: AdmissionGate,
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
}

impl SchedulerContext {
    pub fn new(max_concurrent_checks: usize) -> Self {
        Self {
            gate: AdmissionGate::new(max_concurrent_checks),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }
}
