// Admission gate bounding simultaneous checks across all intervals

use crate::telemetry;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Fixed-capacity slot pool shared by every interval loop
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    /// A capacity of zero is raised to one so the gate can never deadlock
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }

    /// Wait for a free slot. Returns `None` only if the gate was closed.
    pub async fn acquire(&self) -> Option<AdmissionPermit> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        telemetry::update_checks_in_flight(self.in_flight());
        Some(AdmissionPermit {
            _permit: permit,
            gate: self.clone(),
        })
    }

    /// Take a slot without waiting
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        telemetry::update_checks_in_flight(self.in_flight());
        Some(AdmissionPermit {
            _permit: permit,
            gate: self.clone(),
        })
    }
}

/// One occupied slot; released on drop
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    gate: AdmissionGate,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        // The inner permit is released right after this runs
        telemetry::update_checks_in_flight(self.gate.in_flight().saturating_sub(1));
    }
}
