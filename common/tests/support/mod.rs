// Shared fakes for the monitoring core tests

#![allow(dead_code)]

use async_trait::async_trait;
use common::errors::{FetchError, NotifyError, StorageError};
use common::executor::PageFetcher;
use common::models::{Job, JobUpdate};
use common::notifier::Notifier;
use common::storage::{MemoryStorage, Storage};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Side effects observed across fetcher, notifier and storage, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Fetch(String),
    Notify(Uuid),
    Persist(Uuid),
}

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

pub fn job(url: &str, interval: u64, state: &[u8]) -> Job {
    Job {
        id: Uuid::new_v4(),
        name: url.trim_start_matches("http://").to_string(),
        url: url.to_string(),
        interval,
        email: "owner@example.com".to_string(),
        active: true,
        state: state.to_vec(),
    }
}

#[derive(Debug, Clone)]
enum Response {
    Body(Vec<u8>),
    /// A new body on every fetch
    Changing,
    Fail,
}

/// Fetcher with per-URL canned responses, optional latency and concurrency tracking
#[derive(Debug, Default)]
pub struct FakeFetcher {
    responses: Mutex<HashMap<String, Response>>,
    delays: Mutex<HashMap<String, Duration>>,
    default_delay: Mutex<Duration>,
    log: EventLog,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    active_urls: Mutex<HashSet<String>>,
    overlapping_urls: AtomicUsize,
    revision: AtomicUsize,
}

impl FakeFetcher {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn respond(&self, url: &str, body: &[u8]) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Response::Body(body.to_vec()));
    }

    /// Serve different content on every fetch, so every check is a change
    pub fn respond_changing(&self, url: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Response::Changing);
    }

    pub fn fail(&self, url: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Response::Fail);
    }

    pub fn delay(&self, url: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
    }

    pub fn delay_all(&self, delay: Duration) {
        *self.default_delay.lock().unwrap() = delay;
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Times a URL was fetched while a previous fetch of it was still running
    pub fn overlapping_urls(&self) -> usize {
        self.overlapping_urls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self, url: &str) -> usize {
        self.log
            .count(|e| matches!(e, Event::Fetch(u) if u == url))
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.log.push(Event::Fetch(url.to_string()));

        if !self.active_urls.lock().unwrap().insert(url.to_string()) {
            self.overlapping_urls.fetch_add(1, Ordering::SeqCst);
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(*self.default_delay.lock().unwrap());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.active_urls.lock().unwrap().remove(url);

        let response = self.responses.lock().unwrap().get(url).cloned();
        match response {
            Some(Response::Body(body)) => Ok(body),
            Some(Response::Changing) => {
                let revision = self.revision.fetch_add(1, Ordering::SeqCst);
                Ok(format!("<html>rev {revision}</html>").into_bytes())
            }
            Some(Response::Fail) | None => Err(FetchError::Request {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}

/// Notifier that records every attempt and can be told to fail
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    log: EventLog,
    failing: std::sync::atomic::AtomicBool,
}

impl RecordingNotifier {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn failing(log: EventLog) -> Self {
        let notifier = Self::new(log);
        notifier.failing.store(true, Ordering::SeqCst);
        notifier
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, job: &Job) -> Result<(), NotifyError> {
        self.log.push(Event::Notify(job.id));
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("smtp unavailable".to_string()));
        }
        Ok(())
    }
}

/// Memory storage that logs persists and can fail interval queries on demand
#[derive(Debug, Default)]
pub struct RecordingStorage {
    inner: MemoryStorage,
    log: EventLog,
    failing_queries: AtomicUsize,
    failing_updates: std::sync::atomic::AtomicBool,
    failing_init: std::sync::atomic::AtomicBool,
    interval_queries: AtomicUsize,
    update_delay: Mutex<Duration>,
    updating: Mutex<HashSet<Uuid>>,
    overlapping_updates: AtomicUsize,
}

impl RecordingStorage {
    pub fn new(log: EventLog, jobs: impl IntoIterator<Item = Job>) -> Self {
        Self {
            inner: MemoryStorage::with_jobs(jobs),
            log,
            ..Self::default()
        }
    }

    /// Fail the next `n` interval queries
    pub fn fail_next_queries(&self, n: usize) {
        self.failing_queries.store(n, Ordering::SeqCst);
    }

    pub fn fail_updates(&self) {
        self.failing_updates.store(true, Ordering::SeqCst);
    }

    pub fn fail_init(&self) {
        self.failing_init.store(true, Ordering::SeqCst);
    }

    pub fn interval_queries(&self) -> usize {
        self.interval_queries.load(Ordering::SeqCst)
    }

    /// Make every state persist take `delay`
    pub fn delay_updates(&self, delay: Duration) {
        *self.update_delay.lock().unwrap() = delay;
    }

    /// State persists that started while another persist of the same job was running
    pub fn overlapping_updates(&self) -> usize {
        self.overlapping_updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn init(&self) -> Result<(), StorageError> {
        if self.failing_init.load(Ordering::SeqCst) {
            return Err(StorageError::ConnectionFailed("refused".to_string()));
        }
        self.inner.init().await
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.inner.close().await
    }

    async fn save_job(&self, job: &Job) -> Result<(), StorageError> {
        self.inner.save_job(job).await
    }

    async fn get_job(&self, id: Uuid) -> Result<Job, StorageError> {
        self.inner.get_job(id).await
    }

    async fn get_jobs(&self) -> Result<Vec<Job>, StorageError> {
        self.inner.get_jobs().await
    }

    async fn get_jobs_by_interval(&self, interval: u64) -> Result<Vec<Job>, StorageError> {
        self.interval_queries.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failing_queries
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(StorageError::QueryFailed("connection reset".to_string()));
        }
        self.inner.get_jobs_by_interval(interval).await
    }

    async fn update_job(&self, id: Uuid, update: &JobUpdate) -> Result<Job, StorageError> {
        if update.state.is_none() {
            return self.inner.update_job(id, update).await;
        }

        self.log.push(Event::Persist(id));
        if !self.updating.lock().unwrap().insert(id) {
            self.overlapping_updates.fetch_add(1, Ordering::SeqCst);
        }

        let delay = *self.update_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let result = if self.failing_updates.load(Ordering::SeqCst) {
            Err(StorageError::QueryFailed("disk full".to_string()))
        } else {
            self.inner.update_job(id, update).await
        };

        self.updating.lock().unwrap().remove(&id);
        result
    }

    async fn delete_job(&self, id: Uuid) -> Result<(), StorageError> {
        self.inner.delete_job(id).await
    }
}
