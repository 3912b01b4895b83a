// Error handling framework
// One enum per failure domain of the polling core

use thiserror::Error;
use uuid::Uuid;

/// Page fetch errors
///
/// Always transient from the scheduler's point of view: the check is skipped
/// and naturally retried on the next tick of its interval.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),

    #[error("HTTP request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("HTTP request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to read response body from {url}: {reason}")]
    Body { url: String, reason: String },
}

impl FetchError {
    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::ClientBuild(_) => "client_build",
            FetchError::Request { .. } => "request",
            FetchError::Timeout { .. } => "timeout",
            FetchError::Status { .. } => "status",
            FetchError::Body { .. } => "body",
        }
    }
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Storage query failed: {0}")]
    QueryFailed(String),

    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Duplicate job id: {0}")]
    DuplicateKey(Uuid),

    #[error("Storage is closed")]
    Closed,

    #[error("Storage operation timed out after {0} seconds")]
    Timeout(u64),
}

/// Notification delivery errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("Notification rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid notifier configuration: {0}")]
    Configuration(String),
}

/// Errors surfaced by the monitor's lifecycle and job management operations
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Storage initialization failed: {0}")]
    StorageInit(#[source] StorageError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Initial fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Unsupported polling interval {interval}s, allowed values: {allowed:?}")]
    UnsupportedInterval { interval: u64, allowed: Vec<u64> },

    #[error("Job state can only be written by the check executor")]
    StateNotWritable,

    #[error("Monitor is already running")]
    AlreadyStarted,

    #[error("Monitor has already been stopped")]
    AlreadyStopped,

    #[error("Monitor has not been started")]
    NotStarted,
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed => StorageError::Closed,
            sqlx::Error::PoolTimedOut => StorageError::ConnectionFailed(err.to_string()),
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                StorageError::ConnectionFailed(err.to_string())
            }
            sqlx::Error::Database(db_err) => StorageError::QueryFailed(db_err.message().to_string()),
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}
