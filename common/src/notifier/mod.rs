// Notifier module: change alerts for a single job

pub mod email;
pub mod log;
pub mod webhook;

pub use email::EmailNotifier;
pub use log::LogNotifier;
pub use webhook::WebhookNotifier;

use crate::errors::NotifyError;
use crate::models::Job;
use async_trait::async_trait;

/// Best-effort delivery of a "page changed" alert to the job's owner
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, job: &Job) -> Result<(), NotifyError>;
}

/// Alert subject line
pub fn build_subject(job: &Job) -> String {
    format!("Page monitor alert: {}", job.url)
}

/// Alert body text
pub fn build_message(job: &Job) -> String {
    format!("Detected difference on {}", job.url)
}
