// Log-based notifier (default implementation)

use crate::errors::NotifyError;
use crate::models::Job;
use crate::notifier::{build_message, Notifier};
use async_trait::async_trait;

/// Writes each alert as a structured WARN line instead of delivering it
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
    async fn notify(&self, job: &Job) -> Result<(), NotifyError> {
        tracing::warn!(
            job_name = %job.name,
            url = %job.url,
            email = %job.email,
            alert_type = "content_changed",
            "{}",
            build_message(job)
        );
        Ok(())
    }
}
