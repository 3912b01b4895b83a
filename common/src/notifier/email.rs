// E-mail notifier using the SendGrid v3 HTTP API

use crate::config::EmailConfig;
use crate::errors::NotifyError;
use crate::models::Job;
use crate::notifier::{build_message, build_subject, Notifier};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

/// Sends one plain-text e-mail per alert to the job's owner
pub struct EmailNotifier {
    client: Client,
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig, timeout: Duration) -> Result<Self, NotifyError> {
        if config.api_key.is_empty() {
            return Err(NotifyError::Configuration(
                "SendGrid API key cannot be empty".to_string(),
            ));
        }
        if config.sender.is_empty() {
            return Err(NotifyError::Configuration(
                "Sender address cannot be empty".to_string(),
            ));
        }

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            NotifyError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self { client, config })
    }

    fn payload(&self, job: &Job) -> serde_json::Value {
        json!({
            "personalizations": [{
                "to": [{ "email": job.email, "name": job.email }]
            }],
            "from": { "email": self.config.sender, "name": self.config.sender_name },
            "subject": build_subject(job),
            "content": [{ "type": "text/plain", "value": build_message(job) }]
        })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    #[instrument(skip(self, job), fields(job_id = %job.id, recipient = %job.email))]
    async fn notify(&self, job: &Job) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&self.payload(job))
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), "Alert e-mail accepted");
        Ok(())
    }
}
