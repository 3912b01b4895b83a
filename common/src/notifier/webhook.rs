// Webhook notifier (Discord-compatible JSON payload)

use crate::config::WebhookConfig;
use crate::errors::NotifyError;
use crate::models::Job;
use crate::notifier::{build_message, Notifier};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::instrument;

#[derive(Debug, Serialize)]
struct WebhookPayload {
    content: String,
}

/// Posts `{"content": "<message>"}` to a fixed URL for every alert
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig, timeout: Duration) -> Result<Self, NotifyError> {
        if config.url.is_empty() {
            return Err(NotifyError::Configuration(
                "Webhook URL cannot be empty".to_string(),
            ));
        }

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            NotifyError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            url: config.url,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn notify(&self, job: &Job) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            content: build_message(job),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
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

        Ok(())
    }
}
