// Bootstrap utilities: build the monitor's collaborators from settings

use crate::config::{NotifierKind, Settings, StorageBackend};
use crate::db::DbPool;
use crate::executor::{HttpFetcher, PageFetcher};
use crate::monitor::Monitor;
use crate::notifier::{EmailNotifier, LogNotifier, Notifier, WebhookNotifier};
use crate::storage::{MemoryStorage, PostgresStorage, Storage};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Initialize the configured storage backend.
///
/// Postgres pools are lazy: no connection is made until `Storage::init`.
#[tracing::instrument(skip(settings))]
pub fn init_storage(settings: &Settings) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match settings.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage, jobs are lost on restart");
            Arc::new(MemoryStorage::new())
        }
        StorageBackend::Postgres => {
            let pool =
                DbPool::new(&settings.database).context("Failed to initialize database pool")?;
            info!(table = %settings.storage.table, "Using Postgres storage");
            Arc::new(PostgresStorage::new(pool, settings.storage.table.clone()))
        }
    };
    Ok(storage)
}

/// Initialize the configured change notifier
#[tracing::instrument(skip(settings))]
pub fn init_notifier(settings: &Settings) -> Result<Arc<dyn Notifier>> {
    let config = &settings.notifier;
    let timeout = Duration::from_secs(config.timeout_seconds);

    let notifier: Arc<dyn Notifier> = match config.kind {
        NotifierKind::Log => Arc::new(LogNotifier),
        NotifierKind::Email => {
            let email = config
                .email
                .clone()
                .context("notifier.email must be set for the email notifier")?;
            Arc::new(EmailNotifier::new(email, timeout).context("Failed to build email notifier")?)
        }
        NotifierKind::Webhook => {
            let webhook = config
                .webhook
                .clone()
                .context("notifier.webhook must be set for the webhook notifier")?;
            Arc::new(
                WebhookNotifier::new(webhook, timeout)
                    .context("Failed to build webhook notifier")?,
            )
        }
    };

    info!(kind = ?config.kind, "Notifier initialized");
    Ok(notifier)
}

/// Initialize the HTTP page fetcher
pub fn init_fetcher(settings: &Settings) -> Result<Arc<dyn PageFetcher>> {
    let fetcher =
        HttpFetcher::from_config(&settings.scheduler).context("Failed to build HTTP client")?;
    Ok(Arc::new(fetcher))
}

/// Wire storage, notifier and fetcher into an unstarted monitor
pub fn build_monitor(settings: &Settings) -> Result<Monitor> {
    let storage = init_storage(settings)?;
    let notifier = init_notifier(settings)?;
    let fetcher = init_fetcher(settings)?;

    Ok(Monitor::new(
        settings.scheduler.clone(),
        storage,
        notifier,
        fetcher,
    ))
}
