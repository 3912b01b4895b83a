// Executor module: page fetching and the per-job check protocol

pub mod check;
pub mod http;

pub use check::CheckExecutor;
pub use http::HttpFetcher;

use crate::errors::FetchError;
use async_trait::async_trait;

/// PageFetcher retrieves the current body of a monitored page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the full response body. Any failure is transient.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}
