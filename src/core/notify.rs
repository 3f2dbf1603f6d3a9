//! Outcome reporting boundary.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Delivers a plan report out-of-band. Implementations decide the medium;
/// the report is plain text.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<()>;
}

/// Notifier that writes the report to the application log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        info!("{subject}\n{body}");
        Ok(())
    }
}
