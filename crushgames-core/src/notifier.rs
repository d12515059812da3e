// src/notifier.rs

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::Error;

/// Outbound "someone won / someone claimed" notifications. Delivery is a
/// side effect: it runs on a detached task and must never block or fail the
/// request that triggered it. An SMTP or webhook implementation plugs in
/// behind this trait.
#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), Error>;
}

/// Default notifier: writes the summary to the log stream.
pub struct TracingNotifier;

#[async_trait]
impl AdminNotifier for TracingNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), Error> {
        info!(target: "notify", "{}: {}", subject, body);
        Ok(())
    }
}

/// Fire-and-forget delivery. Errors are caught at the task boundary so a
/// broken notification channel cannot crash the process or surface to the
/// player.
pub fn spawn_notify(notifier: Arc<dyn AdminNotifier>, subject: String, body: String) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&subject, &body).await {
            warn!("Notification '{}' failed: {:?}", subject, e);
        }
    });
}
