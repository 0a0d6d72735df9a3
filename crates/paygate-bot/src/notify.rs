//! Best-effort session webhook.
//!
//! Issuance enqueues a notification and moves on. A background worker drains
//! the queue and POSTs `{ user_id, session_id }` to
//! `<base>/api/session_updated`. Failures are counted and logged, never
//! surfaced to the caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const SESSION_UPDATED_PATH: &str = "/api/session_updated";

/// Errors that can occur while delivering a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// HTTP request failed or timed out.
    #[error("Webhook request error: {0}")]
    Request(String),

    /// Endpoint returned a non-success status code.
    #[error("Webhook returned status {0}")]
    Status(u16),

    /// The outbound queue is full or closed.
    #[error("Webhook queue full")]
    QueueFull,
}

/// Payload of the session webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub user_id: i64,
    pub session_id: String,
}

/// Delivery counters.
#[derive(Debug, Default)]
pub struct NotifyStats {
    sent: AtomicU64,
    failed: AtomicU64,
}

impl NotifyStats {
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    fn record(&self, result: &Result<(), NotifyError>) {
        match result {
            Ok(()) => self.sent.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }
}

/// HTTP client for the session endpoint.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl WebhookClient {
    pub fn new(http: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            http,
            url: format!("{}{SESSION_UPDATED_PATH}", base_url.trim_end_matches('/')),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST one update.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Request` on transport failure or timeout, and
    /// `NotifyError::Status` on a non-2xx response.
    pub async fn send(&self, update: &SessionUpdate) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .json(update)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(user_id = update.user_id, "Session webhook delivered");
            Ok(())
        } else {
            Err(NotifyError::Status(status.as_u16()))
        }
    }
}

/// Queue front of the webhook worker.
///
/// Cloning shares the queue and the counters. Without a configured endpoint
/// every notification is dropped silently.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Option<mpsc::Sender<SessionUpdate>>,
    stats: Arc<NotifyStats>,
}

impl Notifier {
    /// Start the worker on the current runtime.
    pub fn spawn(client: WebhookClient, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<SessionUpdate>(capacity.max(1));
        let stats = Arc::new(NotifyStats::default());

        let worker_stats = Arc::clone(&stats);
        let handle = tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                let result = client.send(&update).await;
                if let Err(e) = &result {
                    warn!(
                        user_id = update.user_id,
                        session_id = %update.session_id,
                        error = %e,
                        "Session webhook failed"
                    );
                }
                worker_stats.record(&result);
            }
            debug!("Webhook worker stopped");
        });

        (
            Self {
                tx: Some(tx),
                stats,
            },
            handle,
        )
    }

    /// A notifier with no endpoint.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            stats: Arc::new(NotifyStats::default()),
        }
    }

    /// Enqueue without waiting.
    pub fn notify(&self, user_id: i64, session_id: &str) {
        let Some(tx) = &self.tx else {
            return;
        };

        let update = SessionUpdate {
            user_id,
            session_id: session_id.to_string(),
        };
        if tx.try_send(update).is_err() {
            let result = Err(NotifyError::QueueFull);
            warn!(user_id, "Session webhook dropped: queue full");
            self.stats.record(&result);
        }
    }

    pub fn stats(&self) -> &NotifyStats {
        &self.stats
    }
}
