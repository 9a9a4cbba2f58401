//! Outbound notifications carrying account links.
//!
//! Delivery itself (SMTP, transactional mail provider) is someone else's job.
//! The workflow only needs `send` to either succeed or fail.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::auth::AuthError;

/// A single message handed to a notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub link: String,
}

/// Delivery channel for account links.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, link: &str) -> Result<(), AuthError>;
}

/// Writes notifications to the log. Development default.
///
/// Links carry a live bearer token, so the full link is only emitted at
/// `debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

/// The link without its query string.
fn redact_link(link: &str) -> &str {
    link.split_once('?').map_or(link, |(base, _)| base)
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, link: &str) -> Result<(), AuthError> {
        info!(to, subject, link = redact_link(link), "notification (log only)");
        debug!(to, link, "notification link");
        Ok(())
    }
}

/// POSTs each notification as JSON to a webhook that performs delivery.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, to: &str, subject: &str, link: &str) -> Result<(), AuthError> {
        let body = Notification {
            to: to.to_string(),
            subject: subject.to_string(),
            link: link.to_string(),
        };
        self.client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| AuthError::Notification(format!("webhook delivery: {e}")))?;
        info!(to, subject, "notification delivered to webhook");
        Ok(())
    }
}

/// Keeps every notification in memory. Used by tests and `--memory` mode.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    outbox: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far, oldest first.
    pub async fn sent(&self) -> Vec<Notification> {
        self.outbox.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, to: &str, subject: &str, link: &str) -> Result<(), AuthError> {
        self.outbox.lock().await.push(Notification {
            to: to.to_string(),
            subject: subject.to_string(),
            link: link.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_notifier_records_in_order() {
        let notifier = MemoryNotifier::new();
        notifier.send("a@x.com", "First", "https://l/1").await.unwrap();
        notifier.send("b@x.com", "Second", "https://l/2").await.unwrap();
        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, "First");
        assert_eq!(sent[1].to, "b@x.com");
    }

    #[test]
    fn logged_link_drops_token() {
        assert_eq!(
            redact_link("https://accounts.test/reset-password?token=abc&redirectUrl=x"),
            "https://accounts.test/reset-password"
        );
        assert_eq!(redact_link("https://accounts.test/plain"), "https://accounts.test/plain");
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        LogNotifier
            .send("a@x.com", "Subject", "https://l/x?token=t")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn webhook_failure_is_a_notification_error() {
        // Port 9 (discard) on localhost is not expected to speak HTTP.
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/notify");
        let err = notifier.send("a@x.com", "Subject", "link").await.unwrap_err();
        assert!(matches!(err, AuthError::Notification(_)));
    }
}
