//! Notification sink implementations.
//!
//! The platform's push pipeline is an external collaborator; this service
//! hands notices to it over a webhook and never blocks on the outcome.

use std::sync::Arc;
use std::time::Duration;

use domain::services::{Notifier, NotifyResult, VisitNotice};
use serde_json::json;
use uuid::Uuid;

use crate::config::NotificationsConfig;

/// Webhook-backed notifier. Posts each notice as JSON; failures are
/// reported in the result and logged by callers.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_default();
        Self { client, url }
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notice: VisitNotice) -> NotifyResult {
        match self.client.post(&self.url).json(&notice).send().await {
            Ok(response) if response.status().is_success() => NotifyResult::Sent,
            Ok(response) => NotifyResult::Failed(format!(
                "notification webhook returned {}",
                response.status()
            )),
            Err(err) => NotifyResult::Failed(err.to_string()),
        }
    }

    async fn revoke(&self, visiting_id: Uuid) -> NotifyResult {
        let body = json!({ "revoke": visiting_id });
        match self.client.post(&self.url).json(&body).send().await {
            Ok(response) if response.status().is_success() => NotifyResult::Sent,
            Ok(response) => NotifyResult::Failed(format!(
                "notification webhook returned {}",
                response.status()
            )),
            Err(err) => NotifyResult::Failed(err.to_string()),
        }
    }
}

/// Log-only notifier used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: VisitNotice) -> NotifyResult {
        tracing::info!(
            kind = %notice.kind,
            visiting_id = %notice.visiting_id,
            destination_id = %notice.destination_id,
            "Visiting notice"
        );
        NotifyResult::Sent
    }

    async fn revoke(&self, visiting_id: Uuid) -> NotifyResult {
        tracing::info!(visiting_id = %visiting_id, "Visiting notices revoked");
        NotifyResult::Sent
    }
}

/// Builds the configured notifier.
pub fn build_notifier(config: &NotificationsConfig) -> Arc<dyn Notifier> {
    if config.webhook_url.is_empty() {
        Arc::new(LogNotifier)
    } else {
        Arc::new(WebhookNotifier::new(
            config.webhook_url.clone(),
            config.timeout_ms,
        ))
    }
}

/// Deliver a notice without letting a sink failure surface to the caller.
pub async fn notify_best_effort(notifier: &dyn Notifier, notice: VisitNotice) {
    match notifier.notify(notice.clone()).await {
        NotifyResult::Sent | NotifyResult::Skipped => {}
        NotifyResult::Failed(reason) => {
            tracing::warn!(
                kind = %notice.kind,
                visiting_id = %notice.visiting_id,
                reason = %reason,
                "Notification delivery failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::services::NoticeKind;

    #[test]
    fn test_build_notifier_defaults_to_log() {
        let config = NotificationsConfig::default();
        // Just confirm construction succeeds for the log-only path
        let _notifier = build_notifier(&config);
    }

    #[tokio::test]
    async fn test_log_notifier_always_sends() {
        let notifier = LogNotifier;
        let notice = VisitNotice {
            kind: NoticeKind::CheckedIn,
            visiting_id: Uuid::new_v4(),
            destination_id: Uuid::new_v4(),
            actor_id: None,
            timestamp: Utc::now(),
        };
        assert!(matches!(notifier.notify(notice).await, NotifyResult::Sent));
        assert!(matches!(
            notifier.revoke(Uuid::new_v4()).await,
            NotifyResult::Sent
        ));
    }

    #[tokio::test]
    async fn test_notify_best_effort_swallows_failures() {
        let notifier = domain::services::notify::MockNotifier::failing();
        let notice = VisitNotice {
            kind: NoticeKind::Approved,
            visiting_id: Uuid::new_v4(),
            destination_id: Uuid::new_v4(),
            actor_id: None,
            timestamp: Utc::now(),
        };
        // Must not panic or propagate
        notify_best_effort(&notifier, notice).await;
    }
}
