//! Outbound notifications and who receives them.

use async_trait::async_trait;
use serde::Serialize;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// One message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub recipient_id: Uuid,
    pub title: String,
    pub body: String,
    pub target_url: String,
}

/// Delivery transport. Failures are reported but never roll back business writes.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), AppError>;
}

/// Default sender: writes the notification to the structured log.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotificationSender;

#[async_trait]
impl NotificationSender for LoggingNotificationSender {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        tracing::info!(
            recipient_id = %notification.recipient_id,
            title = %notification.title,
            target_url = %notification.target_url,
            "Notification dispatched"
        );
        Ok(())
    }
}

/// Keeps every notification in memory so callers can assert on what was sent.
#[derive(Debug, Default)]
pub struct RecordingNotificationSender {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSender for RecordingNotificationSender {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        self.sent
            .lock()
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("notification log poisoned")))?
            .push(notification.clone());
        Ok(())
    }
}

/// Recipient resolution for warehouse notifications.
#[derive(Debug, Clone)]
pub struct NotificationRouting {
    pub hq_warehouse_code: String,
    pub default_recipient: Option<Uuid>,
    pub recipients_by_business_line: HashMap<Uuid, Uuid>,
    pub public_base_url: String,
}

impl NotificationRouting {
    /// Warehouse contact for a business line, falling back to the default recipient.
    pub fn warehouse_recipient(&self, business_line_id: Option<Uuid>) -> Option<Uuid> {
        business_line_id
            .and_then(|id| self.recipients_by_business_line.get(&id).copied())
            .or(self.default_recipient)
    }

    pub fn quote_url(&self, quote_id: Uuid) -> String {
        format!("{}/quotes/{}", self.public_base_url.trim_end_matches('/'), quote_id)
    }

    pub fn is_hq_warehouse(&self, warehouse_code: &str) -> bool {
        warehouse_code.trim().eq_ignore_ascii_case(&self.hq_warehouse_code)
    }
}

impl Default for NotificationRouting {
    fn default() -> Self {
        Self {
            hq_warehouse_code: "HQ".to_string(),
            default_recipient: None,
            recipients_by_business_line: HashMap::new(),
            public_base_url: "http://localhost:8080".to_string(),
        }
    }
}

/// Send notifications released by a committed transaction. Errors are logged and dropped.
pub async fn dispatch(sender: &dyn NotificationSender, notifications: Vec<Notification>) {
    for notification in notifications {
        if let Err(e) = sender.send(&notification).await {
            tracing::warn!(
                error = %e,
                recipient_id = %notification.recipient_id,
                title = %notification.title,
                "Notification delivery failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_line_recipient_wins_over_default() {
        let line = Uuid::new_v4();
        let line_contact = Uuid::new_v4();
        let fallback = Uuid::new_v4();
        let routing = NotificationRouting {
            default_recipient: Some(fallback),
            recipients_by_business_line: HashMap::from([(line, line_contact)]),
            ..NotificationRouting::default()
        };

        assert_eq!(routing.warehouse_recipient(Some(line)), Some(line_contact));
        assert_eq!(routing.warehouse_recipient(Some(Uuid::new_v4())), Some(fallback));
        assert_eq!(routing.warehouse_recipient(None), Some(fallback));
        assert_eq!(NotificationRouting::default().warehouse_recipient(None), None);
    }

    #[test]
    fn hq_match_ignores_case_and_padding() {
        let routing = NotificationRouting::default();
        assert!(routing.is_hq_warehouse(" hq "));
        assert!(!routing.is_hq_warehouse("SZ01"));
    }

    #[test]
    fn quote_links_use_the_public_base_url() {
        let routing = NotificationRouting {
            public_base_url: "https://erp.example.com/".to_string(),
            ..NotificationRouting::default()
        };
        let id = Uuid::nil();
        assert_eq!(
            routing.quote_url(id),
            "https://erp.example.com/quotes/00000000-0000-0000-0000-000000000000"
        );
    }

    #[tokio::test]
    async fn recording_sender_keeps_everything() {
        let sender = RecordingNotificationSender::new();
        let n = Notification {
            recipient_id: Uuid::new_v4(),
            title: "Ship now".to_string(),
            body: "body".to_string(),
            target_url: "/quotes/1".to_string(),
        };
        dispatch(&sender, vec![n.clone(), n.clone()]).await;
        assert_eq!(sender.sent(), vec![n.clone(), n]);
    }
}
