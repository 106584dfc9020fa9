//! Notification dispatch
//!
//! Notifications are fire-and-forget records in the `notifications.json`
//! collection; delivery is the notification service's problem. A store
//! failure here is logged and swallowed so a flaky sink never fails the
//! operation that triggered the notification.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::store::models::{new_id, Notification};
use crate::store::{collections, DocumentStore};

#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn DocumentStore>,
}

impl Notifier {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create one notification record for `user_id`
    pub async fn notify(&self, user_id: &str, kind: &str, title: &str, body: &str) {
        let notification = Notification {
            id: new_id(),
            user_id: user_id.to_string(),
            kind: kind.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            read: false,
            created_at: Utc::now(),
        };

        let doc = match serde_json::to_value(&notification) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Failed to encode notification for {}: {}", user_id, e);
                return;
            }
        };

        if let Err(e) = self.store.create(collections::NOTIFICATIONS, doc).await {
            warn!("Failed to deliver notification to {}: {}", user_id, e);
        }
    }
}
