//! Notification Dispatcher
//!
//! Emits user-facing alerts for workflow transitions and tracks their read state.

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::domain::{Alert, Notification};
use crate::error::{CollabError, Result};
use crate::repository::NotificationStore;

pub const DEFAULT_LIST_LIMIT: i64 = 50;

#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// Create an unread notification for `user_id`
    pub async fn notify(&self, user_id: &str, alert: Alert) -> Result<Notification> {
        let notification = Notification::new(user_id, alert);
        self.store.insert(&notification).await?;

        info!(
            notification_id = %notification.id,
            user_id = %user_id,
            kind = ?notification.kind,
            "Notification created"
        );
        Ok(notification)
    }

    /// Best-effort variant used by workflow transitions. A failed insert is
    /// logged and never fails the transition that triggered it.
    pub async fn notify_quietly(&self, user_id: &str, alert: Alert) {
        if let Err(e) = self.notify(user_id, alert).await {
            error!(error = %e, user_id = %user_id, "Failed to create notification");
        }
    }

    /// Mark one notification read. Missing and foreign notifications are
    /// indistinguishable to the caller.
    pub async fn mark_read(&self, notification_id: &str, acting_user_id: &str) -> Result<Notification> {
        match self.store.mark_read(notification_id, acting_user_id).await? {
            Some(notification) => {
                debug!(notification_id = %notification_id, user_id = %acting_user_id, "Notification read");
                Ok(notification)
            }
            None => Err(CollabError::not_found("Notification", notification_id)),
        }
    }

    pub async fn list(&self, acting_user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        self.store
            .list_for_user(acting_user_id, unread_only, DEFAULT_LIST_LIMIT)
            .await
    }

    pub async fn mark_all_read(&self, acting_user_id: &str) -> Result<u64> {
        let count = self.store.mark_all_read(acting_user_id).await?;
        info!(user_id = %acting_user_id, count, "Marked all notifications read");
        Ok(count)
    }

    /// Mark the acting user's alerts about a workflow read once they acted on it
    pub async fn mark_read_for_workflow(&self, user_id: &str, token: &str) {
        match self.store.mark_read_for_workflow(user_id, token).await {
            Ok(count) if count > 0 => debug!(user_id = %user_id, count, "Workflow notifications read"),
            Ok(_) => {}
            Err(e) => error!(error = %e, user_id = %user_id, "Failed to mark workflow notifications read"),
        }
    }
}
