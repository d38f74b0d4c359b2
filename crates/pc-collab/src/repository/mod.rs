//! Repository Layer
//!
//! Storage seams for workflow instances and notifications, with MongoDB
//! implementations for production and in-memory implementations for tests
//! and dev mode. The pet directory adapters implement the external
//! capability, grant, and profile seams declared in `service::pets`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Notification, WorkflowInstance, WorkflowKind, WorkflowStatus};
use crate::error::Result;

pub mod workflow;
pub mod notification;
pub mod pet;
pub mod indexes;
pub mod memory;

pub use workflow::MongoWorkflowStore;
pub use notification::MongoNotificationStore;
pub use pet::MongoPetDirectory;
pub use memory::{InMemoryWorkflowStore, InMemoryNotificationStore, InMemoryPetDirectory};
pub use indexes::ensure_indexes;

/// Persistent record of every collaboration workflow, keyed by token.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Fails with `CollabError::Duplicate` if the token is already taken.
    async fn insert(&self, workflow: &WorkflowInstance) -> Result<()>;

    async fn find_by_token(&self, token: &str) -> Result<Option<WorkflowInstance>>;

    /// Only returns the instance while its status is `Pending`.
    async fn find_pending_by_token(
        &self,
        token: &str,
        kind: Option<WorkflowKind>,
    ) -> Result<Option<WorkflowInstance>>;

    /// Newest pending, unexpired instance for a (pet, email, kind) triple.
    async fn find_active_pending_for(
        &self,
        pet_id: &str,
        target_email: &str,
        kind: WorkflowKind,
        now: DateTime<Utc>,
    ) -> Result<Option<WorkflowInstance>>;

    /// Compare-and-set from `Pending` to `to`. Returns `None` when the row is
    /// missing or no longer pending, so at most one concurrent caller wins.
    async fn transition(
        &self,
        token: &str,
        to: WorkflowStatus,
        resolved_by: &str,
    ) -> Result<Option<WorkflowInstance>>;

    async fn list_pending_for_pet(&self, pet_id: &str, now: DateTime<Utc>) -> Result<Vec<WorkflowInstance>>;

    /// Delete pending instances whose deadline is before `before`.
    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64>;
}

/// Persistent record of user notifications.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: &Notification) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Notification>>;

    /// Marks read only if `user_id` owns the notification. Returns `None` for
    /// both missing and foreign notifications.
    async fn mark_read(&self, id: &str, user_id: &str) -> Result<Option<Notification>>;

    /// Newest first
    async fn list_for_user(&self, user_id: &str, unread_only: bool, limit: i64) -> Result<Vec<Notification>>;

    async fn mark_all_read(&self, user_id: &str) -> Result<u64>;

    async fn mark_read_for_workflow(&self, user_id: &str, token: &str) -> Result<u64>;
}
