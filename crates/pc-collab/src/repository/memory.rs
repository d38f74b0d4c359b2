//! In-Memory Repositories
//!
//! Same contracts as the MongoDB stores, held in process memory. Used by the
//! test suites and by the server in dev mode.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{Notification, PetSummary, ProfileSummary, WorkflowInstance, WorkflowKind, WorkflowStatus};
use crate::error::{CollabError, Result};
use crate::service::pets::{
    AccessGrantApplier, GrantOutcome, PetCapabilities, ProfileDirectory, RevokeOutcome,
};
use super::pet::{PetDocument, UserDocument};
use super::{NotificationStore, WorkflowStore};

/// Workflow rows keyed by token
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    rows: RwLock<HashMap<String, WorkflowInstance>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn insert(&self, workflow: &WorkflowInstance) -> Result<()> {
        let mut rows = self.rows.write();
        if rows.contains_key(&workflow.token) {
            return Err(CollabError::duplicate("Workflow", "token", workflow.token_hint()));
        }
        rows.insert(workflow.token.clone(), workflow.clone());
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<WorkflowInstance>> {
        Ok(self.rows.read().get(token).cloned())
    }

    async fn find_pending_by_token(
        &self,
        token: &str,
        kind: Option<WorkflowKind>,
    ) -> Result<Option<WorkflowInstance>> {
        Ok(self
            .rows
            .read()
            .get(token)
            .filter(|wf| wf.is_pending() && kind.map_or(true, |k| wf.kind == k))
            .cloned())
    }

    async fn find_active_pending_for(
        &self,
        pet_id: &str,
        target_email: &str,
        kind: WorkflowKind,
        now: DateTime<Utc>,
    ) -> Result<Option<WorkflowInstance>> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|wf| {
                wf.pet_id == pet_id
                    && wf.target_email == target_email
                    && wf.kind == kind
                    && wf.is_active_at(now)
            })
            .max_by_key(|wf| wf.created_at)
            .cloned())
    }

    async fn transition(
        &self,
        token: &str,
        to: WorkflowStatus,
        resolved_by: &str,
    ) -> Result<Option<WorkflowInstance>> {
        if !to.is_terminal() {
            return Err(CollabError::internal("workflow can only transition to a terminal status"));
        }

        let mut rows = self.rows.write();
        match rows.get_mut(token) {
            Some(wf) if wf.is_pending() => {
                wf.status = to;
                wf.resolved_at = Some(Utc::now());
                wf.resolved_by = Some(resolved_by.to_string());
                Ok(Some(wf.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_pending_for_pet(&self, pet_id: &str, now: DateTime<Utc>) -> Result<Vec<WorkflowInstance>> {
        let mut pending: Vec<WorkflowInstance> = self
            .rows
            .read()
            .values()
            .filter(|wf| wf.pet_id == pet_id && wf.is_active_at(now))
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64> {
        let mut rows = self.rows.write();
        let start = rows.len();
        rows.retain(|_, wf| !(wf.is_pending() && matches!(wf.expires_at, Some(deadline) if deadline < before)));
        Ok((start - rows.len()) as u64)
    }
}

/// Notifications keyed by id
#[derive(Default)]
pub struct InMemoryNotificationStore {
    rows: RwLock<HashMap<String, Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification for a user, newest first
    pub fn all_for(&self, user_id: &str) -> Vec<Notification> {
        let mut list: Vec<Notification> = self
            .rows
            .read()
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, notification: &Notification) -> Result<()> {
        let mut rows = self.rows.write();
        if rows.contains_key(&notification.id) {
            return Err(CollabError::duplicate("Notification", "id", &notification.id));
        }
        rows.insert(notification.id.clone(), notification.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Notification>> {
        Ok(self.rows.read().get(id).cloned())
    }

    async fn mark_read(&self, id: &str, user_id: &str) -> Result<Option<Notification>> {
        let mut rows = self.rows.write();
        match rows.get_mut(id) {
            Some(n) if n.is_owned_by(user_id) => {
                n.mark_read();
                Ok(Some(n.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_for_user(&self, user_id: &str, unread_only: bool, limit: i64) -> Result<Vec<Notification>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .all_for(user_id)
            .into_iter()
            .filter(|n| !unread_only || !n.is_read)
            .take(limit)
            .collect())
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        let mut count = 0;
        for n in self.rows.write().values_mut() {
            if n.is_owned_by(user_id) && !n.is_read {
                n.mark_read();
                count += 1;
            }
        }
        Ok(count)
    }

    async fn mark_read_for_workflow(&self, user_id: &str, token: &str) -> Result<u64> {
        let mut count = 0;
        for n in self.rows.write().values_mut() {
            if n.is_owned_by(user_id) && !n.is_read && n.workflow_token.as_deref() == Some(token) {
                n.mark_read();
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Pets and user accounts held in memory
#[derive(Default)]
pub struct InMemoryPetDirectory {
    pets: RwLock<HashMap<String, PetDocument>>,
    users: RwLock<HashMap<String, UserDocument>>,
}

impl InMemoryPetDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, id: &str, email: &str, display_name: &str) {
        self.users.write().insert(
            id.to_string(),
            UserDocument {
                id: id.to_string(),
                email: email.trim().to_lowercase(),
                display_name: display_name.to_string(),
                avatar_url: None,
            },
        );
    }

    pub fn add_pet(&self, id: &str, name: &str, owner_id: &str) {
        self.pets.write().insert(
            id.to_string(),
            PetDocument {
                id: id.to_string(),
                name: name.to_string(),
                photo_url: None,
                owner_id: owner_id.to_string(),
                admin_ids: Vec::new(),
                collaborator_ids: Vec::new(),
            },
        );
    }

    pub fn add_admin(&self, pet_id: &str, principal_id: &str) {
        if let Some(pet) = self.pets.write().get_mut(pet_id) {
            pet.admin_ids.push(principal_id.to_string());
        }
    }

    pub fn add_collaborator(&self, pet_id: &str, principal_id: &str) {
        if let Some(pet) = self.pets.write().get_mut(pet_id) {
            if !pet.collaborator_ids.iter().any(|c| c == principal_id) {
                pet.collaborator_ids.push(principal_id.to_string());
            }
        }
    }

    pub fn collaborators(&self, pet_id: &str) -> Vec<String> {
        self.pets
            .read()
            .get(pet_id)
            .map(|p| p.collaborator_ids.clone())
            .unwrap_or_default()
    }

    fn user_id_by_email(&self, email: &str) -> Option<String> {
        let email = email.trim().to_lowercase();
        self.users
            .read()
            .values()
            .find(|u| u.email == email)
            .map(|u| u.id.clone())
    }
}

#[async_trait]
impl PetCapabilities for InMemoryPetDirectory {
    async fn can_manage(&self, principal_id: &str, pet_id: &str) -> Result<bool> {
        Ok(self
            .pets
            .read()
            .get(pet_id)
            .map(|p| p.owner_id == principal_id || p.admin_ids.iter().any(|a| a == principal_id))
            .unwrap_or(false))
    }

    async fn is_collaborator(&self, pet_id: &str, email: &str) -> Result<bool> {
        let Some(user_id) = self.user_id_by_email(email) else {
            return Ok(false);
        };
        Ok(self.collaborators(pet_id).contains(&user_id))
    }

    async fn authorities(&self, pet_id: &str) -> Result<Vec<String>> {
        Ok(self
            .pets
            .read()
            .get(pet_id)
            .map(|p| {
                let mut ids = vec![p.owner_id.clone()];
                ids.extend(p.admin_ids.iter().filter(|a| **a != p.owner_id).cloned());
                ids
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl AccessGrantApplier for InMemoryPetDirectory {
    async fn grant_collaborator(&self, pet_id: &str, principal_id: &str) -> Result<GrantOutcome> {
        let mut pets = self.pets.write();
        let pet = pets
            .get_mut(pet_id)
            .ok_or_else(|| CollabError::grant(format!("pet {} does not exist", pet_id)))?;
        if pet.collaborator_ids.iter().any(|c| c == principal_id) {
            return Ok(GrantOutcome::AlreadyCollaborator);
        }
        pet.collaborator_ids.push(principal_id.to_string());
        Ok(GrantOutcome::Granted)
    }

    async fn revoke_collaborator(&self, pet_id: &str, principal_id: &str) -> Result<RevokeOutcome> {
        let mut pets = self.pets.write();
        let Some(pet) = pets.get_mut(pet_id) else {
            return Ok(RevokeOutcome::NotCollaborator);
        };
        let before = pet.collaborator_ids.len();
        pet.collaborator_ids.retain(|c| c != principal_id);
        if pet.collaborator_ids.len() < before {
            Ok(RevokeOutcome::Revoked)
        } else {
            Ok(RevokeOutcome::NotCollaborator)
        }
    }
}

#[async_trait]
impl ProfileDirectory for InMemoryPetDirectory {
    async fn principal_profile(&self, principal_id: &str) -> Result<Option<ProfileSummary>> {
        Ok(self.users.read().get(principal_id).map(|u| ProfileSummary {
            display_name: u.display_name.clone(),
            avatar_url: u.avatar_url.clone(),
        }))
    }

    async fn principal_by_email(&self, email: &str) -> Result<Option<String>> {
        Ok(self.user_id_by_email(email))
    }

    async fn pet_profile(&self, pet_id: &str) -> Result<Option<PetSummary>> {
        Ok(self.pets.read().get(pet_id).map(|p| PetSummary {
            name: p.name.clone(),
            photo_url: p.photo_url.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Alert, AlertKind};
    use chrono::Duration;

    fn workflow(token: &str) -> WorkflowInstance {
        WorkflowInstance::new(WorkflowKind::Invitation, token, "pet-1", "owner", "e@x.com")
    }

    #[tokio::test]
    async fn test_duplicate_token_rejected() {
        let store = InMemoryWorkflowStore::new();
        store.insert(&workflow("t1")).await.unwrap();
        let err = store.insert(&workflow("t1")).await.unwrap_err();
        assert!(matches!(err, CollabError::Duplicate { .. }));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let store = InMemoryWorkflowStore::new();
        store.insert(&workflow("t1")).await.unwrap();

        let first = store.transition("t1", WorkflowStatus::Accepted, "u1").await.unwrap();
        assert_eq!(first.unwrap().status, WorkflowStatus::Accepted);

        let second = store.transition("t1", WorkflowStatus::Rejected, "u2").await.unwrap();
        assert!(second.is_none());

        let stored = store.find_by_token("t1").await.unwrap().unwrap();
        assert_eq!(stored.status, WorkflowStatus::Accepted);
        assert_eq!(stored.resolved_by.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_transition_to_pending_is_refused() {
        let store = InMemoryWorkflowStore::new();
        store.insert(&workflow("t1")).await.unwrap();
        assert!(store.transition("t1", WorkflowStatus::Pending, "u1").await.is_err());
    }

    #[tokio::test]
    async fn test_find_pending_filters_kind_and_status() {
        let store = InMemoryWorkflowStore::new();
        store.insert(&workflow("t1")).await.unwrap();

        assert!(store.find_pending_by_token("t1", None).await.unwrap().is_some());
        assert!(store.find_pending_by_token("t1", Some(WorkflowKind::Invitation)).await.unwrap().is_some());
        assert!(store.find_pending_by_token("t1", Some(WorkflowKind::Removal)).await.unwrap().is_none());

        store.transition("t1", WorkflowStatus::Rejected, "u").await.unwrap();
        assert!(store.find_pending_by_token("t1", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_active_pending_ignores_expired() {
        let store = InMemoryWorkflowStore::new();
        let now = Utc::now();
        store
            .insert(&workflow("old").with_expires_at(now - Duration::hours(1)))
            .await
            .unwrap();

        let found = store
            .find_active_pending_for("pet-1", "e@x.com", WorkflowKind::Invitation, now)
            .await
            .unwrap();
        assert!(found.is_none());

        store.insert(&workflow("fresh").with_ttl(Duration::days(7)).unwrap()).await.unwrap();
        let found = store
            .find_active_pending_for("pet-1", "e@x.com", WorkflowKind::Invitation, now)
            .await
            .unwrap();
        assert_eq!(found.unwrap().token, "fresh");
    }

    #[tokio::test]
    async fn test_purge_only_removes_expired_pending() {
        let store = InMemoryWorkflowStore::new();
        let now = Utc::now();
        store.insert(&workflow("stale").with_expires_at(now - Duration::days(40))).await.unwrap();
        store.insert(&workflow("recent").with_expires_at(now - Duration::days(1))).await.unwrap();
        store.insert(&workflow("done").with_expires_at(now - Duration::days(40))).await.unwrap();
        store.transition("done", WorkflowStatus::Accepted, "u").await.unwrap();

        let purged = store.purge_expired(now - Duration::days(30)).await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.find_by_token("stale").await.unwrap().is_none());
        assert!(store.find_by_token("recent").await.unwrap().is_some());
        assert!(store.find_by_token("done").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_notification_ownership() {
        let store = InMemoryNotificationStore::new();
        let n = Notification::new("alice", Alert::new(AlertKind::InvitationAccepted, "hi"));
        store.insert(&n).await.unwrap();

        assert!(store.mark_read(&n.id, "mallory").await.unwrap().is_none());
        assert!(!store.find_by_id(&n.id).await.unwrap().unwrap().is_read);

        let read = store.mark_read(&n.id, "alice").await.unwrap().unwrap();
        assert!(read.is_read);
    }

    #[tokio::test]
    async fn test_grant_and_revoke_are_idempotent() {
        let dir = InMemoryPetDirectory::new();
        dir.add_pet("pet-1", "Rex", "owner");

        assert_eq!(dir.grant_collaborator("pet-1", "u1").await.unwrap(), GrantOutcome::Granted);
        assert_eq!(dir.grant_collaborator("pet-1", "u1").await.unwrap(), GrantOutcome::AlreadyCollaborator);
        assert_eq!(dir.collaborators("pet-1"), vec!["u1".to_string()]);

        assert_eq!(dir.revoke_collaborator("pet-1", "u1").await.unwrap(), RevokeOutcome::Revoked);
        assert_eq!(dir.revoke_collaborator("pet-1", "u1").await.unwrap(), RevokeOutcome::NotCollaborator);
        assert!(dir.grant_collaborator("missing", "u1").await.is_err());
    }
}
