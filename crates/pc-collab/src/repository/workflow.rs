//! Workflow Repository (MongoDB)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, ReturnDocument},
    Collection, Database,
};

use crate::domain::{WorkflowInstance, WorkflowKind, WorkflowStatus};
use crate::error::{CollabError, Result};
use super::WorkflowStore;

pub const WORKFLOWS_COLLECTION: &str = "collab_workflows";

const DUPLICATE_KEY_CODE: i32 = 11000;

pub struct MongoWorkflowStore {
    collection: Collection<WorkflowInstance>,
}

impl MongoWorkflowStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(WORKFLOWS_COLLECTION),
        }
    }

    fn not_expired(now: DateTime<Utc>) -> Document {
        doc! {
            "$or": [
                { "expiresAt": null },
                { "expiresAt": { "$gt": bson::DateTime::from_chrono(now) } },
            ]
        }
    }
}

pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY_CODE
    )
}

#[async_trait]
impl WorkflowStore for MongoWorkflowStore {
    async fn insert(&self, workflow: &WorkflowInstance) -> Result<()> {
        match self.collection.insert_one(workflow).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(CollabError::duplicate("Workflow", "token", workflow.token_hint()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<WorkflowInstance>> {
        Ok(self.collection.find_one(doc! { "token": token }).await?)
    }

    async fn find_pending_by_token(
        &self,
        token: &str,
        kind: Option<WorkflowKind>,
    ) -> Result<Option<WorkflowInstance>> {
        let mut filter = doc! {
            "token": token,
            "status": WorkflowStatus::Pending.as_str(),
        };
        if let Some(kind) = kind {
            filter.insert("kind", kind.as_str());
        }
        Ok(self.collection.find_one(filter).await?)
    }

    async fn find_active_pending_for(
        &self,
        pet_id: &str,
        target_email: &str,
        kind: WorkflowKind,
        now: DateTime<Utc>,
    ) -> Result<Option<WorkflowInstance>> {
        let mut filter = doc! {
            "petId": pet_id,
            "targetEmail": target_email,
            "kind": kind.as_str(),
            "status": WorkflowStatus::Pending.as_str(),
        };
        filter.extend(Self::not_expired(now));

        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .limit(1)
            .build();

        let mut cursor = self.collection.find(filter).with_options(options).await?;
        Ok(cursor.try_next().await?)
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

        let filter = doc! {
            "token": token,
            "status": WorkflowStatus::Pending.as_str(),
        };
        let update = doc! {
            "$set": {
                "status": to.as_str(),
                "resolvedAt": bson::DateTime::from_chrono(Utc::now()),
                "resolvedBy": resolved_by,
            }
        };

        Ok(self
            .collection
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn list_pending_for_pet(&self, pet_id: &str, now: DateTime<Utc>) -> Result<Vec<WorkflowInstance>> {
        let mut filter = doc! {
            "petId": pet_id,
            "status": WorkflowStatus::Pending.as_str(),
        };
        filter.extend(Self::not_expired(now));

        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .build();

        let cursor = self.collection.find(filter).with_options(options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64> {
        let filter = doc! {
            "status": WorkflowStatus::Pending.as_str(),
            "expiresAt": { "$lt": bson::DateTime::from_chrono(before) },
        };
        let result = self.collection.delete_many(filter).await?;
        Ok(result.deleted_count)
    }
}
