//! Notification Repository (MongoDB)

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{FindOptions, ReturnDocument},
    Collection, Database,
};

use crate::domain::Notification;
use crate::error::Result;
use super::NotificationStore;

pub const NOTIFICATIONS_COLLECTION: &str = "notifications";

pub struct MongoNotificationStore {
    collection: Collection<Notification>,
}

impl MongoNotificationStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(NOTIFICATIONS_COLLECTION),
        }
    }
}

#[async_trait]
impl NotificationStore for MongoNotificationStore {
    async fn insert(&self, notification: &Notification) -> Result<()> {
        self.collection.insert_one(notification).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Notification>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn mark_read(&self, id: &str, user_id: &str) -> Result<Option<Notification>> {
        // Ownership is part of the filter so a foreign id looks exactly like a missing one.
        let filter = doc! { "_id": id, "userId": user_id };

        // Keep the first readAt when the notification was already read.
        let update = vec![doc! {
            "$set": {
                "isRead": true,
                "readAt": { "$ifNull": ["$readAt", bson::DateTime::from_chrono(Utc::now())] },
            }
        }];

        Ok(self
            .collection
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn list_for_user(&self, user_id: &str, unread_only: bool, limit: i64) -> Result<Vec<Notification>> {
        let mut filter = doc! { "userId": user_id };
        if unread_only {
            filter.insert("isRead", false);
        }

        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .limit(limit)
            .build();

        let cursor = self.collection.find(filter).with_options(options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        let result = self
            .collection
            .update_many(
                doc! { "userId": user_id, "isRead": false },
                doc! { "$set": { "isRead": true, "readAt": bson::DateTime::from_chrono(Utc::now()) } },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn mark_read_for_workflow(&self, user_id: &str, token: &str) -> Result<u64> {
        let result = self
            .collection
            .update_many(
                doc! { "userId": user_id, "workflowToken": token, "isRead": false },
                doc! { "$set": { "isRead": true, "readAt": bson::DateTime::from_chrono(Utc::now()) } },
            )
            .await?;
        Ok(result.modified_count)
    }
}
