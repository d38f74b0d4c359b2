//! MongoDB Index Management
//!
//! Creates the indexes the collaboration stores rely on. Should be called on
//! startup, before the API starts serving.

use mongodb::{bson::doc, options::IndexOptions, Database, IndexModel};
use tracing::info;

use crate::domain::{Notification, WorkflowInstance};
use crate::error::Result;
use super::notification::NOTIFICATIONS_COLLECTION;
use super::workflow::WORKFLOWS_COLLECTION;

pub async fn ensure_indexes(db: &Database) -> Result<()> {
    let workflow_indexes = vec![
        // Token is the link credential and must map to a single workflow
        IndexModel::builder()
            .keys(doc! { "token": 1 })
            .options(IndexOptions::builder().name("uniq_token".to_string()).unique(true).build())
            .build(),
        // Duplicate-pending lookups
        IndexModel::builder()
            .keys(doc! { "petId": 1, "targetEmail": 1, "status": 1 })
            .options(IndexOptions::builder().name("idx_pet_email_status".to_string()).build())
            .build(),
        // Purge of long-expired pending rows
        IndexModel::builder()
            .keys(doc! { "status": 1, "expiresAt": 1 })
            .options(IndexOptions::builder().name("idx_status_expires".to_string()).build())
            .build(),
    ];

    db.collection::<WorkflowInstance>(WORKFLOWS_COLLECTION)
        .create_indexes(workflow_indexes)
        .await?;
    info!("Created indexes on {} collection", WORKFLOWS_COLLECTION);

    let notification_indexes = vec![
        IndexModel::builder()
            .keys(doc! { "userId": 1, "isRead": 1 })
            .options(IndexOptions::builder().name("idx_user_read".to_string()).build())
            .build(),
        IndexModel::builder()
            .keys(doc! { "userId": 1, "createdAt": -1 })
            .options(IndexOptions::builder().name("idx_user_time".to_string()).build())
            .build(),
        IndexModel::builder()
            .keys(doc! { "workflowToken": 1 })
            .options(IndexOptions::builder().name("idx_workflow_token".to_string()).sparse(true).build())
            .build(),
    ];

    db.collection::<Notification>(NOTIFICATIONS_COLLECTION)
        .create_indexes(notification_indexes)
        .await?;
    info!("Created indexes on {} collection", NOTIFICATIONS_COLLECTION);

    Ok(())
}
