//! Pet Directory (MongoDB)
//!
//! Adapter over the pet aggregate's `pets` and `users` collections.

use async_trait::async_trait;
use mongodb::{bson::doc, Collection, Database};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{PetSummary, ProfileSummary};
use crate::error::{CollabError, Result};
use crate::service::pets::{
    AccessGrantApplier, GrantOutcome, PetCapabilities, ProfileDirectory, RevokeOutcome,
};

pub const PETS_COLLECTION: &str = "pets";
pub const USERS_COLLECTION: &str = "users";

/// Pet as stored by the pet aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub owner_id: String,
    #[serde(default)]
    pub admin_ids: Vec<String>,
    #[serde(default)]
    pub collaborator_ids: Vec<String>,
}

/// User account as stored by the account service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

pub struct MongoPetDirectory {
    pets: Collection<PetDocument>,
    users: Collection<UserDocument>,
}

impl MongoPetDirectory {
    pub fn new(db: &Database) -> Self {
        Self {
            pets: db.collection(PETS_COLLECTION),
            users: db.collection(USERS_COLLECTION),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDocument>> {
        Ok(self.users.find_one(doc! { "email": email.trim().to_lowercase() }).await?)
    }

    async fn pet_exists(&self, pet_id: &str) -> Result<bool> {
        let count = self.pets.count_documents(doc! { "_id": pet_id }).await?;
        Ok(count > 0)
    }
}

#[async_trait]
impl PetCapabilities for MongoPetDirectory {
    async fn can_manage(&self, principal_id: &str, pet_id: &str) -> Result<bool> {
        let count = self
            .pets
            .count_documents(doc! {
                "_id": pet_id,
                "$or": [ { "ownerId": principal_id }, { "adminIds": principal_id } ],
            })
            .await?;
        Ok(count > 0)
    }

    async fn is_collaborator(&self, pet_id: &str, email: &str) -> Result<bool> {
        let Some(user) = self.find_user_by_email(email).await? else {
            return Ok(false);
        };
        let count = self
            .pets
            .count_documents(doc! { "_id": pet_id, "collaboratorIds": user.id.as_str() })
            .await?;
        Ok(count > 0)
    }

    async fn authorities(&self, pet_id: &str) -> Result<Vec<String>> {
        let Some(pet) = self.pets.find_one(doc! { "_id": pet_id }).await? else {
            return Ok(Vec::new());
        };
        let mut ids = vec![pet.owner_id];
        for admin in pet.admin_ids {
            if !ids.contains(&admin) {
                ids.push(admin);
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl AccessGrantApplier for MongoPetDirectory {
    async fn grant_collaborator(&self, pet_id: &str, principal_id: &str) -> Result<GrantOutcome> {
        let result = self
            .pets
            .update_one(
                doc! { "_id": pet_id, "collaboratorIds": { "$ne": principal_id } },
                doc! { "$addToSet": { "collaboratorIds": principal_id } },
            )
            .await?;

        if result.modified_count > 0 {
            return Ok(GrantOutcome::Granted);
        }
        if self.pet_exists(pet_id).await? {
            debug!(pet_id = %pet_id, principal_id = %principal_id, "Already a collaborator");
            Ok(GrantOutcome::AlreadyCollaborator)
        } else {
            Err(CollabError::grant(format!("pet {} does not exist", pet_id)))
        }
    }

    async fn revoke_collaborator(&self, pet_id: &str, principal_id: &str) -> Result<RevokeOutcome> {
        let result = self
            .pets
            .update_one(
                doc! { "_id": pet_id, "collaboratorIds": principal_id },
                doc! { "$pull": { "collaboratorIds": principal_id } },
            )
            .await?;

        if result.modified_count > 0 {
            Ok(RevokeOutcome::Revoked)
        } else {
            Ok(RevokeOutcome::NotCollaborator)
        }
    }
}

#[async_trait]
impl ProfileDirectory for MongoPetDirectory {
    async fn principal_profile(&self, principal_id: &str) -> Result<Option<ProfileSummary>> {
        let user = self.users.find_one(doc! { "_id": principal_id }).await?;
        Ok(user.map(|u| ProfileSummary {
            display_name: u.display_name,
            avatar_url: u.avatar_url,
        }))
    }

    async fn principal_by_email(&self, email: &str) -> Result<Option<String>> {
        Ok(self.find_user_by_email(email).await?.map(|u| u.id))
    }

    async fn pet_profile(&self, pet_id: &str) -> Result<Option<PetSummary>> {
        let pet = self.pets.find_one(doc! { "_id": pet_id }).await?;
        Ok(pet.map(|p| PetSummary {
            name: p.name,
            photo_url: p.photo_url,
        }))
    }
}
