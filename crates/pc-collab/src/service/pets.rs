//! Pet Aggregate Seams
//!
//! The collaboration core does not own pets or user accounts. It asks these
//! injected collaborators for capability checks, display data, and access
//! grant changes.

use async_trait::async_trait;

use crate::domain::{PetSummary, ProfileSummary};
use crate::error::Result;

/// Authorization queries against the pet aggregate
#[async_trait]
pub trait PetCapabilities: Send + Sync {
    /// Owner or admin of the pet
    async fn can_manage(&self, principal_id: &str, pet_id: &str) -> Result<bool>;

    /// Whether the account registered for `email` is currently a collaborator
    async fn is_collaborator(&self, pet_id: &str, email: &str) -> Result<bool>;

    /// Owner and admin principal ids
    async fn authorities(&self, pet_id: &str) -> Result<Vec<String>>;
}

/// Result of granting collaborator access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    Granted,
    /// Conflict: already a collaborator. The engine treats this as success.
    AlreadyCollaborator,
}

/// Result of revoking collaborator access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    /// Not a collaborator. The engine treats this as success.
    NotCollaborator,
}

/// Mutates the pet's collaborator list
#[async_trait]
pub trait AccessGrantApplier: Send + Sync {
    async fn grant_collaborator(&self, pet_id: &str, principal_id: &str) -> Result<GrantOutcome>;

    async fn revoke_collaborator(&self, pet_id: &str, principal_id: &str) -> Result<RevokeOutcome>;
}

/// Display data and email lookup for accounts and pets
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn principal_profile(&self, principal_id: &str) -> Result<Option<ProfileSummary>>;

    async fn principal_by_email(&self, email: &str) -> Result<Option<String>>;

    async fn pet_profile(&self, pet_id: &str) -> Result<Option<PetSummary>>;
}
