//! Principals and Read Projections
//!
//! The authenticated principal is supplied by the session layer; profile and
//! pet summaries come from the pet directory.

use serde::{Deserialize, Serialize};

use super::workflow::WorkflowKind;

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

impl Principal {
    pub fn new(id: impl Into<String>, email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: display_name.into(),
        }
    }

    /// Case-insensitive match against a normalized workflow email. Both sides
    /// are folded with the same Unicode lowercasing used at create time.
    pub fn has_email(&self, email: &str) -> bool {
        self.email.trim().to_lowercase() == email.trim().to_lowercase()
    }
}

/// Display data for a user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Display data for a pet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetSummary {
    pub name: String,
    pub photo_url: Option<String>,
}

/// Redacted view of a pending workflow, served without authentication.
/// Carries no internal identifiers besides the token itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicView {
    pub token: String,
    pub kind: WorkflowKind,
    pub initiator_name: String,
    pub initiator_avatar_url: Option<String>,
    pub pet_name: String,
    pub pet_photo_url: Option<String>,
    pub target_email: String,
}
