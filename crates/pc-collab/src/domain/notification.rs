//! Notification Entity
//!
//! User-facing alerts emitted by workflow transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use bson::serde_helpers::chrono_datetime_as_bson_datetime;

/// Alert type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    InvitationReceived,
    InvitationAccepted,
    InvitationRejected,
    RemovalRequested,
    RemovalAccepted,
    RemovalRejected,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvitationReceived => "INVITATION_RECEIVED",
            Self::InvitationAccepted => "INVITATION_ACCEPTED",
            Self::InvitationRejected => "INVITATION_REJECTED",
            Self::RemovalRequested => "REMOVAL_REQUESTED",
            Self::RemovalAccepted => "REMOVAL_ACCEPTED",
            Self::RemovalRejected => "REMOVAL_REJECTED",
        }
    }
}

/// Content of a notification before it is stored
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
    pub pet_id: Option<String>,
    pub workflow_token: Option<String>,
}

impl Alert {
    pub fn new(kind: AlertKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            pet_id: None,
            workflow_token: None,
        }
    }

    pub fn for_pet(mut self, pet_id: impl Into<String>) -> Self {
        self.pet_id = Some(pet_id.into());
        self
    }

    pub fn for_workflow(mut self, token: impl Into<String>) -> Self {
        self.workflow_token = Some(token.into());
        self
    }
}

/// Stored notification, owned exclusively by `user_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: String,

    pub user_id: String,

    pub kind: AlertKind,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pet_id: Option<String>,

    /// Workflow that triggered the alert
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_token: Option<String>,

    #[serde(default)]
    pub is_read: bool,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(default, with = "super::optional_bson_datetime", skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn new(user_id: impl Into<String>, alert: Alert) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            kind: alert.kind,
            message: alert.message,
            pet_id: alert.pet_id,
            workflow_token: alert.workflow_token,
            is_read: false,
            created_at: Utc::now(),
            read_at: None,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// Idempotent; a read notification never becomes unread again.
    pub fn mark_read(&mut self) {
        if !self.is_read {
            self.is_read = true;
            self.read_at = Some(Utc::now());
        }
    }
}
