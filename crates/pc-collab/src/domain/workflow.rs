//! Collaboration Workflow Entity
//!
//! A single record type covers both invitations and removal requests.
//! The two kinds share every field; they differ only in who may act on them
//! and which access grant change acceptance applies.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use bson::serde_helpers::chrono_datetime_as_bson_datetime;

use crate::error::{CollabError, Result};

/// Workflow kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowKind {
    /// Grant a collaborator access to a pet
    Invitation,
    /// Revoke a collaborator's access to a pet
    Removal,
}

impl Default for WorkflowKind {
    fn default() -> Self {
        Self::Invitation
    }
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invitation => "INVITATION",
            Self::Removal => "REMOVAL",
        }
    }

    /// Entity name used in not-found errors and logs
    pub fn entity_name(&self) -> &'static str {
        match self {
            Self::Invitation => "Invitation",
            Self::Removal => "RemovalRequest",
        }
    }
}

/// Workflow status. Leaves `Pending` at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Pending,
    Accepted,
    Rejected,
}

impl Default for WorkflowStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Invitation or removal request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInstance {
    #[serde(rename = "_id")]
    pub id: String,

    /// Opaque link credential, globally unique
    pub token: String,

    pub pet_id: String,

    /// Principal who created the workflow
    pub initiator_id: String,

    #[serde(default)]
    pub kind: WorkflowKind,

    /// Normalized (trimmed, lower-case) counterpart email
    pub target_email: String,

    #[serde(default)]
    pub status: WorkflowStatus,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(default, with = "super::optional_bson_datetime", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default, with = "super::optional_bson_datetime", skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,

    /// Principal who accepted or rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

impl WorkflowInstance {
    pub fn new(
        kind: WorkflowKind,
        token: impl Into<String>,
        pet_id: impl Into<String>,
        initiator_id: impl Into<String>,
        target_email: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            token: token.into(),
            pet_id: pet_id.into(),
            initiator_id: initiator_id.into(),
            kind,
            target_email: target_email.into(),
            status: WorkflowStatus::Pending,
            created_at: Utc::now(),
            expires_at: None,
            resolved_at: None,
            resolved_by: None,
        }
    }

    /// Set the deadline `ttl` after creation. Fails if the deadline is not representable.
    pub fn with_ttl(mut self, ttl: Duration) -> Result<Self> {
        let deadline = self
            .created_at
            .checked_add_signed(ttl)
            .ok_or_else(|| CollabError::configuration(format!("workflow TTL of {ttl} is out of range")))?;
        self.expires_at = Some(deadline);
        Ok(self)
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == WorkflowStatus::Pending
    }

    /// Expiry is evaluated lazily; the stored status stays `Pending`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(deadline) if now > deadline)
    }

    /// Pending and inside its deadline
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && !self.is_expired_at(now)
    }

    /// Check that the workflow can still be resolved, accepted or rejected.
    ///
    /// A terminal status wins over the deadline: once processed, the link reports
    /// `AlreadyProcessed` even if it has also lapsed.
    pub fn ensure_actionable(&self, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(CollabError::AlreadyProcessed);
        }
        if self.is_expired_at(now) {
            return Err(CollabError::Expired);
        }
        Ok(())
    }

    /// Token prefix safe to put in logs
    pub fn token_hint(&self) -> &str {
        token_hint(&self.token)
    }
}

/// First 8 characters of a token
pub fn token_hint(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    &token[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invitation() -> WorkflowInstance {
        WorkflowInstance::new(WorkflowKind::Invitation, "tok_abcdefghijk", "pet-1", "owner-1", "e@x.com")
    }

    #[test]
    fn test_new_defaults() {
        let wf = invitation();
        assert_eq!(wf.status, WorkflowStatus::Pending);
        assert_eq!(wf.kind, WorkflowKind::Invitation);
        assert!(wf.expires_at.is_none());
        assert!(wf.is_active_at(Utc::now()));
    }

    #[test]
    fn test_expiry_is_lazy() {
        let wf = invitation().with_expires_at(Utc::now() - Duration::minutes(1));
        assert!(wf.is_pending());
        assert!(wf.is_expired_at(Utc::now()));
        assert!(matches!(wf.ensure_actionable(Utc::now()), Err(CollabError::Expired)));
    }

    #[test]
    fn test_no_deadline_never_expires() {
        let wf = invitation();
        assert!(!wf.is_expired_at(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn test_terminal_status_reports_already_processed() {
        let mut wf = invitation().with_expires_at(Utc::now() - Duration::minutes(1));
        wf.status = WorkflowStatus::Accepted;
        assert!(matches!(wf.ensure_actionable(Utc::now()), Err(CollabError::AlreadyProcessed)));
    }

    #[test]
    fn test_ttl_is_relative_to_creation() {
        let wf = invitation().with_ttl(Duration::days(7)).unwrap();
        assert_eq!(wf.expires_at, Some(wf.created_at + Duration::days(7)));
    }

    #[test]
    fn test_ttl_past_calendar_range_is_an_error() {
        let result = invitation().with_ttl(Duration::hours(3_000_000_000));
        assert!(matches!(result, Err(CollabError::Configuration { .. })));

        let result = invitation().with_ttl(Duration::MAX);
        assert!(result.is_err());
    }

    #[test]
    fn test_bson_field_names() {
        let wf = invitation().with_ttl(Duration::hours(1)).unwrap();
        let doc = bson::to_document(&wf).unwrap();
        assert_eq!(doc.get_str("status").unwrap(), "PENDING");
        assert_eq!(doc.get_str("kind").unwrap(), "INVITATION");
        assert_eq!(doc.get_str("targetEmail").unwrap(), "e@x.com");
        assert!(doc.get_datetime("expiresAt").is_ok());
        assert!(!doc.contains_key("resolvedAt"));

        let back: WorkflowInstance = bson::from_document(doc).unwrap();
        assert_eq!(back.token, wf.token);
    }

    #[test]
    fn test_token_hint() {
        assert_eq!(token_hint("abcdefghijklmnop"), "abcdefgh");
        assert_eq!(token_hint("abc"), "abc");
    }
}
