//! Collaboration Workflow Engine
//!
//! Creates, resolves, accepts, and rejects invitations and removal requests.
//!
//! # Ordering
//!
//! Accepting applies the access grant change first and only then commits the
//! status with a compare-and-set on `PENDING`. A failed grant aborts the call
//! with the workflow still pending. If the compare-and-set loses to a
//! concurrent reject, the grant change is reverted.

use std::sync::{Arc, OnceLock};

use chrono::{Duration, Utc};
use regex::Regex;
use tracing::{debug, error, info, warn};

use pc_config::WorkflowConfig;

use crate::domain::{
    token_hint, Alert, AlertKind, Principal, ProfileSummary, PublicView, WorkflowInstance,
    WorkflowKind, WorkflowStatus,
};
use crate::error::{CollabError, Result};
use crate::repository::WorkflowStore;
use super::notification::NotificationDispatcher;
use super::pets::{AccessGrantApplier, GrantOutcome, PetCapabilities, ProfileDirectory, RevokeOutcome};
use super::token::{RandomTokenGenerator, TokenGenerator};

const MAX_EMAIL_LEN: usize = 254;
const UNKNOWN_INITIATOR: &str = "A PetCircle member";

/// Engine tuning
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub invitation_ttl: Duration,
    pub removal_ttl: Duration,
    /// Token generation attempts before surfacing an internal error
    pub token_attempts: u32,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            invitation_ttl: Duration::days(7),
            removal_ttl: Duration::days(7),
            token_attempts: 3,
        }
    }
}

impl TryFrom<&WorkflowConfig> for WorkflowSettings {
    type Error = CollabError;

    fn try_from(config: &WorkflowConfig) -> Result<Self> {
        Ok(Self {
            invitation_ttl: chrono_duration("invitation TTL", config.invitation_ttl())?,
            removal_ttl: chrono_duration("removal TTL", config.removal_ttl())?,
            token_attempts: config.token_attempts.max(1),
        })
    }
}

/// Convert a configured duration, rejecting values chrono cannot represent.
pub(crate) fn chrono_duration(what: &str, value: std::time::Duration) -> Result<Duration> {
    Duration::from_std(value)
        .map_err(|_| CollabError::configuration(format!("{what} of {}s is out of range", value.as_secs())))
}

/// Who may accept or reject a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Approver {
    /// The principal whose email the workflow targets
    Counterpart,
    /// An owner or admin of the pet
    PetAuthority,
}

/// Per-kind behavior table
struct KindPolicy {
    approver: Approver,
    created_alert: AlertKind,
    accepted_alert: AlertKind,
    rejected_alert: AlertKind,
    ttl: fn(&WorkflowSettings) -> Duration,
}

static INVITATION_POLICY: KindPolicy = KindPolicy {
    approver: Approver::Counterpart,
    created_alert: AlertKind::InvitationReceived,
    accepted_alert: AlertKind::InvitationAccepted,
    rejected_alert: AlertKind::InvitationRejected,
    ttl: invitation_ttl,
};

static REMOVAL_POLICY: KindPolicy = KindPolicy {
    approver: Approver::PetAuthority,
    created_alert: AlertKind::RemovalRequested,
    accepted_alert: AlertKind::RemovalAccepted,
    rejected_alert: AlertKind::RemovalRejected,
    ttl: removal_ttl,
};

fn invitation_ttl(settings: &WorkflowSettings) -> Duration {
    settings.invitation_ttl
}

fn removal_ttl(settings: &WorkflowSettings) -> Duration {
    settings.removal_ttl
}

fn policy(kind: WorkflowKind) -> &'static KindPolicy {
    match kind {
        WorkflowKind::Invitation => &INVITATION_POLICY,
        WorkflowKind::Removal => &REMOVAL_POLICY,
    }
}

/// Result of a create call. `created` is false when an active pending
/// workflow for the same pet and email was returned instead.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub workflow: WorkflowInstance,
    pub created: bool,
}

/// Access grant change applied by an accepted workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantChange {
    Granted,
    AlreadyCollaborator,
    Revoked,
    /// Removal target held no grant (or has no account)
    NotCollaborator,
}

impl GrantChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "GRANTED",
            Self::AlreadyCollaborator => "ALREADY_COLLABORATOR",
            Self::Revoked => "REVOKED",
            Self::NotCollaborator => "NOT_COLLABORATOR",
        }
    }

    /// Whether this call changed the collaborator list
    fn is_effective(&self) -> bool {
        matches!(self, Self::Granted | Self::Revoked)
    }
}

#[derive(Debug, Clone)]
pub struct AccessGrantResult {
    pub workflow: WorkflowInstance,
    /// Principal whose grant was created or revoked
    pub principal_id: Option<String>,
    pub change: GrantChange,
}

/// Trim and lower-case an email, rejecting malformed addresses
pub fn normalize_email(email: &str) -> Result<String> {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern")
    });

    let normalized = email.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(CollabError::validation("Email is required"));
    }
    if normalized.len() > MAX_EMAIL_LEN || !re.is_match(&normalized) {
        return Err(CollabError::validation(format!("Invalid email address: {}", email.trim())));
    }
    Ok(normalized)
}

pub struct CollaborationEngine {
    store: Arc<dyn WorkflowStore>,
    tokens: Arc<dyn TokenGenerator>,
    capabilities: Arc<dyn PetCapabilities>,
    grants: Arc<dyn AccessGrantApplier>,
    directory: Arc<dyn ProfileDirectory>,
    notifications: NotificationDispatcher,
    settings: WorkflowSettings,
}

impl CollaborationEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        capabilities: Arc<dyn PetCapabilities>,
        grants: Arc<dyn AccessGrantApplier>,
        directory: Arc<dyn ProfileDirectory>,
        notifications: NotificationDispatcher,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            store,
            tokens: Arc::new(RandomTokenGenerator),
            capabilities,
            grants,
            directory,
            notifications,
            settings,
        }
    }

    pub fn with_token_generator(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn notifications(&self) -> &NotificationDispatcher {
        &self.notifications
    }

    /// Invite `target_email` to collaborate on a pet. Requires owner/admin.
    pub async fn create_invitation(
        &self,
        initiator: &Principal,
        pet_id: &str,
        target_email: &str,
    ) -> Result<CreateOutcome> {
        self.create(WorkflowKind::Invitation, initiator, pet_id, target_email).await
    }

    /// Ask for a current collaborator to be removed. Requires owner/admin.
    pub async fn create_removal_request(
        &self,
        initiator: &Principal,
        pet_id: &str,
        target_email: &str,
    ) -> Result<CreateOutcome> {
        self.create(WorkflowKind::Removal, initiator, pet_id, target_email).await
    }

    async fn create(
        &self,
        kind: WorkflowKind,
        initiator: &Principal,
        pet_id: &str,
        target_email: &str,
    ) -> Result<CreateOutcome> {
        let pet_id = pet_id.trim();
        if pet_id.is_empty() {
            return Err(CollabError::validation("Pet id is required"));
        }
        let email = normalize_email(target_email)?;

        if !self.capabilities.can_manage(&initiator.id, pet_id).await? {
            warn!(principal_id = %initiator.id, pet_id = %pet_id, kind = ?kind, "Create refused: not a pet authority");
            return Err(CollabError::Forbidden);
        }
        if kind == WorkflowKind::Removal && !self.capabilities.is_collaborator(pet_id, &email).await? {
            warn!(principal_id = %initiator.id, pet_id = %pet_id, "Removal refused: target is not a collaborator");
            return Err(CollabError::Forbidden);
        }

        let now = Utc::now();
        if let Some(existing) = self
            .store
            .find_active_pending_for(pet_id, &email, kind, now)
            .await?
        {
            debug!(token = %existing.token_hint(), pet_id = %pet_id, kind = ?kind, "Returning existing pending workflow");
            return Ok(CreateOutcome {
                workflow: existing,
                created: false,
            });
        }

        let workflow = self.insert_with_fresh_token(kind, initiator, pet_id, &email).await?;
        info!(
            token = %workflow.token_hint(),
            pet_id = %pet_id,
            kind = ?kind,
            principal_id = %initiator.id,
            "Workflow created"
        );

        self.dispatch_created(&workflow, initiator).await;

        Ok(CreateOutcome {
            workflow,
            created: true,
        })
    }

    async fn insert_with_fresh_token(
        &self,
        kind: WorkflowKind,
        initiator: &Principal,
        pet_id: &str,
        email: &str,
    ) -> Result<WorkflowInstance> {
        let ttl = (policy(kind).ttl)(&self.settings);

        for attempt in 1..=self.settings.token_attempts {
            let workflow = WorkflowInstance::new(kind, self.tokens.generate(), pet_id, &initiator.id, email)
                .with_ttl(ttl)?;

            match self.store.insert(&workflow).await {
                Ok(()) => return Ok(workflow),
                Err(CollabError::Duplicate { .. }) => {
                    warn!(attempt, "Token collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }

        error!(attempts = self.settings.token_attempts, "Could not mint a unique workflow token");
        Err(CollabError::internal("could not generate a unique token"))
    }

    /// Unauthenticated lookup of a pending workflow; the token is the credential.
    pub async fn resolve_public(&self, token: &str, kind: WorkflowKind) -> Result<PublicView> {
        let workflow = match self.store.find_pending_by_token(token, Some(kind)).await? {
            Some(workflow) => workflow,
            None => {
                // Distinguish a used link from an unknown one
                return match self.store.find_by_token(token).await? {
                    Some(processed) if processed.kind == kind => Err(CollabError::AlreadyProcessed),
                    _ => Err(CollabError::not_found(kind.entity_name(), token_hint(token))),
                };
            }
        };

        if let Err(e) = workflow.ensure_actionable(Utc::now()) {
            debug!(token = %workflow.token_hint(), "Resolve of lapsed workflow");
            return Err(e);
        }

        let pet = self
            .directory
            .pet_profile(&workflow.pet_id)
            .await?
            .ok_or_else(|| CollabError::not_found(kind.entity_name(), workflow.token_hint()))?;
        let initiator = self
            .directory
            .principal_profile(&workflow.initiator_id)
            .await?
            .unwrap_or_else(|| ProfileSummary {
                display_name: UNKNOWN_INITIATOR.to_string(),
                avatar_url: None,
            });

        Ok(PublicView {
            token: workflow.token,
            kind: workflow.kind,
            initiator_name: initiator.display_name,
            initiator_avatar_url: initiator.avatar_url,
            pet_name: pet.name,
            pet_photo_url: pet.photo_url,
            target_email: workflow.target_email,
        })
    }

    /// Accept a workflow and apply its access grant change.
    pub async fn accept(&self, token: &str, acting: &Principal) -> Result<AccessGrantResult> {
        let workflow = self.load_actionable(token).await?;
        self.authorize_approver(&workflow, acting).await?;

        let (principal_id, change) = self.apply_grant(&workflow, acting).await?;

        let updated = match self
            .store
            .transition(token, WorkflowStatus::Accepted, &acting.id)
            .await
        {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                self.compensate(&workflow, principal_id.as_deref(), change).await;
                return Err(CollabError::AlreadyProcessed);
            }
            Err(e) => {
                self.compensate(&workflow, principal_id.as_deref(), change).await;
                return Err(e);
            }
        };

        info!(
            token = %updated.token_hint(),
            pet_id = %updated.pet_id,
            kind = ?updated.kind,
            principal_id = %acting.id,
            change = ?change,
            "Workflow accepted"
        );

        self.dispatch_resolved(&updated, acting, policy(updated.kind).accepted_alert).await;

        Ok(AccessGrantResult {
            workflow: updated,
            principal_id,
            change,
        })
    }

    /// Reject a workflow. No access grant change.
    pub async fn reject(&self, token: &str, acting: &Principal) -> Result<WorkflowInstance> {
        let workflow = self.load_actionable(token).await?;
        self.authorize_approver(&workflow, acting).await?;

        let updated = self
            .store
            .transition(token, WorkflowStatus::Rejected, &acting.id)
            .await?
            .ok_or(CollabError::AlreadyProcessed)?;

        info!(
            token = %updated.token_hint(),
            pet_id = %updated.pet_id,
            kind = ?updated.kind,
            principal_id = %acting.id,
            "Workflow rejected"
        );

        self.dispatch_resolved(&updated, acting, policy(updated.kind).rejected_alert).await;

        Ok(updated)
    }

    /// Outstanding workflows for a pet. Owner/admin only.
    pub async fn list_pending_for_pet(&self, acting: &Principal, pet_id: &str) -> Result<Vec<WorkflowInstance>> {
        if !self.capabilities.can_manage(&acting.id, pet_id).await? {
            return Err(CollabError::Forbidden);
        }
        self.store.list_pending_for_pet(pet_id, Utc::now()).await
    }

    /// Delete pending workflows whose deadline passed more than `retention` ago.
    pub async fn purge_expired(&self, retention: Duration) -> Result<u64> {
        let cutoff = Utc::now()
            .checked_sub_signed(retention)
            .ok_or_else(|| CollabError::configuration("purge retention is out of range"))?;
        let purged = self.store.purge_expired(cutoff).await?;
        if purged > 0 {
            info!(purged, cutoff = %cutoff, "Purged expired workflows");
        }
        Ok(purged)
    }

    async fn load_actionable(&self, token: &str) -> Result<WorkflowInstance> {
        let workflow = self
            .store
            .find_by_token(token)
            .await?
            .ok_or_else(|| CollabError::not_found("Workflow", token_hint(token)))?;
        workflow.ensure_actionable(Utc::now())?;
        Ok(workflow)
    }

    async fn authorize_approver(&self, workflow: &WorkflowInstance, acting: &Principal) -> Result<()> {
        let allowed = match policy(workflow.kind).approver {
            Approver::Counterpart => acting.has_email(&workflow.target_email),
            Approver::PetAuthority => self.capabilities.can_manage(&acting.id, &workflow.pet_id).await?,
        };

        if !allowed {
            warn!(
                token = %workflow.token_hint(),
                principal_id = %acting.id,
                kind = ?workflow.kind,
                "Workflow action refused"
            );
            return Err(CollabError::Forbidden);
        }
        Ok(())
    }

    async fn apply_grant(
        &self,
        workflow: &WorkflowInstance,
        acting: &Principal,
    ) -> Result<(Option<String>, GrantChange)> {
        let applied = match workflow.kind {
            WorkflowKind::Invitation => self
                .grants
                .grant_collaborator(&workflow.pet_id, &acting.id)
                .await
                .map(|outcome| {
                    let change = match outcome {
                        GrantOutcome::Granted => GrantChange::Granted,
                        GrantOutcome::AlreadyCollaborator => GrantChange::AlreadyCollaborator,
                    };
                    (Some(acting.id.clone()), change)
                }),
            WorkflowKind::Removal => match self.directory.principal_by_email(&workflow.target_email).await {
                Ok(Some(principal_id)) => self
                    .grants
                    .revoke_collaborator(&workflow.pet_id, &principal_id)
                    .await
                    .map(|outcome| {
                        let change = match outcome {
                            RevokeOutcome::Revoked => GrantChange::Revoked,
                            RevokeOutcome::NotCollaborator => GrantChange::NotCollaborator,
                        };
                        (Some(principal_id), change)
                    }),
                Ok(None) => Ok((None, GrantChange::NotCollaborator)),
                Err(e) => Err(e),
            },
        };

        applied.map_err(|e| {
            error!(error = %e, token = %workflow.token_hint(), pet_id = %workflow.pet_id, "Access grant change failed");
            match e {
                CollabError::Grant { .. } => e,
                other => CollabError::grant(other.to_string()),
            }
        })
    }

    /// Undo a grant change after losing the status compare-and-set, unless the
    /// winner was an accept that wants the same change.
    async fn compensate(&self, workflow: &WorkflowInstance, principal_id: Option<&str>, change: GrantChange) {
        let (Some(principal_id), true) = (principal_id, change.is_effective()) else {
            return;
        };

        match self.store.find_by_token(&workflow.token).await {
            Ok(Some(current)) if current.status == WorkflowStatus::Accepted => return,
            Ok(_) => {}
            Err(e) => {
                error!(
                    error = %e,
                    token = %workflow.token_hint(),
                    change = ?change,
                    "Could not re-read workflow, leaving grant change in place"
                );
                return;
            }
        }

        let reverted = match change {
            GrantChange::Granted => self
                .grants
                .revoke_collaborator(&workflow.pet_id, principal_id)
                .await
                .map(|_| ()),
            GrantChange::Revoked => self
                .grants
                .grant_collaborator(&workflow.pet_id, principal_id)
                .await
                .map(|_| ()),
            _ => Ok(()),
        };

        match reverted {
            Ok(()) => warn!(token = %workflow.token_hint(), change = ?change, "Reverted grant change"),
            Err(e) => error!(error = %e, token = %workflow.token_hint(), change = ?change, "Failed to revert grant change"),
        }
    }

    async fn pet_name(&self, pet_id: &str) -> String {
        match self.directory.pet_profile(pet_id).await {
            Ok(Some(pet)) => pet.name,
            Ok(None) => "a pet".to_string(),
            Err(e) => {
                error!(error = %e, pet_id = %pet_id, "Pet lookup failed");
                "a pet".to_string()
            }
        }
    }

    async fn dispatch_created(&self, workflow: &WorkflowInstance, initiator: &Principal) {
        let pet_name = self.pet_name(&workflow.pet_id).await;
        let policy = policy(workflow.kind);

        let (recipients, message) = match workflow.kind {
            WorkflowKind::Invitation => {
                let recipients: Vec<String> = match self.directory.principal_by_email(&workflow.target_email).await {
                    Ok(found) => found.into_iter().collect(),
                    Err(e) => {
                        error!(error = %e, "Invitee lookup failed");
                        Vec::new()
                    }
                };
                let message = format!("{} invited you to help care for {}", initiator.display_name, pet_name);
                (recipients, message)
            }
            WorkflowKind::Removal => {
                let recipients: Vec<String> = match self.capabilities.authorities(&workflow.pet_id).await {
                    Ok(ids) => ids.into_iter().filter(|id| *id != initiator.id).collect(),
                    Err(e) => {
                        error!(error = %e, pet_id = %workflow.pet_id, "Authority lookup failed");
                        Vec::new()
                    }
                };
                let message = format!(
                    "{} asked to remove {} from {}",
                    initiator.display_name, workflow.target_email, pet_name
                );
                (recipients, message)
            }
        };

        for recipient in recipients {
            let alert = Alert::new(policy.created_alert, message.clone())
                .for_pet(&workflow.pet_id)
                .for_workflow(&workflow.token);
            self.notifications.notify_quietly(&recipient, alert).await;
        }
    }

    async fn dispatch_resolved(&self, workflow: &WorkflowInstance, acting: &Principal, kind: AlertKind) {
        let pet_name = self.pet_name(&workflow.pet_id).await;
        let verb = if workflow.status == WorkflowStatus::Accepted { "accepted" } else { "declined" };
        let message = match workflow.kind {
            WorkflowKind::Invitation => format!("{} {} your invitation to {}", acting.display_name, verb, pet_name),
            WorkflowKind::Removal => format!(
                "{} {} the removal of {} from {}",
                acting.display_name, verb, workflow.target_email, pet_name
            ),
        };

        let alert = Alert::new(kind, message)
            .for_pet(&workflow.pet_id)
            .for_workflow(&workflow.token);
        self.notifications.notify_quietly(&workflow.initiator_id, alert).await;
        self.notifications.mark_read_for_workflow(&acting.id, &workflow.token).await;
    }
}
