//! Collaboration Workflows API
//!
//! Public link resolution plus the authenticated create, list, accept, and
//! reject endpoints for invitations and removal requests.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::api::common::ApiResult;
use crate::api::middleware::Authenticated;
use crate::domain::{PublicView, WorkflowInstance, WorkflowKind};
use crate::error::CollabError;
use crate::service::{AccessGrantResult, CollaborationEngine, CreateOutcome};

/// Create invitation / removal request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowRequest {
    /// Counterpart email address
    pub email: String,
}

/// Workflow response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResponse {
    pub id: String,
    pub token: String,
    pub pet_id: String,
    pub initiator_id: String,
    /// INVITATION or REMOVAL
    pub kind: String,
    pub target_email: String,
    /// PENDING, ACCEPTED or REJECTED
    pub status: String,
    pub created_at: String,
    pub expires_at: Option<String>,
    pub resolved_at: Option<String>,
    pub resolved_by: Option<String>,
}

impl From<WorkflowInstance> for WorkflowResponse {
    fn from(w: WorkflowInstance) -> Self {
        Self {
            kind: w.kind.as_str().to_string(),
            status: w.status.as_str().to_string(),
            created_at: w.created_at.to_rfc3339(),
            expires_at: w.expires_at.map(|t| t.to_rfc3339()),
            resolved_at: w.resolved_at.map(|t| t.to_rfc3339()),
            id: w.id,
            token: w.token,
            pet_id: w.pet_id,
            initiator_id: w.initiator_id,
            target_email: w.target_email,
            resolved_by: w.resolved_by,
        }
    }
}

/// Create result. `created` is false when an existing pending workflow
/// for the same pet and email was returned.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowResponse {
    pub created: bool,
    pub workflow: WorkflowResponse,
}

impl From<CreateOutcome> for CreateWorkflowResponse {
    fn from(outcome: CreateOutcome) -> Self {
        Self {
            created: outcome.created,
            workflow: outcome.workflow.into(),
        }
    }
}

/// Redacted workflow view served by token
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicWorkflowResponse {
    pub token: String,
    pub kind: String,
    pub initiator_name: String,
    pub initiator_avatar_url: Option<String>,
    pub pet_name: String,
    pub pet_photo_url: Option<String>,
    pub target_email: String,
}

impl From<PublicView> for PublicWorkflowResponse {
    fn from(v: PublicView) -> Self {
        Self {
            token: v.token,
            kind: v.kind.as_str().to_string(),
            initiator_name: v.initiator_name,
            initiator_avatar_url: v.initiator_avatar_url,
            pet_name: v.pet_name,
            pet_photo_url: v.pet_photo_url,
            target_email: v.target_email,
        }
    }
}

/// Accept result
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcceptResponse {
    pub workflow: WorkflowResponse,
    /// Principal whose access changed
    pub principal_id: Option<String>,
    /// GRANTED, ALREADY_COLLABORATOR, REVOKED or NOT_COLLABORATOR
    pub change: String,
}

impl From<AccessGrantResult> for AcceptResponse {
    fn from(r: AccessGrantResult) -> Self {
        Self {
            change: r.change.as_str().to_string(),
            principal_id: r.principal_id,
            workflow: r.workflow.into(),
        }
    }
}

/// Workflows service state
#[derive(Clone)]
pub struct WorkflowsState {
    pub engine: Arc<CollaborationEngine>,
}

fn create_status(outcome: &CreateOutcome) -> StatusCode {
    if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

/// Resolve an invitation link
#[utoipa::path(
    get,
    path = "/api/invitations/{token}",
    tag = "workflows",
    params(
        ("token" = String, Path, description = "Invitation token")
    ),
    responses(
        (status = 200, description = "Pending invitation", body = PublicWorkflowResponse),
        (status = 400, description = "Already processed"),
        (status = 404, description = "Unknown token"),
        (status = 410, description = "Expired")
    )
)]
pub async fn get_invitation(
    State(state): State<WorkflowsState>,
    Path(token): Path<String>,
) -> ApiResult<PublicWorkflowResponse> {
    let view = state.engine.resolve_public(&token, WorkflowKind::Invitation).await?;
    Ok(Json(view.into()))
}

/// Resolve a removal request link
#[utoipa::path(
    get,
    path = "/api/removal-requests/{token}",
    tag = "workflows",
    params(
        ("token" = String, Path, description = "Removal request token")
    ),
    responses(
        (status = 200, description = "Pending removal request", body = PublicWorkflowResponse),
        (status = 400, description = "Already processed"),
        (status = 404, description = "Unknown token"),
        (status = 410, description = "Expired")
    )
)]
pub async fn get_removal_request(
    State(state): State<WorkflowsState>,
    Path(token): Path<String>,
) -> ApiResult<PublicWorkflowResponse> {
    let view = state.engine.resolve_public(&token, WorkflowKind::Removal).await?;
    Ok(Json(view.into()))
}

/// Invite a collaborator to a pet
#[utoipa::path(
    post,
    path = "/api/pets/{pet_id}/invitations",
    tag = "workflows",
    params(
        ("pet_id" = String, Path, description = "Pet ID")
    ),
    request_body = CreateWorkflowRequest,
    responses(
        (status = 201, description = "Invitation created", body = CreateWorkflowResponse),
        (status = 200, description = "Existing pending invitation returned", body = CreateWorkflowResponse),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not permitted")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_invitation(
    State(state): State<WorkflowsState>,
    Authenticated(principal): Authenticated,
    Path(pet_id): Path<String>,
    Json(req): Json<CreateWorkflowRequest>,
) -> Result<(StatusCode, Json<CreateWorkflowResponse>), CollabError> {
    let outcome = state.engine.create_invitation(&principal, &pet_id, &req.email).await?;
    Ok((create_status(&outcome), Json(outcome.into())))
}

/// Request removal of a collaborator from a pet
#[utoipa::path(
    post,
    path = "/api/pets/{pet_id}/removal-requests",
    tag = "workflows",
    params(
        ("pet_id" = String, Path, description = "Pet ID")
    ),
    request_body = CreateWorkflowRequest,
    responses(
        (status = 201, description = "Removal request created", body = CreateWorkflowResponse),
        (status = 200, description = "Existing pending request returned", body = CreateWorkflowResponse),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not permitted")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_removal_request(
    State(state): State<WorkflowsState>,
    Authenticated(principal): Authenticated,
    Path(pet_id): Path<String>,
    Json(req): Json<CreateWorkflowRequest>,
) -> Result<(StatusCode, Json<CreateWorkflowResponse>), CollabError> {
    let outcome = state.engine.create_removal_request(&principal, &pet_id, &req.email).await?;
    Ok((create_status(&outcome), Json(outcome.into())))
}

/// List pending workflows for a pet
#[utoipa::path(
    get,
    path = "/api/pets/{pet_id}/invitations",
    tag = "workflows",
    params(
        ("pet_id" = String, Path, description = "Pet ID")
    ),
    responses(
        (status = 200, description = "Pending workflows", body = Vec<WorkflowResponse>),
        (status = 403, description = "Not permitted")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_pending(
    State(state): State<WorkflowsState>,
    Authenticated(principal): Authenticated,
    Path(pet_id): Path<String>,
) -> ApiResult<Vec<WorkflowResponse>> {
    let pending = state.engine.list_pending_for_pet(&principal, &pet_id).await?;
    Ok(Json(pending.into_iter().map(Into::into).collect()))
}

/// Accept an invitation or removal request
#[utoipa::path(
    post,
    path = "/api/workflows/{token}/accept",
    tag = "workflows",
    params(
        ("token" = String, Path, description = "Workflow token")
    ),
    responses(
        (status = 200, description = "Accepted", body = AcceptResponse),
        (status = 400, description = "Already processed"),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Unknown token"),
        (status = 410, description = "Expired")
    ),
    security(("bearer_auth" = []))
)]
pub async fn accept_workflow(
    State(state): State<WorkflowsState>,
    Authenticated(principal): Authenticated,
    Path(token): Path<String>,
) -> ApiResult<AcceptResponse> {
    let result = state.engine.accept(&token, &principal).await?;
    Ok(Json(result.into()))
}

/// Reject an invitation or removal request
#[utoipa::path(
    post,
    path = "/api/workflows/{token}/reject",
    tag = "workflows",
    params(
        ("token" = String, Path, description = "Workflow token")
    ),
    responses(
        (status = 200, description = "Rejected", body = WorkflowResponse),
        (status = 400, description = "Already processed"),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Unknown token"),
        (status = 410, description = "Expired")
    ),
    security(("bearer_auth" = []))
)]
pub async fn reject_workflow(
    State(state): State<WorkflowsState>,
    Authenticated(principal): Authenticated,
    Path(token): Path<String>,
) -> ApiResult<WorkflowResponse> {
    let workflow = state.engine.reject(&token, &principal).await?;
    Ok(Json(workflow.into()))
}

/// Create workflows router
pub fn workflows_router(state: WorkflowsState) -> Router {
    Router::new()
        .route("/invitations/:token", get(get_invitation))
        .route("/removal-requests/:token", get(get_removal_request))
        .route("/pets/:pet_id/invitations", post(create_invitation).get(list_pending))
        .route("/pets/:pet_id/removal-requests", post(create_removal_request))
        .route("/workflows/:token/accept", post(accept_workflow))
        .route("/workflows/:token/reject", post(reject_workflow))
        .with_state(state)
}
