//! Notifications API
//!
//! The acting user's alert feed. Every endpoint is scoped to the caller.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::common::ApiResult;
use crate::api::middleware::Authenticated;
use crate::domain::Notification;
use crate::service::NotificationDispatcher;

/// Notification response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: String,
    pub kind: String,
    pub message: String,
    pub pet_id: Option<String>,
    pub workflow_token: Option<String>,
    pub is_read: bool,
    pub created_at: String,
    pub read_at: Option<String>,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            kind: n.kind.as_str().to_string(),
            created_at: n.created_at.to_rfc3339(),
            read_at: n.read_at.map(|t| t.to_rfc3339()),
            id: n.id,
            message: n.message,
            pet_id: n.pet_id,
            workflow_token: n.workflow_token,
            is_read: n.is_read,
        }
    }
}

/// Query parameters for the notification feed
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct NotificationsQuery {
    /// Only unread notifications
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResponse {
    /// Notifications that changed from unread to read
    pub updated: u64,
}

/// Notifications service state
#[derive(Clone)]
pub struct NotificationsState {
    pub dispatcher: NotificationDispatcher,
}

/// List the caller's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "notifications",
    params(NotificationsQuery),
    responses(
        (status = 200, description = "Notifications", body = Vec<NotificationResponse>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_notifications(
    State(state): State<NotificationsState>,
    Authenticated(principal): Authenticated,
    Query(query): Query<NotificationsQuery>,
) -> ApiResult<Vec<NotificationResponse>> {
    let notifications = state.dispatcher.list(&principal.id, query.unread_only).await?;
    Ok(Json(notifications.into_iter().map(Into::into).collect()))
}

/// Mark one notification read
#[utoipa::path(
    post,
    path = "/api/notifications/{id}/read",
    tag = "notifications",
    params(
        ("id" = String, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification read", body = NotificationResponse),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn mark_read(
    State(state): State<NotificationsState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<NotificationResponse> {
    let notification = state.dispatcher.mark_read(&id, &principal.id).await?;
    Ok(Json(notification.into()))
}

/// Mark all of the caller's notifications read
#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    tag = "notifications",
    responses(
        (status = 200, description = "Notifications read", body = MarkAllReadResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn mark_all_read(
    State(state): State<NotificationsState>,
    Authenticated(principal): Authenticated,
) -> ApiResult<MarkAllReadResponse> {
    let updated = state.dispatcher.mark_all_read(&principal.id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

/// Create notifications router
pub fn notifications_router(state: NotificationsState) -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/read-all", post(mark_all_read))
        .route("/:id/read", post(mark_read))
        .with_state(state)
}
