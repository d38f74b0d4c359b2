//! API Layer
//!
//! REST endpoints for collaboration workflows and notifications.

pub mod common;
pub mod middleware;
pub mod openapi;

pub mod workflows;
pub mod notifications;

use std::sync::Arc;

use axum::{Extension, Router};

use crate::service::{CollaborationEngine, SessionResolver};

pub use common::*;
pub use middleware::{AuthState, Authenticated};
pub use openapi::CollabApiDoc;
pub use workflows::{WorkflowsState, workflows_router};
pub use notifications::{NotificationsState, notifications_router};

/// Assemble the `/api` routes with the session resolver installed for
/// the `Authenticated` extractor.
pub fn build_router(engine: Arc<CollaborationEngine>, sessions: Arc<dyn SessionResolver>) -> Router {
    let notifications_state = NotificationsState {
        dispatcher: engine.notifications().clone(),
    };
    let workflows_state = WorkflowsState { engine };

    Router::new()
        .nest("/api", workflows_router(workflows_state))
        .nest("/api/notifications", notifications_router(notifications_state))
        .layer(Extension(AuthState::new(sessions)))
}
