//! OpenAPI Documentation

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Registers the bearer session scheme referenced by authenticated paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Collaboration API OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "PetCircle Collaboration API",
        version = "1.0.0",
        description = "Invitations, removal requests, and notifications for shared pet care"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "workflows", description = "Invitations and removal requests"),
        (name = "notifications", description = "User notifications")
    ),
    modifiers(&SecurityAddon),
    paths(
        super::workflows::get_invitation,
        super::workflows::get_removal_request,
        super::workflows::create_invitation,
        super::workflows::create_removal_request,
        super::workflows::list_pending,
        super::workflows::accept_workflow,
        super::workflows::reject_workflow,
        super::notifications::list_notifications,
        super::notifications::mark_read,
        super::notifications::mark_all_read,
    ),
    components(
        schemas(
            super::workflows::CreateWorkflowRequest,
            super::workflows::WorkflowResponse,
            super::workflows::CreateWorkflowResponse,
            super::workflows::PublicWorkflowResponse,
            super::workflows::AcceptResponse,
            super::notifications::NotificationResponse,
            super::notifications::MarkAllReadResponse,
            super::common::ApiError,
        )
    )
)]
pub struct CollabApiDoc;
