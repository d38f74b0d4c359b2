//! API Endpoint Tests
//!
//! Tests for:
//! - Public link resolution
//! - Authentication and authorization failures
//! - Create (201 vs 200), accept and reject
//! - Notification feed endpoints

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use pc_collab::api::build_router;
use pc_collab::domain::{Principal, WorkflowInstance, WorkflowKind};
use pc_collab::repository::{
    InMemoryNotificationStore, InMemoryPetDirectory, InMemoryWorkflowStore, WorkflowStore,
};
use pc_collab::service::{CollaborationEngine, JwtSessionResolver, NotificationDispatcher, WorkflowSettings};

struct TestApp {
    app: Router,
    sessions: Arc<JwtSessionResolver>,
    store: Arc<InMemoryWorkflowStore>,
    pets: Arc<InMemoryPetDirectory>,
}

impl TestApp {
    fn bearer(&self, principal: &Principal) -> String {
        let token = self.sessions.issue(principal, Duration::hours(1)).unwrap();
        format!("Bearer {}", token)
    }

    async fn send(&self, method: Method, uri: &str, auth: Option<&Principal>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(principal) = auth {
            builder = builder.header(header::AUTHORIZATION, self.bearer(principal));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

fn owner() -> Principal {
    Principal::new("u-owner", "owner@example.com", "Olivia")
}

fn friend() -> Principal {
    Principal::new("u-friend", "friend@example.com", "Finn")
}

fn stranger() -> Principal {
    Principal::new("u-stranger", "stranger@example.com", "Sam")
}

fn create_test_app() -> TestApp {
    let pets = Arc::new(InMemoryPetDirectory::new());
    for p in [owner(), friend(), stranger()] {
        pets.add_user(&p.id, &p.email, &p.display_name);
    }
    pets.add_pet("pet-1", "Biscuit", "u-owner");

    let store = Arc::new(InMemoryWorkflowStore::new());
    let engine = Arc::new(CollaborationEngine::new(
        store.clone(),
        pets.clone(),
        pets.clone(),
        pets.clone(),
        NotificationDispatcher::new(Arc::new(InMemoryNotificationStore::new())),
        WorkflowSettings::default(),
    ));
    let sessions = Arc::new(JwtSessionResolver::new("test-secret", "petcircle").unwrap());

    TestApp {
        app: build_router(engine, sessions.clone()),
        sessions,
        store,
        pets,
    }
}

async fn invite(app: &TestApp, email: &str) -> String {
    let (status, body) = app
        .send(
            Method::POST,
            "/api/pets/pet-1/invitations",
            Some(&owner()),
            Some(json!({ "email": email })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body["workflow"]["token"].as_str().unwrap().to_string()
}

// ============================================================================
// Public resolution
// ============================================================================

#[tokio::test]
async fn test_public_invitation_view() {
    let app = create_test_app();
    let token = invite(&app, "friend@example.com").await;

    let (status, body) = app
        .send(Method::GET, &format!("/api/invitations/{}", token), None, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["petName"], "Biscuit");
    assert_eq!(body["initiatorName"], "Olivia");
    assert_eq!(body["kind"], "INVITATION");
    assert!(body.get("petId").is_none());
    assert!(body.get("initiatorId").is_none());
}

#[tokio::test]
async fn test_public_lookup_errors() {
    let app = create_test_app();

    let (status, body) = app.send(Method::GET, "/api/invitations/unknown", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");

    let expired = WorkflowInstance::new(WorkflowKind::Invitation, "expired-token", "pet-1", "u-owner", "friend@example.com")
        .with_expires_at(Utc::now() - Duration::minutes(5));
    app.store.insert(&expired).await.unwrap();

    let (status, body) = app.send(Method::GET, "/api/invitations/expired-token", None, None).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "EXPIRED");

    // A token resolves only under its own kind
    let (status, _) = app
        .send(Method::GET, "/api/removal-requests/expired-token", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Authentication / authorization
// ============================================================================

#[tokio::test]
async fn test_create_requires_session() {
    let app = create_test_app();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/pets/pet-1/invitations",
            None,
            Some(json!({ "email": "friend@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHORIZED");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/pets/pet-1/invitations")
        .header(header::AUTHORIZATION, "Bearer not-a-session")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "email": "friend@example.com" }).to_string()))
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_by_non_owner_is_forbidden() {
    let app = create_test_app();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/pets/pet-1/invitations",
            Some(&stranger()),
            Some(json!({ "email": "friend@example.com" })),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_create_with_bad_email_is_bad_request() {
    let app = create_test_app();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/pets/pet-1/invitations",
            Some(&owner()),
            Some(json!({ "email": "nope" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

// ============================================================================
// Workflow lifecycle
// ============================================================================

#[tokio::test]
async fn test_repeat_create_returns_existing_with_ok() {
    let app = create_test_app();
    let token = invite(&app, "friend@example.com").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/pets/pet-1/invitations",
            Some(&owner()),
            Some(json!({ "email": "Friend@Example.com" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], false);
    assert_eq!(body["workflow"]["token"], token.as_str());
}

#[tokio::test]
async fn test_accept_then_accept_again() {
    let app = create_test_app();
    let token = invite(&app, "friend@example.com").await;
    let uri = format!("/api/workflows/{}/accept", token);

    let (status, _) = app.send(Method::POST, &uri, Some(&stranger()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send(Method::POST, &uri, Some(&friend()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["change"], "GRANTED");
    assert_eq!(body["workflow"]["status"], "ACCEPTED");
    assert_eq!(app.pets.collaborators("pet-1"), vec!["u-friend".to_string()]);

    let (status, body) = app.send(Method::POST, &uri, Some(&friend()), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ALREADY_PROCESSED");

    let (status, _) = app
        .send(Method::GET, &format!("/api/invitations/{}", token), None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reject_endpoint() {
    let app = create_test_app();
    let token = invite(&app, "friend@example.com").await;

    let (status, body) = app
        .send(Method::POST, &format!("/api/workflows/{}/reject", token), Some(&friend()), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "REJECTED");
    assert!(app.pets.collaborators("pet-1").is_empty());
}

#[tokio::test]
async fn test_removal_request_endpoints() {
    let app = create_test_app();
    app.pets.add_collaborator("pet-1", "u-friend");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/pets/pet-1/removal-requests",
            Some(&owner()),
            Some(json!({ "email": "friend@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["workflow"]["kind"], "REMOVAL");
    let token = body["workflow"]["token"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(Method::GET, &format!("/api/removal-requests/{}", token), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::POST, &format!("/api/workflows/{}/accept", token), Some(&owner()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["change"], "REVOKED");
    assert!(app.pets.collaborators("pet-1").is_empty());
}

#[tokio::test]
async fn test_list_pending_for_pet() {
    let app = create_test_app();
    invite(&app, "friend@example.com").await;
    invite(&app, "stranger@example.com").await;

    let (status, body) = app
        .send(Method::GET, "/api/pets/pet-1/invitations", Some(&owner()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, _) = app
        .send(Method::GET, "/api/pets/pet-1/invitations", Some(&friend()), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Notifications
// ============================================================================

#[tokio::test]
async fn test_notification_feed() {
    let app = create_test_app();
    invite(&app, "friend@example.com").await;

    let (status, body) = app
        .send(Method::GET, "/api/notifications?unreadOnly=true", Some(&friend()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let feed = body.as_array().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["kind"], "INVITATION_RECEIVED");
    let id = feed[0]["id"].as_str().unwrap().to_string();

    // Someone else's notification looks missing
    let (status, _) = app
        .send(Method::POST, &format!("/api/notifications/{}/read", id), Some(&stranger()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(Method::POST, &format!("/api/notifications/{}/read", id), Some(&friend()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isRead"], true);

    let (_, body) = app
        .send(Method::GET, "/api/notifications?unreadOnly=true", Some(&friend()), None)
        .await;
    assert!(body.as_array().unwrap().is_empty());

    let (_, body) = app.send(Method::GET, "/api/notifications", Some(&friend()), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_mark_all_read() {
    let app = create_test_app();
    let first = invite(&app, "friend@example.com").await;
    app.send(Method::POST, &format!("/api/workflows/{}/reject", first), Some(&friend()), None)
        .await;
    invite(&app, "friend@example.com").await;

    let (status, body) = app
        .send(Method::POST, "/api/notifications/read-all", Some(&friend()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    // The first invitation alert was already cleared by the reject
    assert_eq!(body["updated"], 1);

    let (status, _) = app.send(Method::POST, "/api/notifications/read-all", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
