//! API Middleware
//!
//! Authentication extractor for Axum. The session resolver is provided to
//! handlers through a request extension.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::domain::Principal;
use crate::error::CollabError;
use crate::service::{extract_bearer_token, SessionResolver};

/// Request extension holding the session resolver
#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<dyn SessionResolver>,
}

impl AuthState {
    pub fn new(sessions: Arc<dyn SessionResolver>) -> Self {
        Self { sessions }
    }
}

/// Extractor for authenticated requests
pub struct Authenticated(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = CollabError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CollabError::unauthorized("Missing Authorization header"))?;

        let token = extract_bearer_token(header)
            .ok_or_else(|| CollabError::unauthorized("Invalid Authorization header format"))?;

        let auth_state = parts
            .extensions
            .get::<AuthState>()
            .cloned()
            .ok_or_else(|| CollabError::internal("AuthState not found"))?;

        let principal = auth_state
            .sessions
            .resolve(token)
            .await?
            .ok_or_else(|| CollabError::unauthorized("Invalid or expired session"))?;

        Ok(Authenticated(principal))
    }
}
