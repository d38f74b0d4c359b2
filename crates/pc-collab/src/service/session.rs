//! Session Resolution
//!
//! Authentication is owned by the account service. This module only turns a
//! bearer credential into a `Principal`.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Principal;
use crate::error::{CollabError, Result};

/// Resolves a bearer credential to the authenticated principal
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// `Ok(None)` for credentials that are invalid or expired
    async fn resolve(&self, bearer: &str) -> Result<Option<Principal>>;
}

/// Session token claims issued by the account service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub iss: String,
    pub exp: i64,
}

/// HS256 session tokens
pub struct JwtSessionResolver {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    issuer: String,
}

impl JwtSessionResolver {
    pub fn new(secret: &str, issuer: impl Into<String>) -> Result<Self> {
        if secret.is_empty() {
            return Err(CollabError::Configuration {
                message: "JWT secret must not be empty".to_string(),
            });
        }
        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
        })
    }

    /// Issue a session token (dev mode and tests)
    pub fn issue(&self, principal: &Principal, ttl: chrono::Duration) -> Result<String> {
        let claims = SessionClaims {
            sub: principal.id.clone(),
            email: principal.email.clone(),
            name: Some(principal.display_name.clone()),
            iss: self.issuer.clone(),
            exp: (Utc::now() + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| CollabError::internal(format!("failed to sign session token: {}", e)))
    }
}

#[async_trait]
impl SessionResolver for JwtSessionResolver {
    async fn resolve(&self, bearer: &str) -> Result<Option<Principal>> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        match decode::<SessionClaims>(bearer, &self.decoding_key, &validation) {
            Ok(data) => {
                let claims = data.claims;
                let display_name = claims.name.unwrap_or_else(|| claims.email.clone());
                Ok(Some(Principal::new(claims.sub, claims.email, display_name)))
            }
            Err(e) => {
                debug!(error = %e, "Session token rejected");
                Ok(None)
            }
        }
    }
}

/// Extract the credential from an `Authorization: Bearer <token>` header value
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Principal {
        Principal::new("u-alice", "alice@example.com", "Alice")
    }

    #[tokio::test]
    async fn test_issue_and_resolve() {
        let resolver = JwtSessionResolver::new("secret", "petcircle").unwrap();
        let token = resolver.issue(&alice(), chrono::Duration::hours(1)).unwrap();

        let principal = resolver.resolve(&token).await.unwrap().unwrap();
        assert_eq!(principal, alice());
    }

    #[tokio::test]
    async fn test_rejects_foreign_issuer_and_garbage() {
        let other = JwtSessionResolver::new("secret", "elsewhere").unwrap();
        let token = other.issue(&alice(), chrono::Duration::hours(1)).unwrap();

        let resolver = JwtSessionResolver::new("secret", "petcircle").unwrap();
        assert!(resolver.resolve(&token).await.unwrap().is_none());
        assert!(resolver.resolve("not-a-jwt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_expired() {
        let resolver = JwtSessionResolver::new("secret", "petcircle").unwrap();
        let token = resolver.issue(&alice(), chrono::Duration::hours(-2)).unwrap();
        assert!(resolver.resolve(&token).await.unwrap().is_none());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer"), None);
    }
}
