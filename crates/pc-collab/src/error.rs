//! Collaboration Error Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::api::common::ApiError;

#[derive(Error, Debug)]
pub enum CollabError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Workflow expired")]
    Expired,

    #[error("Workflow already processed")]
    AlreadyProcessed,

    #[error("Forbidden")]
    Forbidden,

    #[error("Authorization error: {message}")]
    Unauthorized { message: String },

    #[error("Duplicate entity: {entity_type} with {field}={value}")]
    Duplicate { entity_type: String, field: String, value: String },

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Access grant error: {message}")]
    Grant { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CollabError {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(entity_type: impl Into<String>, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    pub fn grant(message: impl Into<String>) -> Self {
        Self::Grant { message: message.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Stable machine-readable code for API consumers
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Expired => "EXPIRED",
            Self::AlreadyProcessed => "ALREADY_PROCESSED",
            Self::Forbidden => "FORBIDDEN",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            _ => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::AlreadyProcessed => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Expired => StatusCode::GONE,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CollabError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Validation { message } => message.clone(),
            Self::Unauthorized { message } => message.clone(),
            Self::NotFound { entity_type, .. } => format!("{} not found", entity_type),
            Self::Expired => "This link has expired".to_string(),
            Self::AlreadyProcessed => "This link has already been used".to_string(),
            Self::Forbidden => "Not permitted".to_string(),
            other => {
                error!(error = %other, "Request failed");
                "Internal Error".to_string()
            }
        };

        let body = ApiError {
            error: self.code().to_string(),
            message,
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, CollabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(CollabError::not_found("Workflow", "t").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(CollabError::Expired.status_code(), StatusCode::GONE);
        assert_eq!(CollabError::AlreadyProcessed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(CollabError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(CollabError::unauthorized("no").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(CollabError::grant("down").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_expired_and_processed_are_distinct() {
        assert_ne!(CollabError::Expired.code(), CollabError::AlreadyProcessed.code());
        assert_ne!(CollabError::Expired.code(), CollabError::not_found("Workflow", "t").code());
    }
}
