//! Common API types and utilities

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::CollabError;

/// Handler result returning a JSON body
pub type ApiResult<T> = Result<Json<T>, CollabError>;

/// Standard API error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
