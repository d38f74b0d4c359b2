//! PetCircle Collaboration
//!
//! Collaboration workflow core providing:
//! - Invitations granting a collaborator access to a pet
//! - Removal requests revoking a collaborator's access
//! - Single-use, expiring link tokens
//! - Per-user notifications for workflow transitions
//! - REST API with OpenAPI documentation

pub mod domain;
pub mod repository;
pub mod service;
pub mod api;
pub mod error;

pub use domain::*;
pub use error::{CollabError, Result};
pub use service::{CollaborationEngine, NotificationDispatcher, WorkflowSettings};
