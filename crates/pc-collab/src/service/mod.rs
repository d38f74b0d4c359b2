//! Service Layer
//!
//! Workflow engine, notification dispatch, token generation, session
//! resolution, and the seams to the pet aggregate.

pub mod pets;
pub mod token;
pub mod notification;
pub mod workflow;
pub mod session;
pub mod purge;

pub use pets::{AccessGrantApplier, GrantOutcome, PetCapabilities, ProfileDirectory, RevokeOutcome};
pub use token::{RandomTokenGenerator, TokenGenerator};
pub use notification::NotificationDispatcher;
pub use workflow::{
    normalize_email, AccessGrantResult, CollaborationEngine, CreateOutcome, GrantChange, WorkflowSettings,
};
pub use session::{extract_bearer_token, JwtSessionResolver, SessionClaims, SessionResolver};
pub use purge::ExpiryPurger;
