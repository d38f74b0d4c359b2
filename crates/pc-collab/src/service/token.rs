//! Workflow Token Generation

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;

/// Number of random bytes per token (256 bits of entropy)
pub const TOKEN_BYTES: usize = 32;

/// Produces link tokens. Uniqueness is enforced by the store; callers retry
/// on a uniqueness violation.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// URL-safe base64 over OS-seeded random bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> String {
        let bytes: [u8; TOKEN_BYTES] = rand::thread_rng().gen();
        URL_SAFE_NO_PAD.encode(bytes)
    }
}
