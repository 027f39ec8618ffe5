//! Generation capability seam.
//!
//! The engine treats utterance production as an opaque capability: given a
//! role description and the shared session context, produce the next
//! utterance. Implementations may take arbitrarily long and may fail; the
//! scheduler treats every failure as permanent for the current turn and
//! builds no retries on top.

pub mod gemini;

pub use gemini::GeminiGenerator;

use async_trait::async_trait;

use crate::error::GenerationError;

/// Produces the next utterance for a role, given the shared context.
#[async_trait]
pub trait Generator: Send + Sync + std::fmt::Debug {
    /// Generate one utterance.
    ///
    /// `role` is the participant's role description (delivered as the
    /// system instruction by provider implementations); `context` is the
    /// session context assembled once per session by the scheduler.
    async fn generate(&self, role: &str, context: &str) -> Result<String, GenerationError>;

    /// Model identifier, for logging.
    fn model(&self) -> &str {
        "unknown"
    }
}
