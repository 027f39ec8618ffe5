//! Error types for the roundtable engine.
//!
//! The taxonomy mirrors the failure surfaces of the core: lifecycle misuse,
//! durable storage failures, and generation-capability failures. Observer
//! delivery failures are deliberately absent: a failed delivery removes the
//! observer inside the hub and never surfaces to the publisher.

use thiserror::Error;

/// Errors from the durable transcript/state store.
///
/// A storage failure is fatal to a running session: once an append or
/// replace fails, transcript integrity can no longer be guaranteed.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying file I/O failed.
    #[error("transcript storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A transcript record could not be serialized.
    #[error("transcript record serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Lifecycle misuse errors reported to the caller with no state change.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A discussion session is already running.
    #[error("a discussion is already in progress")]
    AlreadyRunning,

    /// There is no active discussion session.
    #[error("no active discussion to stop")]
    NotRunning,

    /// The requested operation is forbidden while a session is running.
    #[error("operation not permitted while a discussion is in progress")]
    Busy,

    /// A guarded store operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from the external generation capability.
///
/// The scheduler treats every variant as permanent for the current turn;
/// retry policy, if any, belongs to the capability implementation itself.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The HTTP request failed or timed out.
    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The model API returned an error payload.
    #[error("model API error: {0}")]
    Api(String),

    /// The model returned a response with no usable text.
    #[error("empty completion from model")]
    EmptyCompletion,

    /// The capability is not configured (e.g. missing API key).
    #[error("generation capability not configured: {0}")]
    NotConfigured(String),
}
