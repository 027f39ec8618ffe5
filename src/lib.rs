//! # Roundtable
//!
//! Turn-based multi-agent discussion engine. A fixed roster of
//! conversational participants takes turns refining a shared strategy
//! document toward a fixed goal; every utterance is appended to a durable
//! transcript and fanned out live to connected observers, with full
//! history replay for late joiners.
//!
//! The engine is built from five cooperating pieces:
//!
//! - [`transcript::TranscriptStore`] — durable append-only transcript plus
//!   the strategy document and goal text;
//! - [`hub::BroadcastHub`] — observer registry with history-then-live
//!   delivery guarantees;
//! - [`participant::ParticipantRegistry`] — the fixed, ordered roster;
//! - [`scheduler::TurnScheduler`] — the round-robin session state machine;
//! - [`lifecycle::DiscussionController`] — the single-flight start/stop
//!   guard.
//!
//! The HTTP/WebSocket surface in [`server`] is a thin adapter; the core is
//! transport-agnostic.

pub mod config;
pub mod error;
pub mod hub;
pub mod lifecycle;
pub mod llm;
pub mod participant;
pub mod scheduler;
pub mod server;
pub mod transcript;

pub use error::{GenerationError, LifecycleError, StorageError};
pub use hub::{BroadcastHub, ObserverHandle};
pub use lifecycle::DiscussionController;
pub use llm::{GeminiGenerator, Generator};
pub use participant::{Participant, ParticipantRegistry};
pub use scheduler::{SessionStatus, TurnScheduler};
pub use transcript::{StrategyDocument, TranscriptEntry, TranscriptStore};

/// Library version.
pub const VERSION: &str = "0.1.0";
