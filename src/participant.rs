//! Participant records and the fixed, ordered registry.
//!
//! Participants are defined once at process start and never added or
//! removed at runtime. "Can rewrite the strategy document" is an explicit
//! flag on the record, not a subtype.

use std::sync::Arc;

use crate::llm::Generator;

/// A named conversational participant.
pub struct Participant {
    /// Unique name, used as the transcript sender identifier.
    pub name: String,
    /// Role description handed to the generation capability.
    pub role: String,
    /// The capability producing this participant's utterances.
    pub generator: Arc<dyn Generator>,
    /// Whether this participant's output replaces the strategy document.
    pub writes_strategy: bool,
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("name", &self.name)
            .field("writes_strategy", &self.writes_strategy)
            .finish_non_exhaustive()
    }
}

/// Fixed ordered list of participants.
///
/// Iteration order is the round-robin speaking order; there is no dynamic
/// speaker selection.
#[derive(Debug)]
pub struct ParticipantRegistry {
    participants: Vec<Participant>,
}

impl ParticipantRegistry {
    /// Build a registry from an ordered participant list.
    pub fn new(participants: Vec<Participant>) -> Self {
        Self { participants }
    }

    /// Participants in speaking order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    /// Look up a participant by name.
    pub fn get(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.name == name)
    }

    /// Number of participants.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
