//! Turn scheduler: the session state machine.
//!
//! Drives one discussion session: `Idle → Running → {Completed, Stopped,
//! Failed}`. The shared context (goal + strategy + topic) is assembled once
//! at session start and handed identically to every participant for the
//! session's duration; participants speak in fixed registry order,
//! round-robin, for up to `max_rounds` rounds.
//!
//! Cancellation is cooperative: the stop flag is consulted at turn
//! boundaries only and never preempts an in-flight generation call.
//! Every terminal transition is preceded by a human-readable system notice
//! appended and broadcast, so observers always learn why a session ended.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::hub::BroadcastHub;
use crate::participant::ParticipantRegistry;
use crate::transcript::{TranscriptStore, SYSTEM_SENDER};

/// Lifecycle state of the discussion engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No session has run yet.
    Idle,
    /// A session is in progress.
    Running,
    /// The last session ran all configured rounds.
    Completed,
    /// The last session was stopped by request.
    Stopped,
    /// The last session terminated on an unrecoverable error.
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Stopped => "stopped",
            SessionStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// The single active session. At most one exists at any instant.
#[derive(Debug, Clone)]
pub struct Session {
    /// Discussion topic.
    pub topic: String,
    /// When the session was accepted.
    pub started_at: DateTime<Utc>,
    /// Participant names in the order their turns completed.
    pub turns: Vec<String>,
}

/// State shared between the lifecycle controller and the scheduler.
///
/// The wrapping mutex is the engine's single cross-component lock: the
/// start check-and-set, the stop flag, and terminal transitions all go
/// through it.
#[derive(Debug)]
pub struct DiscussionState {
    /// Current lifecycle status (terminal states persist until next start).
    pub status: SessionStatus,
    /// Cooperative stop signal, checked at turn boundaries.
    pub stop_requested: bool,
    /// The active session, cleared on every terminal transition.
    pub session: Option<Session>,
}

impl DiscussionState {
    /// Fresh idle state.
    pub fn new() -> Self {
        Self {
            status: SessionStatus::Idle,
            stop_requested: false,
            session: None,
        }
    }
}

impl Default for DiscussionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to the discussion state.
pub type SharedState = Arc<Mutex<DiscussionState>>;

/// Runs one discussion session to a terminal status.
pub struct TurnScheduler {
    store: Arc<TranscriptStore>,
    hub: Arc<BroadcastHub>,
    registry: Arc<ParticipantRegistry>,
    state: SharedState,
    max_rounds: u32,
}

impl TurnScheduler {
    /// Create a scheduler over the shared engine components.
    pub fn new(
        store: Arc<TranscriptStore>,
        hub: Arc<BroadcastHub>,
        registry: Arc<ParticipantRegistry>,
        state: SharedState,
        max_rounds: u32,
    ) -> Self {
        Self {
            store,
            hub,
            registry,
            state,
            max_rounds,
        }
    }

    /// Run the session to completion.
    ///
    /// Expects the caller (the lifecycle controller) to have already
    /// transitioned the shared state to `Running`; this method owns the
    /// terminal transition.
    pub async fn run(&self, topic: String) {
        let context = self.build_context(&topic);

        if let Err(e) = self.notice(&format!("Discussion started on topic: {topic}")) {
            log::error!("failed to record session start: {e}");
            self.finish(SessionStatus::Failed);
            return;
        }

        let outcome = self.run_rounds(&context).await;
        self.finish(outcome);
    }

    /// Assemble the shared context, once per session.
    fn build_context(&self, topic: &str) -> String {
        format!(
            "We are discussing the following topic: {topic}\n\n\
             Current goals:\n{goal}\n\n\
             Current strategy:\n{strategy}\n\n\
             Ground rules: the goals are fixed; the strategy is the artifact \
             under discussion. Keep responses short, concrete, and focused on \
             actionable steps.",
            goal = self.store.goal(),
            strategy = self.store.strategy().text,
        )
    }

    async fn run_rounds(&self, context: &str) -> SessionStatus {
        for round in 1..=self.max_rounds {
            for participant in self.registry.iter() {
                if self.stop_requested() {
                    log::info!("stop observed in round {round}, aborting");
                    if let Err(e) = self.notice("Discussion stopped by request") {
                        log::error!("failed to record stop notice: {e}");
                        return SessionStatus::Failed;
                    }
                    return SessionStatus::Stopped;
                }

                log::debug!("round {round}: {} speaking", participant.name);
                let text = match participant
                    .generator
                    .generate(&participant.role, context)
                    .await
                {
                    Ok(text) => text,
                    Err(e) => {
                        log::warn!("generation failed for {}: {e}", participant.name);
                        // Best-effort: observers should learn why the session died.
                        if let Err(notice_err) =
                            self.notice(&format!("Generation failed for {}: {e}", participant.name))
                        {
                            log::error!("failed to record failure notice: {notice_err}");
                        }
                        return SessionStatus::Failed;
                    }
                };

                if let Err(e) = self.hub.record(participant.name.as_str(), text.as_str()) {
                    log::error!("transcript append failed for {}: {e}", participant.name);
                    return SessionStatus::Failed;
                }
                self.note_turn(&participant.name);

                if participant.writes_strategy && !text.trim().is_empty() {
                    if let Err(e) = self.store.set_strategy(text.as_str()) {
                        log::error!("strategy replacement failed: {e}");
                        return SessionStatus::Failed;
                    }
                    if let Err(e) = self.notice("Strategy updated") {
                        log::error!("failed to record strategy notice: {e}");
                        return SessionStatus::Failed;
                    }
                }
            }
        }

        if let Err(e) = self.notice(&format!(
            "Discussion completed after {} rounds",
            self.max_rounds
        )) {
            log::error!("failed to record completion notice: {e}");
            return SessionStatus::Failed;
        }
        SessionStatus::Completed
    }

    fn stop_requested(&self) -> bool {
        self.state.lock().stop_requested
    }

    fn note_turn(&self, name: &str) {
        if let Some(session) = self.state.lock().session.as_mut() {
            session.turns.push(name.to_string());
        }
    }

    fn notice(&self, text: &str) -> Result<(), StorageError> {
        self.hub.record(SYSTEM_SENDER, text)?;
        Ok(())
    }

    fn finish(&self, outcome: SessionStatus) {
        let mut state = self.state.lock();
        state.status = outcome;
        state.stop_requested = false;
        state.session = None;
        log::info!("session finished: {outcome}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::llm::Generator;
    use crate::participant::Participant;
    use crate::transcript::DEFAULT_STRATEGY;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Canned(&'static str);

    #[async_trait]
    impl Generator for Canned {
        async fn generate(&self, _role: &str, _context: &str) -> Result<String, GenerationError> {
            Ok(self.0.to_string())
        }
    }

    #[derive(Debug)]
    struct AlwaysFails;

    #[async_trait]
    impl Generator for AlwaysFails {
        async fn generate(&self, _role: &str, _context: &str) -> Result<String, GenerationError> {
            Err(GenerationError::Api("model unavailable".to_string()))
        }
    }

    /// Requests a stop from inside its own turn, before returning.
    #[derive(Debug)]
    struct StopsItself(SharedState);

    #[async_trait]
    impl Generator for StopsItself {
        async fn generate(&self, _role: &str, _context: &str) -> Result<String, GenerationError> {
            self.0.lock().stop_requested = true;
            Ok("last words".to_string())
        }
    }

    fn participant(name: &str, generator: Arc<dyn Generator>, writes: bool) -> Participant {
        Participant {
            name: name.to_string(),
            role: format!("{name} role"),
            generator,
            writes_strategy: writes,
        }
    }

    fn running_state(topic: &str) -> SharedState {
        Arc::new(Mutex::new(DiscussionState {
            status: SessionStatus::Running,
            stop_requested: false,
            session: Some(Session {
                topic: topic.to_string(),
                started_at: Utc::now(),
                turns: Vec::new(),
            }),
        }))
    }

    fn scheduler(
        participants: Vec<Participant>,
        max_rounds: u32,
        state: SharedState,
    ) -> (TurnScheduler, Arc<TranscriptStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TranscriptStore::open(dir.path()).unwrap());
        let hub = Arc::new(BroadcastHub::new(store.clone()));
        let registry = Arc::new(ParticipantRegistry::new(participants));
        let sched = TurnScheduler::new(store.clone(), hub, registry, state, max_rounds);
        (sched, store, dir)
    }

    fn senders(store: &TranscriptStore) -> Vec<String> {
        store.read_all().into_iter().map(|e| e.sender).collect()
    }

    #[tokio::test]
    async fn two_rounds_two_participants_completes_with_four_turns() {
        let state = running_state("reduce costs");
        let (sched, store, _dir) = scheduler(
            vec![
                participant("A", Arc::new(Canned("a says")), false),
                participant("B", Arc::new(Canned("b says")), false),
            ],
            2,
            state.clone(),
        );

        sched.run("reduce costs".to_string()).await;

        assert_eq!(state.lock().status, SessionStatus::Completed);
        assert_eq!(
            senders(&store),
            vec!["System", "A", "B", "A", "B", "System"]
        );
        // Neither participant holds write capability: strategy untouched.
        let strategy = store.strategy();
        assert_eq!(strategy.text, DEFAULT_STRATEGY);
        assert_eq!(strategy.version, 1);
    }

    #[tokio::test]
    async fn generation_failure_terminates_session_as_failed() {
        let state = running_state("t");
        let (sched, store, _dir) = scheduler(
            vec![
                participant("A", Arc::new(Canned("fine")), false),
                participant("B", Arc::new(AlwaysFails), false),
            ],
            2,
            state.clone(),
        );

        sched.run("t".to_string()).await;

        assert_eq!(state.lock().status, SessionStatus::Failed);
        let entries = store.read_all();
        // Start notice, A's entry, then the failure notice; nothing after.
        assert_eq!(senders(&store), vec!["System", "A", "System"]);
        let failure = &entries[2];
        assert!(failure.text.contains("B"));
        assert!(failure.text.contains("model unavailable"));
    }

    #[tokio::test]
    async fn strategy_writer_replaces_document_and_emits_notice() {
        let state = running_state("t");
        let (sched, store, _dir) = scheduler(
            vec![participant(
                "Refiner",
                Arc::new(Canned("the new strategy")),
                true,
            )],
            1,
            state.clone(),
        );

        sched.run("t".to_string()).await;

        assert_eq!(state.lock().status, SessionStatus::Completed);
        let strategy = store.strategy();
        assert_eq!(strategy.text, "the new strategy");
        assert_eq!(strategy.version, 2);
        assert!(store
            .read_all()
            .iter()
            .any(|e| e.sender == SYSTEM_SENDER && e.text == "Strategy updated"));
    }

    #[tokio::test]
    async fn stop_aborts_before_next_turn_and_keeps_prior_entries() {
        let state = running_state("t");
        let (sched, store, _dir) = scheduler(
            vec![
                participant("A", Arc::new(StopsItself(state.clone())), false),
                participant("B", Arc::new(Canned("never spoken")), false),
            ],
            3,
            state.clone(),
        );

        sched.run("t".to_string()).await;

        assert_eq!(state.lock().status, SessionStatus::Stopped);
        // A's completed turn survives; B never speaks; stop notice closes.
        assert_eq!(senders(&store), vec!["System", "A", "System"]);
        assert_eq!(store.read_all()[1].text, "last words");
    }

    #[tokio::test]
    async fn participant_entry_count_is_bounded_by_rounds_times_participants() {
        let state = running_state("t");
        let (sched, store, _dir) = scheduler(
            vec![
                participant("A", Arc::new(Canned("a")), false),
                participant("B", Arc::new(Canned("b")), false),
                participant("C", Arc::new(Canned("c")), false),
            ],
            4,
            state.clone(),
        );

        sched.run("t".to_string()).await;

        let participant_entries = store
            .read_all()
            .iter()
            .filter(|e| e.sender != SYSTEM_SENDER)
            .count();
        assert_eq!(participant_entries, 4 * 3);
    }

    #[tokio::test]
    async fn session_is_cleared_on_terminal_transition() {
        let state = running_state("t");
        let (sched, _store, _dir) = scheduler(
            vec![participant("A", Arc::new(Canned("a")), false)],
            1,
            state.clone(),
        );

        sched.run("t".to_string()).await;

        let state = state.lock();
        assert_eq!(state.status, SessionStatus::Completed);
        assert!(state.session.is_none());
        assert!(!state.stop_requested);
    }
}
