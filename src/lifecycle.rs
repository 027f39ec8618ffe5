//! Discussion lifecycle controller.
//!
//! Exposes start/stop/status over the single-flight session guard: at most
//! one discussion session exists at any instant. The check-and-set in
//! [`start`](DiscussionController::start) and the scheduler's terminal
//! transitions share one mutex, so two concurrent starts can never race
//! into `Running` together.
//!
//! Dispatch is asynchronous: `start` spawns the session onto the runtime
//! and returns accepted immediately; `stop` returns once the stop signal is
//! recorded, not once the session halts. [`status`](DiscussionController::status)
//! is the observation point for the terminal outcome.

use std::sync::Arc;

use chrono::Utc;

use crate::error::LifecycleError;
use crate::hub::BroadcastHub;
use crate::participant::ParticipantRegistry;
use crate::scheduler::{
    DiscussionState, Session, SessionStatus, SharedState, TurnScheduler,
};
use crate::transcript::TranscriptStore;

/// Owns the single-flight guard and dispatches discussion sessions.
pub struct DiscussionController {
    state: SharedState,
    store: Arc<TranscriptStore>,
    hub: Arc<BroadcastHub>,
    registry: Arc<ParticipantRegistry>,
    max_rounds: u32,
}

impl std::fmt::Debug for DiscussionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscussionController")
            .field("status", &self.status())
            .field("max_rounds", &self.max_rounds)
            .finish_non_exhaustive()
    }
}

impl DiscussionController {
    /// Create a controller over the shared engine components.
    pub fn new(
        store: Arc<TranscriptStore>,
        hub: Arc<BroadcastHub>,
        registry: Arc<ParticipantRegistry>,
        max_rounds: u32,
    ) -> Self {
        Self {
            state: Arc::new(parking_lot::Mutex::new(DiscussionState::new())),
            store,
            hub,
            registry,
            max_rounds,
        }
    }

    /// Start a discussion session on `topic`.
    ///
    /// Returns `Ok(())` once the session is accepted and spawned;
    /// [`LifecycleError::AlreadyRunning`] if a session is active. Must be
    /// called from within a tokio runtime.
    pub fn start(&self, topic: impl Into<String>) -> Result<(), LifecycleError> {
        let topic = topic.into();
        {
            let mut state = self.state.lock();
            if state.status == SessionStatus::Running {
                return Err(LifecycleError::AlreadyRunning);
            }
            state.status = SessionStatus::Running;
            state.stop_requested = false;
            state.session = Some(Session {
                topic: topic.clone(),
                started_at: Utc::now(),
                turns: Vec::new(),
            });
        }

        let scheduler = TurnScheduler::new(
            self.store.clone(),
            self.hub.clone(),
            self.registry.clone(),
            self.state.clone(),
            self.max_rounds,
        );
        log::info!("discussion accepted: {topic}");
        tokio::spawn(async move {
            scheduler.run(topic).await;
        });
        Ok(())
    }

    /// Request a cooperative stop of the active session.
    ///
    /// Returns once the signal is recorded; the session halts at its next
    /// turn boundary. [`LifecycleError::NotRunning`] if nothing is active.
    pub fn stop(&self) -> Result<(), LifecycleError> {
        let mut state = self.state.lock();
        if state.status != SessionStatus::Running {
            return Err(LifecycleError::NotRunning);
        }
        state.stop_requested = true;
        log::info!("stop requested");
        Ok(())
    }

    /// Current lifecycle status.
    pub fn status(&self) -> SessionStatus {
        self.state.lock().status
    }

    /// Purge the transcript.
    ///
    /// Forbidden while a session is running ([`LifecycleError::Busy`]);
    /// the guard lock is held across the truncation so a concurrent start
    /// cannot slip in between check and purge.
    pub fn clear_transcript(&self) -> Result<(), LifecycleError> {
        let state = self.state.lock();
        if state.status == SessionStatus::Running {
            return Err(LifecycleError::Busy);
        }
        self.store.clear()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::llm::Generator;
    use crate::participant::Participant;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    #[derive(Debug)]
    struct Canned(&'static str);

    #[async_trait]
    impl Generator for Canned {
        async fn generate(&self, _role: &str, _context: &str) -> Result<String, GenerationError> {
            Ok(self.0.to_string())
        }
    }

    /// Blocks inside generate until released, to hold a session open.
    #[derive(Debug)]
    struct Gated(Arc<Notify>);

    #[async_trait]
    impl Generator for Gated {
        async fn generate(&self, _role: &str, _context: &str) -> Result<String, GenerationError> {
            self.0.notified().await;
            Ok("released".to_string())
        }
    }

    fn controller(generator: Arc<dyn Generator>, max_rounds: u32) -> (DiscussionController, Arc<TranscriptStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TranscriptStore::open(dir.path()).unwrap());
        let hub = Arc::new(BroadcastHub::new(store.clone()));
        let registry = Arc::new(ParticipantRegistry::new(vec![Participant {
            name: "A".to_string(),
            role: "A role".to_string(),
            generator,
            writes_strategy: false,
        }]));
        let ctl = DiscussionController::new(store.clone(), hub, registry, max_rounds);
        (ctl, store, dir)
    }

    async fn wait_for_terminal(ctl: &DiscussionController) -> SessionStatus {
        for _ in 0..500 {
            let status = ctl.status();
            if status != SessionStatus::Running {
                return status;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("session never reached a terminal status");
    }

    #[tokio::test]
    async fn stop_without_active_session_is_not_running() {
        let (ctl, _store, _dir) = controller(Arc::new(Canned("x")), 1);
        assert!(matches!(ctl.stop(), Err(LifecycleError::NotRunning)));
        assert_eq!(ctl.status(), SessionStatus::Idle);
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_running() {
        let gate = Arc::new(Notify::new());
        let (ctl, _store, _dir) = controller(Arc::new(Gated(gate.clone())), 3);

        ctl.start("first").unwrap();
        assert_eq!(ctl.status(), SessionStatus::Running);
        assert!(matches!(
            ctl.start("second"),
            Err(LifecycleError::AlreadyRunning)
        ));

        ctl.stop().unwrap();
        gate.notify_one();
        assert_eq!(wait_for_terminal(&ctl).await, SessionStatus::Stopped);
    }

    #[tokio::test]
    async fn clear_is_busy_while_running_and_allowed_after() {
        let gate = Arc::new(Notify::new());
        let (ctl, store, _dir) = controller(Arc::new(Gated(gate.clone())), 1);

        ctl.start("t").unwrap();
        assert!(matches!(
            ctl.clear_transcript(),
            Err(LifecycleError::Busy)
        ));

        gate.notify_one();
        wait_for_terminal(&ctl).await;

        assert!(!store.is_empty());
        ctl.clear_transcript().unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn session_runs_to_completed_and_engine_is_restartable() {
        let (ctl, store, _dir) = controller(Arc::new(Canned("hello")), 1);

        ctl.start("one").unwrap();
        assert_eq!(wait_for_terminal(&ctl).await, SessionStatus::Completed);
        let after_first = store.len();
        assert!(after_first > 0);

        // A terminal status releases the guard: starting again is legal.
        ctl.start("two").unwrap();
        assert_eq!(wait_for_terminal(&ctl).await, SessionStatus::Completed);
        assert!(store.len() > after_first);
    }
}
