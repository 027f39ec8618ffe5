//! Durable append-only transcript store.
//!
//! Holds three pieces of state, each independently durable across process
//! restarts:
//!
//! - the transcript: an append-only sequence of timestamped entries,
//!   persisted as one JSON record per line in `transcript.jsonl`;
//! - the strategy document: a single text blob with a logical version
//!   counter, replaced wholesale in `strategy.txt`;
//! - the goal text: a single text blob in `goal.txt`, edited only through
//!   an explicit external operation.
//!
//! One mutex serializes every mutation, so sequence numbers never collide
//! and the backing files never interleave partial writes. Reads issued
//! after a mutation returns always observe it.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Sender identifier used for entries produced by the engine itself.
pub const SYSTEM_SENDER: &str = "System";

/// Strategy document seeded on first run.
pub const DEFAULT_STRATEGY: &str = "Initial strategy: set clear, measurable goals and work toward them in small, reviewable steps.";

/// Goal text seeded on first run.
pub const DEFAULT_GOAL: &str = "1. Improve productivity\n2. Learn new skills\n3. Keep a sustainable pace";

const TRANSCRIPT_FILE: &str = "transcript.jsonl";
const STRATEGY_FILE: &str = "strategy.txt";
const GOAL_FILE: &str = "goal.txt";

/// A single immutable transcript record.
///
/// The sequence number is assigned at append time and is the sole tie-break
/// for concurrent appends; ordering by sequence is the source of truth for
/// conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Monotonic sequence number, assigned by the store.
    pub sequence: u64,
    /// Append timestamp.
    pub timestamp: DateTime<Utc>,
    /// Sender identifier (a participant name or [`SYSTEM_SENDER`]).
    pub sender: String,
    /// Text payload.
    pub text: String,
}

/// The strategy document together with its logical version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyDocument {
    /// Current document text.
    pub text: String,
    /// Bumped on every wholesale replacement.
    pub version: u64,
}

struct StoreInner {
    entries: Vec<TranscriptEntry>,
    next_sequence: u64,
    log: File,
    strategy: StrategyDocument,
    goal: String,
}

/// Durable transcript/state store rooted at a data directory.
///
/// All mutating operations are serialized behind an internal mutex and are
/// durable before they return.
pub struct TranscriptStore {
    dir: PathBuf,
    inner: Mutex<StoreInner>,
}

impl std::fmt::Debug for TranscriptStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TranscriptStore")
            .field("dir", &self.dir)
            .field("entries", &inner.entries.len())
            .field("next_sequence", &inner.next_sequence)
            .finish()
    }
}

impl TranscriptStore {
    /// Open (or create) a store rooted at `dir`.
    ///
    /// Recovers transcript history and the sequence counter from
    /// `transcript.jsonl`; seeds `strategy.txt` and `goal.txt` with defaults
    /// when missing. A torn trailing record (partial last line) is skipped
    /// with a warning rather than failing recovery.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let log_path = dir.join(TRANSCRIPT_FILE);
        let mut entries: Vec<TranscriptEntry> = Vec::new();
        if log_path.exists() {
            let reader = BufReader::new(File::open(&log_path)?);
            for (lineno, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<TranscriptEntry>(&line) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => {
                        log::warn!(
                            "skipping unreadable transcript record at line {}: {}",
                            lineno + 1,
                            e
                        );
                    }
                }
            }
        }
        let next_sequence = entries.last().map(|e| e.sequence + 1).unwrap_or(1);

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let strategy_text = read_or_seed(&dir.join(STRATEGY_FILE), DEFAULT_STRATEGY)?;
        let goal = read_or_seed(&dir.join(GOAL_FILE), DEFAULT_GOAL)?;

        log::info!(
            "transcript store opened at {} ({} entries recovered)",
            dir.display(),
            entries.len()
        );

        Ok(Self {
            dir,
            inner: Mutex::new(StoreInner {
                entries,
                next_sequence,
                log,
                strategy: StrategyDocument {
                    text: strategy_text,
                    version: 1,
                },
                goal,
            }),
        })
    }

    /// Append an entry, assigning the next sequence number.
    ///
    /// The record is flushed to the backing log before this returns. I/O
    /// errors are propagated without retry; the caller decides.
    pub fn append(
        &self,
        sender: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<TranscriptEntry, StorageError> {
        let mut inner = self.inner.lock();
        let entry = TranscriptEntry {
            sequence: inner.next_sequence,
            timestamp: Utc::now(),
            sender: sender.into(),
            text: text.into(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        inner.log.write_all(line.as_bytes())?;
        inner.log.sync_data()?;
        inner.next_sequence += 1;
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    /// Full history, in sequence order, reflecting all completed appends.
    pub fn read_all(&self) -> Vec<TranscriptEntry> {
        self.inner.lock().entries.clone()
    }

    /// Number of entries currently in the transcript.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the transcript is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Highest sequence number appended so far, or 0 when empty.
    pub fn last_sequence(&self) -> u64 {
        self.inner.lock().entries.last().map(|e| e.sequence).unwrap_or(0)
    }

    /// Atomically truncate the transcript. Strategy and goal are untouched.
    ///
    /// The sequence counter keeps counting upward for the life of the
    /// process, so observers deduplicating by sequence stay consistent.
    pub fn clear(&self) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.log = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.dir.join(TRANSCRIPT_FILE))?;
        inner.entries.clear();
        log::info!("transcript cleared");
        Ok(())
    }

    /// Current strategy document.
    pub fn strategy(&self) -> StrategyDocument {
        self.inner.lock().strategy.clone()
    }

    /// Replace the strategy document wholesale. Last writer wins.
    pub fn set_strategy(&self, text: impl Into<String>) -> Result<StrategyDocument, StorageError> {
        let mut inner = self.inner.lock();
        let text = text.into();
        fs::write(self.dir.join(STRATEGY_FILE), &text)?;
        inner.strategy.text = text;
        inner.strategy.version += 1;
        Ok(inner.strategy.clone())
    }

    /// Current goal text.
    pub fn goal(&self) -> String {
        self.inner.lock().goal.clone()
    }

    /// Replace the goal text wholesale.
    pub fn set_goal(&self, text: impl Into<String>) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        let text = text.into();
        fs::write(self.dir.join(GOAL_FILE), &text)?;
        inner.goal = text;
        Ok(())
    }
}

fn read_or_seed(path: &Path, default: &str) -> Result<String, StorageError> {
    if path.exists() {
        Ok(fs::read_to_string(path)?)
    } else {
        fs::write(path, default)?;
        log::info!("seeded {}", path.display());
        Ok(default.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_increasing_sequence_without_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).unwrap();

        for i in 0..5 {
            store.append("Explorer", format!("utterance {i}")).unwrap();
        }

        let entries = store.read_all();
        assert_eq!(entries.len(), 5);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.sequence, i as u64 + 1);
        }
    }

    #[test]
    fn history_and_sequence_counter_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = TranscriptStore::open(dir.path()).unwrap();
            store.append("Explorer", "first").unwrap();
            store.append("Critic", "second").unwrap();
        }

        let store = TranscriptStore::open(dir.path()).unwrap();
        let entries = store.read_all();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].sender, "Critic");

        let next = store.append("Synthesizer", "third").unwrap();
        assert_eq!(next.sequence, 3);
    }

    #[test]
    fn recovery_skips_torn_trailing_record() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = TranscriptStore::open(dir.path()).unwrap();
            store.append("Explorer", "intact").unwrap();
        }
        // Simulate a crash mid-append: a partial JSON line at the tail.
        let log_path = dir.path().join("transcript.jsonl");
        let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
        file.write_all(b"{\"sequence\":2,\"timest").unwrap();

        let store = TranscriptStore::open(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.read_all()[0].text, "intact");
    }

    #[test]
    fn clear_truncates_transcript_but_preserves_strategy_and_goal() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).unwrap();
        store.append("Explorer", "hello").unwrap();
        store.set_strategy("the plan").unwrap();
        store.set_goal("the goal").unwrap();

        store.clear().unwrap();

        assert!(store.is_empty());
        assert_eq!(store.strategy().text, "the plan");
        assert_eq!(store.goal(), "the goal");

        // Durable too: reopen sees an empty transcript and kept state.
        drop(store);
        let store = TranscriptStore::open(dir.path()).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.strategy().text, "the plan");
        assert_eq!(store.goal(), "the goal");
    }

    #[test]
    fn strategy_replacement_bumps_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).unwrap();

        let initial = store.strategy();
        assert_eq!(initial.text, DEFAULT_STRATEGY);
        assert_eq!(initial.version, 1);

        let updated = store.set_strategy("revised plan").unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(store.strategy().text, "revised plan");
    }

    #[test]
    fn defaults_seeded_on_first_open() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).unwrap();
        assert_eq!(store.strategy().text, DEFAULT_STRATEGY);
        assert_eq!(store.goal(), DEFAULT_GOAL);
        assert!(dir.path().join("strategy.txt").exists());
        assert!(dir.path().join("goal.txt").exists());
    }
}
