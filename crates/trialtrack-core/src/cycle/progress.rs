//! Per-group record of an in-progress cycle.
//!
//! A [`ProgressRecord`] exists only while a cycle is open. Its absence means
//! "no cycle in progress" and the position computes to 1. Position is always
//! re-derived from what the persistence layer hands back, so a crash between
//! a decision and its commit costs nothing: the next read sees exactly what
//! was durably written.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageError;
use crate::events::{Event, EventSink};
use crate::model::GroupKey;
use crate::storage::Persistence;

/// Reserved key in the captured-data bag for folded-in gating-action data.
/// Variable names never collide with it.
pub const GATING_DATA_KEY: &str = "__gating_action";

/// Ephemeral progress of one group's open cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub group: GroupKey,
    /// Completion timestamp of each recorded round, in order.
    pub rounds: Vec<DateTime<Utc>>,
    /// Data captured so far, keyed by variable name or a reserved key.
    pub captured: BTreeMap<String, Value>,
}

impl ProgressRecord {
    pub fn new(group: GroupKey) -> Self {
        Self {
            group,
            rounds: Vec::new(),
            captured: BTreeMap::new(),
        }
    }

    /// 1-based position the cycle is currently at.
    pub fn position(&self) -> u32 {
        self.rounds.len() as u32 + 1
    }
}

/// Service owning cycle-progress reads and writes.
///
/// Explicitly constructed with its persistence and event-sink collaborators;
/// tests instantiate isolated stores per case. A store-level mutex makes each
/// operation atomic relative to concurrent position readers on the same
/// store.
pub struct CycleProgressStore {
    store: Arc<dyn Persistence>,
    sink: Arc<dyn EventSink>,
    guard: Mutex<()>,
}

impl CycleProgressStore {
    pub fn new(store: Arc<dyn Persistence>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            sink,
            guard: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().expect("progress store lock poisoned")
    }

    /// Current 1-based position for the group: 1 when no record exists,
    /// otherwise one past the number of completed rounds.
    pub fn current_position(&self, key: &GroupKey) -> Result<u32, StorageError> {
        let _held = self.lock();
        Ok(match self.store.load_progress(key)? {
            Some(record) => record.position(),
            None => 1,
        })
    }

    /// Append a round-completion timestamp and merge captured data into the
    /// progress bag, creating the record if this is the cycle's first round.
    /// Returns the new position.
    pub fn record_round(
        &self,
        key: &GroupKey,
        at: DateTime<Utc>,
        captured: BTreeMap<String, Value>,
    ) -> Result<u32, StorageError> {
        let _held = self.lock();
        let mut record = self
            .store
            .load_progress(key)?
            .unwrap_or_else(|| ProgressRecord::new(*key));
        let position = record.position();
        record.rounds.push(at);
        record.captured.extend(captured);
        self.store.save_progress(&record)?;
        self.sink.emit(Event::RoundRecorded {
            group: *key,
            position,
            at,
        });
        Ok(record.position())
    }

    /// Install a fresh record wholesale. Used by the action gate to seed a
    /// cycle whose position-1 entry was already captured.
    pub fn seed(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let _held = self.lock();
        self.store.save_progress(record)
    }

    /// Discard the group's progress record, completing the cycle. Returns
    /// `false` when no cycle was open (a benign no-op, not an error).
    pub fn clear(&self, key: &GroupKey) -> Result<bool, StorageError> {
        let _held = self.lock();
        let Some(record) = self.store.load_progress(key)? else {
            return Ok(false);
        };
        self.store.delete_progress(key)?;
        self.sink.emit(Event::CycleCleared {
            group: *key,
            rounds_recorded: record.rounds.len(),
            at: Utc::now(),
        });
        Ok(true)
    }

    /// Read-only view of the open record, if any.
    pub fn snapshot(&self, key: &GroupKey) -> Result<Option<ProgressRecord>, StorageError> {
        let _held = self.lock();
        self.store.load_progress(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::storage::MemoryStore;
    use uuid::Uuid;

    fn fresh() -> (CycleProgressStore, GroupKey) {
        let store = CycleProgressStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemorySink::new()),
        );
        let key = GroupKey::new(Uuid::new_v4(), Uuid::new_v4());
        (store, key)
    }

    #[test]
    fn test_position_is_one_without_record() {
        let (store, key) = fresh();
        assert_eq!(store.current_position(&key).unwrap(), 1);
    }

    #[test]
    fn test_position_is_rounds_plus_one() {
        let (store, key) = fresh();
        for expected in 2..=5u32 {
            store
                .record_round(&key, Utc::now(), BTreeMap::new())
                .unwrap();
            assert_eq!(store.current_position(&key).unwrap(), expected);
        }
    }

    #[test]
    fn test_record_round_merges_captured_data() {
        let (store, key) = fresh();
        let mut first = BTreeMap::new();
        first.insert("mood".to_string(), Value::from(4));
        store.record_round(&key, Utc::now(), first).unwrap();

        let mut second = BTreeMap::new();
        second.insert("weight".to_string(), Value::from(70.5));
        store.record_round(&key, Utc::now(), second).unwrap();

        let record = store.snapshot(&key).unwrap().unwrap();
        assert_eq!(record.captured.len(), 2);
        assert_eq!(record.captured["mood"], Value::from(4));
        assert_eq!(record.captured["weight"], Value::from(70.5));
    }

    #[test]
    fn test_clear_without_open_cycle_is_noop() {
        let (store, key) = fresh();
        assert!(!store.clear(&key).unwrap());
        assert_eq!(store.current_position(&key).unwrap(), 1);
    }

    #[test]
    fn test_clear_resets_position() {
        let (store, key) = fresh();
        store
            .record_round(&key, Utc::now(), BTreeMap::new())
            .unwrap();
        assert!(store.clear(&key).unwrap());
        assert_eq!(store.current_position(&key).unwrap(), 1);
        assert!(store.snapshot(&key).unwrap().is_none());
    }

    #[test]
    fn test_groups_are_independent() {
        let (store, key) = fresh();
        let other = GroupKey::new(key.project_id, Uuid::new_v4());
        store
            .record_round(&key, Utc::now(), BTreeMap::new())
            .unwrap();
        assert_eq!(store.current_position(&key).unwrap(), 2);
        assert_eq!(store.current_position(&other).unwrap(), 1);
    }
}
