//! Structured observability events.
//!
//! Every state change in the scheduler core produces an [`Event`] on an
//! injected [`EventSink`]. The core never writes diagnostics to the console;
//! callers decide what to do with the stream (log it, render it, drop it).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::GroupKey;

/// Every state change in the scheduler core produces an Event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A round was recorded for a group's in-progress cycle.
    RoundRecorded {
        group: GroupKey,
        position: u32,
        at: DateTime<Utc>,
    },
    /// A group's progress record was discarded (cycle complete or refresh).
    CycleCleared {
        group: GroupKey,
        rounds_recorded: usize,
        at: DateTime<Utc>,
    },
    /// The gating action occupied position 1 and was skipped past.
    GateBypassed {
        group: GroupKey,
        /// Whether already-captured action data was folded in as the
        /// position-1 entry.
        seeded: bool,
        at: DateTime<Utc>,
    },
    /// A single-use override kept the gating action's slot in place.
    GateOverrideConsumed { group: GroupKey, at: DateTime<Utc> },
    /// The gating action's completion timestamp was finalized.
    ActionCompleted { group: GroupKey, at: DateTime<Utc> },
    /// The gating action occurred but its timestamp is held until qualifier
    /// data arrives.
    ActionPending {
        group: GroupKey,
        qualifier_count: u32,
        at: DateTime<Utc>,
    },
    /// An auto-capture variable is due and its collaborator should populate it.
    AutoCaptureTriggered {
        group: GroupKey,
        variable: String,
        at: DateTime<Utc>,
    },
    /// A counter id was issued from the pool.
    CounterAllocated {
        id: u32,
        variable: String,
        at: DateTime<Utc>,
    },
    /// A counter id was returned to the recyclable pool.
    CounterReleased { id: u32, at: DateTime<Utc> },
}

/// Sink for core events. Implementations must tolerate being called from
/// inside a core operation; they must not call back into the core.
pub trait EventSink {
    fn emit(&self, event: Event);
}

/// Sink that drops every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

/// Sink that buffers events in memory, for tests and the CLI's --events view.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: std::sync::Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("event sink poisoned").clone()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: Event) {
        self.events.lock().expect("event sink poisoned").push(event);
    }
}
