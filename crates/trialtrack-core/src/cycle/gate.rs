//! Gating-action slot decisions.
//!
//! The gating action separates a group's before/after variable sets. When it
//! occupies the first slot of a cycle and its data was already captured, a
//! fresh cycle starts at position 2 with the captured data folded in as the
//! position-1 entry, so the action is never re-reported. A group-level
//! single-use override keeps the slot in place instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result, ValidationError};
use crate::events::{Event, EventSink};
use crate::model::{GatingActionConfig, Group};
use crate::storage::Persistence;

use super::progress::{CycleProgressStore, ProgressRecord, GATING_DATA_KEY};

use std::sync::Arc;

/// Mutable lifecycle state of a group's gating action.
///
/// Rebuilt fresh from the group's stored configuration whenever no persisted
/// state exists. A completion timestamp is committed immediately when the
/// action has no qualifiers, and held pending otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionState {
    pub config: GatingActionConfig,
    /// Qualifier data captured so far, if any.
    pub qualifier_data: Option<Value>,
    /// Finalized completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Timestamp of an occurrence still waiting on qualifier data.
    pub pending_since: Option<DateTime<Utc>>,
}

impl ActionState {
    pub fn from_config(config: GatingActionConfig) -> Self {
        Self {
            config,
            qualifier_data: None,
            completed_at: None,
            pending_since: None,
        }
    }

    /// Whether both the qualifier data and the completion timestamp are
    /// already available for folding into a fresh cycle.
    pub fn ready_to_fold(&self) -> bool {
        self.qualifier_data.is_some() && self.completed_at.is_some()
    }
}

/// Outcome of resolving the gate on a fresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    /// Effective starting position after the gate's adjustment.
    pub position: u32,
    /// Whether the action's slot was skipped past.
    pub bypassed: bool,
    /// Whether captured action data was installed as the position-1 entry.
    pub seeded: bool,
}

impl GateDecision {
    fn pass_through() -> Self {
        Self {
            position: 1,
            bypassed: false,
            seeded: false,
        }
    }
}

/// Service deciding whether the gating action consumes a cycle slot.
pub struct ActionGate {
    store: Arc<dyn Persistence>,
    progress: Arc<CycleProgressStore>,
    sink: Arc<dyn EventSink>,
}

impl ActionGate {
    pub fn new(
        store: Arc<dyn Persistence>,
        progress: Arc<CycleProgressStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            progress,
            sink,
        }
    }

    fn load_or_fresh(&self, group: &Group) -> Result<ActionState, CoreError> {
        Ok(self
            .store
            .load_action_state(&group.key)?
            .unwrap_or_else(|| ActionState::from_config(group.gating.clone())))
    }

    /// Resolve the gate for a brand-new cycle (only called when the progress
    /// store reports position 1).
    ///
    /// The action occupies a slot iff it occurs before the primary inputs,
    /// does not recur every cycle, and has at least one qualifier. With the
    /// slot occupied and no override set, the effective starting position is
    /// 2, and already-captured action data seeds the progress record as the
    /// position-1 entry. An override is consumed (single-use) and keeps the
    /// slot.
    pub fn resolve(&self, group: &mut Group) -> Result<GateDecision> {
        if !group.gating.occupies_slot() {
            return Ok(GateDecision::pass_through());
        }

        if group.gate_override {
            group.gate_override = false;
            self.store.save_group(group)?;
            self.sink.emit(Event::GateOverrideConsumed {
                group: group.key,
                at: Utc::now(),
            });
            return Ok(GateDecision::pass_through());
        }

        let mut state = self.load_or_fresh(group)?;
        // The skipped slot consumes the cycle's first round either way, so
        // position arithmetic stays coherent with the progress record.
        let mut record = ProgressRecord::new(group.key);
        let seeded = if let (Some(completed_at), Some(data)) =
            (state.completed_at.take(), state.qualifier_data.take())
        {
            record.rounds.push(completed_at);
            record.captured.insert(GATING_DATA_KEY.to_string(), data);
            self.progress.seed(&record)?;
            // Folded-in data is consumed; the next cycle starts clean.
            self.store.save_action_state(&group.key, &state)?;
            true
        } else {
            record.rounds.push(Utc::now());
            self.progress.seed(&record)?;
            false
        };

        self.sink.emit(Event::GateBypassed {
            group: group.key,
            seeded,
            at: Utc::now(),
        });
        Ok(GateDecision {
            position: 2,
            bypassed: true,
            seeded,
        })
    }

    /// Commit an occurrence of the gating action.
    ///
    /// Without qualifiers the completion timestamp is finalized and persisted
    /// immediately. With qualifiers it is held pending until the data arrives
    /// through [`ActionGate::supply_qualifier_data`], and the group's
    /// override flag is set so the next resolution keeps the action's slot.
    pub fn on_action_occurred(&self, group: &mut Group, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.load_or_fresh(group)?;
        if group.gating.qualifier_count == 0 {
            state.completed_at = Some(at);
            self.store.save_action_state(&group.key, &state)?;
            self.sink.emit(Event::ActionCompleted {
                group: group.key,
                at,
            });
        } else {
            state.pending_since = Some(at);
            self.store.save_action_state(&group.key, &state)?;
            group.gate_override = true;
            self.store.save_group(group)?;
            self.sink.emit(Event::ActionPending {
                group: group.key,
                qualifier_count: group.gating.qualifier_count,
                at,
            });
        }
        Ok(())
    }

    /// Deliver qualifier data from the normal reporting flow. Promotes a
    /// pending occurrence timestamp to final.
    pub fn supply_qualifier_data(&self, group: &Group, data: Value) -> Result<()> {
        if group.gating.qualifier_count == 0 {
            return Err(CoreError::Validation(ValidationError::InvalidGatingAction(
                "action has no qualifiers to supply data for".to_string(),
            )));
        }
        let mut state = self.load_or_fresh(group)?;
        state.qualifier_data = Some(data);
        if let Some(pending) = state.pending_since.take() {
            state.completed_at = Some(pending);
            self.sink.emit(Event::ActionCompleted {
                group: group.key,
                at: pending,
            });
        }
        self.store.save_action_state(&group.key, &state)?;
        Ok(())
    }

    /// Current action state, for inspection by callers.
    pub fn state(&self, group: &Group) -> Result<ActionState> {
        self.load_or_fresh(group)
    }
}
