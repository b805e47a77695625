//! Current-position variable resolution and classification.
//!
//! The resolver answers "what is due right now" for a group: it derives the
//! current cycle position, lets the gate adjust a fresh cycle's start, then
//! classifies every variable registered at that position by its report kind.
//! Resolution never mutates reporting state, so callers can re-invoke it
//! freely to refresh a display.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::events::{Event, EventSink};
use crate::model::{Group, ReportKind, VariableRegistry};

use super::gate::ActionGate;
use super::progress::CycleProgressStore;

/// What the current position asks of the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Resolved 1-based cycle position.
    pub position: u32,
    /// Variables needing manual user input, by name.
    pub manual: Vec<String>,
    /// Variables due to report here (manual + auto-capture).
    pub report_count: u32,
    /// A time-difference variable is registered at this position.
    pub time_difference_present: bool,
    /// Auto-capture variables whose collaborators should populate them now.
    pub auto_triggered: Vec<String>,
}

impl ResolutionResult {
    fn at(position: u32) -> Self {
        Self {
            position,
            manual: Vec::new(),
            report_count: 0,
            time_difference_present: false,
            auto_triggered: Vec::new(),
        }
    }
}

/// Service resolving which variables are due at the current position.
pub struct VariableResolver {
    progress: Arc<CycleProgressStore>,
    gate: Arc<ActionGate>,
    sink: Arc<dyn EventSink>,
}

impl VariableResolver {
    pub fn new(
        progress: Arc<CycleProgressStore>,
        gate: Arc<ActionGate>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            progress,
            gate,
            sink,
        }
    }

    /// Resolve and classify the variables due at the group's current
    /// position.
    ///
    /// On a brand-new cycle the gate may advance the starting position past
    /// the gating action's slot. Selection includes exactly the variables
    /// whose position set contains the resolved position; order among them
    /// carries no meaning. Auto-capture population is a side effect reported
    /// to the caller, never performed here.
    pub fn resolve_current_reporting(&self, group: &mut Group) -> Result<ResolutionResult> {
        group.validate()?;

        let mut position = self.progress.current_position(&group.key)?;
        if position == 1 {
            position = self.gate.resolve(group)?.position;
        }

        let mut result = ResolutionResult::at(position);
        for var in group.variables().values() {
            if !var.positions.contains(&position) {
                continue;
            }
            match var.kind {
                ReportKind::Manual => {
                    result.manual.push(var.name.clone());
                    result.report_count += 1;
                }
                ReportKind::AutoCapture => {
                    result.report_count += 1;
                    result.auto_triggered.push(var.name.clone());
                    self.sink.emit(Event::AutoCaptureTriggered {
                        group: group.key,
                        variable: var.name.clone(),
                        at: Utc::now(),
                    });
                }
                // Populated later from its dependents; never due on its own.
                ReportKind::Computation => {}
                ReportKind::TimeDifference => {
                    result.time_difference_present = true;
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::model::{
        GatingActionConfig, GroupKey, GroupKind, ModuleKind, VariableConfig,
    };
    use crate::storage::{MemoryStore, Persistence};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn services() -> (VariableResolver, Arc<CycleProgressStore>, Arc<ActionGate>) {
        let store: Arc<dyn Persistence> = Arc::new(MemoryStore::new());
        let sink: Arc<dyn EventSink> = Arc::new(MemorySink::new());
        let progress = Arc::new(CycleProgressStore::new(store.clone(), sink.clone()));
        let gate = Arc::new(ActionGate::new(store, progress.clone(), sink.clone()));
        let resolver = VariableResolver::new(progress.clone(), gate.clone(), sink);
        (resolver, progress, gate)
    }

    /// cycleLength=3; "steps" auto-capture at {2}; "mood" manual at {1};
    /// "duration" time-difference at {3}.
    fn sample_group() -> Group {
        let key = GroupKey::new(Uuid::new_v4(), Uuid::new_v4());
        let gating = GatingActionConfig {
            occurs_before_inputs: false,
            recurs_every_cycle: true,
            qualifier_count: 0,
        };
        let mut group = Group::new(key, GroupKind::Control, 3, gating);
        group.insert_variable(
            VariableConfig::new("steps", ModuleKind::StepCount, [2].into_iter().collect())
                .with_kind(ReportKind::AutoCapture),
        );
        group.insert_variable(
            VariableConfig::new("mood", ModuleKind::Scale, [1].into_iter().collect())
                .with_kind(ReportKind::Manual),
        );
        group.insert_variable(
            VariableConfig::new("duration", ModuleKind::Stopwatch, [3].into_iter().collect())
                .with_kind(ReportKind::TimeDifference),
        );
        group
    }

    fn advance(progress: &CycleProgressStore, group: &Group, rounds: u32) {
        for _ in 0..rounds {
            progress
                .record_round(&group.key, Utc::now(), BTreeMap::new())
                .unwrap();
        }
    }

    #[test]
    fn test_fresh_cycle_selects_position_one_variables() {
        let (resolver, _, _) = services();
        let mut group = sample_group();
        let result = resolver.resolve_current_reporting(&mut group).unwrap();
        assert_eq!(result.position, 1);
        assert_eq!(result.manual, vec!["mood".to_string()]);
        assert_eq!(result.report_count, 1);
        assert!(!result.time_difference_present);
        assert!(result.auto_triggered.is_empty());
    }

    #[test]
    fn test_second_position_triggers_auto_capture() {
        let (resolver, progress, _) = services();
        let mut group = sample_group();
        advance(&progress, &group, 1);
        let result = resolver.resolve_current_reporting(&mut group).unwrap();
        assert_eq!(result.position, 2);
        assert!(result.manual.is_empty());
        assert_eq!(result.report_count, 1);
        assert_eq!(result.auto_triggered, vec!["steps".to_string()]);
    }

    #[test]
    fn test_final_position_flags_time_difference_only() {
        let (resolver, progress, _) = services();
        let mut group = sample_group();
        advance(&progress, &group, 2);
        let result = resolver.resolve_current_reporting(&mut group).unwrap();
        assert_eq!(result.position, 3);
        assert!(result.manual.is_empty());
        assert_eq!(result.report_count, 0);
        assert!(result.time_difference_present);
        assert!(result.auto_triggered.is_empty());
    }

    #[test]
    fn test_computation_variables_are_skipped() {
        let (resolver, _, _) = services();
        let mut group = sample_group();
        group.insert_variable(
            VariableConfig::new("net_intake", ModuleKind::Tally, [1].into_iter().collect())
                .with_kind(ReportKind::Computation),
        );
        let result = resolver.resolve_current_reporting(&mut group).unwrap();
        assert_eq!(result.manual, vec!["mood".to_string()]);
        assert_eq!(result.report_count, 1);
    }

    #[test]
    fn test_shared_position_selects_all() {
        let (resolver, _, _) = services();
        let mut group = sample_group();
        group.insert_variable(
            VariableConfig::new("weight", ModuleKind::Numeric, [1].into_iter().collect())
                .with_kind(ReportKind::Manual),
        );
        let result = resolver.resolve_current_reporting(&mut group).unwrap();
        assert_eq!(result.report_count, 2);
        assert!(result.manual.contains(&"mood".to_string()));
        assert!(result.manual.contains(&"weight".to_string()));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let (resolver, progress, _) = services();
        let mut group = sample_group();
        advance(&progress, &group, 1);
        let first = resolver.resolve_current_reporting(&mut group).unwrap();
        let second = resolver.resolve_current_reporting(&mut group).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_gated_fresh_cycle_starts_at_two_with_seeded_record() {
        let (resolver, progress, gate) = services();
        let key = GroupKey::new(Uuid::new_v4(), Uuid::new_v4());
        let gating = GatingActionConfig {
            occurs_before_inputs: true,
            recurs_every_cycle: false,
            qualifier_count: 2,
        };
        let mut group = Group::new(key, GroupKind::Comparison, 3, gating);
        group.insert_variable(
            VariableConfig::new("steps", ModuleKind::StepCount, [2].into_iter().collect())
                .with_kind(ReportKind::AutoCapture),
        );

        gate.on_action_occurred(&mut group, Utc::now()).unwrap();
        gate.supply_qualifier_data(&group, serde_json::json!({"items": 2}))
            .unwrap();
        group.gate_override = false;

        let result = resolver.resolve_current_reporting(&mut group).unwrap();
        assert_eq!(result.position, 2);
        assert_eq!(result.auto_triggered, vec!["steps".to_string()]);

        // The seeded record carries the action data as the position-1 entry,
        // and re-resolution sees the same position without consulting the
        // gate again.
        let record = progress.snapshot(&key).unwrap().unwrap();
        assert_eq!(record.rounds.len(), 1);
        let again = resolver.resolve_current_reporting(&mut group).unwrap();
        assert_eq!(again, result);
    }

    #[test]
    fn test_position_past_cycle_end_selects_nothing() {
        let (resolver, progress, _) = services();
        let mut group = sample_group();
        advance(&progress, &group, 3);
        let result = resolver.resolve_current_reporting(&mut group).unwrap();
        assert_eq!(result.position, 4);
        assert_eq!(result.report_count, 0);
        assert!(result.manual.is_empty());
    }
}
