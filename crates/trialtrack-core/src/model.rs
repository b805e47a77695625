//! Project, group and variable configuration model.
//!
//! Groups are the unit the scheduler operates on: each group owns a variable
//! map, a cycle length and a gating-action configuration. All group-scoped
//! state elsewhere in the crate is keyed by [`GroupKey`], a
//! (project id, group id) pair, so the model stays correct whether a project
//! has one group or several.
//!
//! Validation is eager: [`Group::validate`] runs when a group is rebuilt from
//! storage or created by a caller, and configuration-shape problems surface
//! there instead of inside the resolver.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Identity of a group, qualified by its owning project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub project_id: Uuid,
    pub group_id: Uuid,
}

impl GroupKey {
    pub fn new(project_id: Uuid, group_id: Uuid) -> Self {
        Self {
            project_id,
            group_id,
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project_id, self.group_id)
    }
}

/// Role of a group within its project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Control,
    Comparison,
}

/// How a variable acquires its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// The user types the value in when the variable is due.
    Manual,
    /// A collaborator populates the value without user interaction.
    AutoCapture,
    /// Derived from other variables after they have reported; never due on
    /// its own.
    Computation,
    /// Elapsed time between cycle anchors; reported at the final position.
    TimeDifference,
}

/// The closed set of capture modules a variable can belong to.
///
/// Module identity used to travel as a free-form tag string; it is now a
/// closed enum so every classification site matches exhaustively. New modules
/// require a variant here and a tag in [`ModuleKind::from_tag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    /// Free numeric entry (weight, dose, ...).
    Numeric,
    /// Bounded ordinal scale (mood 1-5, pain 0-10).
    Scale,
    /// Free-text note.
    Note,
    /// Structured food-intake entry.
    FoodIntake,
    /// Step count pulled from a device.
    StepCount,
    /// Elapsed-time capture between cycle anchors.
    Stopwatch,
    /// Event counter living outside the cycle (see the `counter` module).
    Tally,
}

impl ModuleKind {
    /// Factory from a stored tag string. Returns an error for tags outside
    /// the known module set rather than defaulting.
    pub fn from_tag(tag: &str) -> Result<Self, ValidationError> {
        match tag {
            "numeric" => Ok(Self::Numeric),
            "scale" => Ok(Self::Scale),
            "note" => Ok(Self::Note),
            "food_intake" => Ok(Self::FoodIntake),
            "step_count" => Ok(Self::StepCount),
            "stopwatch" => Ok(Self::Stopwatch),
            "tally" => Ok(Self::Tally),
            other => Err(ValidationError::UnknownModuleTag(other.to_string())),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Scale => "scale",
            Self::Note => "note",
            Self::FoodIntake => "food_intake",
            Self::StepCount => "step_count",
            Self::Stopwatch => "stopwatch",
            Self::Tally => "tally",
        }
    }

    /// Report kind a variable of this module gets unless configured otherwise.
    pub fn default_report_kind(&self) -> ReportKind {
        match self {
            Self::Numeric | Self::Scale | Self::Note | Self::FoodIntake => ReportKind::Manual,
            Self::StepCount => ReportKind::AutoCapture,
            Self::Stopwatch => ReportKind::TimeDifference,
            Self::Tally => ReportKind::Computation,
        }
    }
}

/// One variable registered with a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableConfig {
    pub name: String,
    pub module: ModuleKind,
    /// 1-based cycle positions at which this variable must report.
    pub positions: BTreeSet<u32>,
    pub kind: ReportKind,
}

impl VariableConfig {
    pub fn new(name: impl Into<String>, module: ModuleKind, positions: BTreeSet<u32>) -> Self {
        Self {
            name: name.into(),
            module,
            positions,
            kind: module.default_report_kind(),
        }
    }

    pub fn with_kind(mut self, kind: ReportKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Descriptor of the gating action that separates the before/after variable
/// sets and may itself occupy a cycle slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatingActionConfig {
    /// Whether the action is scheduled before the primary variable set.
    pub occurs_before_inputs: bool,
    /// Whether the action repeats in every cycle (a recurring action never
    /// occupies a dedicated slot).
    pub recurs_every_cycle: bool,
    /// Number of qualifying sub-conditions that must capture data before the
    /// action counts as complete.
    pub qualifier_count: u32,
}

impl GatingActionConfig {
    /// Whether this action consumes a slot in the cycle.
    pub fn occupies_slot(&self) -> bool {
        self.occurs_before_inputs && !self.recurs_every_cycle && self.qualifier_count >= 1
    }
}

/// A user-defined experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub gating: GatingActionConfig,
    /// Names of variables reported before the gating action.
    pub before_action: Vec<String>,
    /// Names of variables reported after the gating action.
    pub after_action: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(title: impl Into<String>, gating: GatingActionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            gating,
            before_action: Vec::new(),
            after_action: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// One reporting track of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub key: GroupKey,
    pub kind: GroupKind,
    /// Total positions in one cycle, >= 1.
    pub cycle_length: u32,
    pub variables: BTreeMap<String, VariableConfig>,
    pub gating: GatingActionConfig,
    /// Single-use flag: when set, the next gate resolution keeps the action's
    /// slot instead of bypassing it, then clears the flag.
    #[serde(default)]
    pub gate_override: bool,
}

impl Group {
    pub fn new(key: GroupKey, kind: GroupKind, cycle_length: u32, gating: GatingActionConfig) -> Self {
        Self {
            key,
            kind,
            cycle_length,
            variables: BTreeMap::new(),
            gating,
            gate_override: false,
        }
    }

    /// Register a variable. The map key is the variable's own name.
    pub fn insert_variable(&mut self, config: VariableConfig) {
        self.variables.insert(config.name.clone(), config);
    }

    /// Eager configuration-shape validation, run whenever a group is rebuilt.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cycle_length < 1 {
            return Err(ValidationError::InvalidCycleLength {
                len: self.cycle_length,
            });
        }
        for (key, var) in &self.variables {
            if key != &var.name {
                return Err(ValidationError::NameMismatch {
                    key: key.clone(),
                    name: var.name.clone(),
                });
            }
            for &position in &var.positions {
                if !(1..=self.cycle_length).contains(&position) {
                    return Err(ValidationError::InvalidPosition {
                        variable: var.name.clone(),
                        position,
                        cycle_length: self.cycle_length,
                    });
                }
            }
            if var.kind == ReportKind::TimeDifference {
                let expected: BTreeSet<u32> = [self.cycle_length].into_iter().collect();
                if var.positions != expected {
                    return Err(ValidationError::MisplacedTimeDifference {
                        variable: var.name.clone(),
                        expected: self.cycle_length,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Read-only view of the variables registered for a group.
///
/// The scheduler core only ever reads through this seam; it never mutates the
/// registry. [`Group`] implements it directly; storage-backed callers can
/// implement it over a query instead.
pub trait VariableRegistry {
    fn variables(&self) -> &BTreeMap<String, VariableConfig>;
}

impl VariableRegistry for Group {
    fn variables(&self) -> &BTreeMap<String, VariableConfig> {
        &self.variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gating_none() -> GatingActionConfig {
        GatingActionConfig {
            occurs_before_inputs: false,
            recurs_every_cycle: true,
            qualifier_count: 0,
        }
    }

    fn group_with(cycle_length: u32) -> Group {
        let key = GroupKey::new(Uuid::new_v4(), Uuid::new_v4());
        Group::new(key, GroupKind::Control, cycle_length, gating_none())
    }

    #[test]
    fn test_module_tag_round_trip() {
        for module in [
            ModuleKind::Numeric,
            ModuleKind::Scale,
            ModuleKind::Note,
            ModuleKind::FoodIntake,
            ModuleKind::StepCount,
            ModuleKind::Stopwatch,
            ModuleKind::Tally,
        ] {
            assert_eq!(ModuleKind::from_tag(module.tag()).unwrap(), module);
        }
        assert!(matches!(
            ModuleKind::from_tag("bogus"),
            Err(ValidationError::UnknownModuleTag(_))
        ));
    }

    #[test]
    fn test_validate_accepts_in_range_positions() {
        let mut group = group_with(3);
        group.insert_variable(VariableConfig::new(
            "mood",
            ModuleKind::Scale,
            [1, 3].into_iter().collect(),
        ));
        assert!(group.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_position() {
        let mut group = group_with(3);
        group.insert_variable(VariableConfig::new(
            "mood",
            ModuleKind::Scale,
            [4].into_iter().collect(),
        ));
        assert!(matches!(
            group.validate(),
            Err(ValidationError::InvalidPosition { position: 4, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_cycle_length() {
        let group = group_with(0);
        assert!(matches!(
            group.validate(),
            Err(ValidationError::InvalidCycleLength { len: 0 })
        ));
    }

    #[test]
    fn test_time_difference_must_sit_at_final_position() {
        let mut group = group_with(3);
        group.insert_variable(VariableConfig::new(
            "duration",
            ModuleKind::Stopwatch,
            [2].into_iter().collect(),
        ));
        assert!(matches!(
            group.validate(),
            Err(ValidationError::MisplacedTimeDifference { expected: 3, .. })
        ));

        let mut group = group_with(3);
        group.insert_variable(VariableConfig::new(
            "duration",
            ModuleKind::Stopwatch,
            [3].into_iter().collect(),
        ));
        assert!(group.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_mismatched_map_key() {
        let mut group = group_with(2);
        group.variables.insert(
            "alias".to_string(),
            VariableConfig::new("mood", ModuleKind::Scale, [1].into_iter().collect()),
        );
        assert!(matches!(
            group.validate(),
            Err(ValidationError::NameMismatch { .. })
        ));
    }

    #[test]
    fn test_gating_slot_rule() {
        let occupies = GatingActionConfig {
            occurs_before_inputs: true,
            recurs_every_cycle: false,
            qualifier_count: 2,
        };
        assert!(occupies.occupies_slot());

        // Recurring actions never get a dedicated slot.
        let recurring = GatingActionConfig {
            occurs_before_inputs: true,
            recurs_every_cycle: true,
            qualifier_count: 2,
        };
        assert!(!recurring.occupies_slot());

        // No qualifiers means nothing to report at the slot.
        let bare = GatingActionConfig {
            occurs_before_inputs: true,
            recurs_every_cycle: false,
            qualifier_count: 0,
        };
        assert!(!bare.occupies_slot());
    }
}
