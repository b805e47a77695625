//! # TrialTrack Core Library
//!
//! This library provides the core business logic for TrialTrack, a tracker
//! for user-defined experiments whose variables report at fixed positions
//! within a repeating measurement cycle. All operations are available via a
//! standalone CLI binary; any GUI is expected to be a thin layer over the
//! same core library.
//!
//! ## Architecture
//!
//! - **Cycle scheduler**: position derivation, gating-action decisions and
//!   variable classification, driven entirely by what persistence reads back
//! - **Counters**: recyclable-id counter service backed by a free-list pool
//! - **Storage**: SQLite persistence and TOML-based configuration
//! - **Events**: every state change surfaces on an injected event sink
//!
//! ## Key Components
//!
//! - [`CycleProgressStore`]: derives the current cycle position
//! - [`ActionGate`]: decides whether the gating action occupies a slot
//! - [`VariableResolver`]: classifies what is due at the current position
//! - [`CounterService`]: counter lifecycle over the recyclable [`IdPool`]
//! - [`Database`]: SQLite persistence behind the [`Persistence`] trait

pub mod counter;
pub mod cycle;
pub mod error;
pub mod events;
pub mod model;
pub mod storage;

pub use counter::{Counter, CounterService, IdPool};
pub use cycle::{
    ActionGate, ActionState, CycleProgressStore, GateDecision, ProgressRecord, ResolutionResult,
    VariableResolver,
};
pub use error::{CoreError, PoolError, Result, StorageError, ValidationError};
pub use events::{Event, EventSink, MemorySink, NullSink};
pub use model::{
    GatingActionConfig, Group, GroupKey, GroupKind, ModuleKind, Project, ReportKind,
    VariableConfig, VariableRegistry,
};
pub use storage::{Config, Database, MemoryStore, Persistence};
