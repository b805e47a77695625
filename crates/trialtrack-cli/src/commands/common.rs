//! Shared service construction and argument parsing for CLI commands.

use std::collections::BTreeSet;
use std::sync::Arc;

use trialtrack_core::{
    ActionGate, CoreError, CounterService, CycleProgressStore, Database, Group, GroupKey,
    NullSink, Persistence, StorageError, VariableResolver,
};
use uuid::Uuid;

/// The core services every command works against, wired to the shared
/// SQLite database.
pub struct Services {
    pub db: Arc<Database>,
    pub progress: Arc<CycleProgressStore>,
    pub gate: Arc<ActionGate>,
    pub resolver: VariableResolver,
    pub counters: CounterService,
}

/// Open the database and construct the core services over it.
pub fn open_services() -> Result<Services, CoreError> {
    let db = Arc::new(Database::open()?);
    let store: Arc<dyn Persistence> = db.clone();
    let sink = Arc::new(NullSink);
    let progress = Arc::new(CycleProgressStore::new(store.clone(), sink.clone()));
    let gate = Arc::new(ActionGate::new(store.clone(), progress.clone(), sink.clone()));
    let resolver = VariableResolver::new(progress.clone(), gate.clone(), sink.clone());
    let counters = CounterService::new(store, sink)?;
    Ok(Services {
        db,
        progress,
        gate,
        resolver,
        counters,
    })
}

pub fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, CoreError> {
    Uuid::parse_str(raw).map_err(|_| CoreError::Custom(format!("invalid {what} id: {raw}")))
}

pub fn parse_key(project: &str, group: &str) -> Result<GroupKey, CoreError> {
    Ok(GroupKey::new(
        parse_uuid(project, "project")?,
        parse_uuid(group, "group")?,
    ))
}

/// Load and validate a group, or fail with a not-found error.
pub fn load_group(db: &Database, key: &GroupKey) -> Result<Group, CoreError> {
    let group = db
        .load_group(key)?
        .ok_or(CoreError::Storage(StorageError::NotFound {
            what: "group",
            id: key.to_string(),
        }))?;
    group.validate()?;
    Ok(group)
}

/// Parse a comma-separated position list like "1,3,7".
pub fn parse_positions(raw: &str) -> Result<BTreeSet<u32>, CoreError> {
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| CoreError::Custom(format!("invalid position: {part}")))
        })
        .collect()
}

/// Parse a `name=value` pair; the value is taken as JSON when it parses,
/// otherwise as a plain string.
pub fn parse_captured(raw: &str) -> Result<(String, serde_json::Value), CoreError> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| CoreError::Custom(format!("expected name=value, got: {raw}")))?;
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((name.to_string(), value))
}
