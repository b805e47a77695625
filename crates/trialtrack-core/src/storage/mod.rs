//! Persistence layer: the `Persistence` trait, an in-memory store, the
//! SQLite database and TOML configuration.
//!
//! The scheduler core calls into persistence synchronously after each
//! state-mutating decision and treats it as fail-stop: a storage failure
//! surfaces to the caller as a [`StorageError`], never silently dropped.

mod config;
pub mod db;

pub use config::Config;
pub use db::Database;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use uuid::Uuid;

use crate::counter::{Counter, IdPool};
use crate::cycle::gate::ActionState;
use crate::cycle::progress::ProgressRecord;
use crate::error::StorageError;
use crate::model::{Group, GroupKey, Project};

/// Returns `~/.config/trialtrack[-dev]/` based on TRIALTRACK_ENV.
///
/// Set TRIALTRACK_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the config directory cannot be created.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TRIALTRACK_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("trialtrack-dev")
    } else {
        base_dir.join("trialtrack")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Durable storage for everything the scheduler core decides about.
///
/// Implemented by [`Database`] (SQLite) for real use and [`MemoryStore`]
/// for tests and ephemeral sessions.
pub trait Persistence {
    fn save_project(&self, project: &Project) -> Result<(), StorageError>;
    fn load_project(&self, id: Uuid) -> Result<Option<Project>, StorageError>;
    fn list_projects(&self) -> Result<Vec<Project>, StorageError>;
    fn delete_project(&self, id: Uuid) -> Result<(), StorageError>;

    fn save_group(&self, group: &Group) -> Result<(), StorageError>;
    fn load_group(&self, key: &GroupKey) -> Result<Option<Group>, StorageError>;
    fn list_groups(&self, project_id: Uuid) -> Result<Vec<Group>, StorageError>;

    fn save_progress(&self, record: &ProgressRecord) -> Result<(), StorageError>;
    fn load_progress(&self, key: &GroupKey) -> Result<Option<ProgressRecord>, StorageError>;
    fn delete_progress(&self, key: &GroupKey) -> Result<(), StorageError>;

    fn save_action_state(&self, key: &GroupKey, state: &ActionState) -> Result<(), StorageError>;
    fn load_action_state(&self, key: &GroupKey) -> Result<Option<ActionState>, StorageError>;

    fn save_pool(&self, pool: &IdPool) -> Result<(), StorageError>;
    fn load_pool(&self) -> Result<Option<IdPool>, StorageError>;

    fn save_counter(&self, counter: &Counter) -> Result<(), StorageError>;
    fn load_counter(&self, id: u32) -> Result<Option<Counter>, StorageError>;
    fn list_counters(&self) -> Result<Vec<Counter>, StorageError>;
    fn delete_counter(&self, id: u32) -> Result<(), StorageError>;
}

#[derive(Default)]
struct MemoryInner {
    projects: BTreeMap<Uuid, Project>,
    groups: BTreeMap<GroupKey, Group>,
    progress: BTreeMap<GroupKey, ProgressRecord>,
    actions: BTreeMap<GroupKey, ActionState>,
    pool: Option<IdPool>,
    counters: BTreeMap<u32, Counter>,
}

/// In-memory [`Persistence`] implementation.
///
/// Used by tests and by callers that want an ephemeral session. Supports
/// one-shot fault injection so callers can exercise fail-stop paths.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    fail_next_save: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `save_*` call fail with a storage error.
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }

    fn check_fault(&self) -> Result<(), StorageError> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(StorageError::QueryFailed(
                "injected fault: save refused".to_string(),
            ));
        }
        Ok(())
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().expect("memory store lock poisoned")
    }
}

impl Persistence for MemoryStore {
    fn save_project(&self, project: &Project) -> Result<(), StorageError> {
        self.check_fault()?;
        self.inner().projects.insert(project.id, project.clone());
        Ok(())
    }

    fn load_project(&self, id: Uuid) -> Result<Option<Project>, StorageError> {
        Ok(self.inner().projects.get(&id).cloned())
    }

    fn list_projects(&self) -> Result<Vec<Project>, StorageError> {
        Ok(self.inner().projects.values().cloned().collect())
    }

    fn delete_project(&self, id: Uuid) -> Result<(), StorageError> {
        let mut inner = self.inner();
        inner.projects.remove(&id);
        inner.groups.retain(|key, _| key.project_id != id);
        inner.progress.retain(|key, _| key.project_id != id);
        inner.actions.retain(|key, _| key.project_id != id);
        Ok(())
    }

    fn save_group(&self, group: &Group) -> Result<(), StorageError> {
        self.check_fault()?;
        self.inner().groups.insert(group.key, group.clone());
        Ok(())
    }

    fn load_group(&self, key: &GroupKey) -> Result<Option<Group>, StorageError> {
        Ok(self.inner().groups.get(key).cloned())
    }

    fn list_groups(&self, project_id: Uuid) -> Result<Vec<Group>, StorageError> {
        Ok(self
            .inner()
            .groups
            .values()
            .filter(|group| group.key.project_id == project_id)
            .cloned()
            .collect())
    }

    fn save_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        self.check_fault()?;
        self.inner().progress.insert(record.group, record.clone());
        Ok(())
    }

    fn load_progress(&self, key: &GroupKey) -> Result<Option<ProgressRecord>, StorageError> {
        Ok(self.inner().progress.get(key).cloned())
    }

    fn delete_progress(&self, key: &GroupKey) -> Result<(), StorageError> {
        self.inner().progress.remove(key);
        Ok(())
    }

    fn save_action_state(&self, key: &GroupKey, state: &ActionState) -> Result<(), StorageError> {
        self.check_fault()?;
        self.inner().actions.insert(*key, state.clone());
        Ok(())
    }

    fn load_action_state(&self, key: &GroupKey) -> Result<Option<ActionState>, StorageError> {
        Ok(self.inner().actions.get(key).cloned())
    }

    fn save_pool(&self, pool: &IdPool) -> Result<(), StorageError> {
        self.check_fault()?;
        self.inner().pool = Some(pool.clone());
        Ok(())
    }

    fn load_pool(&self) -> Result<Option<IdPool>, StorageError> {
        Ok(self.inner().pool.clone())
    }

    fn save_counter(&self, counter: &Counter) -> Result<(), StorageError> {
        self.check_fault()?;
        self.inner().counters.insert(counter.id, counter.clone());
        Ok(())
    }

    fn load_counter(&self, id: u32) -> Result<Option<Counter>, StorageError> {
        Ok(self.inner().counters.get(&id).cloned())
    }

    fn list_counters(&self) -> Result<Vec<Counter>, StorageError> {
        Ok(self.inner().counters.values().cloned().collect())
    }

    fn delete_counter(&self, id: u32) -> Result<(), StorageError> {
        self.inner().counters.remove(&id);
        Ok(())
    }
}
