//! SQLite-backed [`Persistence`] implementation.
//!
//! Records are stored as JSON payloads keyed by their identities; the
//! scheduler core re-derives all transient state (cycle position, pool
//! membership) from what it reads back here, so the schema stays a plain
//! key-to-document mapping.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::counter::{Counter, IdPool};
use crate::cycle::gate::ActionState;
use crate::cycle::progress::ProgressRecord;
use crate::error::StorageError;
use crate::model::{Group, GroupKey, Project};

use super::{data_dir, Persistence};

/// SQLite database holding projects, groups, cycle progress, gating-action
/// state, the counter id pool and counters.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/trialtrack/trialtrack.db`.
    ///
    /// Creates the file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StorageError> {
        let dir = data_dir()
            .map_err(|err| StorageError::QueryFailed(format!("cannot create data directory: {err}")))?;
        Self::open_at(dir.join("trialtrack.db"))
    }

    /// Open the database at an explicit path (tests use a temp directory).
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|source| StorageError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS projects (
                    id   TEXT PRIMARY KEY,
                    data TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS groups (
                    project_id TEXT NOT NULL,
                    group_id   TEXT NOT NULL,
                    data       TEXT NOT NULL,
                    PRIMARY KEY (project_id, group_id)
                );

                CREATE TABLE IF NOT EXISTS progress (
                    project_id TEXT NOT NULL,
                    group_id   TEXT NOT NULL,
                    data       TEXT NOT NULL,
                    PRIMARY KEY (project_id, group_id)
                );

                CREATE TABLE IF NOT EXISTS action_state (
                    project_id TEXT NOT NULL,
                    group_id   TEXT NOT NULL,
                    data       TEXT NOT NULL,
                    PRIMARY KEY (project_id, group_id)
                );

                -- Single process-wide pool row.
                CREATE TABLE IF NOT EXISTS id_pool (
                    id   INTEGER PRIMARY KEY CHECK (id = 0),
                    data TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS counters (
                    id   INTEGER PRIMARY KEY,
                    data TEXT NOT NULL
                );",
            )
            .map_err(|err| StorageError::MigrationFailed(err.to_string()))
    }

    fn encode<T: Serialize>(value: &T) -> Result<String, StorageError> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode<T: DeserializeOwned>(data: &str) -> Result<T, StorageError> {
        Ok(serde_json::from_str(data)?)
    }

    fn load_keyed<T: DeserializeOwned>(
        &self,
        table: &str,
        key: &GroupKey,
    ) -> Result<Option<T>, StorageError> {
        let sql = format!("SELECT data FROM {table} WHERE project_id = ?1 AND group_id = ?2");
        let data: Option<String> = self
            .conn
            .query_row(
                &sql,
                params![key.project_id.to_string(), key.group_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        data.as_deref().map(Self::decode).transpose()
    }

    fn save_keyed<T: Serialize>(
        &self,
        table: &str,
        key: &GroupKey,
        value: &T,
    ) -> Result<(), StorageError> {
        let sql = format!(
            "INSERT INTO {table} (project_id, group_id, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(project_id, group_id) DO UPDATE SET data = excluded.data"
        );
        self.conn.execute(
            &sql,
            params![
                key.project_id.to_string(),
                key.group_id.to_string(),
                Self::encode(value)?
            ],
        )?;
        Ok(())
    }
}

impl Persistence for Database {
    fn save_project(&self, project: &Project) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO projects (id, data) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data",
            params![project.id.to_string(), Self::encode(project)?],
        )?;
        Ok(())
    }

    fn load_project(&self, id: Uuid) -> Result<Option<Project>, StorageError> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM projects WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        data.as_deref().map(Self::decode).transpose()
    }

    fn list_projects(&self) -> Result<Vec<Project>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT data FROM projects ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut projects = Vec::new();
        for row in rows {
            projects.push(Self::decode(&row?)?);
        }
        Ok(projects)
    }

    fn delete_project(&self, id: Uuid) -> Result<(), StorageError> {
        let id = id.to_string();
        self.conn
            .execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        for table in ["groups", "progress", "action_state"] {
            let sql = format!("DELETE FROM {table} WHERE project_id = ?1");
            self.conn.execute(&sql, params![id])?;
        }
        Ok(())
    }

    fn save_group(&self, group: &Group) -> Result<(), StorageError> {
        self.save_keyed("groups", &group.key, group)
    }

    fn load_group(&self, key: &GroupKey) -> Result<Option<Group>, StorageError> {
        self.load_keyed("groups", key)
    }

    fn list_groups(&self, project_id: Uuid) -> Result<Vec<Group>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM groups WHERE project_id = ?1 ORDER BY group_id")?;
        let rows = stmt.query_map(params![project_id.to_string()], |row| {
            row.get::<_, String>(0)
        })?;
        let mut groups = Vec::new();
        for row in rows {
            groups.push(Self::decode(&row?)?);
        }
        Ok(groups)
    }

    fn save_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        self.save_keyed("progress", &record.group, record)
    }

    fn load_progress(&self, key: &GroupKey) -> Result<Option<ProgressRecord>, StorageError> {
        self.load_keyed("progress", key)
    }

    fn delete_progress(&self, key: &GroupKey) -> Result<(), StorageError> {
        self.conn.execute(
            "DELETE FROM progress WHERE project_id = ?1 AND group_id = ?2",
            params![key.project_id.to_string(), key.group_id.to_string()],
        )?;
        Ok(())
    }

    fn save_action_state(&self, key: &GroupKey, state: &ActionState) -> Result<(), StorageError> {
        self.save_keyed("action_state", key, state)
    }

    fn load_action_state(&self, key: &GroupKey) -> Result<Option<ActionState>, StorageError> {
        self.load_keyed("action_state", key)
    }

    fn save_pool(&self, pool: &IdPool) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO id_pool (id, data) VALUES (0, ?1)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data",
            params![Self::encode(pool)?],
        )?;
        Ok(())
    }

    fn load_pool(&self) -> Result<Option<IdPool>, StorageError> {
        let data: Option<String> = self
            .conn
            .query_row("SELECT data FROM id_pool WHERE id = 0", [], |row| {
                row.get(0)
            })
            .optional()?;
        data.as_deref().map(Self::decode).transpose()
    }

    fn save_counter(&self, counter: &Counter) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO counters (id, data) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data",
            params![counter.id, Self::encode(counter)?],
        )?;
        Ok(())
    }

    fn load_counter(&self, id: u32) -> Result<Option<Counter>, StorageError> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM counters WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        data.as_deref().map(Self::decode).transpose()
    }

    fn list_counters(&self) -> Result<Vec<Counter>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT data FROM counters ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut counters = Vec::new();
        for row in rows {
            counters.push(Self::decode(&row?)?);
        }
        Ok(counters)
    }

    fn delete_counter(&self, id: u32) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM counters WHERE id = ?1", params![id])?;
        Ok(())
    }
}
