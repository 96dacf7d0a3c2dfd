//! Durable JSON persistence for tasks and player data
//!
//! Writes are atomic: serialize to a `.tmp` sibling, then rename over the
//! target. The previous generation is kept as a single `.backup` sibling
//! and used to retry a failed load exactly once.
//!
//! Load policy is asymmetric: an unrecoverable tasks document is a hard
//! error, an unrecoverable player document falls back to a fresh default.

use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::domain::{PlayerStatistics, PlayerStats, Task};

/// Current on-disk document version
pub const DATA_VERSION: &str = "1.0";
/// Suffix of the single-generation backup sibling
pub const BACKUP_SUFFIX: &str = ".backup";
/// Suffix of the transient atomic-write sibling
pub const TMP_SUFFIX: &str = ".tmp";
/// Tasks document file name
pub const TASKS_FILE: &str = "tasks.json";
/// Player document file name
pub const PLAYER_FILE: &str = "player.json";

/// Fields every persisted task entry must carry to be materialized
const REQUIRED_TASK_FIELDS: [&str; 5] = ["id", "title", "difficulty", "priority", "status"];

/// Persistence failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt document {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Serialize)]
struct TasksDocumentOut<'a> {
    tasks: &'a HashMap<String, Task>,
    version: &'a str,
    last_modified: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TasksDocumentIn {
    tasks: serde_json::Map<String, Value>,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Serialize)]
struct PlayerDocumentOut<'a> {
    player: &'a PlayerStats,
    statistics: PlayerStatistics,
    version: &'a str,
    last_modified: DateTime<Utc>,
}

#[derive(Deserialize)]
struct PlayerDocumentIn {
    player: Value,
    #[serde(default)]
    version: Option<String>,
}

/// File-backed store for the two persisted documents
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: PathBuf,
    tasks_path: PathBuf,
    player_path: PathBuf,
}

impl Store {
    /// Open (creating if needed) a store rooted at `data_dir`
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir).map_err(|source| StoreError::Write {
            path: data_dir.clone(),
            source,
        })?;

        debug!(data_dir = %data_dir.display(), "opened store");
        Ok(Self {
            tasks_path: data_dir.join(TASKS_FILE),
            player_path: data_dir.join(PLAYER_FILE),
            data_dir,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn tasks_path(&self) -> &Path {
        &self.tasks_path
    }

    pub fn player_path(&self) -> &Path {
        &self.player_path
    }

    /// Save the task map atomically, keeping the previous file as backup
    pub fn save_tasks(&self, tasks: &HashMap<String, Task>) -> Result<(), StoreError> {
        if self.tasks_path.exists()
            && let Err(e) = backup_file(&self.tasks_path)
        {
            warn!(error = %e, "failed to back up tasks file before save");
        }

        let doc = TasksDocumentOut {
            tasks,
            version: DATA_VERSION,
            last_modified: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&doc).map_err(|source| StoreError::Serialize {
            what: "tasks",
            source,
        })?;

        self.write_atomic(&self.tasks_path, &bytes)?;
        info!(count = tasks.len(), path = %self.tasks_path.display(), "saved tasks");
        Ok(())
    }

    /// Load the task map. Malformed entries are skipped with a warning; a
    /// corrupt document is retried once from backup before erroring.
    pub fn load_tasks(&self) -> Result<HashMap<String, Task>, StoreError> {
        if !self.tasks_path.exists() {
            debug!("tasks file does not exist, starting empty");
            return Ok(HashMap::new());
        }

        let mut retried = false;
        loop {
            match self.read_tasks_document() {
                Ok(tasks) => {
                    info!(count = tasks.len(), "loaded tasks");
                    return Ok(tasks);
                }
                Err(e @ StoreError::Corrupt { .. }) => {
                    if retried || !restore_from_backup(&self.tasks_path) {
                        return Err(e);
                    }
                    warn!("tasks file corrupt, restored from backup; retrying load");
                    retried = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Save the player record atomically, with a derived statistics block
    pub fn save_player(&self, player: &PlayerStats) -> Result<(), StoreError> {
        if self.player_path.exists()
            && let Err(e) = backup_file(&self.player_path)
        {
            warn!(error = %e, "failed to back up player file before save");
        }

        let doc = PlayerDocumentOut {
            player,
            statistics: player.statistics(),
            version: DATA_VERSION,
            last_modified: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&doc).map_err(|source| StoreError::Serialize {
            what: "player",
            source,
        })?;

        self.write_atomic(&self.player_path, &bytes)?;
        info!(path = %self.player_path.display(), "saved player data");
        Ok(())
    }

    /// Load the player record. A corrupt document is retried once from
    /// backup, then falls back to a default record rather than erroring.
    pub fn load_player(&self) -> Result<PlayerStats, StoreError> {
        if !self.player_path.exists() {
            debug!("player file does not exist, starting with defaults");
            return Ok(PlayerStats::default());
        }

        let mut retried = false;
        loop {
            match self.read_player_document() {
                Ok(player) => {
                    info!("loaded player data");
                    return Ok(player);
                }
                Err(StoreError::Corrupt { path, message }) => {
                    if !retried && restore_from_backup(&self.player_path) {
                        warn!("player file corrupt, restored from backup; retrying load");
                        retried = true;
                        continue;
                    }
                    warn!(%message, path = %path.display(), "player data unrecoverable, using defaults");
                    return Ok(PlayerStats::default());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Best-effort backup of both documents. Returns false if any copy
    /// failed.
    pub fn create_backup(&self) -> bool {
        let mut success = true;
        for path in [&self.tasks_path, &self.player_path] {
            if path.exists()
                && let Err(e) = backup_file(path)
            {
                error!(error = %e, path = %path.display(), "backup failed");
                success = false;
            }
        }
        success
    }

    fn read_tasks_document(&self) -> Result<HashMap<String, Task>, StoreError> {
        let text = fs::read_to_string(&self.tasks_path).map_err(|source| StoreError::Read {
            path: self.tasks_path.clone(),
            source,
        })?;

        let mut doc: TasksDocumentIn =
            serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
                path: self.tasks_path.clone(),
                message: e.to_string(),
            })?;

        if doc.version.as_deref() != Some(DATA_VERSION) {
            doc = migrate_tasks_document(doc);
        }

        let mut tasks = HashMap::with_capacity(doc.tasks.len());
        for (id, value) in doc.tasks {
            match materialize_task(value) {
                Ok(task) => {
                    tasks.insert(id, task);
                }
                Err(reason) => {
                    warn!(%id, %reason, "skipping malformed task entry");
                }
            }
        }
        Ok(tasks)
    }

    fn read_player_document(&self) -> Result<PlayerStats, StoreError> {
        let text = fs::read_to_string(&self.player_path).map_err(|source| StoreError::Read {
            path: self.player_path.clone(),
            source,
        })?;

        let mut doc: PlayerDocumentIn =
            serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
                path: self.player_path.clone(),
                message: e.to_string(),
            })?;

        if doc.version.as_deref() != Some(DATA_VERSION) {
            doc = migrate_player_document(doc);
        }

        serde_json::from_value(doc.player).map_err(|e| StoreError::Corrupt {
            path: self.player_path.clone(),
            message: e.to_string(),
        })
    }

    /// Write bytes to a `.tmp` sibling, then rename over the target. The
    /// temp file is removed on any failure so partial writes never
    /// accumulate.
    fn write_atomic(&self, target: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let tmp = tmp_path(target);
        let result = write_and_rename(&tmp, target, bytes);
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

fn write_and_rename(tmp: &Path, target: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write {
        path: tmp.to_path_buf(),
        source,
    };

    let mut file = fs::File::create(tmp).map_err(write_err)?;
    file.write_all(bytes).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);

    fs::rename(tmp, target).map_err(|source| StoreError::Write {
        path: target.to_path_buf(),
        source,
    })
}

/// Path of the backup sibling for a document
pub fn backup_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}{}", path.display(), BACKUP_SUFFIX))
}

/// Path of the transient atomic-write sibling for a document
pub fn tmp_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}{}", path.display(), TMP_SUFFIX))
}

/// Copy a document to its backup sibling
pub fn backup_file(path: &Path) -> Result<(), StoreError> {
    let backup = backup_path(path);
    fs::copy(path, &backup).map_err(|source| StoreError::Write {
        path: backup.clone(),
        source,
    })?;
    debug!(path = %backup.display(), "created backup");
    Ok(())
}

/// Copy a document's backup sibling back over the document. Returns false
/// if no backup exists or the copy failed.
pub fn restore_from_backup(path: &Path) -> bool {
    let backup = backup_path(path);
    if !backup.exists() {
        warn!(path = %path.display(), "no backup found to restore");
        return false;
    }
    match fs::copy(&backup, path) {
        Ok(_) => {
            info!(path = %path.display(), "restored from backup");
            true
        }
        Err(e) => {
            error!(error = %e, path = %path.display(), "failed to restore from backup");
            false
        }
    }
}

/// Materialize one task entry, checking the required fields first so the
/// skip warning names what is actually missing
fn materialize_task(value: Value) -> Result<Task, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "task entry is not an object".to_string())?;
    for field in REQUIRED_TASK_FIELDS {
        if !obj.contains_key(field) {
            return Err(format!("missing required field: {}", field));
        }
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

/// Migration hook for tasks documents. Version migrations slot in here;
/// currently just stamps the current version.
fn migrate_tasks_document(mut doc: TasksDocumentIn) -> TasksDocumentIn {
    info!(from = ?doc.version, to = DATA_VERSION, "migrating tasks document");
    doc.version = Some(DATA_VERSION.to_string());
    doc
}

/// Migration hook for player documents
fn migrate_player_document(mut doc: PlayerDocumentIn) -> PlayerDocumentIn {
    info!(from = ?doc.version, to = DATA_VERSION, "migrating player document");
    doc.version = Some(DATA_VERSION.to_string());
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Difficulty, Priority};
    use tempfile::tempdir;

    fn sample_tasks() -> HashMap<String, Task> {
        let mut tasks = HashMap::new();
        let task = Task::with_id("t-1", "First task", Difficulty::Medium, Priority::High);
        tasks.insert(task.id.clone(), task);
        let mut done = Task::with_id("t-2", "Second task", Difficulty::Hard, Priority::Low);
        done.notes = Some("with notes".into());
        done.complete().unwrap();
        tasks.insert(done.id.clone(), done);
        tasks
    }

    #[test]
    fn test_load_missing_files() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        assert!(store.load_tasks().unwrap().is_empty());
        assert_eq!(store.load_player().unwrap(), PlayerStats::default());
    }

    #[test]
    fn test_tasks_round_trip() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let tasks = sample_tasks();
        store.save_tasks(&tasks).unwrap();
        let loaded = store.load_tasks().unwrap();

        assert_eq!(loaded, tasks);
        // Nil notes and nil completed_at survive the trip
        assert!(loaded["t-1"].notes.is_none());
        assert!(loaded["t-1"].completed_at.is_none());
        assert!(loaded["t-2"].completed_at.is_some());
    }

    #[test]
    fn test_player_round_trip() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let mut player = PlayerStats::default();
        player.record_completion(65, Difficulty::Hard);
        store.save_player(&player).unwrap();

        assert_eq!(store.load_player().unwrap(), player);
    }

    #[test]
    fn test_document_envelope_shape() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();
        store.save_tasks(&sample_tasks()).unwrap();
        store.save_player(&PlayerStats::default()).unwrap();

        let tasks_doc: Value =
            serde_json::from_str(&fs::read_to_string(store.tasks_path()).unwrap()).unwrap();
        assert_eq!(tasks_doc["version"], DATA_VERSION);
        assert!(tasks_doc["last_modified"].is_string());
        assert!(tasks_doc["tasks"].is_object());

        let player_doc: Value =
            serde_json::from_str(&fs::read_to_string(store.player_path()).unwrap()).unwrap();
        assert!(player_doc["player"].is_object());
        assert!(player_doc["statistics"].is_object());
        assert_eq!(player_doc["statistics"]["level"], 1);
    }

    #[test]
    fn test_second_save_creates_backup() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        store.save_tasks(&sample_tasks()).unwrap();
        assert!(!backup_path(store.tasks_path()).exists());

        store.save_tasks(&HashMap::new()).unwrap();
        assert!(backup_path(store.tasks_path()).exists());

        // The backup holds the previous generation
        let backup_text = fs::read_to_string(backup_path(store.tasks_path())).unwrap();
        let doc: Value = serde_json::from_str(&backup_text).unwrap();
        assert_eq!(doc["tasks"].as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_no_tmp_files_after_save() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();
        store.save_tasks(&sample_tasks()).unwrap();
        store.save_player(&PlayerStats::default()).unwrap();

        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(TMP_SUFFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_corrupt_tasks_restores_from_backup() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let tasks = sample_tasks();
        store.save_tasks(&tasks).unwrap();
        store.save_tasks(&tasks).unwrap(); // second save creates the backup

        fs::write(store.tasks_path(), b"{ not json at all").unwrap();
        let loaded = store.load_tasks().unwrap();
        assert_eq!(loaded, tasks);
    }

    #[test]
    fn test_corrupt_tasks_without_backup_errors() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        fs::write(store.tasks_path(), b"garbage").unwrap();
        let err = store.load_tasks().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_corrupt_backup_does_not_loop() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        fs::write(store.tasks_path(), b"garbage").unwrap();
        fs::write(backup_path(store.tasks_path()), b"also garbage").unwrap();

        // One restore attempt, then a hard error
        let err = store.load_tasks().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_corrupt_player_falls_back_to_default() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        fs::write(store.player_path(), b"garbage").unwrap();
        assert_eq!(store.load_player().unwrap(), PlayerStats::default());
    }

    #[test]
    fn test_malformed_task_entry_skipped() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let good = Task::with_id("good", "Valid task", Difficulty::Easy, Priority::Low);
        let doc = serde_json::json!({
            "tasks": {
                "good": serde_json::to_value(&good).unwrap(),
                "bad": { "id": "bad", "title": "No status" },
                "worse": "not even an object",
            },
            "version": DATA_VERSION,
            "last_modified": Utc::now(),
        });
        fs::write(store.tasks_path(), serde_json::to_vec(&doc).unwrap()).unwrap();

        let loaded = store.load_tasks().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("good"));
    }

    #[test]
    fn test_version_mismatch_passes_migration() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let good = Task::with_id("t-1", "Old version", Difficulty::Easy, Priority::Low);
        let doc = serde_json::json!({
            "tasks": { "t-1": serde_json::to_value(&good).unwrap() },
            "version": "0.9",
            "last_modified": Utc::now(),
        });
        fs::write(store.tasks_path(), serde_json::to_vec(&doc).unwrap()).unwrap();

        let loaded = store.load_tasks().unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_backup_and_restore_helpers() {
        let temp = tempdir().unwrap();
        let target = temp.path().join("doc.json");
        fs::write(&target, b"original").unwrap();

        backup_file(&target).unwrap();
        fs::write(&target, b"clobbered").unwrap();

        assert!(restore_from_backup(&target));
        assert_eq!(fs::read(&target).unwrap(), b"original");
    }

    #[test]
    fn test_restore_without_backup_is_false() {
        let temp = tempdir().unwrap();
        let target = temp.path().join("doc.json");
        assert!(!restore_from_backup(&target));
    }
}
