//! TaskService - the orchestrator owning the canonical task map and player
//! record
//!
//! Every mutating operation validates through [`crate::validation`],
//! computes rewards through [`crate::reward`], persists through
//! [`crate::store`], and notifies registered observers. Persistence
//! failures are handed to the [`crate::recovery`] manager and then
//! surfaced to the caller; the in-memory state keeps the change.

mod observer;

pub use observer::{ObserverId, ObserverRegistry, TaskAction, TaskObserver};

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::domain::{Difficulty, PlayerStats, Priority, Status, Task};
use crate::error::{StateError, TaskError};
use crate::recovery::{FailureKind, RecoveryAttempt, RecoveryContext, RecoveryManager};
use crate::reward::{self, RewardBreakdown};
use crate::store::Store;
use crate::validation::{self, TaskPatch, UpdateIssue};

/// XP value at or above which deletion safety flags a task as valuable
const HIGH_XP_THRESHOLD: u32 = 50;

/// Filters applied by [`TaskService::list_tasks`]. Unset fields match
/// everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<Status>,
    pub difficulty: Option<Difficulty>,
    pub priority: Option<Priority>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.status.is_none_or(|s| task.status == s)
            && self.difficulty.is_none_or(|d| task.difficulty == d)
            && self.priority.is_none_or(|p| task.priority == p)
    }
}

/// Sort key for task listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CreatedAt,
    /// Case-insensitive title order
    Title,
    /// By XP value
    Difficulty,
    /// Low < Medium < High < Critical
    Priority,
    /// Pending < Active < Blocked < Completed
    Status,
}

/// Fields searched by [`TaskService::search`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Title,
    Notes,
}

/// Task counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub pending: usize,
    pub active: usize,
    pub blocked: usize,
    pub completed: usize,
    pub total: usize,
}

/// How risky a deletion is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SafetyLevel {
    Safe,
    Caution,
    Danger,
}

impl std::fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safe => write!(f, "safe"),
            Self::Caution => write!(f, "caution"),
            Self::Danger => write!(f, "danger"),
        }
    }
}

/// Read-only deletion risk report
#[derive(Debug, Clone)]
pub struct SafetyReport {
    pub requires_confirmation: bool,
    pub warnings: Vec<String>,
    pub safety_level: SafetyLevel,
    pub task: Task,
}

/// Outcome of a successful deletion
#[derive(Debug, Clone)]
pub struct DeletionResult {
    pub success: bool,
    pub task: Task,
    pub warnings: Vec<String>,
    pub requires_confirmation: bool,
}

/// Outcome of a successful completion
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub task: Task,
    pub xp_earned: u32,
    pub level: u32,
    pub leveled_up: bool,
}

/// One field difference reported by [`TaskService::check_update`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub from: String,
    pub to: String,
}

/// Dry-run result of an update
#[derive(Debug, Clone)]
pub struct UpdateCheck {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub changes: Vec<FieldChange>,
}

/// Single owner of the in-memory task/player state
pub struct TaskService {
    store: Store,
    tasks: HashMap<String, Task>,
    player: PlayerStats,
    observers: ObserverRegistry,
    recovery: RecoveryManager,
}

impl TaskService {
    /// Create a service over an opened store, loading existing data. Load
    /// problems are routed through recovery and never block startup.
    pub fn new(store: Store) -> Self {
        let recovery = RecoveryManager::new(store.clone());
        let mut service = Self {
            store,
            tasks: HashMap::new(),
            player: PlayerStats::default(),
            observers: ObserverRegistry::new(),
            recovery,
        };

        if let Err(e) = service.load() {
            error!(error = %e, "initial load failed, starting with recovered state");
        }

        info!(task_count = service.tasks.len(), "task service initialized");
        service
    }

    /// Convenience: open the store at `data_dir` and build a service on it
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, TaskError> {
        let store = Store::open(data_dir)?;
        Ok(Self::new(store))
    }

    // === CRUD ===

    /// Create, validate, persist, and announce a new task
    pub fn create_task(
        &mut self,
        title: &str,
        difficulty: Difficulty,
        priority: Priority,
        notes: Option<String>,
    ) -> Result<Task, TaskError> {
        let title = validation::sanitize_title(title);
        let notes = validation::sanitize_notes(notes);

        validation::validate_title(&title)?;
        if let Some(notes) = &notes {
            validation::validate_notes(notes)?;
        }

        let task = Task::new(title, difficulty, priority, notes);
        self.tasks.insert(task.id.clone(), task.clone());
        self.persist()?;
        self.observers.notify(TaskAction::Created, &task);

        info!(task_id = %task.id, title = %task.title, "created task");
        Ok(task)
    }

    /// Fetch a task by id
    pub fn get_task(&self, id: &str) -> Result<Task, TaskError> {
        self.task_ref(id).cloned()
    }

    /// List tasks with filtering and sorting
    pub fn list_tasks(&self, filter: &TaskFilter, sort: SortKey, reverse: bool) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .values()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect();

        match sort {
            SortKey::CreatedAt => tasks.sort_by_key(|t| t.created_at),
            SortKey::Title => tasks.sort_by_key(|t| t.title.to_lowercase()),
            SortKey::Difficulty => tasks.sort_by_key(|t| t.difficulty.xp_value()),
            SortKey::Priority => tasks.sort_by_key(|t| t.priority),
            SortKey::Status => tasks.sort_by_key(|t| t.status),
        }
        if reverse {
            tasks.reverse();
        }
        tasks
    }

    /// Apply a partial update. Completed tasks accept title/priority/notes
    /// changes only; a difficulty change refreshes the cached XP reward.
    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> Result<Task, TaskError> {
        let patch = validation::sanitize_patch(patch);

        let Some(task) = self.tasks.get_mut(id) else {
            return Err(TaskError::NotFound(id.to_string()));
        };

        let issues = validation::validate_update(task, &patch);
        if let Some(error) = update_error(&issues) {
            return Err(error);
        }

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(difficulty) = patch.difficulty {
            let old_xp = task.xp_reward;
            task.set_difficulty(difficulty)?;
            debug!(task_id = %id, %difficulty, old_xp, new_xp = task.xp_reward, "difficulty changed");
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(notes) = patch.notes {
            task.notes = notes;
        }
        if let Some(status) = patch.status {
            task.apply_status(status)?;
            debug!(task_id = %id, %status, "status changed");
        }

        let snapshot = task.clone();
        self.persist()?;
        self.observers.notify(TaskAction::Updated, &snapshot);

        info!(task_id = %id, "updated task");
        Ok(snapshot)
    }

    /// Complete a task: compute the reward against the player's current
    /// (pre-completion) state, then apply both sides and persist.
    pub fn complete_task(&mut self, id: &str) -> Result<CompletionOutcome, TaskError> {
        let Some(task) = self.tasks.get_mut(id) else {
            return Err(TaskError::NotFound(id.to_string()));
        };
        if task.is_completed() {
            return Err(StateError::AlreadyCompleted { id: id.to_string() }.into());
        }

        let xp_earned = reward::total_xp(task, &self.player, Utc::now());
        task.complete()?;
        let difficulty = task.difficulty;
        let snapshot = task.clone();

        let (level, leveled_up) = self.player.record_completion(xp_earned, difficulty);

        self.persist()?;
        self.observers.notify(TaskAction::Completed, &snapshot);

        info!(task_id = %id, xp_earned, "completed task");
        if leveled_up {
            info!(level, "player leveled up");
        }

        Ok(CompletionOutcome {
            task: snapshot,
            xp_earned,
            level,
            leveled_up,
        })
    }

    /// Delete a task. Completed tasks require `force`; a best-effort
    /// backup runs first, and the result carries any safety warnings.
    pub fn delete_task(&mut self, id: &str, force: bool) -> Result<DeletionResult, TaskError> {
        let task = self.task_ref(id)?.clone();
        let mut warnings = Vec::new();

        if task.is_completed() {
            if !force {
                return Err(StateError::DeletionRequiresForce { id: id.to_string() }.into());
            }
            warnings.push(format!(
                "Deleting completed task '{}' - earned XP is preserved but the task record will be lost.",
                task.title
            ));
        }

        if task.is_active() {
            warnings.push(format!(
                "Deleting active task '{}' - consider marking it blocked or pending instead.",
                task.title
            ));
        }

        if task.priority.is_elevated() {
            warnings.push(format!(
                "Deleting {} priority task '{}' - ensure this is intentional.",
                task.priority.display_name().to_lowercase(),
                task.title
            ));
        }

        if task.xp_reward >= HIGH_XP_THRESHOLD {
            warnings.push(format!(
                "Deleting high XP value task '{}' ({} XP).",
                task.title, task.xp_reward
            ));
        }

        if !self.store.create_backup() {
            warn!(task_id = %id, "could not create backup before deletion");
            warnings.push("Could not create backup before deletion".into());
            self.recovery.attempt_recovery(
                FailureKind::BackupFailure,
                "backup before deletion failed",
                &RecoveryContext::default(),
            );
        }

        self.tasks.remove(id);
        self.persist()?;
        self.observers.notify(TaskAction::Deleted, &task);

        info!(task_id = %id, warning_count = warnings.len(), "deleted task");
        Ok(DeletionResult {
            success: true,
            task,
            warnings,
            requires_confirmation: false,
        })
    }

    /// Read-only version of the deletion warnings, for callers that want
    /// to confirm before deleting
    pub fn check_deletion_safety(&self, id: &str) -> Result<SafetyReport, TaskError> {
        let task = self.task_ref(id)?.clone();
        let mut report = SafetyReport {
            requires_confirmation: false,
            warnings: Vec::new(),
            safety_level: SafetyLevel::Safe,
            task: task.clone(),
        };

        if task.is_completed() {
            report.requires_confirmation = true;
            report.safety_level = SafetyLevel::Danger;
            report.warnings.push(format!(
                "This completed task has awarded {} XP. Deletion will not affect earned XP but removes the task from history.",
                task.xp_reward
            ));
        } else if task.is_active() {
            report.requires_confirmation = true;
            report.safety_level = SafetyLevel::Caution;
            report
                .warnings
                .push("This task is currently active. Consider marking it blocked or pending instead.".into());
        }

        if task.priority.is_elevated() {
            report.requires_confirmation = true;
            if report.safety_level == SafetyLevel::Safe {
                report.safety_level = SafetyLevel::Caution;
            }
            report.warnings.push(format!(
                "This is a {} priority task. Ensure deletion is intentional.",
                task.priority.display_name().to_lowercase()
            ));
        }

        if task.xp_reward >= HIGH_XP_THRESHOLD {
            if report.safety_level == SafetyLevel::Safe {
                report.safety_level = SafetyLevel::Caution;
            }
            report.warnings.push(format!(
                "This task has a high XP value ({} XP). Consider completing it instead.",
                task.xp_reward
            ));
        }

        Ok(report)
    }

    // === Queries ===

    /// Full reward breakdown for completing a task right now, without
    /// mutating anything
    pub fn preview_reward(&self, id: &str) -> Result<RewardBreakdown, TaskError> {
        let task = self.task_ref(id)?;
        Ok(reward::preview(task, &self.player, Utc::now()))
    }

    /// Task counts by status
    pub fn counts(&self) -> TaskCounts {
        let mut counts = TaskCounts::default();
        for task in self.tasks.values() {
            match task.status {
                Status::Pending => counts.pending += 1,
                Status::Active => counts.active += 1,
                Status::Blocked => counts.blocked += 1,
                Status::Completed => counts.completed += 1,
            }
            counts.total += 1;
        }
        counts
    }

    /// Case-insensitive substring search. An empty field list searches
    /// title and notes; an empty query matches nothing.
    pub fn search(&self, query: &str, fields: &[SearchField]) -> Vec<Task> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        let fields: &[SearchField] = if fields.is_empty() {
            &[SearchField::Title, SearchField::Notes]
        } else {
            fields
        };

        self.tasks
            .values()
            .filter(|task| {
                fields.iter().any(|field| match field {
                    SearchField::Title => task.title.to_lowercase().contains(&query),
                    SearchField::Notes => task
                        .notes
                        .as_ref()
                        .is_some_and(|notes| notes.to_lowercase().contains(&query)),
                })
            })
            .cloned()
            .collect()
    }

    /// Dry-run an update: report validity, warnings, and the field-level
    /// change set without touching the task
    pub fn check_update(&self, id: &str, patch: TaskPatch) -> Result<UpdateCheck, TaskError> {
        let task = self.task_ref(id)?;
        let patch = validation::sanitize_patch(patch);
        let issues = validation::validate_update(task, &patch);

        let mut check = UpdateCheck {
            valid: issues.is_empty(),
            errors: issues.iter().map(ToString::to_string).collect(),
            warnings: Vec::new(),
            changes: Vec::new(),
        };

        if let Some(title) = &patch.title
            && *title != task.title
        {
            check.changes.push(FieldChange {
                field: "title",
                from: task.title.clone(),
                to: title.clone(),
            });
        }

        if let Some(difficulty) = patch.difficulty
            && difficulty != task.difficulty
        {
            check.changes.push(FieldChange {
                field: "difficulty",
                from: task.difficulty.to_string(),
                to: difficulty.to_string(),
            });
            if !task.is_completed() {
                let delta = reward::difficulty_adjustment(task.difficulty, difficulty);
                check.warnings.push(format!(
                    "Difficulty change will update the XP reward from {} to {} ({:+})",
                    task.xp_reward,
                    difficulty.xp_value(),
                    delta
                ));
            }
        }

        if let Some(priority) = patch.priority
            && priority != task.priority
        {
            check.changes.push(FieldChange {
                field: "priority",
                from: task.priority.to_string(),
                to: priority.to_string(),
            });
            if priority.is_elevated() {
                check
                    .warnings
                    .push(format!("Setting task to {} priority", priority.display_name().to_lowercase()));
            }
        }

        if let Some(status) = patch.status
            && status != task.status
        {
            check.changes.push(FieldChange {
                field: "status",
                from: task.status.to_string(),
                to: status.to_string(),
            });
            if status == Status::Completed {
                check
                    .warnings
                    .push(format!("Completing this task will award at least {} XP", task.xp_reward));
            }
        }

        if let Some(notes) = &patch.notes
            && *notes != task.notes
        {
            check.changes.push(FieldChange {
                field: "notes",
                from: task.notes.clone().unwrap_or_default(),
                to: notes.clone().unwrap_or_default(),
            });
        }

        Ok(check)
    }

    /// Apply a status to several tasks, skipping (and logging) failures
    pub fn bulk_update_status(&mut self, ids: &[String], status: Status) -> Vec<Task> {
        let mut updated = Vec::new();
        for id in ids {
            match self.update_task(id, TaskPatch::default().with_status(status)) {
                Ok(task) => updated.push(task),
                Err(e) => warn!(%id, error = %e, "bulk status update failed for task"),
            }
        }
        info!(count = updated.len(), %status, "bulk updated task status");
        updated
    }

    /// Current player record
    pub fn player(&self) -> &PlayerStats {
        &self.player
    }

    // === Observers ===

    /// Register an observer; returns a handle for removal
    pub fn add_observer(&mut self, observer: Box<dyn TaskObserver>) -> ObserverId {
        self.observers.add(observer)
    }

    /// Remove a previously registered observer
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    // === Persistence ===

    /// Reload both documents from disk. A failed tasks load goes through
    /// recovery and is retried once; player data degrades to defaults
    /// inside the store.
    pub fn load(&mut self) -> Result<(), TaskError> {
        match self.store.load_tasks() {
            Ok(tasks) => self.tasks = tasks,
            Err(e) => {
                error!(error = %e, "failed to load tasks");
                self.recovery
                    .attempt_recovery(FailureKind::LoadFailure, &e.to_string(), &RecoveryContext::default());
                match self.store.load_tasks() {
                    Ok(tasks) => {
                        warn!(count = tasks.len(), "tasks loaded after recovery");
                        self.tasks = tasks;
                    }
                    Err(retry_err) => {
                        error!(error = %retry_err, "tasks still unloadable after recovery");
                        return Err(TaskError::Persistence(retry_err));
                    }
                }
            }
        }

        match self.store.load_player() {
            Ok(player) => self.player = player,
            Err(e) => {
                error!(error = %e, "failed to load player data");
                return Err(TaskError::Persistence(e));
            }
        }

        Ok(())
    }

    /// Persist both documents now
    pub fn save(&mut self) -> Result<(), TaskError> {
        self.persist()
    }

    /// Recovery attempts made so far
    pub fn recovery_log(&self) -> &[RecoveryAttempt] {
        self.recovery.log()
    }

    pub fn clear_recovery_log(&mut self) {
        self.recovery.clear_log();
    }

    fn task_ref(&self, id: &str) -> Result<&Task, TaskError> {
        self.tasks.get(id).ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    /// Save both documents; on failure, hand the in-memory snapshots to
    /// recovery and surface the persistence error to the caller. The
    /// in-memory mutation stays either way.
    fn persist(&mut self) -> Result<(), TaskError> {
        let result = self
            .store
            .save_tasks(&self.tasks)
            .and_then(|()| self.store.save_player(&self.player));

        if let Err(e) = result {
            error!(error = %e, "failed to persist state");
            let ctx = RecoveryContext {
                tasks: Some(self.tasks.clone()),
                player: Some(self.player.clone()),
                ..RecoveryContext::default()
            };
            let outcome = self
                .recovery
                .attempt_recovery(FailureKind::SaveFailure, &e.to_string(), &ctx);
            warn!(recovered = outcome.success, "save-failure recovery finished");
            return Err(TaskError::Persistence(e));
        }
        Ok(())
    }
}

/// Collapse update issues into the error to return: state problems outrank
/// field problems
fn update_error(issues: &[UpdateIssue]) -> Option<TaskError> {
    for issue in issues {
        if let UpdateIssue::State(e) = issue {
            return Some(TaskError::State(e.clone()));
        }
    }
    for issue in issues {
        if let UpdateIssue::Field(e) = issue {
            return Some(TaskError::Validation(e.clone()));
        }
    }
    None
}
