//! Pure validation rules for task fields and updates
//!
//! No I/O here. Field checks return a single error; update validation
//! collects every issue so callers can report them all at once.

use serde::Serialize;
use thiserror::Error;

use crate::domain::{Difficulty, Priority, Status, Task};
use crate::error::StateError;

/// Maximum title length in characters
pub const MAX_TITLE_LENGTH: usize = 200;
/// Maximum notes length in characters
pub const MAX_NOTES_LENGTH: usize = 1000;

/// Field-level validation failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title cannot be empty")]
    EmptyTitle,

    #[error("title cannot exceed {MAX_TITLE_LENGTH} characters")]
    TitleTooLong,

    #[error("title cannot start with a non-alphanumeric character")]
    InvalidLeadingChar,

    #[error("notes cannot exceed {MAX_NOTES_LENGTH} characters")]
    NotesTooLong,
}

/// A single problem found while validating an update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateIssue {
    Field(ValidationError),
    State(StateError),
}

impl std::fmt::Display for UpdateIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(e) => write!(f, "{}", e),
            Self::State(e) => write!(f, "{}", e),
        }
    }
}

/// Partial update to a task. Absent fields are left untouched; `id` and
/// `created_at` are immutable and deliberately not representable here.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    /// `Some(None)` clears the notes, `Some(Some(s))` replaces them
    pub notes: Option<Option<String>>,
}

impl TaskPatch {
    /// Check whether the patch changes anything at all
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.difficulty.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.notes.is_none()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_notes(mut self, notes: Option<impl Into<String>>) -> Self {
        self.notes = Some(notes.map(Into::into));
        self
    }
}

/// Validate a task title
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    let trimmed = title.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }

    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong);
    }

    // Leading character must be alphanumeric (ASCII, matching the wire
    // format's expectations for titles)
    if let Some(first) = trimmed.chars().next()
        && !first.is_ascii_alphanumeric()
    {
        return Err(ValidationError::InvalidLeadingChar);
    }

    Ok(())
}

/// Validate task notes
pub fn validate_notes(notes: &str) -> Result<(), ValidationError> {
    if notes.chars().count() > MAX_NOTES_LENGTH {
        return Err(ValidationError::NotesTooLong);
    }
    Ok(())
}

/// Validate a status transition against the transition table
pub fn validate_status_transition(current: Status, next: Status) -> Result<(), StateError> {
    if !current.can_transition_to(next) {
        return Err(StateError::IllegalTransition {
            from: current,
            to: next,
        });
    }
    Ok(())
}

/// Trim a raw title
pub fn sanitize_title(title: &str) -> String {
    title.trim().to_string()
}

/// Trim raw notes, collapsing whitespace-only notes to None
pub fn sanitize_notes(notes: Option<String>) -> Option<String> {
    notes.and_then(|n| {
        let trimmed = n.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Sanitize a patch: trim strings and collapse empty notes to a clear.
/// Enum-valued fields are already typed, so there is nothing to normalize
/// there; unknown enum spellings are rejected when the caller parses them.
pub fn sanitize_patch(mut patch: TaskPatch) -> TaskPatch {
    if let Some(title) = patch.title.take() {
        patch.title = Some(sanitize_title(&title));
    }
    if let Some(notes) = patch.notes.take() {
        patch.notes = Some(sanitize_notes(notes));
    }
    patch
}

/// Validate a patch against the current task, collecting every issue.
///
/// Completed tasks freeze `difficulty` and `status`; title, priority, and
/// notes stay editable.
pub fn validate_update(current: &Task, patch: &TaskPatch) -> Vec<UpdateIssue> {
    let mut issues = Vec::new();

    if current.is_completed() {
        if patch.difficulty.is_some() {
            issues.push(UpdateIssue::State(StateError::DifficultyLocked {
                id: current.id.clone(),
            }));
        }
        if let Some(status) = patch.status
            && status != Status::Completed
        {
            issues.push(UpdateIssue::State(StateError::StatusLocked {
                id: current.id.clone(),
            }));
        }
    }

    if let Some(status) = patch.status
        && let Err(e) = validate_status_transition(current.status, status)
    {
        issues.push(UpdateIssue::State(e));
    }

    if let Some(title) = &patch.title
        && let Err(e) = validate_title(title)
    {
        issues.push(UpdateIssue::Field(e));
    }

    if let Some(Some(notes)) = &patch.notes
        && let Err(e) = validate_notes(notes)
    {
        issues.push(UpdateIssue::Field(e));
    }

    issues
}
