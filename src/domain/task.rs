//! Task entity
//!
//! Invariants maintained here: `completed_at` is Some iff status is
//! Completed, and a completed task's difficulty and status are frozen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StateError;

use super::{Difficulty, Priority, Status};

/// A single tracked task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, generated at creation
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Difficulty, determines the base XP reward
    pub difficulty: Difficulty,

    /// Priority for ordering and reward multipliers
    pub priority: Priority,

    /// Current lifecycle status
    pub status: Status,

    /// Optional free-form notes
    #[serde(default)]
    pub notes: Option<String>,

    /// Base XP cached from difficulty at creation/update time
    pub xp_reward: u32,

    /// Creation timestamp, immutable
    pub created_at: DateTime<Utc>,

    /// Completion timestamp, set when the task is completed
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new pending task with a generated id
    pub fn new(
        title: impl Into<String>,
        difficulty: Difficulty,
        priority: Priority,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            title: title.into(),
            difficulty,
            priority,
            status: Status::Pending,
            notes,
            xp_reward: difficulty.xp_value(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Create a task with a specific id (for tests and recovery)
    pub fn with_id(
        id: impl Into<String>,
        title: impl Into<String>,
        difficulty: Difficulty,
        priority: Priority,
    ) -> Self {
        let mut task = Self::new(title, difficulty, priority, None);
        task.id = id.into();
        task
    }

    /// Check if the task is completed
    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }

    /// Check if the task is active
    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    /// Check if the task is blocked
    pub fn is_blocked(&self) -> bool {
        self.status == Status::Blocked
    }

    /// Mark the task completed and return the cached XP reward
    pub fn complete(&mut self) -> Result<u32, StateError> {
        if self.is_completed() {
            return Err(StateError::AlreadyCompleted { id: self.id.clone() });
        }
        self.status = Status::Completed;
        self.completed_at = Some(Utc::now());
        Ok(self.xp_reward)
    }

    /// Transition to a new status, keeping `completed_at` in sync
    pub fn apply_status(&mut self, next: Status) -> Result<(), StateError> {
        if !self.status.can_transition_to(next) {
            return Err(StateError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }

        if next == Status::Completed {
            self.completed_at = Some(Utc::now());
        } else if self.is_completed() {
            // Leaving Completed clears the timestamp. Unreachable through the
            // transition table today; kept so the invariant holds if a future
            // rule opens that edge.
            self.completed_at = None;
        }

        self.status = next;
        Ok(())
    }

    /// Change difficulty and refresh the cached XP reward
    pub fn set_difficulty(&mut self, difficulty: Difficulty) -> Result<(), StateError> {
        if self.is_completed() {
            return Err(StateError::DifficultyLocked { id: self.id.clone() });
        }
        self.difficulty = difficulty;
        self.xp_reward = difficulty.xp_value();
        Ok(())
    }
}
