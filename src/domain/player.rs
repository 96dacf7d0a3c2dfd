//! Player stats with level derivation and progress tracking
//!
//! Level is never stored; it is always derived from total XP via the
//! formulas in [`crate::reward`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reward;

use super::Difficulty;

/// Singleton player record, mutated only through task completion
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerStats {
    /// Lifetime XP. Monotonically non-decreasing.
    pub total_xp: u64,

    /// Number of tasks ever completed
    pub tasks_completed: u32,

    /// Consecutive completions feeding the streak multiplier
    pub current_streak: u32,

    /// Timestamp of the most recent completion
    pub last_activity: Option<DateTime<Utc>>,

    #[serde(rename = "easy_tasks_completed")]
    pub easy_completed: u32,

    #[serde(rename = "medium_tasks_completed")]
    pub medium_completed: u32,

    #[serde(rename = "hard_tasks_completed")]
    pub hard_completed: u32,
}

/// Derived statistics block, serialized alongside the raw player record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatistics {
    pub level: u32,
    pub total_xp: u64,
    pub xp_to_next_level: u64,
    pub level_progress: f64,
    pub tasks_completed: u32,
    pub current_streak: u32,
    pub easy_tasks_completed: u32,
    pub medium_tasks_completed: u32,
    pub hard_tasks_completed: u32,
    pub last_activity: Option<DateTime<Utc>>,
}

impl PlayerStats {
    /// Current level, derived from total XP
    pub fn level(&self) -> u32 {
        reward::level_for_xp(self.total_xp)
    }

    /// XP threshold of the current level
    pub fn xp_for_current_level(&self) -> u64 {
        reward::xp_for_level(self.level())
    }

    /// XP threshold of the next level
    pub fn xp_for_next_level(&self) -> u64 {
        reward::xp_for_level(self.level() + 1)
    }

    /// XP still needed to reach the next level
    pub fn xp_to_next_level(&self) -> u64 {
        self.xp_for_next_level().saturating_sub(self.total_xp)
    }

    /// Progress through the current level, 0.0 to 1.0
    pub fn level_progress(&self) -> f64 {
        let floor = self.xp_for_current_level();
        let ceiling = self.xp_for_next_level();
        let range = ceiling.saturating_sub(floor);
        if range == 0 {
            return 1.0;
        }
        let into_level = self.total_xp.saturating_sub(floor);
        (into_level as f64 / range as f64).clamp(0.0, 1.0)
    }

    /// Add XP and report `(new_level, leveled_up)`
    pub fn add_xp(&mut self, amount: u32) -> (u32, bool) {
        let old_level = self.level();
        self.total_xp += u64::from(amount);
        let new_level = self.level();
        (new_level, new_level > old_level)
    }

    /// Record a task completion: bump counters, streak, and last activity,
    /// then add the earned XP. Reports `(new_level, leveled_up)`.
    pub fn record_completion(&mut self, xp_earned: u32, difficulty: Difficulty) -> (u32, bool) {
        self.tasks_completed += 1;
        self.last_activity = Some(Utc::now());

        match difficulty {
            Difficulty::Easy => self.easy_completed += 1,
            Difficulty::Medium => self.medium_completed += 1,
            Difficulty::Hard => self.hard_completed += 1,
        }

        self.current_streak += 1;

        self.add_xp(xp_earned)
    }

    /// Reset the completion streak to zero
    pub fn reset_streak(&mut self) {
        self.current_streak = 0;
    }

    /// Snapshot of the derived statistics
    pub fn statistics(&self) -> PlayerStatistics {
        PlayerStatistics {
            level: self.level(),
            total_xp: self.total_xp,
            xp_to_next_level: self.xp_to_next_level(),
            level_progress: self.level_progress(),
            tasks_completed: self.tasks_completed,
            current_streak: self.current_streak,
            easy_tasks_completed: self.easy_completed,
            medium_tasks_completed: self.medium_completed,
            hard_tasks_completed: self.hard_completed,
            last_activity: self.last_activity,
        }
    }
}
