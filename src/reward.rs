//! XP reward calculation
//!
//! Pure functions; no I/O and no mutation. The service computes rewards
//! against the player's *pre-completion* state, then applies them.
//!
//! Total XP = base + multiplier bonus + flat bonuses, where the multiplier
//! bonus is `floor(base * priority_mult * streak_mult) - base` (fractional
//! remainder dropped, not rounded).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Difficulty, PlayerStats, Priority, Task};

/// Minimum streak before the streak multiplier kicks in
pub const STREAK_BONUS_THRESHOLD: u32 = 3;
/// Extra multiplier per streak level past the threshold
pub const STREAK_BONUS_STEP: f64 = 0.1;
/// Streak multiplier cap
pub const MAX_STREAK_BONUS: f64 = 0.5;
/// Flat bonus for completing a task the same day it was created
pub const DAILY_COMPLETION_BONUS: u32 = 5;
/// Flat bonus for sustained activity within a week
pub const WEEKLY_COMPLETION_BONUS: u32 = 10;

/// Full reward breakdown for display, produced without mutating state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardBreakdown {
    pub base_xp: u32,
    pub priority_multiplier: f64,
    pub streak_multiplier: f64,
    pub multiplier_bonus: u32,
    pub flat_bonus: u32,
    pub total_bonus: u32,
    pub total_xp: u32,
}

/// Base XP for a difficulty. Constant per level: 15/30/50.
pub fn base_xp(difficulty: Difficulty) -> u32 {
    difficulty.xp_value()
}

/// Priority multiplier. Low and Medium carry no bonus.
pub fn priority_multiplier(priority: Priority) -> f64 {
    match priority {
        Priority::Low | Priority::Medium => 1.0,
        Priority::High => 1.1,
        Priority::Critical => 1.2,
    }
}

/// Streak multiplier: 1.0 below the threshold, then +0.1 per level capped
/// at +0.5
pub fn streak_multiplier(current_streak: u32) -> f64 {
    if current_streak < STREAK_BONUS_THRESHOLD {
        return 1.0;
    }
    let streak_levels = current_streak - STREAK_BONUS_THRESHOLD + 1;
    1.0 + (f64::from(streak_levels) * STREAK_BONUS_STEP).min(MAX_STREAK_BONUS)
}

/// Flat completion bonuses: same-day creation and weekly activity
pub fn completion_bonus(task: &Task, player: &PlayerStats, now: DateTime<Utc>) -> u32 {
    let mut bonus = 0;

    if task.created_at.date_naive() == now.date_naive() {
        bonus += DAILY_COMPLETION_BONUS;
    }

    if let Some(last_activity) = player.last_activity {
        let days_since_last = (now - last_activity).num_days();
        if days_since_last <= 7 && player.current_streak >= 2 {
            bonus += WEEKLY_COMPLETION_BONUS;
        }
    }

    bonus
}

/// Bonus XP from multipliers alone, truncating integer semantics
pub fn multiplier_bonus(task: &Task, player: &PlayerStats) -> u32 {
    let base = base_xp(task.difficulty);
    let multiplied = f64::from(base) * priority_multiplier(task.priority) * streak_multiplier(player.current_streak);
    // Truncation, not rounding: 16.5 multiplied XP yields a bonus of 1 on
    // a base of 15
    (multiplied as u32).saturating_sub(base)
}

/// Total XP reward for completing `task` given the player's current state
pub fn total_xp(task: &Task, player: &PlayerStats, now: DateTime<Utc>) -> u32 {
    base_xp(task.difficulty) + multiplier_bonus(task, player) + completion_bonus(task, player, now)
}

/// Level for a total XP amount: `floor(sqrt(xp / 100)) + 1`, minimum 1
pub fn level_for_xp(xp: u64) -> u32 {
    if xp == 0 {
        return 1;
    }
    (xp as f64 / 100.0).sqrt() as u32 + 1
}

/// XP threshold for a level: `(level - 1)^2 * 100`
pub fn xp_for_level(level: u32) -> u64 {
    if level <= 1 {
        return 0;
    }
    u64::from(level - 1).pow(2) * 100
}

/// XP needed on top of `current_xp` to reach the next level
pub fn xp_to_next_level(current_xp: u64) -> u64 {
    let next_level_xp = xp_for_level(level_for_xp(current_xp) + 1);
    next_level_xp.saturating_sub(current_xp)
}

/// Signed base-XP delta of changing a task's difficulty
pub fn difficulty_adjustment(current: Difficulty, new: Difficulty) -> i64 {
    i64::from(base_xp(new)) - i64::from(base_xp(current))
}

/// Full reward breakdown for display purposes
pub fn preview(task: &Task, player: &PlayerStats, now: DateTime<Utc>) -> RewardBreakdown {
    let base = base_xp(task.difficulty);
    let priority_mult = priority_multiplier(task.priority);
    let streak_mult = streak_multiplier(player.current_streak);
    let mult_bonus = multiplier_bonus(task, player);
    let flat_bonus = completion_bonus(task, player, now);
    let total = total_xp(task, player, now);

    RewardBreakdown {
        base_xp: base,
        priority_multiplier: priority_mult,
        streak_multiplier: streak_mult,
        multiplier_bonus: mult_bonus,
        flat_bonus,
        total_bonus: total - base,
        total_xp: total,
    }
}
