//! Questlog - gamified task tracker core
//!
//! The task lifecycle and persistence engine behind a single-user,
//! XP-driven task tracker. Completing tasks awards experience points that
//! accumulate into a level; tasks and player progress live in versioned
//! JSON documents written atomically with single-generation backups.
//!
//! # Core Concepts
//!
//! - **One owner**: a single [`TaskService`] instance holds the canonical
//!   task map and player record; presentation layers call through it.
//! - **Pure rules**: validation and reward math are side-effect-free
//!   modules the service composes.
//! - **Durability first**: every mutation persists before observers hear
//!   about it, and persistence failures route through recovery strategies
//!   instead of crashing the caller.
//!
//! # Modules
//!
//! - [`domain`] - Task, PlayerStats, and the fixed vocabularies
//! - [`validation`] - field and update validation rules
//! - [`reward`] - XP and level math
//! - [`store`] - atomic JSON persistence with backup recovery
//! - [`recovery`] - strategies for degraded persistence conditions
//! - [`service`] - the TaskService orchestrator and observers
//! - [`config`] - configuration loading

pub mod config;
pub mod domain;
pub mod error;
pub mod recovery;
pub mod reward;
pub mod service;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use domain::{Difficulty, PlayerStatistics, PlayerStats, Priority, Status, Task};
pub use error::{ErrorCategory, Severity, StateError, TaskError};
pub use recovery::{FailureKind, RecoveryAttempt, RecoveryContext, RecoveryManager, RecoveryResult};
pub use reward::RewardBreakdown;
pub use service::{
    CompletionOutcome, DeletionResult, FieldChange, ObserverId, SafetyLevel, SafetyReport, SearchField,
    SortKey, TaskAction, TaskCounts, TaskFilter, TaskObserver, TaskService, UpdateCheck,
};
pub use store::{Store, StoreError};
pub use validation::{TaskPatch, UpdateIssue, ValidationError};
