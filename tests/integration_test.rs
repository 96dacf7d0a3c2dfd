//! Integration tests for the task tracker core
//!
//! These exercise the full stack: service orchestration, validation,
//! rewards, persistence, and recovery against a real temp directory.

use std::fs;

use questlog::{
    Difficulty, FailureKind, Priority, RecoveryContext, RecoveryManager, SortKey, StateError, Status,
    Store, TaskError, TaskFilter, TaskPatch, TaskService,
};
use tempfile::TempDir;

fn open_service(temp: &TempDir) -> TaskService {
    TaskService::open(temp.path().join("data")).expect("service should open")
}

// =============================================================================
// Lifecycle scenarios
// =============================================================================

#[test]
fn test_full_task_lifecycle() {
    let temp = TempDir::new().unwrap();
    let mut svc = open_service(&temp);

    let task = svc
        .create_task("Ship v1", Difficulty::Hard, Priority::Critical, None)
        .unwrap();
    assert_eq!(task.xp_reward, 50);
    assert_eq!(task.status, Status::Pending);

    svc.update_task(&task.id, TaskPatch::default().with_status(Status::Active))
        .unwrap();

    // Fresh player, created today: 50 + floor(50*1.2*1.0 - 50) + 5 = 65
    let outcome = svc.complete_task(&task.id).unwrap();
    assert_eq!(outcome.xp_earned, 65);
    assert_eq!(svc.player().total_xp, 65);
    assert_eq!(svc.player().level(), 1);

    // The completed task still lists, with its completion timestamp
    let completed = svc.get_task(&task.id).unwrap();
    assert!(completed.completed_at.is_some());

    // Deletion needs force for completed tasks, then the task is gone
    assert!(matches!(
        svc.delete_task(&task.id, false),
        Err(TaskError::State(StateError::DeletionRequiresForce { .. }))
    ));
    svc.delete_task(&task.id, true).unwrap();
    assert!(svc.list_tasks(&TaskFilter::default(), SortKey::CreatedAt, false).is_empty());

    // Earned XP survives the deletion
    assert_eq!(svc.player().total_xp, 65);
}

#[test]
fn test_second_completion_is_rejected_without_side_effects() {
    let temp = TempDir::new().unwrap();
    let mut svc = open_service(&temp);

    let task = svc.create_task("Once", Difficulty::Medium, Priority::Low, None).unwrap();
    svc.complete_task(&task.id).unwrap();

    let before = svc.player().clone();
    let err = svc.complete_task(&task.id).unwrap_err();
    assert!(matches!(err, TaskError::State(StateError::AlreadyCompleted { .. })));
    assert_eq!(svc.player(), &before);
}

#[test]
fn test_completed_task_edit_rules_end_to_end() {
    let temp = TempDir::new().unwrap();
    let mut svc = open_service(&temp);

    let task = svc.create_task("Locked down", Difficulty::Easy, Priority::Low, None).unwrap();
    svc.complete_task(&task.id).unwrap();

    // Difficulty edit raises a state error
    assert!(matches!(
        svc.update_task(&task.id, TaskPatch::default().with_difficulty(Difficulty::Easy)),
        Err(TaskError::State(_))
    ));

    // Notes edit on the same task succeeds
    let updated = svc
        .update_task(&task.id, TaskPatch::default().with_notes(Some("x")))
        .unwrap();
    assert_eq!(updated.notes.as_deref(), Some("x"));
}

#[test]
fn test_streak_builds_across_completions() {
    let temp = TempDir::new().unwrap();
    let mut svc = open_service(&temp);

    let mut ids = Vec::new();
    for i in 0..4 {
        let task = svc
            .create_task(&format!("Task {}", i), Difficulty::Easy, Priority::Low, None)
            .unwrap();
        ids.push(task.id);
    }

    // Completion 1: streak 0 before, 15 base + 5 daily = 20
    assert_eq!(svc.complete_task(&ids[0]).unwrap().xp_earned, 20);
    // Completion 2: streak 1, still no weekly (needs streak >= 2) = 20
    assert_eq!(svc.complete_task(&ids[1]).unwrap().xp_earned, 20);
    // Completion 3: streak 2, weekly bonus joins = 30
    assert_eq!(svc.complete_task(&ids[2]).unwrap().xp_earned, 30);
    // Completion 4: streak 3, multiplier kicks in: floor(15*1.1)-15 = 1 -> 31
    assert_eq!(svc.complete_task(&ids[3]).unwrap().xp_earned, 31);

    assert_eq!(svc.player().current_streak, 4);
}

// =============================================================================
// Persistence round trips
// =============================================================================

#[test]
fn test_state_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");

    let task_id = {
        let mut svc = TaskService::open(&data_dir).unwrap();
        let task = svc
            .create_task("Durable", Difficulty::Hard, Priority::High, Some("notes live too".into()))
            .unwrap();
        svc.complete_task(&task.id).unwrap();
        task.id
    };

    let svc = TaskService::open(&data_dir).unwrap();
    let task = svc.get_task(&task_id).unwrap();
    assert_eq!(task.title, "Durable");
    assert_eq!(task.notes.as_deref(), Some("notes live too"));
    assert!(task.is_completed());
    assert_eq!(svc.player().tasks_completed, 1);
    assert_eq!(svc.player().hard_completed, 1);
}

#[test]
fn test_persisted_layout_matches_contract() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");
    let mut svc = TaskService::open(&data_dir).unwrap();
    let task = svc
        .create_task("Layout check", Difficulty::Medium, Priority::Medium, None)
        .unwrap();
    svc.complete_task(&task.id).unwrap();

    let tasks_doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(data_dir.join("tasks.json")).unwrap()).unwrap();
    assert_eq!(tasks_doc["version"], "1.0");
    let record = &tasks_doc["tasks"][&task.id];
    assert_eq!(record["id"], task.id.as_str());
    assert_eq!(record["difficulty"], "MEDIUM");
    assert_eq!(record["status"], "COMPLETED");
    assert_eq!(record["notes"], serde_json::Value::Null);
    assert!(record["completed_at"].is_string());

    let player_doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(data_dir.join("player.json")).unwrap()).unwrap();
    assert_eq!(player_doc["version"], "1.0");
    assert_eq!(player_doc["player"]["tasks_completed"], 1);
    assert_eq!(player_doc["statistics"]["medium_tasks_completed"], 1);
    assert!(player_doc["last_modified"].is_string());

    // No transient temp files after clean operation
    let tmp_files: Vec<_> = fs::read_dir(&data_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(tmp_files.is_empty());
}

// =============================================================================
// Corruption and recovery
// =============================================================================

#[test]
fn test_corrupted_tasks_file_loads_from_backup() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");

    let task_id = {
        let mut svc = TaskService::open(&data_dir).unwrap();
        let task = svc.create_task("Precious", Difficulty::Hard, Priority::High, None).unwrap();
        // A second mutation rolls the backup generation forward
        svc.update_task(&task.id, TaskPatch::default().with_status(Status::Active))
            .unwrap();
        task.id
    };

    // Garbage over the main file, valid backup in place
    fs::write(data_dir.join("tasks.json"), b"%% not json %%").unwrap();

    let svc = TaskService::open(&data_dir).unwrap();
    assert_eq!(svc.get_task(&task_id).unwrap().title, "Precious");
}

#[test]
fn test_total_corruption_recovers_to_empty_but_usable() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");

    {
        let mut svc = TaskService::open(&data_dir).unwrap();
        svc.create_task("Doomed", Difficulty::Easy, Priority::Low, None).unwrap();
    }

    // Corrupt main file and backup both
    fs::write(data_dir.join("tasks.json"), b"garbage").unwrap();
    let backup = data_dir.join("tasks.json.backup");
    if backup.exists() {
        fs::write(&backup, b"garbage too").unwrap();
    }

    // Startup routes through recovery and still comes up
    let mut svc = TaskService::open(&data_dir).unwrap();
    assert!(svc.list_tasks(&TaskFilter::default(), SortKey::CreatedAt, false).is_empty());
    assert!(!svc.recovery_log().is_empty());

    // And the service is fully usable afterwards
    let task = svc.create_task("Fresh start", Difficulty::Easy, Priority::Low, None).unwrap();
    assert!(svc.get_task(&task.id).is_ok());
}

#[test]
fn test_corrupt_player_file_degrades_to_defaults() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");

    {
        let mut svc = TaskService::open(&data_dir).unwrap();
        let task = svc.create_task("XP source", Difficulty::Easy, Priority::Low, None).unwrap();
        svc.complete_task(&task.id).unwrap();
    }

    fs::write(data_dir.join("player.json"), b"broken").unwrap();
    fs::write(data_dir.join("player.json.backup"), b"broken too").unwrap();

    // Tasks still load; player quietly resets
    let svc = TaskService::open(&data_dir).unwrap();
    assert_eq!(svc.counts().total, 1);
    assert_eq!(svc.player().total_xp, 0);
}

#[test]
fn test_recovery_manager_corruption_salvage() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");
    let store = Store::open(&data_dir).unwrap();

    // Corrupt player data with a recognizable XP total, no backups at all
    fs::write(store.player_path(), br#"{"player": {"total_xp": 512, "#).unwrap();

    let mut manager = RecoveryManager::new(store.clone());
    let result = manager.attempt_recovery(FailureKind::Corruption, "bad json", &RecoveryContext::default());

    assert!(result.success);
    assert_eq!(store.load_player().unwrap().total_xp, 512);
    assert_eq!(manager.log().len(), 1);
}

// =============================================================================
// Level progression
// =============================================================================

#[test]
fn test_level_progression_thresholds() {
    use questlog::reward;

    assert_eq!(reward::level_for_xp(0), 1);
    assert_eq!(reward::level_for_xp(99), 1);
    assert_eq!(reward::level_for_xp(100), 2);
    assert_eq!(reward::level_for_xp(400), 3);

    assert_eq!(reward::xp_for_level(2), 100);
    assert_eq!(reward::xp_for_level(3), 400);
}
