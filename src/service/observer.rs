//! Observer registration for task change notifications
//!
//! Observers run synchronously, inline with the mutation that triggered
//! them. A failing observer is logged and skipped; it never aborts the
//! operation or the rest of the notification loop.

use tracing::{debug, warn};

use crate::domain::Task;

/// What happened to a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskAction {
    Created,
    Updated,
    Completed,
    Deleted,
}

impl std::fmt::Display for TaskAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Completed => write!(f, "completed"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// Callback interface for task changes
pub trait TaskObserver {
    fn on_task_changed(&self, action: TaskAction, task: &Task) -> eyre::Result<()>;
}

/// Plain closures work as observers
impl<F> TaskObserver for F
where
    F: Fn(TaskAction, &Task) -> eyre::Result<()>,
{
    fn on_task_changed(&self, action: TaskAction, task: &Task) -> eyre::Result<()> {
        self(action, task)
    }
}

/// Handle for removing a registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Ordered list of observers, notified sequentially
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: u64,
    observers: Vec<(ObserverId, Box<dyn TaskObserver>)>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer and return its removal handle
    pub fn add(&mut self, observer: Box<dyn TaskObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        debug!(observer = id.0, "observer registered");
        id
    }

    /// Remove an observer. Returns false if the id was not registered.
    pub fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() < before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Notify every observer in registration order. Errors are logged and
    /// never propagated.
    pub fn notify(&self, action: TaskAction, task: &Task) {
        for (id, observer) in &self.observers {
            if let Err(e) = observer.on_task_changed(action, task) {
                warn!(observer = id.0, %action, error = %e, "observer notification failed");
            }
        }
    }
}
