use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{EntryId, TaskId, TimeLogEntry};

/// The single live entry across all tasks. `entry` is a copy of the entry in the owning task's
/// log, refreshed on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTimer {
    pub task_id: TaskId,
    pub entry: TimeLogEntry,
}

impl ActiveTimer {
    pub fn is(&self, task_id: &TaskId, entry_id: &EntryId) -> bool {
        &self.task_id == task_id && &self.entry.id == entry_id
    }
}

/// Everything the engine knows besides the task logs. This is also what gets persisted between
/// runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    #[serde(default)]
    pub active: Option<ActiveTimer>,
    /// Task selected for timing that has not been started yet.
    #[serde(default)]
    pub primed_task: Option<TaskId>,
}

impl TimerState {
    pub fn is_running(&self, task_id: &TaskId, entry_id: &EntryId) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.is(task_id, entry_id) && active.entry.is_running)
    }

    pub fn active_task(&self) -> Option<&TaskId> {
        self.active.as_ref().map(|active| &active.task_id)
    }

    /// Pair of the running entry, if the active entry is running.
    pub fn running(&self) -> Option<(&TaskId, &EntryId)> {
        self.active
            .as_ref()
            .filter(|active| active.entry.is_running)
            .map(|active| (&active.task_id, &active.entry.id))
    }

    /// What a presentation layer shows at `now`. Reading this never changes stored durations.
    pub fn display(&self, now: DateTime<Utc>) -> Option<TimerDisplay> {
        self.active.as_ref().map(|active| TimerDisplay {
            task_id: active.task_id.clone(),
            entry_id: active.entry.id.clone(),
            description: active.entry.description.clone(),
            elapsed: active.entry.live_duration(now),
            running: active.entry.is_running,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerDisplay {
    pub task_id: TaskId,
    pub entry_id: EntryId,
    pub description: String,
    pub elapsed: Duration,
    pub running: bool,
}
