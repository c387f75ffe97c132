//! State transitions of the timer. Every function takes the current [TimerState] and the wall
//! clock reading, mutates task logs through [TaskStore] and returns the next state.
//!
//! At most one entry across all tasks may be running. This is upheld by finalizing the
//! previously running entry inside the same transition that starts a new one.

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};

use crate::{
    model::{EntryId, TaskId, TimeLogEntry, task::first_playable},
    store::TaskStore,
};

use super::{
    checklist_link::sync_logged_time,
    state::{ActiveTimer, TimerState},
};

/// Arguments of [toggle].
#[derive(Debug, Clone)]
pub struct ToggleRequest {
    pub task_id: TaskId,
    pub entry_id: EntryId,
    /// Used when `entry_id` is not part of the log yet. It is appended to the log.
    pub entry_to_start: Option<TimeLogEntry>,
    /// Replaces the task's log as part of the transition.
    pub replacement_log: Option<Vec<TimeLogEntry>>,
}

impl ToggleRequest {
    pub fn existing(task_id: TaskId, entry_id: EntryId) -> Self {
        Self {
            task_id,
            entry_id,
            entry_to_start: None,
            replacement_log: None,
        }
    }

    pub fn new_entry(task_id: TaskId, entry: TimeLogEntry) -> Self {
        Self {
            task_id,
            entry_id: entry.id.clone(),
            entry_to_start: Some(entry),
            replacement_log: None,
        }
    }

    pub fn with_log(task_id: TaskId, entry_id: EntryId, log: Vec<TimeLogEntry>) -> Self {
        Self {
            task_id,
            entry_id,
            entry_to_start: None,
            replacement_log: Some(log),
        }
    }
}

/// Starts, pauses or switches to an entry.
///
/// - Another running entry is finalized first.
/// - The live running entry itself is paused but stays selected.
/// - Anything else is started, recovering time of a stale running flag.
///
/// Unknown tasks, unresolvable entries and headers leave the state untouched.
pub fn toggle(
    mut state: TimerState,
    tasks: &mut impl TaskStore,
    request: ToggleRequest,
    now: DateTime<Utc>,
) -> TimerState {
    let ToggleRequest {
        task_id,
        entry_id,
        entry_to_start,
        replacement_log,
    } = request;

    let Some(task) = tasks.task(&task_id) else {
        debug!("Ignoring toggle of {entry_id} for unknown task {task_id}");
        return state;
    };
    let log = replacement_log.as_deref().unwrap_or(&task.time_log);
    let Some(target) = log
        .iter()
        .find(|entry| entry.id == entry_id)
        .cloned()
        .or(entry_to_start)
    else {
        debug!("Ignoring toggle of unknown entry {entry_id} in {task_id}");
        return state;
    };
    if target.is_header() {
        warn!("Refusing to time header {entry_id} in {task_id}");
        return state;
    }

    let pausing = state.is_running(&task_id, &entry_id);

    if let Some(previous) = state
        .active
        .as_ref()
        .filter(|active| !active.is(&task_id, &entry_id) && active.entry.is_running)
    {
        let (previous_task, previous_entry) = (previous.task_id.clone(), previous.entry.id.clone());
        debug!("Switching away from {previous_entry} in {previous_task}");
        finalize_entry(tasks, &previous_task, &previous_entry, now);
    }

    let updated = if pausing {
        // The log copy is authoritative, but never lose the pointer's start time.
        let live = match &state.active {
            Some(active) if !target.is_running => active.entry.clone(),
            _ => target,
        };
        let paused = live.finalized(now);
        info!(
            "Paused {entry_id} in {task_id} at {}ms",
            paused.duration.num_milliseconds()
        );
        paused
    } else {
        let started = target.started(now);
        info!("Started {entry_id} in {task_id}");
        started
    };

    let Some(task) = tasks.task_mut(&task_id) else {
        return state;
    };
    if let Some(log) = replacement_log {
        task.time_log = log;
    }
    match task.entry_position(&entry_id) {
        Some(position) => task.time_log[position] = updated.clone(),
        None => task.time_log.push(updated.clone()),
    }
    if pausing {
        sync_logged_time(&mut task.checklist, &updated);
    }
    tasks.task_changed(&task_id);

    if !pausing {
        settle_orphans(tasks, Some((&task_id, &entry_id)), now);
        state.primed_task = None;
    }
    state.active = Some(ActiveTimer {
        task_id,
        entry: updated,
    });
    state
}

/// Finalizes the active entry and deactivates it.
pub fn stop(mut state: TimerState, tasks: &mut impl TaskStore, now: DateTime<Utc>) -> TimerState {
    state.primed_task = None;
    let Some(active) = state.active.take() else {
        trace!("Nothing to stop");
        return state;
    };
    if active.entry.is_running {
        finalize_entry(tasks, &active.task_id, &active.entry.id, now);
    }
    info!("Stopped {} in {}", active.entry.id, active.task_id);
    state
}

/// Zeroes an entry. The active entry stays selected, paused at zero.
pub fn reset(
    mut state: TimerState,
    tasks: &mut impl TaskStore,
    task_id: &TaskId,
    entry_id: &EntryId,
) -> TimerState {
    let Some(task) = tasks.task_mut(task_id) else {
        debug!("Ignoring reset for unknown task {task_id}");
        return state;
    };
    let Some(position) = task.entry_position(entry_id) else {
        debug!("Ignoring reset of unknown entry {entry_id} in {task_id}");
        return state;
    };
    let zeroed = task.time_log[position].zeroed();
    task.time_log[position] = zeroed.clone();
    sync_logged_time(&mut task.checklist, &zeroed);
    tasks.task_changed(task_id);

    if let Some(active) = state
        .active
        .as_mut()
        .filter(|active| active.is(task_id, entry_id))
    {
        active.entry = zeroed;
    }
    info!("Reset {entry_id} in {task_id}");
    state
}

/// Forgets the active entry and the primed task. Stored durations are not touched.
pub fn clear_active(_state: TimerState) -> TimerState {
    TimerState::default()
}

/// Selects a task for timing without starting anything.
pub fn prime_task(
    state: TimerState,
    tasks: &mut impl TaskStore,
    task_id: &TaskId,
    now: DateTime<Utc>,
) -> TimerState {
    if tasks.task(task_id).is_none() {
        debug!("Ignoring prime of unknown task {task_id}");
        return state;
    }
    let mut state = stop(state, tasks, now);
    state.primed_task = Some(task_id.clone());
    debug!("Primed {task_id}");
    state
}

/// Replaces a task's log and selects its first playable entry, paused.
pub fn prime_with_new_log(
    state: TimerState,
    tasks: &mut impl TaskStore,
    task_id: &TaskId,
    entries: Vec<TimeLogEntry>,
    title: Option<String>,
    now: DateTime<Utc>,
) -> TimerState {
    if tasks.task(task_id).is_none() {
        debug!("Ignoring new log for unknown task {task_id}");
        return state;
    }
    let mut state = stop(state, tasks, now);
    let Some(task) = tasks.task_mut(task_id) else {
        return state;
    };
    task.time_log = entries
        .into_iter()
        .map(|entry| if entry.is_running { entry.finalized(now) } else { entry })
        .collect();
    if title.is_some() {
        task.time_log_title = title;
    }
    state.active = first_playable(&task.time_log).map(|entry| ActiveTimer {
        task_id: task_id.clone(),
        entry: entry.clone(),
    });
    tasks.task_changed(task_id);
    debug!("Primed {task_id} with a new log");
    state
}

/// Pauses an entry in its owning task's log and refreshes its checklist mirror. Returns the
/// entry as stored afterwards.
pub(crate) fn finalize_entry(
    tasks: &mut impl TaskStore,
    task_id: &TaskId,
    entry_id: &EntryId,
    now: DateTime<Utc>,
) -> Option<TimeLogEntry> {
    let Some(task) = tasks.task_mut(task_id) else {
        debug!("Task {task_id} of entry {entry_id} is gone");
        return None;
    };
    let Some(position) = task.entry_position(entry_id) else {
        debug!("Entry {entry_id} is gone from {task_id}");
        return None;
    };
    let entry = &task.time_log[position];
    if !entry.is_running {
        return Some(entry.clone());
    }
    let finalized = entry.finalized(now);
    task.time_log[position] = finalized.clone();
    sync_logged_time(&mut task.checklist, &finalized);
    tasks.task_changed(task_id);
    Some(finalized)
}

/// Finalizes every running entry except `keep`. Running entries without a pointer only appear
/// after unclean shutdowns or when the pointer was cleared under a running entry.
pub(crate) fn settle_orphans(
    tasks: &mut impl TaskStore,
    keep: Option<(&TaskId, &EntryId)>,
    now: DateTime<Utc>,
) {
    for task_id in tasks.task_ids() {
        let orphans = tasks
            .task(&task_id)
            .map(|task| {
                task.time_log
                    .iter()
                    .filter(|entry| entry.is_running)
                    .filter(|entry| keep != Some((&task_id, &entry.id)))
                    .map(|entry| entry.id.clone())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        for entry_id in orphans {
            warn!("Finalizing orphaned running entry {entry_id} in {task_id}");
            finalize_entry(tasks, &task_id, &entry_id, now);
        }
    }
}
