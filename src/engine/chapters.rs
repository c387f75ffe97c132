//! Moving through a task's log. A chapter is the run of entries after a header up to the next
//! header. Navigation never wraps around: there is nothing before the first chapter and nothing
//! after the last entry.

use tracing::debug;

use crate::{model::TimeLogEntry, store::TaskStore};

use super::TimerEngine;

/// Index of the first non-header entry after `from`.
pub fn next_entry_index(log: &[TimeLogEntry], from: usize) -> Option<usize> {
    log.iter()
        .enumerate()
        .skip(from + 1)
        .find(|(_, entry)| !entry.is_header())
        .map(|(index, _)| index)
}

/// Index of the closest non-header entry before `from`.
pub fn previous_entry_index(log: &[TimeLogEntry], from: usize) -> Option<usize> {
    log[..from.min(log.len())]
        .iter()
        .rposition(|entry| !entry.is_header())
}

/// First entry of the chapter following the one containing `from`.
pub fn next_chapter_index(log: &[TimeLogEntry], from: usize) -> Option<usize> {
    let header = log
        .iter()
        .enumerate()
        .skip(from + 1)
        .find(|(_, entry)| entry.is_header())
        .map(|(index, _)| index)?;
    next_entry_index(log, header)
}

/// First entry of the chapter preceding the one containing `from`.
pub fn previous_chapter_index(log: &[TimeLogEntry], from: usize) -> Option<usize> {
    let current_header = header_at_or_before(log, from)?;
    let previous_header = header_at_or_before(log, current_header.checked_sub(1)?)?;
    next_entry_index(log, previous_header)
}

fn header_at_or_before(log: &[TimeLogEntry], index: usize) -> Option<usize> {
    let end = (index + 1).min(log.len());
    log[..end].iter().rposition(TimeLogEntry::is_header)
}

type Finder = fn(&[TimeLogEntry], usize) -> Option<usize>;

impl TimerEngine {
    pub fn next_entry(&mut self, tasks: &mut impl TaskStore) {
        self.navigate(tasks, next_entry_index, "next entry");
    }

    pub fn previous_entry(&mut self, tasks: &mut impl TaskStore) {
        self.navigate(tasks, previous_entry_index, "previous entry");
    }

    pub fn next_chapter(&mut self, tasks: &mut impl TaskStore) {
        self.navigate(tasks, next_chapter_index, "next chapter");
    }

    pub fn previous_chapter(&mut self, tasks: &mut impl TaskStore) {
        self.navigate(tasks, previous_chapter_index, "previous chapter");
    }

    /// Switches the timer to the entry picked by `find`, relative to the active entry.
    fn navigate(&mut self, tasks: &mut impl TaskStore, find: Finder, direction: &str) {
        let Some(active) = self.state().active.as_ref() else {
            debug!("No active entry to move from to the {direction}");
            return;
        };
        let Some(task) = tasks.task(&active.task_id) else {
            return;
        };
        let Some(current) = task.entry_position(&active.entry.id) else {
            debug!("Active entry {} is no longer in {}", active.entry.id, active.task_id);
            return;
        };
        let Some(target) = find(&task.time_log, current) else {
            debug!("There is no {direction} after {}", active.entry.id);
            return;
        };
        let task_id = active.task_id.clone();
        let entry_id = task.time_log[target].id.clone();
        self.toggle(tasks, &task_id, &entry_id);
    }
}
