//! Archiving a task's log into immutable sessions.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    model::{Checklist, SessionId, TaskId, TimeLogEntry, TimeLogSession},
    store::TaskStore,
};

use super::{TimerEngine, checklist_link::sync_logged_time, state::TimerState};

/// Snapshots the task's log into a new session, finalizing a running entry first. With
/// `reset_live_log` the live log keeps its structure but every entry starts from zero again.
pub fn post_log(
    mut state: TimerState,
    tasks: &mut impl TaskStore,
    task_id: &TaskId,
    session_id: SessionId,
    reset_live_log: bool,
    now: DateTime<Utc>,
) -> TimerState {
    let Some(task) = tasks.task_mut(task_id) else {
        debug!("Ignoring post of unknown task {task_id}");
        return state;
    };
    if task.time_log.is_empty() {
        debug!("Nothing to post for {task_id}");
        return state;
    }

    for entry in task.time_log.iter_mut().filter(|entry| entry.is_running) {
        *entry = entry.finalized(now);
        sync_logged_time(&mut task.checklist, entry);
    }

    let title = task
        .time_log_title
        .clone()
        .unwrap_or_else(|| format!("{} {}", task.title, now.format("%Y-%m-%d")));
    let session = TimeLogSession::new(session_id, title, now, task.time_log.clone());
    info!(
        "Archived {} entries of {task_id} as session {}",
        session.entries().len(),
        session.id()
    );
    task.time_log_sessions.push(session);

    if reset_live_log {
        zero_log(&mut task.time_log, &mut task.checklist);
    }
    tasks.task_changed(task_id);

    if state.active_task() == Some(task_id) {
        state.active = None;
    }
    state
}

/// Zeroes every entry of the task without archiving anything.
pub fn reset_all_log_entries(
    mut state: TimerState,
    tasks: &mut impl TaskStore,
    task_id: &TaskId,
) -> TimerState {
    let Some(task) = tasks.task_mut(task_id) else {
        debug!("Ignoring reset of unknown task {task_id}");
        return state;
    };
    zero_log(&mut task.time_log, &mut task.checklist);
    tasks.task_changed(task_id);
    info!("Reset every entry of {task_id}");

    if state.active_task() == Some(task_id) {
        state.active = None;
    }
    state
}

fn zero_log(log: &mut [TimeLogEntry], checklist: &mut Checklist) {
    for entry in log.iter_mut() {
        *entry = entry.zeroed();
        sync_logged_time(checklist, entry);
    }
}

impl TimerEngine {
    pub fn post_log(&mut self, tasks: &mut impl TaskStore, task_id: &TaskId) {
        self.archive(tasks, task_id, false);
    }

    pub fn post_and_reset_log(&mut self, tasks: &mut impl TaskStore, task_id: &TaskId) {
        self.archive(tasks, task_id, true);
    }

    pub fn reset_all_log_entries(&mut self, tasks: &mut impl TaskStore, task_id: &TaskId) {
        self.apply(|state, _| reset_all_log_entries(state, tasks, task_id));
    }

    fn archive(&mut self, tasks: &mut impl TaskStore, task_id: &TaskId, reset_live_log: bool) {
        let session_id = self.next_session_id();
        self.apply(|state, now| post_log(state, tasks, task_id, session_id, reset_live_log, now));
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::{
        engine::tests::{entry, running_count, setup, task_with_log},
        model::{Checklist, ChecklistBlock, ChecklistItem, ChecklistSection, Task, TimeLogEntry},
        store::TaskStore,
    };

    fn task_with_checklist_link() -> Task {
        let mut task = Task::new("1".into(), "Paint");
        task.checklist = Checklist::new(vec![ChecklistBlock::Section(ChecklistSection {
            id: "s".into(),
            title: "Walls".into(),
            items: vec![ChecklistItem::new("prime".into(), "Prime")],
        })]);
        task.time_log = vec![
            TimeLogEntry::header("h".into(), "Walls"),
            TimeLogEntry::new("x".into(), "Prime")
                .with_checklist_item("prime".into())
                .with_duration(Duration::milliseconds(120_000)),
        ];
        task
    }

    #[test]
    fn post_and_reset_archives_finalized_log() {
        let (mut engine, mut book, clock) = setup(vec![task_with_checklist_link()]);
        engine.toggle(&mut book, &"1".into(), &"x".into());
        clock.advance_ms(5_000);

        engine.post_and_reset_log(&mut book, &"1".into());

        let task = book.task(&"1".into()).unwrap();
        assert_eq!(task.time_log_sessions.len(), 1);
        let session = &task.time_log_sessions[0];
        assert_eq!(session.entries().len(), 2);
        assert_eq!(session.entries()[1].duration, Duration::milliseconds(125_000));
        assert!(!session.entries()[1].is_running);
        assert_eq!(session.total_duration(), Duration::milliseconds(125_000));

        let live = entry(&book, "1", "x");
        assert_eq!(live.duration, Duration::zero());
        assert!(!live.is_running);
        assert_eq!(task.time_log[0].description, "Walls");
        assert_eq!(
            task.checklist.item(&"prime".into()).unwrap().logged_time,
            Duration::zero()
        );
        assert_eq!(engine.state().active, None);
    }

    #[test]
    fn plain_post_keeps_live_durations() {
        let (mut engine, mut book, clock) = setup(vec![task_with_checklist_link()]);
        engine.toggle(&mut book, &"1".into(), &"x".into());
        clock.advance_ms(5_000);

        engine.post_log(&mut book, &"1".into());

        let live = entry(&book, "1", "x");
        assert_eq!(live.duration, Duration::milliseconds(125_000));
        assert!(!live.is_running);
        assert_eq!(running_count(&book), 0);
        let task = book.task(&"1".into()).unwrap();
        assert_eq!(
            task.checklist.item(&"prime".into()).unwrap().logged_time,
            Duration::milliseconds(125_000)
        );
        assert_eq!(task.time_log_sessions[0].title(), "Paint 2018-07-04");
        assert_eq!(engine.state().active, None);
    }

    #[test]
    fn posting_another_task_keeps_the_active_timer() {
        let (mut engine, mut book, _) = setup(vec![
            task_with_log("1", &[("x", false)]),
            task_with_log("2", &[("y", false)]),
        ]);
        engine.toggle(&mut book, &"1".into(), &"x".into());

        engine.post_log(&mut book, &"2".into());

        assert!(engine.state().is_running(&"1".into(), &"x".into()));
        assert_eq!(book.task(&"2".into()).unwrap().time_log_sessions.len(), 1);
    }

    #[test]
    fn empty_logs_are_not_archived() {
        let (mut engine, mut book, _) = setup(vec![Task::new("1".into(), "Empty")]);

        engine.post_log(&mut book, &"1".into());

        assert!(book.task(&"1".into()).unwrap().time_log_sessions.is_empty());
    }

    #[test]
    fn reset_all_zeroes_without_archiving() {
        let (mut engine, mut book, clock) = setup(vec![task_with_log("1", &[("a", false), ("b", false)])]);
        engine.toggle(&mut book, &"1".into(), &"a".into());
        clock.advance_ms(2_000);
        engine.toggle(&mut book, &"1".into(), &"b".into());
        clock.advance_ms(2_000);

        engine.reset_all_log_entries(&mut book, &"1".into());

        let task = book.task(&"1".into()).unwrap();
        assert!(task.time_log_sessions.is_empty());
        assert!(task
            .time_log
            .iter()
            .all(|entry| entry.duration == Duration::zero() && !entry.is_running));
        assert_eq!(engine.state().active, None);
    }
}
