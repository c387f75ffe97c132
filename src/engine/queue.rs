//! Stepping through a work session queue: a fixed, externally supplied order of tasks that are
//! timed one after another.

use tracing::debug;

use crate::{
    model::{Checklist, EntryId, TaskId, TimeLogEntry, task::first_playable},
    store::TaskStore,
};

use super::{TimerEngine, ToggleRequest};

const UNTITLED_SECTION: &str = "Checklist";

/// Builds a log with a header per checklist section and an entry per item still to be done.
/// Entries start from the time already mirrored on their item.
pub fn log_from_checklist(
    checklist: &Checklist,
    mut next_id: impl FnMut() -> EntryId,
) -> Vec<TimeLogEntry> {
    let mut log = Vec::new();
    for section in checklist.sections() {
        let mut open = section.items.iter().filter(|item| !item.is_completed).peekable();
        if open.peek().is_none() {
            continue;
        }
        let title = if section.title.is_empty() {
            UNTITLED_SECTION
        } else {
            section.title.as_str()
        };
        log.push(TimeLogEntry::header(next_id(), title));
        for item in open {
            log.push(
                TimeLogEntry::new(next_id(), item.text.clone())
                    .with_checklist_item(item.id.clone())
                    .with_duration(item.logged_time),
            );
        }
    }
    log
}

impl TimerEngine {
    /// Starts timing the first task of the queue.
    pub fn start_session(&mut self, tasks: &mut impl TaskStore, queue: &[TaskId]) {
        let Some(first) = queue.first() else {
            debug!("Work session queue is empty");
            return;
        };
        let Some(task) = tasks.task(first) else {
            debug!("First queued task {first} does not exist");
            return;
        };
        match task.first_playable() {
            Some(entry) => {
                let entry_id = entry.id.clone();
                self.start_entry(tasks, first, &entry_id);
            }
            None => self.start_default_entry(tasks, first),
        }
    }

    pub fn next_in_session(&mut self, tasks: &mut impl TaskStore, queue: &[TaskId]) {
        self.step_session(tasks, queue, true);
    }

    pub fn previous_in_session(&mut self, tasks: &mut impl TaskStore, queue: &[TaskId]) {
        self.step_session(tasks, queue, false);
    }

    /// Starts a task picked from the session: its existing log, else a log generated from its
    /// checklist, else a single fresh entry.
    pub fn start_task_from_session(&mut self, tasks: &mut impl TaskStore, task_id: &TaskId) {
        let Some(task) = tasks.task(task_id) else {
            debug!("Ignoring session start of unknown task {task_id}");
            return;
        };
        if let Some(entry) = task.first_playable() {
            let entry_id = entry.id.clone();
            self.start_entry(tasks, task_id, &entry_id);
            return;
        }

        let generated = log_from_checklist(&task.checklist, || self.next_entry_id());
        if let Some(entry_id) = first_playable(&generated).map(|entry| entry.id.clone()) {
            debug!("Generated {} log records from the checklist of {task_id}", generated.len());
            self.toggle_with(
                tasks,
                ToggleRequest::with_log(task_id.clone(), entry_id, generated),
            );
            return;
        }

        self.start_default_entry(tasks, task_id);
    }

    fn step_session(&mut self, tasks: &mut impl TaskStore, queue: &[TaskId], forward: bool) {
        let Some(current) = self.state().active_task() else {
            debug!("No active task to step the session from");
            return;
        };
        let Some(position) = queue.iter().position(|id| id == current) else {
            debug!("Active task {current} is not part of the session");
            return;
        };
        let neighbour = if forward {
            queue.get(position + 1)
        } else {
            position.checked_sub(1).and_then(|index| queue.get(index))
        };
        let Some(neighbour) = neighbour.filter(|id| tasks.task(id).is_some()) else {
            debug!("No queued task in that direction of {current}");
            return;
        };
        self.stop(tasks);
        self.start_default_entry(tasks, neighbour);
    }

    /// Toggles the entry unless it is already the running one, which toggling would pause.
    fn start_entry(&mut self, tasks: &mut impl TaskStore, task_id: &TaskId, entry_id: &EntryId) {
        if self.state().is_running(task_id, entry_id) {
            debug!("Entry {entry_id} of {task_id} is already running");
            return;
        }
        self.toggle(tasks, task_id, entry_id);
    }

    fn start_default_entry(&mut self, tasks: &mut impl TaskStore, task_id: &TaskId) {
        let Some(title) = tasks.task(task_id).map(|task| task.title.clone()) else {
            return;
        };
        let entry = TimeLogEntry::new(self.next_entry_id(), title);
        self.toggle_with(tasks, ToggleRequest::new_entry(task_id.clone(), entry));
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::{
        engine::tests::{running_count, setup, task_with_log},
        model::{
            Checklist, ChecklistBlock, ChecklistItem, ChecklistSection, RichTextBlock, Task, TaskId,
        },
        store::TaskStore,
    };

    use super::log_from_checklist;

    fn queue(ids: &[&str]) -> Vec<TaskId> {
        ids.iter().map(|id| TaskId::from(*id)).collect()
    }

    fn checklist() -> Checklist {
        let mut done = ChecklistItem::new("done".into(), "Tape edges");
        done.is_completed = true;
        let mut primed = ChecklistItem::new("prime".into(), "Prime");
        primed.logged_time = Duration::minutes(3);
        Checklist::new(vec![
            ChecklistBlock::Text(RichTextBlock {
                id: "t".into(),
                content: "Use the blue paint".into(),
            }),
            ChecklistBlock::Section(ChecklistSection {
                id: "a".into(),
                title: "Prep".into(),
                items: vec![done.clone()],
            }),
            ChecklistBlock::Section(ChecklistSection {
                id: "b".into(),
                title: "Walls".into(),
                items: vec![primed, ChecklistItem::new("coat".into(), "First coat"), done],
            }),
            ChecklistBlock::Section(ChecklistSection {
                id: "c".into(),
                title: String::new(),
                items: vec![ChecklistItem::new("clean".into(), "Clean up")],
            }),
        ])
    }

    #[test]
    fn checklist_log_covers_open_items_by_section() {
        let mut counter = 0;
        let log = log_from_checklist(&checklist(), || {
            counter += 1;
            counter.to_string().into()
        });

        let shape = log
            .iter()
            .map(|entry| (entry.is_header(), entry.description.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            shape,
            vec![
                (true, "Walls"),
                (false, "Prime"),
                (false, "First coat"),
                (true, "Checklist"),
                (false, "Clean up"),
            ]
        );
        assert_eq!(log[1].duration, Duration::minutes(3));
        assert_eq!(log[1].checklist_item_id, Some("prime".into()));
    }

    #[test]
    fn start_session_uses_existing_log() {
        let (mut engine, mut book, _) = setup(vec![
            task_with_log("1", &[("h", true), ("a", false)]),
            task_with_log("2", &[]),
        ]);

        engine.start_session(&mut book, &queue(&["1", "2"]));

        assert!(engine.state().is_running(&"1".into(), &"a".into()));
    }

    #[test]
    fn starting_a_running_session_again_keeps_it_running() {
        let (mut engine, mut book, clock) = setup(vec![task_with_log("1", &[("a", false)])]);
        let queue = queue(&["1"]);

        engine.start_session(&mut book, &queue);
        clock.advance_ms(400);
        engine.start_session(&mut book, &queue);
        engine.start_task_from_session(&mut book, &"1".into());

        assert!(engine.state().is_running(&"1".into(), &"a".into()));
        assert!(book.task(&"1".into()).unwrap().time_log[0].is_running);
        assert_eq!(running_count(&book), 1);
    }

    #[test]
    fn start_session_synthesizes_default_entry() {
        let (mut engine, mut book, _) = setup(vec![Task::new("1".into(), "Write report")]);

        engine.start_session(&mut book, &queue(&["1"]));

        let task = book.task(&"1".into()).unwrap();
        assert_eq!(task.time_log.len(), 1);
        assert_eq!(task.time_log[0].description, "Write report");
        assert!(task.time_log[0].is_running);
    }

    #[test]
    fn stepping_moves_through_the_queue_and_stops_at_edges() {
        let (mut engine, mut book, clock) = setup(vec![
            Task::new("1".into(), "One"),
            Task::new("2".into(), "Two"),
        ]);
        let queue = queue(&["1", "2"]);
        engine.start_session(&mut book, &queue);
        clock.advance_ms(900);

        engine.next_in_session(&mut book, &queue);
        assert_eq!(engine.state().active_task(), Some(&"2".into()));
        assert_eq!(book.task(&"1".into()).unwrap().time_log[0].duration, Duration::milliseconds(900));
        assert_eq!(running_count(&book), 1);

        engine.next_in_session(&mut book, &queue);
        assert_eq!(engine.state().active_task(), Some(&"2".into()));

        engine.previous_in_session(&mut book, &queue);
        assert_eq!(engine.state().active_task(), Some(&"1".into()));
        assert_eq!(book.task(&"1".into()).unwrap().time_log.len(), 2);
        assert_eq!(running_count(&book), 1);
    }

    #[test]
    fn stepping_from_outside_the_queue_does_nothing() {
        let (mut engine, mut book, _) = setup(vec![
            task_with_log("1", &[("x", false)]),
            Task::new("2".into(), "Two"),
        ]);
        engine.toggle(&mut book, &"1".into(), &"x".into());

        engine.next_in_session(&mut book, &queue(&["2"]));

        assert!(engine.state().is_running(&"1".into(), &"x".into()));
    }

    #[test]
    fn task_from_session_prefers_log_then_checklist_then_default() {
        let mut with_checklist = Task::new("2".into(), "Paint");
        with_checklist.checklist = checklist();
        let (mut engine, mut book, _) = setup(vec![
            task_with_log("1", &[("x", false)]),
            with_checklist,
            Task::new("3".into(), "Plain"),
        ]);

        engine.start_task_from_session(&mut book, &"1".into());
        assert!(engine.state().is_running(&"1".into(), &"x".into()));

        engine.start_task_from_session(&mut book, &"2".into());
        let painted = book.task(&"2".into()).unwrap();
        assert_eq!(painted.time_log.len(), 5);
        assert!(painted.time_log[1].is_running);
        assert_eq!(painted.time_log[1].description, "Prime");

        engine.start_task_from_session(&mut book, &"3".into());
        let plain = book.task(&"3".into()).unwrap();
        assert_eq!(plain.time_log.len(), 1);
        assert!(plain.time_log[0].is_running);
        assert_eq!(running_count(&book), 1);
    }
}
