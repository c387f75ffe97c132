//! The work-timer engine.
//!
//! [TimerEngine] owns the single [TimerState] of the process and the clock. Callers hand it the
//! task collection on every operation; the engine never keeps references into it. All
//! operations are synchronous and never fail: unknown tasks or entries simply leave everything
//! as it was.
//!
//! The transitions themselves live in [transition], [archive] and [chapters] as functions from
//! the current state to the next one, so they can be exercised without an engine.

pub mod archive;
pub mod chapters;
pub mod checklist_link;
pub mod queue;
pub mod state;
pub mod transition;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    model::{EntryId, SessionId, TaskId, TimeLogEntry},
    store::TaskStore,
    utils::clock::Clock,
};

pub use state::{ActiveTimer, TimerDisplay, TimerState};
pub use transition::ToggleRequest;

pub struct TimerEngine {
    state: TimerState,
    clock: Box<dyn Clock>,
    id_sequence: u64,
}

impl TimerEngine {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            state: TimerState::default(),
            clock,
            id_sequence: 0,
        }
    }

    /// Installs state persisted by a previous run. A timer that was running is resumed through
    /// [TimerEngine::toggle_with], which folds in the time that passed while nothing was
    /// watching it.
    pub fn restore(clock: Box<dyn Clock>, stored: TimerState, tasks: &mut impl TaskStore) -> Self {
        let mut engine = Self::new(clock);
        let TimerState {
            active,
            primed_task,
        } = stored;

        match active {
            Some(active) if active.entry.is_running && active.entry.start_time.is_some() => {
                info!("Resuming {} in {} after restart", active.entry.id, active.task_id);
                reconcile_pointer_copy(tasks, &active);
                let ActiveTimer { task_id, entry } = active;
                engine.toggle_with(tasks, ToggleRequest::new_entry(task_id, entry));
            }
            Some(active) => {
                engine.state.active = tasks.task(&active.task_id).is_some().then_some(active);
            }
            None => {}
        }

        if engine.state.active.is_none() {
            engine.state.primed_task = primed_task.filter(|id| tasks.task(id).is_some());
        }

        let now = engine.now();
        let running = engine
            .state
            .running()
            .map(|(task, entry)| (task.clone(), entry.clone()));
        transition::settle_orphans(
            tasks,
            running.as_ref().map(|(task, entry)| (task, entry)),
            now,
        );
        if let Some(active) = engine.state.active.as_mut() {
            if let Some(entry) = tasks
                .task(&active.task_id)
                .and_then(|task| task.entry(&active.entry.id))
            {
                active.entry = entry.clone();
            }
        }
        engine
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    /// Persistable copy of the current state.
    pub fn snapshot(&self) -> TimerState {
        self.state.clone()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.time()
    }

    pub fn display(&self) -> Option<TimerDisplay> {
        self.state.display(self.now())
    }

    pub fn primed_task(&self) -> Option<&TaskId> {
        self.state.primed_task.as_ref()
    }

    /// Unique, time ordered identifier for new entries, sessions and tasks.
    pub fn next_id(&mut self) -> String {
        self.id_sequence += 1;
        format!("{:x}{:04x}", self.now().timestamp_millis(), self.id_sequence)
    }

    pub fn next_entry_id(&mut self) -> EntryId {
        self.next_id().into()
    }

    pub(crate) fn next_session_id(&mut self) -> SessionId {
        self.next_id().into()
    }

    fn apply(&mut self, transition: impl FnOnce(TimerState, DateTime<Utc>) -> TimerState) {
        let now = self.now();
        let state = std::mem::take(&mut self.state);
        self.state = transition(state, now);
    }

    pub fn toggle(&mut self, tasks: &mut impl TaskStore, task_id: &TaskId, entry_id: &EntryId) {
        self.toggle_with(
            tasks,
            ToggleRequest::existing(task_id.clone(), entry_id.clone()),
        );
    }

    pub fn toggle_with(&mut self, tasks: &mut impl TaskStore, request: ToggleRequest) {
        self.apply(|state, now| transition::toggle(state, tasks, request, now));
    }

    pub fn stop(&mut self, tasks: &mut impl TaskStore) {
        self.apply(|state, now| transition::stop(state, tasks, now));
    }

    pub fn reset(&mut self, tasks: &mut impl TaskStore, task_id: &TaskId, entry_id: &EntryId) {
        self.apply(|state, _| transition::reset(state, tasks, task_id, entry_id));
    }

    pub fn clear_active(&mut self) {
        self.apply(|state, _| transition::clear_active(state));
    }

    pub fn prime_task(&mut self, tasks: &mut impl TaskStore, task_id: &TaskId) {
        self.apply(|state, now| transition::prime_task(state, tasks, task_id, now));
    }

    pub fn prime_with_new_log(
        &mut self,
        tasks: &mut impl TaskStore,
        task_id: &TaskId,
        entries: Vec<TimeLogEntry>,
        title: Option<String>,
    ) {
        self.apply(|state, now| {
            transition::prime_with_new_log(state, tasks, task_id, entries, title, now)
        });
    }

    /// Must be called before a task is removed from the store. A timer of that task is dropped
    /// together with it.
    pub fn forget_task(&mut self, task_id: &TaskId) {
        if self.state.active_task() == Some(task_id) {
            debug!("Dropping active timer of deleted task {task_id}");
            self.state.active = None;
        }
        if self.state.primed_task.as_ref() == Some(task_id) {
            self.state.primed_task = None;
        }
    }
}

/// A running pointer persisted after its task was last saved carries the newer start time.
fn reconcile_pointer_copy(tasks: &mut impl TaskStore, active: &ActiveTimer) {
    let Some(task) = tasks.task_mut(&active.task_id) else {
        return;
    };
    if let Some(position) = task.entry_position(&active.entry.id) {
        if !task.time_log[position].is_running {
            task.time_log[position] = active.entry.clone();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{Duration, Utc};

    use crate::{
        model::{
            Checklist, ChecklistBlock, ChecklistItem, ChecklistSection, EntryId, Task, TaskId,
            TimeLogEntry,
        },
        store::{TaskBook, TaskStore},
        utils::{
            clock::{Clock, ManualClock},
            logging::TEST_LOGGING,
        },
    };

    use super::{ActiveTimer, TimerEngine, TimerState, ToggleRequest};

    pub(crate) fn entry(task: &TaskBook, task_id: &str, entry_id: &str) -> TimeLogEntry {
        task.task(&task_id.into())
            .and_then(|task| task.entry(&entry_id.into()))
            .cloned()
            .expect("entry should exist")
    }

    pub(crate) fn running_count(book: &TaskBook) -> usize {
        book.tasks()
            .flat_map(|task| task.time_log.iter())
            .filter(|entry| entry.is_running)
            .count()
    }

    pub(crate) fn task_with_log(id: &str, log: &[(&str, bool)]) -> Task {
        let mut task = Task::new(id.into(), format!("Task {id}"));
        task.time_log = log
            .iter()
            .map(|(entry_id, header)| {
                if *header {
                    TimeLogEntry::header((*entry_id).into(), format!("Chapter {entry_id}"))
                } else {
                    TimeLogEntry::new((*entry_id).into(), format!("Entry {entry_id}"))
                }
            })
            .collect();
        task
    }

    pub(crate) fn setup(tasks: Vec<Task>) -> (TimerEngine, TaskBook, ManualClock) {
        *TEST_LOGGING;
        let clock = ManualClock::new();
        let engine = TimerEngine::new(Box::new(clock.clone()));
        (engine, TaskBook::new(tasks), clock)
    }

    fn ids(task: &str, entry: &str) -> (TaskId, EntryId) {
        (task.into(), entry.into())
    }

    #[test]
    fn start_then_pause_accumulates_elapsed_time() {
        let (mut engine, mut book, clock) = setup(vec![task_with_log("1", &[("x", false)])]);
        let (task, x) = ids("1", "x");

        engine.toggle(&mut book, &task, &x);
        assert!(entry(&book, "1", "x").is_running);
        clock.advance_ms(1500);
        engine.toggle(&mut book, &task, &x);

        let stored = entry(&book, "1", "x");
        assert_eq!(stored.duration, Duration::milliseconds(1500));
        assert_eq!(stored.start_time, None);
        assert!(!stored.is_running);
        let active = engine.state().active.as_ref().expect("paused entry stays selected");
        assert!(active.is(&task, &x));
        assert!(!active.entry.is_running);
    }

    #[test]
    fn switching_tasks_finalizes_previous_entry() {
        let (mut engine, mut book, clock) = setup(vec![
            task_with_log("1", &[("x", false)]),
            task_with_log("2", &[("y", false)]),
        ]);

        engine.toggle(&mut book, &"1".into(), &"x".into());
        clock.advance_ms(2000);
        engine.toggle(&mut book, &"2".into(), &"y".into());

        let x = entry(&book, "1", "x");
        assert!(!x.is_running);
        assert_eq!(x.duration, Duration::milliseconds(2000));
        assert!(entry(&book, "2", "y").is_running);
        assert_eq!(running_count(&book), 1);
        let active = engine.state().active.as_ref().unwrap();
        assert!(active.is(&"2".into(), &"y".into()));
    }

    #[test]
    fn durations_never_decrease_across_start_and_pause() {
        let (mut engine, mut book, clock) = setup(vec![task_with_log("1", &[("a", false), ("b", false)])]);
        let task: TaskId = "1".into();
        let mut last = Duration::zero();
        for step in 0..6 {
            let target: EntryId = if step % 3 == 0 { "b".into() } else { "a".into() };
            engine.toggle(&mut book, &task, &target);
            clock.advance_ms(250 * (step + 1));
            let a = entry(&book, "1", "a").live_duration(engine.now());
            assert!(a >= last);
            last = a;
            assert!(running_count(&book) <= 1);
        }
    }

    #[test]
    fn stop_without_active_timer_changes_nothing() {
        let (mut engine, mut book, _) = setup(vec![task_with_log("1", &[("x", false)])]);
        let before = book.task(&"1".into()).cloned();

        engine.stop(&mut book);

        assert_eq!(engine.state(), &TimerState::default());
        assert_eq!(book.task(&"1".into()).cloned(), before);
        assert!(book.take_changed().is_empty());
    }

    #[test]
    fn stop_finalizes_and_deactivates() {
        let (mut engine, mut book, clock) = setup(vec![task_with_log("1", &[("x", false)])]);
        engine.toggle(&mut book, &"1".into(), &"x".into());
        clock.advance_ms(700);

        engine.stop(&mut book);

        assert_eq!(engine.state().active, None);
        assert_eq!(entry(&book, "1", "x").duration, Duration::milliseconds(700));
        assert_eq!(running_count(&book), 0);
    }

    #[test]
    fn headers_are_never_started() {
        let (mut engine, mut book, _) = setup(vec![task_with_log("1", &[("h", true), ("a", false)])]);

        engine.toggle(&mut book, &"1".into(), &"h".into());

        assert_eq!(engine.state().active, None);
        assert_eq!(running_count(&book), 0);
    }

    #[test]
    fn unknown_targets_are_ignored() {
        let (mut engine, mut book, _) = setup(vec![task_with_log("1", &[("a", false)])]);
        engine.toggle(&mut book, &"1".into(), &"a".into());
        let before = engine.snapshot();

        engine.toggle(&mut book, &"1".into(), &"missing".into());
        engine.toggle(&mut book, &"missing".into(), &"a".into());

        assert_eq!(engine.snapshot(), before);
        assert!(entry(&book, "1", "a").is_running);
    }

    #[test]
    fn new_entry_is_appended_and_started() {
        let (mut engine, mut book, _) = setup(vec![task_with_log("1", &[("a", false)])]);
        let fresh = TimeLogEntry::new("fresh".into(), "Fresh");

        engine.toggle_with(&mut book, ToggleRequest::new_entry("1".into(), fresh));

        let task = book.task(&"1".into()).unwrap();
        assert_eq!(task.time_log.len(), 2);
        assert!(task.time_log[1].is_running);
    }

    #[test]
    fn reset_keeps_active_entry_selected() {
        let (mut engine, mut book, clock) = setup(vec![task_with_log("1", &[("x", false)])]);
        engine.toggle(&mut book, &"1".into(), &"x".into());
        clock.advance_ms(5000);

        engine.reset(&mut book, &"1".into(), &"x".into());

        let stored = entry(&book, "1", "x");
        assert_eq!(stored.duration, Duration::zero());
        assert!(!stored.is_running);
        let active = engine.state().active.as_ref().expect("still selected");
        assert_eq!(active.entry, stored);
        assert_eq!(running_count(&book), 0);
    }

    #[test]
    fn priming_is_cancelled_by_starting() {
        let (mut engine, mut book, _) = setup(vec![task_with_log("1", &[("x", false)])]);

        engine.prime_task(&mut book, &"1".into());
        assert_eq!(engine.primed_task(), Some(&"1".into()));

        engine.toggle(&mut book, &"1".into(), &"x".into());
        assert_eq!(engine.primed_task(), None);
    }

    #[test]
    fn prime_with_new_log_selects_first_playable_paused() {
        let (mut engine, mut book, clock) = setup(vec![
            task_with_log("1", &[("x", false)]),
            Task::new("2".into(), "Two"),
        ]);
        engine.toggle(&mut book, &"1".into(), &"x".into());
        clock.advance_ms(300);

        let log = vec![
            TimeLogEntry::header("h".into(), "Intro"),
            TimeLogEntry::new("a".into(), "First"),
        ];
        engine.prime_with_new_log(&mut book, &"2".into(), log, Some("Plan".into()));

        let active = engine.state().active.as_ref().unwrap();
        assert!(active.is(&"2".into(), &"a".into()));
        assert!(!active.entry.is_running);
        assert_eq!(entry(&book, "1", "x").duration, Duration::milliseconds(300));
        assert_eq!(running_count(&book), 0);
        assert_eq!(book.task(&"2".into()).unwrap().time_log_title.as_deref(), Some("Plan"));
    }

    #[test]
    fn clear_active_leaves_durations_alone() {
        let (mut engine, mut book, clock) = setup(vec![task_with_log("1", &[("x", false)])]);
        engine.toggle(&mut book, &"1".into(), &"x".into());
        clock.advance_ms(100);

        engine.clear_active();

        assert_eq!(engine.state(), &TimerState::default());
        assert_eq!(entry(&book, "1", "x").duration, Duration::zero());
    }

    #[test]
    fn cleared_running_entry_is_settled_by_next_start() {
        let (mut engine, mut book, clock) = setup(vec![task_with_log("1", &[("x", false), ("y", false)])]);
        engine.toggle(&mut book, &"1".into(), &"x".into());
        engine.clear_active();
        clock.advance_ms(400);

        engine.toggle(&mut book, &"1".into(), &"y".into());

        assert_eq!(running_count(&book), 1);
        assert_eq!(entry(&book, "1", "x").duration, Duration::milliseconds(400));
    }

    #[test]
    fn restore_folds_in_time_since_last_save() {
        *TEST_LOGGING;
        let clock = ManualClock::new();
        let now = clock.time();
        let running = TimeLogEntry {
            start_time: Some(now - Duration::milliseconds(10_000)),
            is_running: true,
            ..TimeLogEntry::new("x".into(), "Resume me").with_duration(Duration::milliseconds(30_000))
        };
        let mut task = Task::new("1".into(), "One");
        task.time_log.push(running.clone());
        let mut book = TaskBook::new([task]);
        let stored = TimerState {
            active: Some(ActiveTimer {
                task_id: "1".into(),
                entry: running,
            }),
            primed_task: None,
        };

        let engine = TimerEngine::restore(Box::new(clock.clone()), stored, &mut book);

        let restored = entry(&book, "1", "x");
        assert_eq!(restored.duration, Duration::milliseconds(40_000));
        assert!(restored.is_running);
        assert_eq!(restored.start_time, Some(now));
        assert!(engine.state().is_running(&"1".into(), &"x".into()));
    }

    #[test]
    fn restore_settles_stray_running_entries() {
        *TEST_LOGGING;
        let clock = ManualClock::new();
        let now = clock.time();
        let stray = TimeLogEntry {
            start_time: Some(now - Duration::seconds(3)),
            is_running: true,
            ..TimeLogEntry::new("stray".into(), "Stray")
        };
        let mut task = Task::new("1".into(), "One");
        task.time_log.push(stray);
        let mut book = TaskBook::new([task]);

        let engine = TimerEngine::restore(Box::new(clock), TimerState::default(), &mut book);

        assert_eq!(engine.state().active, None);
        let settled = entry(&book, "1", "stray");
        assert!(!settled.is_running);
        assert_eq!(settled.duration, Duration::seconds(3));
    }

    #[test]
    fn restore_drops_pointer_of_missing_task() {
        *TEST_LOGGING;
        let stored = TimerState {
            active: Some(ActiveTimer {
                task_id: "gone".into(),
                entry: TimeLogEntry::new("x".into(), "x").started(Utc::now()),
            }),
            primed_task: Some("gone".into()),
        };
        let mut book = TaskBook::default();

        let engine = TimerEngine::restore(Box::new(ManualClock::new()), stored, &mut book);

        assert_eq!(engine.state(), &TimerState::default());
    }

    #[test]
    fn forgetting_the_active_task_drops_its_timer() {
        let (mut engine, mut book, _) = setup(vec![task_with_log("1", &[("x", false)])]);
        engine.toggle(&mut book, &"1".into(), &"x".into());

        engine.forget_task(&"1".into());
        book.remove(&"1".into());

        assert_eq!(engine.state().active, None);
    }

    #[test]
    fn display_reads_live_duration_without_storing_it() {
        let (mut engine, mut book, clock) = setup(vec![task_with_log("1", &[("x", false)])]);
        engine.toggle(&mut book, &"1".into(), &"x".into());
        clock.advance_ms(3_500);

        let display = engine.display().unwrap();

        assert_eq!(display.elapsed, Duration::milliseconds(3_500));
        assert!(display.running);
        assert_eq!(entry(&book, "1", "x").duration, Duration::zero());
    }

    #[test]
    fn generated_ids_are_unique() {
        let (mut engine, _, _) = setup(vec![]);
        let first = engine.next_id();
        let second = engine.next_id();
        assert_ne!(first, second);
    }

    fn linked_task(id: &str) -> Task {
        let mut task = Task::new(id.into(), "Paint");
        task.checklist = Checklist::new(vec![ChecklistBlock::Section(ChecklistSection {
            id: "s".into(),
            title: "Walls".into(),
            items: vec![ChecklistItem::new("prime".into(), "Prime")],
        })]);
        task.time_log = vec![
            TimeLogEntry::new("x".into(), "Prime")
                .with_checklist_item("prime".into())
                .with_duration(Duration::seconds(60)),
        ];
        task
    }

    fn logged_time(book: &TaskBook, task_id: &str) -> Duration {
        book.task(&task_id.into())
            .and_then(|task| task.checklist.item(&"prime".into()))
            .map(|item| item.logged_time)
            .expect("checklist item should exist")
    }

    #[test]
    fn pausing_mirrors_time_into_the_checklist() {
        let (mut engine, mut book, clock) = setup(vec![linked_task("1")]);
        let (task, x) = ids("1", "x");

        engine.toggle(&mut book, &task, &x);
        clock.advance_ms(15_000);
        assert_eq!(logged_time(&book, "1"), Duration::zero());

        engine.toggle(&mut book, &task, &x);

        assert!(!entry(&book, "1", "x").is_running);
        assert_eq!(logged_time(&book, "1"), Duration::seconds(75));
    }

    #[test]
    fn switching_away_mirrors_time_into_the_checklist() {
        let (mut engine, mut book, clock) =
            setup(vec![linked_task("1"), task_with_log("2", &[("y", false)])]);

        engine.toggle(&mut book, &"1".into(), &"x".into());
        clock.advance_ms(20_000);
        engine.toggle(&mut book, &"2".into(), &"y".into());

        assert!(engine.state().is_running(&"2".into(), &"y".into()));
        assert!(!entry(&book, "1", "x").is_running);
        assert_eq!(logged_time(&book, "1"), Duration::seconds(80));
        assert_eq!(running_count(&book), 1);
    }
}
