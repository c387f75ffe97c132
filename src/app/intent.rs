use anyhow::{Context, Result, bail};
use tracing::info;

use crate::{
    engine::queue::log_from_checklist,
    model::{
        ChecklistItem, ChecklistItemId, EntryId, Task, TaskId, TimeLogEntry, task::first_playable,
    },
    store::TaskStore,
};

use super::Workspace;

/// One user request against the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    AddTask {
        title: String,
    },
    AddEntry {
        task: TaskId,
        description: String,
        header: bool,
        checklist_item: Option<ChecklistItemId>,
    },
    RemoveTask {
        task: TaskId,
    },
    AddChecklistItem {
        task: TaskId,
        section: Option<String>,
        text: String,
    },
    CompleteChecklistItem {
        task: TaskId,
        item: ChecklistItemId,
    },
    Toggle {
        task: TaskId,
        entry: EntryId,
    },
    Stop,
    Reset {
        task: TaskId,
        entry: EntryId,
    },
    Clear,
    Prime {
        task: TaskId,
    },
    PrimeChecklist {
        task: TaskId,
        title: Option<String>,
    },
    NextEntry,
    PreviousEntry,
    NextChapter,
    PreviousChapter,
    Post {
        task: TaskId,
        reset: bool,
    },
    ResetAll {
        task: TaskId,
    },
    SessionStart {
        queue: Vec<TaskId>,
    },
    SessionNext {
        queue: Vec<TaskId>,
    },
    SessionPrevious {
        queue: Vec<TaskId>,
    },
    SessionTask {
        task: TaskId,
    },
    Status,
    Watch,
}

/// What should be shown after an intent was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(String),
    Removed(TaskId),
    Timer,
    Status,
}

impl Workspace {
    /// Applies `intent`. Timer operations never fail; editing intents fail on ids that don't
    /// exist, since those come straight from the user.
    pub fn apply(&mut self, intent: Intent) -> Result<Outcome> {
        let book = &mut self.book;
        let engine = &mut self.engine;
        match intent {
            Intent::AddTask { title } => {
                let id = TaskId::from(engine.next_id());
                book.insert(Task::new(id.clone(), title));
                info!("Added task {id}");
                Ok(Outcome::Created(id.to_string()))
            }
            Intent::AddEntry {
                task,
                description,
                header,
                checklist_item,
            } => {
                let id = engine.next_entry_id();
                let target = book
                    .task_mut(&task)
                    .with_context(|| format!("Task {task} does not exist"))?;
                let entry = match checklist_item {
                    _ if header => TimeLogEntry::header(id.clone(), description),
                    Some(item_id) => {
                        let item = target
                            .checklist
                            .item(&item_id)
                            .with_context(|| format!("Checklist item {item_id} does not exist"))?;
                        TimeLogEntry::new(id.clone(), description)
                            .with_duration(item.logged_time)
                            .with_checklist_item(item_id)
                    }
                    None => TimeLogEntry::new(id.clone(), description),
                };
                target.time_log.push(entry);
                book.task_changed(&task);
                Ok(Outcome::Created(id.to_string()))
            }
            Intent::RemoveTask { task } => {
                if book.task(&task).is_none() {
                    bail!("Task {task} does not exist");
                }
                engine.forget_task(&task);
                book.remove(&task);
                self.deleted.push(task.clone());
                info!("Removed task {task}");
                Ok(Outcome::Removed(task))
            }
            Intent::AddChecklistItem {
                task,
                section,
                text,
            } => {
                let id = ChecklistItemId::from(engine.next_id());
                let target = book
                    .task_mut(&task)
                    .with_context(|| format!("Task {task} does not exist"))?;
                target.checklist.add_item(
                    section.as_deref().unwrap_or_default(),
                    || engine.next_id(),
                    ChecklistItem::new(id.clone(), text),
                );
                book.task_changed(&task);
                Ok(Outcome::Created(id.to_string()))
            }
            Intent::CompleteChecklistItem { task, item } => {
                let target = book
                    .task_mut(&task)
                    .with_context(|| format!("Task {task} does not exist"))?;
                target
                    .checklist
                    .item_mut(&item)
                    .with_context(|| format!("Checklist item {item} does not exist"))?
                    .is_completed = true;
                book.task_changed(&task);
                Ok(Outcome::Status)
            }
            Intent::Toggle { task, entry } => {
                engine.toggle(book, &task, &entry);
                Ok(Outcome::Timer)
            }
            Intent::Stop => {
                engine.stop(book);
                Ok(Outcome::Timer)
            }
            Intent::Reset { task, entry } => {
                engine.reset(book, &task, &entry);
                Ok(Outcome::Timer)
            }
            Intent::Clear => {
                engine.clear_active();
                Ok(Outcome::Timer)
            }
            Intent::Prime { task } => {
                engine.prime_task(book, &task);
                Ok(Outcome::Timer)
            }
            Intent::PrimeChecklist { task, title } => {
                let target = book
                    .task(&task)
                    .with_context(|| format!("Task {task} does not exist"))?;
                let log = log_from_checklist(&target.checklist, || engine.next_entry_id());
                if first_playable(&log).is_none() {
                    bail!("Task {task} has no open checklist items to build a log from");
                }
                engine.prime_with_new_log(book, &task, log, title);
                Ok(Outcome::Timer)
            }
            Intent::NextEntry => {
                engine.next_entry(book);
                Ok(Outcome::Timer)
            }
            Intent::PreviousEntry => {
                engine.previous_entry(book);
                Ok(Outcome::Timer)
            }
            Intent::NextChapter => {
                engine.next_chapter(book);
                Ok(Outcome::Timer)
            }
            Intent::PreviousChapter => {
                engine.previous_chapter(book);
                Ok(Outcome::Timer)
            }
            Intent::Post { task, reset } => {
                if reset {
                    engine.post_and_reset_log(book, &task);
                } else {
                    engine.post_log(book, &task);
                }
                Ok(Outcome::Status)
            }
            Intent::ResetAll { task } => {
                engine.reset_all_log_entries(book, &task);
                Ok(Outcome::Status)
            }
            Intent::SessionStart { queue } => {
                engine.start_session(book, &queue);
                Ok(Outcome::Timer)
            }
            Intent::SessionNext { queue } => {
                engine.next_in_session(book, &queue);
                Ok(Outcome::Timer)
            }
            Intent::SessionPrevious { queue } => {
                engine.previous_in_session(book, &queue);
                Ok(Outcome::Timer)
            }
            Intent::SessionTask { task } => {
                engine.start_task_from_session(book, &task);
                Ok(Outcome::Timer)
            }
            // The refresh loop itself is driven by [super::watch].
            Intent::Status | Intent::Watch => Ok(Outcome::Status),
        }
    }
}
