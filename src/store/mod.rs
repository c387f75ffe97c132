//! The task collection the engine reads from and writes logs into. The engine only depends on
//! [TaskStore]; [TaskBook] is the in-memory collection used by the application.

use std::collections::{BTreeSet, HashMap};

use crate::model::{Task, TaskId};

/// Access to tasks owned outside of the engine.
pub trait TaskStore {
    fn task(&self, id: &TaskId) -> Option<&Task>;

    fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task>;

    fn task_ids(&self) -> Vec<TaskId>;

    /// Signals that a task's persisted fields changed and should be saved.
    fn task_changed(&mut self, id: &TaskId);
}

/// Insertion ordered in-memory task collection that remembers which tasks changed since the
/// last [TaskBook::take_changed].
#[derive(Debug, Default)]
pub struct TaskBook {
    order: Vec<TaskId>,
    tasks: HashMap<TaskId, Task>,
    changed: BTreeSet<TaskId>,
}

impl TaskBook {
    pub fn new(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut book = Self::default();
        for task in tasks {
            book.load(task);
        }
        book
    }

    /// Adds a task without marking it changed.
    fn load(&mut self, task: Task) {
        if !self.tasks.contains_key(&task.id) {
            self.order.push(task.id.clone());
        }
        self.tasks.insert(task.id.clone(), task);
    }

    pub fn insert(&mut self, task: Task) {
        let id = task.id.clone();
        self.load(task);
        self.changed.insert(id);
    }

    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        self.order.retain(|existing| existing != id);
        self.changed.remove(id);
        self.tasks.remove(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns tasks changed since the previous call, in id order.
    pub fn take_changed(&mut self) -> Vec<Task> {
        std::mem::take(&mut self.changed)
            .into_iter()
            .filter_map(|id| self.tasks.get(&id).cloned())
            .collect()
    }
}

impl TaskStore for TaskBook {
    fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    fn task_ids(&self) -> Vec<TaskId> {
        self.order.clone()
    }

    fn task_changed(&mut self, id: &TaskId) {
        if self.tasks.contains_key(id) {
            self.changed.insert(id.clone());
        }
    }
}
