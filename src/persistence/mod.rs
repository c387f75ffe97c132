//! Persistence of tasks and the timer pointer.
//!
//!  - Every task lives in its own JSON file under `tasks/`, named after the task id.
//!  - The timer pointer lives in `timer.json` next to it.
//!  - Writes go through [processing::ProcessingModule], which receives [SaveEvent]s from the
//!    foreground and coalesces bursts of task updates before they hit the disk.

use crate::{
    engine::TimerState,
    model::{Task, TaskId},
};

pub mod processing;
pub mod state_storage;

/// Something the foreground changed and wants written down.
#[derive(Debug, Clone)]
pub enum SaveEvent {
    Task(Task),
    TaskDeleted(TaskId),
    Timer(TimerState),
}
