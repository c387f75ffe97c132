use serde::{Deserialize, Serialize};

use super::{Checklist, EntryId, TaskId, TimeLogEntry, TimeLogSession};

/// A task as far as the timer is concerned. The task exclusively owns its log and its archived
/// sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub time_log: Vec<TimeLogEntry>,
    #[serde(default)]
    pub time_log_sessions: Vec<TimeLogSession>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_log_title: Option<String>,
    #[serde(default)]
    pub checklist: Checklist,
}

impl Task {
    pub fn new(id: TaskId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            time_log: Vec::new(),
            time_log_sessions: Vec::new(),
            time_log_title: None,
            checklist: Checklist::default(),
        }
    }

    pub fn entry(&self, id: &EntryId) -> Option<&TimeLogEntry> {
        self.time_log.iter().find(|entry| &entry.id == id)
    }

    pub fn entry_position(&self, id: &EntryId) -> Option<usize> {
        self.time_log.iter().position(|entry| &entry.id == id)
    }

    pub fn first_playable(&self) -> Option<&TimeLogEntry> {
        first_playable(&self.time_log)
    }
}

pub fn first_playable(log: &[TimeLogEntry]) -> Option<&TimeLogEntry> {
    log.iter().find(|entry| !entry.is_header())
}
