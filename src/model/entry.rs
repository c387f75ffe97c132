use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{ChecklistItemId, EntryId, SessionId, duration_ms};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    #[default]
    Entry,
    /// Zero-duration marker that opens a chapter. Never started.
    Header,
}

/// The atomic unit of tracked time.
///
/// `duration` is the only durable measure of elapsed time. While the entry runs, `start_time`
/// holds the wall-clock moment it was (re)started and the time since then is not yet part of
/// `duration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeLogEntry {
    pub id: EntryId,
    pub description: String,
    #[serde(default = "Duration::zero", with = "duration_ms")]
    pub duration: Duration,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_running: bool,
    #[serde(rename = "type", default)]
    pub kind: EntryKind,
    /// Checklist item whose `logged_time` mirrors this entry. Relation only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checklist_item_id: Option<ChecklistItemId>,
}

impl TimeLogEntry {
    pub fn new(id: EntryId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            duration: Duration::zero(),
            start_time: None,
            is_running: false,
            kind: EntryKind::Entry,
            checklist_item_id: None,
        }
    }

    pub fn header(id: EntryId, title: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Header,
            ..Self::new(id, title)
        }
    }

    pub fn with_checklist_item(self, item: ChecklistItemId) -> Self {
        Self {
            checklist_item_id: Some(item),
            ..self
        }
    }

    pub fn with_duration(self, duration: Duration) -> Self {
        Self { duration, ..self }
    }

    pub fn is_header(&self) -> bool {
        self.kind == EntryKind::Header
    }

    /// Time since `start_time` that is not yet folded into `duration`. A clock that moved
    /// backwards yields zero rather than a negative value.
    pub fn pending_elapsed(&self, now: DateTime<Utc>) -> Duration {
        match self.start_time {
            Some(start) if self.is_running => (now - start).max(Duration::zero()),
            _ => Duration::zero(),
        }
    }

    /// Duration as it should be displayed at `now`. Never written back.
    pub fn live_duration(&self, now: DateTime<Utc>) -> Duration {
        self.duration + self.pending_elapsed(now)
    }

    /// Paused copy with the pending elapsed time folded in.
    pub fn finalized(&self, now: DateTime<Utc>) -> Self {
        Self {
            duration: self.live_duration(now),
            start_time: None,
            is_running: false,
            ..self.clone()
        }
    }

    /// Running copy started at `now`. A stale running flag left by an unclean shutdown has its
    /// elapsed time recovered first.
    pub fn started(&self, now: DateTime<Utc>) -> Self {
        Self {
            duration: self.live_duration(now),
            start_time: Some(now),
            is_running: true,
            ..self.clone()
        }
    }

    pub fn zeroed(&self) -> Self {
        Self {
            duration: Duration::zero(),
            start_time: None,
            is_running: false,
            ..self.clone()
        }
    }
}

/// Archived snapshot of a task's log. Only constructed by the session archiver and never
/// changed afterwards, so the fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeLogSession {
    id: SessionId,
    title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
    entries: Vec<TimeLogEntry>,
}

impl TimeLogSession {
    pub(crate) fn new(
        id: SessionId,
        title: String,
        created_at: DateTime<Utc>,
        entries: Vec<TimeLogEntry>,
    ) -> Self {
        Self {
            id,
            title,
            created_at,
            entries,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn entries(&self) -> &[TimeLogEntry] {
        &self.entries
    }

    pub fn total_duration(&self) -> Duration {
        self.entries
            .iter()
            .fold(Duration::zero(), |sum, entry| sum + entry.duration)
    }
}
