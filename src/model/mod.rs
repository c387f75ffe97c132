//! Data definitions shared by the timer engine, the task store and persistence.
//!
//! All identifiers are opaque strings wrapped into newtypes so a task id can never be passed
//! where an entry id is expected.

pub mod checklist;
pub mod entry;
pub mod task;

use std::{fmt::Display, sync::Arc};

use serde::{Deserialize, Serialize};

pub use checklist::{Checklist, ChecklistBlock, ChecklistItem, ChecklistSection, RichTextBlock};
pub use entry::{EntryKind, TimeLogEntry, TimeLogSession};
pub use task::Task;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.into())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value.into())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifies a task in the task store.
    TaskId
);
string_id!(
    /// Identifies an entry inside a single task's log.
    EntryId
);
string_id!(ChecklistItemId);
string_id!(SessionId);

/// Stores [chrono::Duration] as whole milliseconds.
pub(crate) mod duration_ms {
    use chrono::Duration;
    use serde::{self, Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_milliseconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = i64::deserialize(deserializer)?;
        if ms < 0 {
            return Err(D::Error::custom(format!("negative duration of {ms}ms")));
        }
        Duration::try_milliseconds(ms)
            .ok_or_else(|| D::Error::custom(format!("duration of {ms}ms is out of range")))
    }
}
