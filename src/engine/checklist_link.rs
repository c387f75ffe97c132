use tracing::trace;

use crate::model::{Checklist, TimeLogEntry};

/// Copies the entry's duration into the checklist item it is linked to. Returns whether an item
/// was updated. A link to an item that no longer exists is skipped.
pub fn sync_logged_time(checklist: &mut Checklist, entry: &TimeLogEntry) -> bool {
    let Some(item_id) = &entry.checklist_item_id else {
        return false;
    };
    match checklist.item_mut(item_id) {
        Some(item) => {
            trace!(
                "Mirroring {}ms of entry {} into checklist item {item_id}",
                entry.duration.num_milliseconds(),
                entry.id
            );
            item.logged_time = entry.duration;
            true
        }
        None => {
            trace!("Checklist item {item_id} linked from entry {} is gone", entry.id);
            false
        }
    }
}
