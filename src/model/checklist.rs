//! Checklists come in several stored shapes: titled sections of items, free-form text blocks and
//! the legacy flat array of items. They are normalized once while deserializing, so the rest of
//! the crate only ever sees [ChecklistBlock]s.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::{ChecklistItemId, duration_ms};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: ChecklistItemId,
    pub text: String,
    #[serde(default)]
    pub is_completed: bool,
    /// Mirror of the linked entry's duration. The entry is authoritative.
    #[serde(default = "Duration::zero", with = "duration_ms")]
    pub logged_time: Duration,
}

impl ChecklistItem {
    pub fn new(id: ChecklistItemId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            is_completed: false,
            logged_time: Duration::zero(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistSection {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichTextBlock {
    #[serde(default)]
    pub id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChecklistBlock {
    Section(ChecklistSection),
    Text(RichTextBlock),
}

/// One element of a stored checklist, before normalization.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StoredChecklistBlock {
    Block(ChecklistBlock),
    LegacyItem(ChecklistItem),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<StoredChecklistBlock>", into = "Vec<ChecklistBlock>")]
pub struct Checklist {
    blocks: Vec<ChecklistBlock>,
}

impl From<Vec<StoredChecklistBlock>> for Checklist {
    /// Consecutive legacy items are grouped into one untitled section.
    fn from(stored: Vec<StoredChecklistBlock>) -> Self {
        let mut blocks = Vec::with_capacity(stored.len());
        let mut loose = Vec::new();
        for block in stored {
            match block {
                StoredChecklistBlock::LegacyItem(item) => loose.push(item),
                StoredChecklistBlock::Block(block) => {
                    if !loose.is_empty() {
                        blocks.push(untitled_section(std::mem::take(&mut loose)));
                    }
                    blocks.push(block);
                }
            }
        }
        if !loose.is_empty() {
            blocks.push(untitled_section(loose));
        }
        Self { blocks }
    }
}

impl From<Checklist> for Vec<ChecklistBlock> {
    fn from(value: Checklist) -> Self {
        value.blocks
    }
}

fn untitled_section(items: Vec<ChecklistItem>) -> ChecklistBlock {
    ChecklistBlock::Section(ChecklistSection {
        items,
        ..Default::default()
    })
}

impl Checklist {
    pub fn new(blocks: Vec<ChecklistBlock>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[ChecklistBlock] {
        &self.blocks
    }

    pub fn sections(&self) -> impl Iterator<Item = &ChecklistSection> {
        self.blocks.iter().filter_map(|block| match block {
            ChecklistBlock::Section(section) => Some(section),
            ChecklistBlock::Text(_) => None,
        })
    }

    fn sections_mut(&mut self) -> impl Iterator<Item = &mut ChecklistSection> {
        self.blocks.iter_mut().filter_map(|block| match block {
            ChecklistBlock::Section(section) => Some(section),
            ChecklistBlock::Text(_) => None,
        })
    }

    pub fn item(&self, id: &ChecklistItemId) -> Option<&ChecklistItem> {
        self.sections()
            .flat_map(|section| section.items.iter())
            .find(|item| &item.id == id)
    }

    pub fn item_mut(&mut self, id: &ChecklistItemId) -> Option<&mut ChecklistItem> {
        self.sections_mut()
            .flat_map(|section| section.items.iter_mut())
            .find(|item| &item.id == id)
    }

    pub fn has_items(&self) -> bool {
        self.sections().any(|section| !section.items.is_empty())
    }

    /// Appends an item to the first section titled `section`, creating that section at the end
    /// when there is none.
    pub fn add_item(&mut self, section: &str, section_id: impl FnOnce() -> String, item: ChecklistItem) {
        if let Some(existing) = self.sections_mut().find(|existing| existing.title == section) {
            existing.items.push(item);
            return;
        }
        self.blocks.push(ChecklistBlock::Section(ChecklistSection {
            id: section_id(),
            title: section.to_string(),
            items: vec![item],
        }));
    }
}
