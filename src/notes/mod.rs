//! Notes as seen by the scheduler: an id, sibling cards, and tags

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::timestamp::TimestampSecs;

/// Tag added to a note when one of its cards becomes a leech
pub const LEECH_TAG: &str = "leech";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub i64);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub mtime: TimestampSecs,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Note {
    pub fn new(tags: Vec<String>) -> Self {
        let mut note = Self {
            id: NoteId(0),
            mtime: TimestampSecs::now(),
            tags: Vec::new(),
        };
        for tag in tags {
            note.add_tag(&tag);
        }
        note
    }

    /// Tags compare case-insensitively.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Returns false if the tag was already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || tag.contains(char::is_whitespace) || self.has_tag(tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    /// Returns false if the tag was not present.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| !t.eq_ignore_ascii_case(tag));
        self.tags.len() != before
    }

    /// Space-separated form used in storage, with surrounding spaces.
    pub fn tags_to_string(&self) -> String {
        if self.tags.is_empty() {
            String::new()
        } else {
            format!(" {} ", self.tags.join(" "))
        }
    }

    pub fn tags_from_string(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }
}
