//! Single-step undo for reviews and checkpointed operations
//!
//! At most one entry is pending. Answers accumulate in a reviews batch that
//! can be undone one answer at a time; any checkpointed operation replaces
//! the batch. An [`ExternalUndo`] source, when attached to a collection and
//! able to undo, takes precedence over this log.

use serde::Serialize;

use crate::card::{Card, CardId};
use crate::decks::{DailyCounter, DeckId};
use crate::storage::{SqliteStorage, StorageError};

/// Everything needed to reverse one answer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewUndo {
    /// The card exactly as it was before the answer
    pub card: Card,
    /// Whether the note carried the leech tag before the answer
    pub was_leech: bool,
    pub counted: DailyCounter,
    pub counted_deck: DeckId,
    pub day: u32,
    pub taken_millis: i64,
    /// Siblings buried as a side effect of the answer
    pub buried_siblings: Vec<CardId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum UndoEntry {
    #[default]
    None,
    Reviews(Vec<ReviewUndo>),
    Checkpoint {
        name: String,
    },
}

/// What an undo call reversed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UndoResult {
    Review(ReviewUndo),
    Checkpoint { name: String },
    External { name: String },
}

/// A richer undo history kept outside this log
pub trait ExternalUndo {
    /// Name of the step that would be undone, or `None` if there is nothing.
    fn undo_label(&self) -> Option<String>;

    fn undo(&mut self, storage: &SqliteStorage) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct UndoLog {
    entry: UndoEntry,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self) -> &UndoEntry {
        &self.entry
    }

    /// Record an answer. A pending checkpoint entry is replaced.
    pub fn push_review(&mut self, review: ReviewUndo) {
        match &mut self.entry {
            UndoEntry::Reviews(batch) => batch.push(review),
            _ => self.entry = UndoEntry::Reviews(vec![review]),
        }
    }

    /// Start a checkpointed operation, discarding any pending reviews.
    pub fn set_checkpoint(&mut self, name: impl Into<String>) {
        self.entry = UndoEntry::Checkpoint { name: name.into() };
    }

    pub fn checkpoint_name(&self) -> Option<&str> {
        match &self.entry {
            UndoEntry::Checkpoint { name } => Some(name),
            _ => None,
        }
    }

    /// Forget a pending checkpoint entry, keeping a reviews batch.
    pub fn discard_checkpoint(&mut self) {
        if matches!(self.entry, UndoEntry::Checkpoint { .. }) {
            self.entry = UndoEntry::None;
        }
    }

    pub fn clear(&mut self) {
        self.entry = UndoEntry::None;
    }

    /// Label for the step `take_step` would return.
    pub fn label(&self) -> Option<String> {
        match &self.entry {
            UndoEntry::None => None,
            UndoEntry::Reviews(_) => Some("Review".to_string()),
            UndoEntry::Checkpoint { name } => Some(name.clone()),
        }
    }

    /// Remove the most recent step: the last answer of a reviews batch, or
    /// the whole checkpoint.
    pub fn take_step(&mut self) -> Option<UndoResult> {
        match std::mem::take(&mut self.entry) {
            UndoEntry::None => None,
            UndoEntry::Checkpoint { name } => Some(UndoResult::Checkpoint { name }),
            UndoEntry::Reviews(mut batch) => {
                let last = batch.pop();
                if !batch.is_empty() {
                    self.entry = UndoEntry::Reviews(batch);
                }
                last.map(UndoResult::Review)
            }
        }
    }
}
