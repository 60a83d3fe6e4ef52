//! SQLite-backed collection storage
//!
//! One [`SqliteStorage`] owns the connection for a collection. All writes made
//! on behalf of one scheduling action go through [`SqliteStorage::transact`],
//! which wraps them in a savepoint so they either all land or none do.

mod cards;
mod config;
mod decks;
mod graves;
mod notes;
mod revlog;
mod sqlite;

use thiserror::Error;

use crate::card::CardId;
use crate::decks::{DeckConfigId, DeckId};
use crate::notes::NoteId;

pub use cards::LearningDue;
pub use graves::GraveKind;
pub use revlog::{RevlogEntry, RevlogId, RevlogKind};
pub use sqlite::SqliteStorage;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Card not found: {0}")]
    CardNotFound(CardId),

    #[error("Deck not found: {0}")]
    DeckNotFound(DeckId),

    #[error("Deck options not found: {0}")]
    DeckConfigNotFound(DeckConfigId),

    #[error("Note not found: {0}")]
    NoteNotFound(NoteId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Render ids as a comma-separated SQL list for `IN (...)` clauses.
pub(crate) fn ids_to_sql<I: IntoIterator<Item = i64>>(ids: I) -> String {
    let parts: Vec<String> = ids.into_iter().map(|id| id.to_string()).collect();
    format!("({})", parts.join(","))
}
