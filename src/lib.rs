//! Spaced-repetition scheduling core
//!
//! Decides which card to show next, and when each card should come back
//! after it is answered. A [`Collection`] ties together SQLite storage, the
//! scheduler generation the collection uses, and single-step undo.

pub mod card;
pub mod collection;
pub mod config;
pub mod decks;
pub mod notes;
pub mod scheduler;
pub mod storage;
pub mod timestamp;
pub mod undo;

pub use card::{Card, CardId, CardQueue, CardType, Due};
pub use collection::{Collection, CollectionError};
pub use scheduler::{AnswerOutcome, Counts, Grade, Scheduler, SchedulerError, SchedulerVersion, Scheduling};
pub use undo::{ExternalUndo, UndoResult};
