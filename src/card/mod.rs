//! Cards: the unit of scheduling
//!
//! A card carries its queue and type, a typed due value, and the numbers the
//! interval algorithms read and write (interval, ease factor, reps, lapses and
//! the remaining learning steps).

mod due;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use due::{Due, DueUnit, LEARN_TIMESTAMP_THRESHOLD};

use crate::decks::DeckId;
use crate::notes::NoteId;
use crate::storage::{SqliteStorage, StorageError};
use crate::timestamp::TimestampSecs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub i64);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which queue a card is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardQueue {
    New,
    /// Learning or relearning, due later today (timestamp due)
    Learn,
    Review,
    /// Learning or relearning, due on a later day (day due)
    DayLearn,
    /// Answered "again" in a filtered deck that does not reschedule
    Preview,
    Suspended,
    /// Buried automatically because a sibling was answered
    SchedBuried,
    /// Buried by the user
    UserBuried,
}

impl CardQueue {
    pub fn from_i8(value: i8) -> Option<Self> {
        Some(match value {
            0 => Self::New,
            1 => Self::Learn,
            2 => Self::Review,
            3 => Self::DayLearn,
            4 => Self::Preview,
            -1 => Self::Suspended,
            -2 => Self::SchedBuried,
            -3 => Self::UserBuried,
            _ => return None,
        })
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Self::New => 0,
            Self::Learn => 1,
            Self::Review => 2,
            Self::DayLearn => 3,
            Self::Preview => 4,
            Self::Suspended => -1,
            Self::SchedBuried => -2,
            Self::UserBuried => -3,
        }
    }

    pub fn is_buried(self) -> bool {
        matches!(self, Self::SchedBuried | Self::UserBuried)
    }

    /// Suspended or buried: never served, never counted.
    pub fn is_inactive(self) -> bool {
        self == Self::Suspended || self.is_buried()
    }

    /// True if `due` is expressed in the unit this queue requires.
    pub fn accepts(self, due: Due, ctype: CardType) -> bool {
        match self {
            Self::New => due.unit() == DueUnit::Position,
            Self::Review | Self::DayLearn => due.unit() == DueUnit::Day,
            Self::Learn | Self::Preview => due.unit() == DueUnit::Timestamp,
            Self::Suspended | Self::SchedBuried | Self::UserBuried => match ctype {
                CardType::New => due.unit() == DueUnit::Position,
                CardType::Review => due.unit() == DueUnit::Day,
                CardType::Learn | CardType::Relearn => due.unit() != DueUnit::Position,
            },
        }
    }
}

/// Learning phase of a card; survives suspending and burying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardType {
    New,
    Learn,
    Review,
    Relearn,
}

impl CardType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::New,
            1 => Self::Learn,
            2 => Self::Review,
            3 => Self::Relearn,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::New => 0,
            Self::Learn => 1,
            Self::Review => 2,
            Self::Relearn => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    pub note_id: NoteId,
    pub deck_id: DeckId,
    pub template_idx: u16,
    pub mtime: TimestampSecs,
    pub ctype: CardType,
    pub queue: CardQueue,
    pub due: Due,
    /// Current interval in days (0 for unseen cards)
    pub interval: u32,
    /// Ease factor in permille (2500 = 250%)
    pub ease_factor: u16,
    pub reps: u32,
    pub lapses: u32,
    /// Learning steps left, encoded as `today * 1000 + total`
    pub remaining_steps: u32,
    /// Raw due value from before the card was moved into a filtered deck
    pub original_due: i64,
    /// Home deck while the card sits in a filtered deck, otherwise 0
    pub original_deck_id: DeckId,
}

impl Default for Card {
    fn default() -> Self {
        Self {
            id: CardId(0),
            note_id: NoteId(0),
            deck_id: DeckId(1),
            template_idx: 0,
            mtime: TimestampSecs(0),
            ctype: CardType::New,
            queue: CardQueue::New,
            due: Due::Position(0),
            interval: 0,
            ease_factor: 0,
            reps: 0,
            lapses: 0,
            remaining_steps: 0,
            original_due: 0,
            original_deck_id: DeckId(0),
        }
    }
}

impl Card {
    pub fn new(note_id: NoteId, template_idx: u16, deck_id: DeckId, position: u32) -> Self {
        Self {
            note_id,
            template_idx,
            deck_id,
            due: Due::Position(position),
            ..Default::default()
        }
    }

    /// Move the card to `queue` with a due value in that queue's unit.
    ///
    /// Panics if the unit does not match; a mismatched due is a bug in the
    /// caller, and persisting it would corrupt scheduling.
    pub fn set_queue_and_due(&mut self, queue: CardQueue, due: Due) {
        assert!(
            queue.accepts(due, self.ctype),
            "card {}: due {:?} is not valid for queue {:?} (type {:?})",
            self.id,
            due,
            queue,
            self.ctype
        );
        self.queue = queue;
        self.due = due;
    }

    pub fn is_filtered(&self) -> bool {
        self.original_deck_id.0 != 0
    }

    /// The deck whose options govern this card.
    pub fn home_deck_id(&self) -> DeckId {
        if self.is_filtered() {
            self.original_deck_id
        } else {
            self.deck_id
        }
    }

    /// Day the card is really due on, looking through a filtered deck move.
    pub fn review_due_day(&self) -> Option<i32> {
        if self.is_filtered() {
            Due::from_raw_for_type(self.ctype, self.original_due).day()
        } else {
            self.due.day()
        }
    }

    /// Days past due for review cards, 0 otherwise.
    pub fn days_late(&self, today: u32) -> u32 {
        self.review_due_day()
            .map(|due| (today as i64 - due as i64).max(0) as u32)
            .unwrap_or(0)
    }

    /// Put the card back in the queue implied by its type.
    pub fn restore_queue_from_type(&mut self) {
        let queue = match self.ctype {
            CardType::New => CardQueue::New,
            CardType::Review => CardQueue::Review,
            CardType::Learn | CardType::Relearn => {
                if self.due.unit() == DueUnit::Timestamp {
                    CardQueue::Learn
                } else {
                    CardQueue::DayLearn
                }
            }
        };
        self.set_queue_and_due(queue, self.due);
    }

    /// True if the card was buried or suspended prior to the call.
    pub fn restore_queue_after_bury_or_suspend(&mut self) -> bool {
        if self.queue.is_inactive() {
            self.restore_queue_from_type();
            true
        } else {
            false
        }
    }

    /// Return the card to its home deck with its original due and queue.
    pub fn remove_from_filtered_deck_restoring_queue(&mut self) {
        if !self.is_filtered() {
            return;
        }
        self.deck_id = self.original_deck_id;
        self.due = Due::from_raw_for_type(self.ctype, self.original_due);
        self.original_deck_id = DeckId(0);
        self.original_due = 0;
        if !self.queue.is_inactive() {
            self.restore_queue_from_type();
        }
    }

    /// Return the card to its home deck; the caller assigns a new due.
    pub fn remove_from_filtered_deck_before_reschedule(&mut self) {
        if self.is_filtered() {
            self.deck_id = self.original_deck_id;
            self.original_deck_id = DeckId(0);
            self.original_due = 0;
        }
    }

    /// Persist the card inside the caller's transaction.
    pub fn flush(&self, storage: &SqliteStorage) -> Result<(), StorageError> {
        storage.update_card(self)
    }
}
