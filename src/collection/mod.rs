//! The collection: storage, the active scheduler, and undo, owned together
//!
//! A [`Collection`] is the session context a host keeps for one open
//! collection file. Every operation goes through it; there is no global
//! state. Methods ending in `_at` take an explicit clock reading and exist so
//! hosts and tests can control time.

use std::path::Path;

use chrono::FixedOffset;
use serde::Serialize;
use thiserror::Error;

use crate::card::{Card, CardId};
use crate::config::ConfigKey;
use crate::decks::{normalize_deck_name, DailyCounter, Deck, DeckConfig, DeckConfigId, DeckId, DeckKind, FilteredDeck};
use crate::notes::{Note, NoteId};
use crate::scheduler::bury_and_suspend::{self, BuryOrSuspendMode, UnburyMode};
use crate::scheduler::new::{self as new_cards, NewCardSortOrder};
use crate::scheduler::timing::{local_timing_today, local_utc_offset};
use crate::scheduler::{
    filtered, undo_review, upgrade, AnswerOutcome, Counts, Grade, SchedTimingToday, Scheduler, SchedulerError,
    SchedulerVersion, Scheduling,
};
use crate::storage::{GraveKind, SqliteStorage, StorageError};
use crate::timestamp::TimestampSecs;
use crate::undo::{ExternalUndo, UndoLog, UndoResult};

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CollectionError>;

pub const DEFAULT_DECK_ID: DeckId = DeckId(1);
pub const DEFAULT_DECK_CONFIG_ID: DeckConfigId = DeckConfigId(1);

/// One row of the deck list
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckSummary {
    pub id: DeckId,
    pub name: String,
    pub filtered: bool,
    pub card_count: usize,
}

pub struct Collection {
    storage: SqliteStorage,
    sched: Scheduler,
    undo: UndoLog,
    external_undo: Option<Box<dyn ExternalUndo>>,
    offset: FixedOffset,
}

impl Collection {
    // ==================== Opening and Closing ====================

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, local_utc_offset(), TimestampSecs::now())
    }

    /// Open `path`, creating a new collection stamped at `now` if it is empty.
    pub fn open_with(path: impl AsRef<Path>, offset: FixedOffset, now: TimestampSecs) -> Result<Self> {
        let storage = SqliteStorage::open(path)?;
        Self::from_storage(storage, offset, now)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with(local_utc_offset(), TimestampSecs::now())
    }

    pub fn open_in_memory_with(offset: FixedOffset, now: TimestampSecs) -> Result<Self> {
        Self::from_storage(SqliteStorage::open_in_memory()?, offset, now)
    }

    fn from_storage(storage: SqliteStorage, offset: FixedOffset, now: TimestampSecs) -> Result<Self> {
        if storage.get_config_value::<TimestampSecs>(ConfigKey::CreationStamp.as_str())?.is_none() {
            init_new_collection(&storage, offset, now)?;
        }
        let sched = Scheduler::from_storage(&storage, offset)?;
        Ok(Self {
            storage,
            sched,
            undo: UndoLog::new(),
            external_undo: None,
            offset,
        })
    }

    /// Commit any pending checkpoint and close.
    pub fn close(mut self) -> Result<()> {
        self.save()
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    pub fn scheduler_version(&self) -> SchedulerVersion {
        self.sched.version()
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.offset
    }

    /// Make random fuzz repeatable.
    pub fn seed_rng(&mut self, seed: u64) {
        self.sched.seed_rng(seed);
    }

    pub fn timing_today_at(&self, now: TimestampSecs) -> Result<SchedTimingToday> {
        Ok(self.sched.timing_today(&self.storage, now)?)
    }

    fn today_at(&self, now: TimestampSecs) -> Result<u32> {
        Ok(self.timing_today_at(now)?.days_elapsed)
    }

    // ==================== Studying ====================

    pub fn reset(&mut self) -> Result<()> {
        self.reset_at(TimestampSecs::now())
    }

    pub fn reset_at(&mut self, now: TimestampSecs) -> Result<()> {
        Ok(self.sched.reset(&self.storage, now)?)
    }

    pub fn get_card(&mut self) -> Result<Option<Card>> {
        self.get_card_at(TimestampSecs::now())
    }

    pub fn get_card_at(&mut self, now: TimestampSecs) -> Result<Option<Card>> {
        Ok(self.sched.get_card(&self.storage, now)?)
    }

    pub fn answer_card(&mut self, card: &Card, grade: Grade) -> Result<AnswerOutcome> {
        self.answer_card_at(card, grade, TimestampSecs::now())
    }

    /// Panics if `card` is not the card the last `get_card` returned, or
    /// if it has changed since.
    pub fn answer_card_at(&mut self, card: &Card, grade: Grade, now: TimestampSecs) -> Result<AnswerOutcome> {
        if self.undo.checkpoint_name().is_some() {
            self.save()?;
        }
        Ok(self.sched.answer_card(&self.storage, &mut self.undo, card, grade, now)?)
    }

    pub fn counts(&mut self) -> Result<Counts> {
        self.counts_at(TimestampSecs::now())
    }

    pub fn counts_at(&mut self, now: TimestampSecs) -> Result<Counts> {
        Ok(self.sched.counts(&self.storage, now)?)
    }

    pub fn answer_buttons(&mut self, card: &Card) -> Result<u8> {
        Ok(self.sched.answer_buttons(&self.storage, card)?)
    }

    /// Interval each grade would give `card`, without fuzz.
    pub fn next_interval_secs_at(&mut self, card: &Card, grade: Grade, now: TimestampSecs) -> Result<u32> {
        Ok(self.sched.next_interval_secs(&self.storage, card, grade, now)?)
    }

    // ==================== Undo ====================

    pub fn undo_label(&self) -> Option<String> {
        self.external_undo
            .as_ref()
            .and_then(|external| external.undo_label())
            .or_else(|| self.undo.label())
    }

    pub fn attach_external_undo(&mut self, external: Box<dyn ExternalUndo>) {
        self.external_undo = Some(external);
    }

    pub fn undo(&mut self) -> Result<Option<UndoResult>> {
        self.undo_at(TimestampSecs::now())
    }

    /// Reverse the most recent step. Returns `None` when there is nothing to undo.
    ///
    /// A checkpoint is rolled back and released, so the next operation
    /// starts a fresh one. Every write made through the collection opens its
    /// own checkpoint or commits the pending one first, so a rollback only
    /// discards the operation it is named after. Writes made directly on
    /// [`Collection::storage`] while a checkpoint is pending are discarded
    /// with it.
    pub fn undo_at(&mut self, now: TimestampSecs) -> Result<Option<UndoResult>> {
        if let Some(external) = self.external_undo.as_mut() {
            if let Some(name) = external.undo_label() {
                external.undo(&self.storage)?;
                self.undo.clear();
                self.sched.reset(&self.storage, now)?;
                log::info!("Undid external step '{}'", name);
                return Ok(Some(UndoResult::External { name }));
            }
        }

        let result = match self.undo.take_step() {
            None => return Ok(None),
            Some(UndoResult::Review(review)) => {
                if let Err(err) = undo_review(&self.storage, &review) {
                    self.undo.push_review(review);
                    return Err(err.into());
                }
                UndoResult::Review(review)
            }
            Some(UndoResult::Checkpoint { name }) => {
                self.storage.rollback_checkpoint()?;
                log::info!("Rolled back '{}'", name);
                UndoResult::Checkpoint { name }
            }
            Some(other) => other,
        };
        self.sched.reset(&self.storage, now)?;
        Ok(Some(result))
    }

    /// Begin an undoable operation named `name`. A previous checkpoint is
    /// committed first, and pending reviews can no longer be undone.
    pub fn checkpoint(&mut self, name: &str) -> Result<()> {
        if self.undo.checkpoint_name().is_some() {
            self.storage.release_checkpoint()?;
        }
        self.storage.begin_checkpoint()?;
        self.undo.set_checkpoint(name);
        log::debug!("Checkpoint '{}'", name);
        Ok(())
    }

    /// Commit a pending checkpoint. Pending reviews stay undoable.
    pub fn save(&mut self) -> Result<()> {
        if let Some(name) = self.undo.checkpoint_name() {
            log::debug!("Saving checkpoint '{}'", name);
            self.storage.release_checkpoint()?;
            self.undo.discard_checkpoint();
        }
        Ok(())
    }

    /// Run `op` as a named, undoable operation, then drop the queues so the
    /// next request rebuilds them. A failed operation leaves nothing behind.
    fn checkpointed<T, F>(&mut self, name: &str, op: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.checkpoint(name)?;
        let result = op(self);
        if result.is_err() {
            self.storage.rollback_checkpoint()?;
            self.undo.clear();
            log::warn!("'{}' failed and was rolled back", name);
        }
        self.sched.invalidate();
        result
    }

    // ==================== Settings ====================

    /// Store a collection setting as an undoable step. Queues are rebuilt
    /// on next use.
    pub fn set_config<T: Serialize>(&mut self, key: ConfigKey, value: &T) -> Result<()> {
        self.checkpointed("Change Setting", |col| Ok(col.storage.set_config(key, value)?))
    }

    /// Switch to a later scheduler generation. Not undoable.
    pub fn upgrade_scheduler(&mut self, target: SchedulerVersion) -> Result<()> {
        self.upgrade_scheduler_at(target, TimestampSecs::now())
    }

    pub fn upgrade_scheduler_at(&mut self, target: SchedulerVersion, now: TimestampSecs) -> Result<()> {
        let from = self.sched.version();
        if from == target {
            return Ok(());
        }
        self.save()?;
        upgrade::upgrade_scheduler(&self.storage, from, target, self.offset, now)?;
        self.undo.clear();
        self.sched = Scheduler::new(target, self.offset);
        Ok(())
    }

    // ==================== Decks ====================

    /// Add a normal deck, creating missing parents. An existing deck of the
    /// same name is returned as is.
    pub fn add_deck(&mut self, name: &str) -> Result<DeckId> {
        let name = normalize_deck_name(name);
        if name.is_empty() {
            return Err(CollectionError::InvalidInput("deck name is empty".to_string()));
        }
        self.checkpointed("Add Deck", |col| {
            let mut deck = Deck::new_normal(name);
            for parent in deck.ancestor_names() {
                col.ensure_deck(&parent)?;
            }
            if let Some(existing) = col.storage.get_deck_by_name(&deck.name)? {
                return Ok(existing.id);
            }
            col.storage.add_deck(&mut deck)?;
            log::info!("Added deck '{}'", deck.name);
            Ok(deck.id)
        })
    }

    fn ensure_deck(&self, name: &str) -> Result<DeckId> {
        if let Some(existing) = self.storage.get_deck_by_name(name)? {
            return Ok(existing.id);
        }
        let mut deck = Deck::new_normal(name);
        self.storage.add_deck(&mut deck)?;
        Ok(deck.id)
    }

    pub fn add_filtered_deck(&mut self, name: &str, filtered: FilteredDeck) -> Result<DeckId> {
        let name = normalize_deck_name(name);
        if self.storage.get_deck_by_name(&name)?.is_some() {
            return Err(CollectionError::InvalidInput(format!("deck '{}' already exists", name)));
        }
        self.checkpointed("Add Filtered Deck", |col| {
            let mut deck = Deck::new_filtered(name, filtered);
            for parent in deck.ancestor_names() {
                col.ensure_deck(&parent)?;
            }
            col.storage.add_deck(&mut deck)?;
            Ok(deck.id)
        })
    }

    pub fn decks(&self) -> Result<Vec<DeckSummary>> {
        let decks = self.storage.all_decks()?;
        let cards = self.storage.all_cards()?;
        Ok(decks
            .into_iter()
            .map(|deck| DeckSummary {
                card_count: cards.iter().filter(|card| card.deck_id == deck.id).count(),
                id: deck.id,
                filtered: deck.is_filtered(),
                name: deck.name,
            })
            .collect())
    }

    pub fn current_deck(&self) -> Result<DeckId> {
        Ok(self.storage.current_deck_id()?)
    }

    /// Study `deck` and its children from now on.
    pub fn set_current_deck(&mut self, deck: DeckId) -> Result<()> {
        self.storage.get_deck_required(deck)?;
        self.checkpointed("Select Deck", |col| {
            Ok(col.storage.set_config(ConfigKey::CurrentDeck, &deck)?)
        })
    }

    /// Remove a deck, its children, and every card whose home is one of
    /// them. Filtered decks are emptied first. The default deck stays.
    pub fn remove_deck(&mut self, id: DeckId) -> Result<()> {
        if id == DEFAULT_DECK_ID {
            return Err(CollectionError::InvalidInput("the default deck cannot be removed".to_string()));
        }
        let deck = self.storage.get_deck_required(id)?;
        self.checkpointed("Delete Deck", |col| {
            let doomed = col.storage.deck_with_children(&deck)?;
            for deck in doomed.iter().filter(|deck| deck.is_filtered()) {
                filtered::empty_filtered_deck(&col.storage, deck.id)?;
            }
            let ids: Vec<DeckId> = doomed.iter().map(|deck| deck.id).collect();
            let cards: Vec<CardId> = col
                .storage
                .all_cards()?
                .into_iter()
                .filter(|card| ids.contains(&card.home_deck_id()))
                .map(|card| card.id)
                .collect();
            col.remove_cards(&cards)?;
            for id in ids {
                col.storage.remove_deck(id)?;
                col.storage.add_grave(id.0, GraveKind::Deck)?;
            }
            if ids_contains_current(&col.storage, &doomed)? {
                col.storage.set_config(ConfigKey::CurrentDeck, &DEFAULT_DECK_ID)?;
            }
            log::info!("Removed deck '{}' with {} cards", deck.name, cards.len());
            Ok(())
        })
    }

    /// Raise today's limits on `deck` by studying fewer cards on paper.
    pub fn extend_limits(&mut self, deck: DeckId, new_delta: i32, review_delta: i32) -> Result<()> {
        self.extend_limits_at(deck, new_delta, review_delta, TimestampSecs::now())
    }

    pub fn extend_limits_at(
        &mut self,
        deck: DeckId,
        new_delta: i32,
        review_delta: i32,
        now: TimestampSecs,
    ) -> Result<()> {
        let today = self.today_at(now)?;
        self.checkpointed("Extend Limits", |col| {
            if new_delta != 0 {
                col.storage.update_deck_today(deck, today, DailyCounter::New, -new_delta, 0)?;
            }
            if review_delta != 0 {
                col.storage.update_deck_today(deck, today, DailyCounter::Review, -review_delta, 0)?;
            }
            Ok(())
        })
    }

    // ==================== Deck Options ====================

    pub fn deck_configs(&self) -> Result<Vec<DeckConfig>> {
        Ok(self.storage.all_deck_configs()?)
    }

    /// Store `config`, allocating an id when it has none.
    pub fn add_or_update_deck_config(&mut self, config: &mut DeckConfig, now: TimestampSecs) -> Result<()> {
        config.mtime = now;
        self.checkpointed("Update Options", |col| {
            col.storage.add_or_update_deck_config(config)?;
            Ok(())
        })
    }

    pub fn set_deck_config(&mut self, deck: DeckId, config: DeckConfigId) -> Result<()> {
        let mut deck = self.storage.get_deck_required(deck)?;
        if self.storage.get_deck_config(config)?.is_none() {
            return Err(StorageError::DeckConfigNotFound(config).into());
        }
        match deck.kind {
            DeckKind::Normal { ref mut config_id } => *config_id = config,
            DeckKind::Filtered(_) => {
                return Err(CollectionError::InvalidInput(format!(
                    "filtered deck '{}' has no options",
                    deck.name
                )))
            }
        }
        self.checkpointed("Set Deck Options", |col| {
            col.storage.update_deck(&deck)?;
            Ok(())
        })
    }

    // ==================== Notes and Cards ====================

    /// Add a note with `template_count` cards in `deck`. The cards share the
    /// next new-card position.
    pub fn add_note(&mut self, deck: DeckId, template_count: u16, tags: Vec<String>) -> Result<(NoteId, Vec<CardId>)> {
        if template_count == 0 {
            return Err(CollectionError::InvalidInput("a note needs at least one card".to_string()));
        }
        let deck = self.storage.get_deck_required(deck)?;
        if deck.is_filtered() {
            return Err(CollectionError::InvalidInput(format!(
                "cards cannot be added to filtered deck '{}'",
                deck.name
            )));
        }
        self.checkpointed("Add Note", |col| {
            let mut note = Note::new(tags);
            col.storage.add_note(&mut note)?;
            let position = col.storage.next_new_position()?;
            let mut card_ids = Vec::with_capacity(template_count as usize);
            for template_idx in 0..template_count {
                let mut card = Card::new(note.id, template_idx, deck.id, position);
                card.mtime = note.mtime;
                col.storage.add_card(&mut card)?;
                card_ids.push(card.id);
            }
            Ok((note.id, card_ids))
        })
    }

    /// Remove notes and their cards, leaving graves behind.
    pub fn remove_notes(&mut self, note_ids: &[NoteId]) -> Result<usize> {
        self.checkpointed("Delete Note", |col| {
            let mut removed = 0;
            for note_id in note_ids {
                let cards: Vec<CardId> = col.storage.cards_of_note(*note_id)?.iter().map(|c| c.id).collect();
                col.remove_cards(&cards)?;
                if col.storage.get_note(*note_id)?.is_some() {
                    col.storage.remove_note(*note_id)?;
                    col.storage.add_grave(note_id.0, GraveKind::Note)?;
                    removed += 1;
                }
            }
            Ok(removed)
        })
    }

    fn remove_cards(&self, ids: &[CardId]) -> Result<()> {
        for id in ids {
            self.storage.remove_card(*id)?;
            self.storage.add_grave(id.0, GraveKind::Card)?;
        }
        Ok(())
    }

    // ==================== Bury and Suspend ====================

    pub fn suspend_cards(&mut self, ids: &[CardId], now: TimestampSecs) -> Result<usize> {
        self.bury_or_suspend(ids, BuryOrSuspendMode::Suspend, "Suspend", now)
    }

    /// Bury until tomorrow. `manual` marks a user bury rather than a sibling bury.
    pub fn bury_cards(&mut self, ids: &[CardId], manual: bool, now: TimestampSecs) -> Result<usize> {
        let mode = if manual {
            BuryOrSuspendMode::BuryUser
        } else {
            BuryOrSuspendMode::BurySched
        };
        self.bury_or_suspend(ids, mode, "Bury", now)
    }

    fn bury_or_suspend(&mut self, ids: &[CardId], mode: BuryOrSuspendMode, name: &str, now: TimestampSecs) -> Result<usize> {
        let today = self.today_at(now)?;
        let version = self.sched.version();
        self.checkpointed(name, |col| {
            Ok(bury_and_suspend::bury_or_suspend_cards(&col.storage, ids, mode, version, today, now)?)
        })
    }

    /// Unsuspend or unbury `ids`, whichever applies.
    pub fn restore_cards(&mut self, ids: &[CardId], now: TimestampSecs) -> Result<usize> {
        self.checkpointed("Unsuspend", |col| {
            Ok(bury_and_suspend::unbury_or_unsuspend_cards(&col.storage, ids, now)?)
        })
    }

    pub fn unbury_deck(&mut self, deck: DeckId, mode: UnburyMode, now: TimestampSecs) -> Result<usize> {
        self.checkpointed("Unbury", |col| {
            Ok(bury_and_suspend::unbury_cards_in_deck(&col.storage, deck, mode, now)?)
        })
    }

    // ==================== New Card Order ====================

    pub fn sort_cards(
        &mut self,
        ids: &[CardId],
        starting_from: u32,
        step: u32,
        order: NewCardSortOrder,
        shift: bool,
        now: TimestampSecs,
    ) -> Result<usize> {
        self.checkpointed("Reposition", |col| {
            Ok(new_cards::sort_cards(&col.storage, ids, starting_from, step, order, shift, now)?)
        })
    }

    pub fn sort_deck(&mut self, deck: DeckId, random: bool, now: TimestampSecs) -> Result<usize> {
        self.checkpointed("Sort Deck", |col| Ok(new_cards::sort_deck(&col.storage, deck, random, now)?))
    }

    /// Forget `ids`: they become new cards at the end of the new queue.
    pub fn reschedule_cards_as_new(&mut self, ids: &[CardId], log: bool, now: TimestampSecs) -> Result<()> {
        self.checkpointed("Forget", |col| {
            Ok(new_cards::reschedule_cards_as_new(&col.storage, ids, log, now)?)
        })
    }

    // ==================== Filtered Decks ====================

    pub fn build_filtered_deck(&mut self, deck: DeckId, now: TimestampSecs) -> Result<usize> {
        let today = self.today_at(now)?;
        self.checkpointed("Build Filtered Deck", |col| {
            Ok(filtered::build_filtered_deck(&col.storage, deck, today)?)
        })
    }

    pub fn empty_filtered_deck(&mut self, deck: DeckId) -> Result<usize> {
        self.checkpointed("Empty Filtered Deck", |col| {
            Ok(filtered::empty_filtered_deck(&col.storage, deck)?)
        })
    }
}

impl Drop for Collection {
    fn drop(&mut self) {
        if self.undo.checkpoint_name().is_some() {
            if let Err(err) = self.storage.release_checkpoint() {
                log::warn!("Failed to commit checkpoint on close: {}", err);
            }
        }
    }
}

fn ids_contains_current(storage: &SqliteStorage, decks: &[Deck]) -> Result<bool> {
    let current = storage.current_deck_id()?;
    Ok(decks.iter().any(|deck| deck.id == current))
}

/// Stamp a fresh collection: day zero starts at the most recent rollover,
/// the current generation is selected, and the default deck and options exist.
fn init_new_collection(storage: &SqliteStorage, offset: FixedOffset, now: TimestampSecs) -> Result<()> {
    storage.transact(|storage| {
        let rollover = storage.rollover_hour()?;
        let timing = local_timing_today(now, now, offset, rollover);
        let created = timing.next_day_at.adding_secs(-86_400);
        storage.set_config(ConfigKey::CreationStamp, &created)?;
        storage.set_config(ConfigKey::SchedulerVersion, &2u8)?;
        storage.set_config(ConfigKey::CurrentDeck, &DEFAULT_DECK_ID)?;

        if storage.get_deck_config(DEFAULT_DECK_CONFIG_ID)?.is_none() {
            let mut config = DeckConfig {
                mtime: now,
                ..Default::default()
            };
            storage.add_or_update_deck_config(&mut config)?;
        }
        if storage.get_deck(DEFAULT_DECK_ID)?.is_none() {
            let mut deck = Deck::new_normal("Default");
            deck.id = DEFAULT_DECK_ID;
            deck.mtime = now;
            storage.add_deck(&mut deck)?;
        }
        log::info!("Created collection, day zero starts at {}", created);
        Ok::<_, CollectionError>(())
    })
}
