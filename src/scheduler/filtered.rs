//! Filtered decks
//!
//! A filtered deck borrows cards from their home decks. Each borrowed card
//! remembers its home deck and raw due, and goes back when the deck is
//! emptied, when it is rescheduled as a review, or when it passes a preview.

use rand::seq::SliceRandom;

use super::learning::SECS_PER_DAY;
use super::{AnswerContext, CardAnswered, Grade};
use crate::card::{Card, CardQueue, CardType, Due};
use crate::decks::{DeckId, FilteredKind, FilteredOrder};
use crate::storage::{Result, RevlogKind, SqliteStorage, StorageError};

/// Review cards in a filtered deck get day dues far in the past, so they are
/// all due and keep the order the deck was built in.
const FILTERED_REVIEW_DUE_BASE: i32 = -100_000;

// ==================== Answering ====================

/// Answer a card in a filtered deck that does not reschedule. Failing
/// grades show it again after the deck's preview delay; passing grades
/// return it home untouched.
pub fn answer_preview(card: &mut Card, grade: Grade, ctx: &mut AnswerContext) -> CardAnswered {
    match grade {
        Grade::Again | Grade::Hard => {
            let delay = ctx.config.preview_delay_secs().clamp(0, SECS_PER_DAY) as u32;
            card.set_queue_and_due(
                CardQueue::Preview,
                Due::Timestamp(ctx.timing.now.0 + delay as i64),
            );
            CardAnswered {
                review_kind: RevlogKind::Filtered,
                interval_log: -(delay as i32),
                learning_delay_secs: Some(delay),
                leeched: false,
                suspended: false,
            }
        }
        Grade::Good | Grade::Easy => {
            card.remove_from_filtered_deck_restoring_queue();
            CardAnswered {
                review_kind: RevlogKind::Filtered,
                interval_log: card.interval as i32,
                learning_delay_secs: None,
                leeched: false,
                suspended: false,
            }
        }
    }
}

// ==================== Building and Emptying ====================

/// Fill filtered deck `deck_id` from its search, after emptying it.
/// Returns how many cards were moved in.
pub fn build_filtered_deck(storage: &SqliteStorage, deck_id: DeckId, today: u32) -> Result<usize> {
    let deck = storage.get_deck_required(deck_id)?;
    let filtered = deck
        .filtered()
        .cloned()
        .ok_or_else(|| StorageError::InvalidInput(format!("deck '{}' is not a filtered deck", deck.name)))?;

    storage.transact(|storage| {
        empty_filtered_deck(storage, deck_id)?;

        let search = &filtered.search;
        let source_decks = match search.source_deck {
            Some(source) => {
                let source = storage.get_deck_required(source)?;
                storage.deck_with_children(&source)?
            }
            None => storage.all_decks()?,
        };
        let source_ids: Vec<DeckId> = source_decks
            .iter()
            .filter(|deck| !deck.is_filtered())
            .map(|deck| deck.id)
            .collect();

        let mut cards: Vec<Card> = storage
            .cards_in_decks(&source_ids)?
            .into_iter()
            .filter(|card| !card.is_filtered() && matches_search(card, search.kind, today))
            .collect();

        match search.order {
            FilteredOrder::Due => cards.sort_by_key(|card| (card.ctype != CardType::Review, card.due.to_raw(), card.id)),
            FilteredOrder::OldestAdded => cards.sort_by_key(|card| card.id),
            FilteredOrder::Random => cards.shuffle(&mut rand::thread_rng()),
        }
        cards.truncate(search.limit as usize);

        for (idx, card) in cards.iter_mut().enumerate() {
            card.original_deck_id = card.deck_id;
            card.original_due = card.due.to_raw();
            card.deck_id = deck_id;
            let due = match card.ctype {
                CardType::New => Due::Position(idx as u32),
                _ => Due::Day(FILTERED_REVIEW_DUE_BASE + idx as i32),
            };
            card.set_queue_and_due(card.queue, due);
            card.flush(storage)?;
        }

        log::info!("Moved {} cards into filtered deck '{}'", cards.len(), deck.name);
        Ok(cards.len())
    })
}

fn matches_search(card: &Card, kind: FilteredKind, today: u32) -> bool {
    let due_review = card.queue == CardQueue::Review
        && card.due.day().map(|due| due <= today as i32).unwrap_or(false);
    match kind {
        FilteredKind::Due => due_review,
        FilteredKind::New => card.queue == CardQueue::New,
        FilteredKind::Any => card.queue == CardQueue::New || card.queue == CardQueue::Review,
    }
}

/// Send every card in filtered deck `deck_id` home. Cards that started
/// learning inside the deck keep their learning due.
pub fn empty_filtered_deck(storage: &SqliteStorage, deck_id: DeckId) -> Result<usize> {
    storage.transact(|storage| {
        let cards = storage.cards_in_filtered_deck(deck_id)?;
        for mut card in cards.iter().cloned() {
            if matches!(card.ctype, CardType::Learn | CardType::Relearn) {
                card.remove_from_filtered_deck_before_reschedule();
            } else {
                card.remove_from_filtered_deck_restoring_queue();
            }
            card.flush(storage)?;
        }
        if !cards.is_empty() {
            log::info!("Returned {} cards from filtered deck {}", cards.len(), deck_id);
        }
        Ok(cards.len())
    })
}
