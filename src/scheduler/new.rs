//! Ordering new cards, and turning studied cards back into new ones

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::card::{Card, CardId, CardQueue, CardType, Due};
use crate::decks::DeckId;
use crate::notes::NoteId;
use crate::storage::{Result, RevlogEntry, RevlogKind, SqliteStorage};
use crate::timestamp::TimestampSecs;

impl Card {
    fn schedule_as_new(&mut self, position: u32) {
        self.remove_from_filtered_deck_before_reschedule();
        self.ctype = CardType::New;
        self.interval = 0;
        self.ease_factor = 0;
        self.remaining_steps = 0;
        self.set_queue_and_due(CardQueue::New, Due::Position(position));
    }

    /// If the card is new, change its position, and return true.
    fn set_new_position(&mut self, position: u32) -> bool {
        if self.queue != CardQueue::New || self.ctype != CardType::New {
            return false;
        }
        self.due = Due::Position(position);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NewCardSortOrder {
    NoteId,
    Random,
    /// Keep the order the cards were given in
    Preserve,
}

/// Assigns positions per note, so siblings share a position.
pub struct NewCardSorter {
    position: HashMap<NoteId, u32>,
}

impl NewCardSorter {
    pub fn new(cards: &[Card], starting_from: u32, step: u32, order: NewCardSortOrder) -> Self {
        let note_ids = note_ids_in_order(cards, order);
        NewCardSorter {
            position: note_ids
                .into_iter()
                .enumerate()
                .map(|(i, nid)| (nid, (i as u32) * step + starting_from))
                .collect(),
        }
    }

    pub fn position(&self, card: &Card) -> u32 {
        self.position.get(&card.note_id).copied().unwrap_or_default()
    }
}

fn note_ids_in_order(cards: &[Card], order: NewCardSortOrder) -> Vec<NoteId> {
    let mut seen = HashSet::new();
    let mut note_ids: Vec<NoteId> = cards
        .iter()
        .filter_map(|card| seen.insert(card.note_id).then_some(card.note_id))
        .collect();
    match order {
        NewCardSortOrder::Preserve => {}
        NewCardSortOrder::NoteId => note_ids.sort_unstable(),
        NewCardSortOrder::Random => note_ids.shuffle(&mut rand::thread_rng()),
    }
    note_ids
}

fn cards_in_given_order(storage: &SqliteStorage, ids: &[CardId]) -> Result<Vec<Card>> {
    let mut cards = Vec::with_capacity(ids.len());
    for id in ids {
        match storage.get_card(*id)? {
            Some(card) => cards.push(card),
            None => log::warn!("Skipping missing card {}", id),
        }
    }
    Ok(cards)
}

/// Give new cards among `ids` positions `starting_from`, `starting_from + step`, ...
/// With `shift`, existing new cards at or after `starting_from` move up to
/// make room. Returns how many cards were repositioned.
pub fn sort_cards(
    storage: &SqliteStorage,
    ids: &[CardId],
    starting_from: u32,
    step: u32,
    order: NewCardSortOrder,
    shift: bool,
    now: TimestampSecs,
) -> Result<usize> {
    storage.transact(|storage| {
        if shift {
            storage.shift_new_positions(starting_from, step * ids.len() as u32, ids)?;
        }
        let cards = cards_in_given_order(storage, ids)?;
        let sorter = NewCardSorter::new(&cards, starting_from, step, order);
        let mut count = 0;
        for mut card in cards {
            if card.set_new_position(sorter.position(&card)) {
                card.mtime = now;
                card.flush(storage)?;
                count += 1;
            }
        }
        log::debug!("Repositioned {} new cards from {}", count, starting_from);
        Ok(count)
    })
}

/// Renumber the new cards of one deck from 1, randomly or by note.
pub fn sort_deck(storage: &SqliteStorage, deck: DeckId, random: bool, now: TimestampSecs) -> Result<usize> {
    let ids: Vec<CardId> = storage
        .cards_in_decks(&[deck])?
        .into_iter()
        .filter(|card| card.queue == CardQueue::New)
        .map(|card| card.id)
        .collect();
    let order = if random {
        NewCardSortOrder::Random
    } else {
        NewCardSortOrder::NoteId
    };
    sort_cards(storage, &ids, 1, 1, order, false, now)
}

/// Forget the scheduling of `ids` and put them at the end of the new queue.
/// Reps and lapses are kept. With `log`, each card gets a manual revlog row.
pub fn reschedule_cards_as_new(storage: &SqliteStorage, ids: &[CardId], log: bool, now: TimestampSecs) -> Result<()> {
    storage.transact(|storage| {
        for mut card in cards_in_given_order(storage, ids)? {
            let last_interval = card.interval as i32;
            let position = storage.next_new_position()?;
            card.schedule_as_new(position);
            card.mtime = now;
            if log {
                let mut entry = RevlogEntry {
                    id: Default::default(),
                    card_id: card.id,
                    button_chosen: 0,
                    interval: 0,
                    last_interval,
                    ease_factor: 0,
                    taken_millis: 0,
                    review_kind: RevlogKind::Manual,
                };
                storage.add_revlog_entry(&mut entry, now.as_millis())?;
            }
            card.flush(storage)?;
        }
        log::info!("Rescheduled {} cards as new", ids.len());
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_storage() -> SqliteStorage {
        SqliteStorage::open_in_memory().unwrap()
    }

    fn add_new(storage: &SqliteStorage, note: i64, position: u32) -> Card {
        let mut card = Card::new(NoteId(note), 0, DeckId(1), position);
        storage.add_card(&mut card).unwrap();
        card
    }

    #[test]
    fn test_sorter_orders() {
        let mut c1 = Card::new(NoteId(6), 0, DeckId(0), 0);
        c1.id = CardId(2);
        let mut c2 = Card::new(NoteId(5), 0, DeckId(0), 0);
        c2.id = CardId(3);
        let mut c3 = Card::new(NoteId(4), 0, DeckId(0), 0);
        c3.id = CardId(1);
        let cards = vec![c1.clone(), c2.clone(), c3.clone()];

        let sorter = NewCardSorter::new(&cards, 0, 1, NewCardSortOrder::NoteId);
        assert_eq!(sorter.position(&c1), 2);
        assert_eq!(sorter.position(&c2), 1);
        assert_eq!(sorter.position(&c3), 0);

        let sorter = NewCardSorter::new(&cards, 5, 2, NewCardSortOrder::Preserve);
        assert_eq!(sorter.position(&c1), 5);
        assert_eq!(sorter.position(&c2), 7);
        assert_eq!(sorter.position(&c3), 9);
    }

    #[test]
    fn test_siblings_share_position() {
        let cards = vec![
            Card::new(NoteId(1), 0, DeckId(1), 0),
            Card::new(NoteId(1), 1, DeckId(1), 0),
            Card::new(NoteId(2), 0, DeckId(1), 0),
        ];
        let sorter = NewCardSorter::new(&cards, 10, 1, NewCardSortOrder::Preserve);
        assert_eq!(sorter.position(&cards[0]), 10);
        assert_eq!(sorter.position(&cards[1]), 10);
        assert_eq!(sorter.position(&cards[2]), 11);
    }

    #[test]
    fn test_sort_cards_with_shift() {
        let storage = create_test_storage();
        let a = add_new(&storage, 1, 0);
        let b = add_new(&storage, 2, 1);
        let c = add_new(&storage, 3, 2);

        let moved = sort_cards(&storage, &[c.id], 1, 1, NewCardSortOrder::Preserve, true, TimestampSecs(9)).unwrap();
        assert_eq!(moved, 1);
        assert_eq!(storage.get_card_required(a.id).unwrap().due, Due::Position(0));
        assert_eq!(storage.get_card_required(c.id).unwrap().due, Due::Position(1));
        assert_eq!(storage.get_card_required(b.id).unwrap().due, Due::Position(2));
    }

    #[test]
    fn test_sort_skips_non_new_cards() {
        let storage = create_test_storage();
        let mut review = Card {
            ctype: CardType::Review,
            queue: CardQueue::Review,
            due: Due::Day(5),
            interval: 3,
            ..Default::default()
        };
        storage.add_card(&mut review).unwrap();
        let moved = sort_cards(&storage, &[review.id], 0, 1, NewCardSortOrder::NoteId, false, TimestampSecs(9)).unwrap();
        assert_eq!(moved, 0);
        assert_eq!(storage.get_card_required(review.id).unwrap().due, Due::Day(5));
    }

    #[test]
    fn test_reschedule_as_new_logs_and_appends() {
        let storage = create_test_storage();
        add_new(&storage, 1, 4);
        let mut review = Card {
            note_id: NoteId(2),
            ctype: CardType::Review,
            queue: CardQueue::Review,
            due: Due::Day(5),
            interval: 12,
            ease_factor: 2300,
            reps: 7,
            lapses: 1,
            ..Default::default()
        };
        storage.add_card(&mut review).unwrap();

        reschedule_cards_as_new(&storage, &[review.id], true, TimestampSecs(100)).unwrap();
        let card = storage.get_card_required(review.id).unwrap();
        assert_eq!(card.ctype, CardType::New);
        assert_eq!(card.queue, CardQueue::New);
        assert_eq!(card.due, Due::Position(5));
        assert_eq!(card.interval, 0);
        assert_eq!(card.reps, 7);

        let entry = storage.last_revlog_entry_for_card(review.id).unwrap().unwrap();
        assert_eq!(entry.review_kind, RevlogKind::Manual);
        assert_eq!(entry.last_interval, 12);
    }
}
