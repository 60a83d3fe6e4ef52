//! Suspending, burying, and the automatic unbury at the start of a day

use serde::{Deserialize, Serialize};

use super::SchedulerVersion;
use crate::card::{Card, CardId, CardQueue, CardType, Due};
use crate::config::ConfigKey;
use crate::decks::DeckId;
use crate::storage::{Result, SqliteStorage};
use crate::timestamp::TimestampSecs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuryOrSuspendMode {
    Suspend,
    /// Buried because a sibling was studied
    BurySched,
    BuryUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnburyMode {
    All,
    UserOnly,
    SchedOnly,
}

impl UnburyMode {
    fn queues(self) -> &'static [CardQueue] {
        match self {
            UnburyMode::All => &[CardQueue::SchedBuried, CardQueue::UserBuried],
            UnburyMode::UserOnly => &[CardQueue::UserBuried],
            UnburyMode::SchedOnly => &[CardQueue::SchedBuried],
        }
    }
}

impl Card {
    /// Take a card out of (re)learning, for the legacy rules which did not
    /// keep learning state on suspended or buried cards. Relearning cards
    /// become due reviews; learning cards start over as new at `position`.
    fn remove_from_learning(&mut self, today: u32, position: u32) {
        if !matches!(self.queue, CardQueue::Learn | CardQueue::DayLearn) {
            return;
        }
        self.remaining_steps = 0;
        if self.ctype == CardType::Learn {
            self.ctype = CardType::New;
            self.interval = 0;
            self.ease_factor = 0;
            self.set_queue_and_due(CardQueue::New, Due::Position(position));
        } else {
            self.ctype = CardType::Review;
            self.set_queue_and_due(CardQueue::Review, Due::Day(today as i32));
        }
    }
}

/// Unbury everything once per day. A last-unburied day more than a week
/// ahead means the clock moved backwards, and also triggers it.
pub fn unbury_if_day_rolled_over(storage: &SqliteStorage, today: u32) -> Result<()> {
    let last = storage.last_unburied_day()?;
    if last < today || today + 7 < last {
        storage.transact(|storage| {
            let count = unbury_on_day_rollover(storage)?;
            storage.set_config(ConfigKey::LastUnburied, &today)?;
            if count > 0 {
                log::info!("Unburied {} cards for day {}", count, today);
            }
            Ok::<_, crate::storage::StorageError>(())
        })?;
    }
    Ok(())
}

/// Leaves modification times alone: nothing was changed by the user.
fn unbury_on_day_rollover(storage: &SqliteStorage) -> Result<usize> {
    let buried = storage.cards_in_queues(&[CardQueue::SchedBuried, CardQueue::UserBuried])?;
    for mut card in buried.iter().cloned() {
        card.restore_queue_after_bury_or_suspend();
        card.flush(storage)?;
    }
    Ok(buried.len())
}

pub fn bury_or_suspend_cards(
    storage: &SqliteStorage,
    ids: &[CardId],
    mode: BuryOrSuspendMode,
    version: SchedulerVersion,
    today: u32,
    now: TimestampSecs,
) -> Result<usize> {
    let desired = match mode {
        BuryOrSuspendMode::Suspend => CardQueue::Suspended,
        BuryOrSuspendMode::BurySched => CardQueue::SchedBuried,
        // the legacy rules had a single bury queue
        BuryOrSuspendMode::BuryUser if version == SchedulerVersion::V1 => CardQueue::SchedBuried,
        BuryOrSuspendMode::BuryUser => CardQueue::UserBuried,
    };

    storage.transact(|storage| {
        let mut changed = 0;
        for id in ids {
            let mut card = storage.get_card_required(*id)?;
            if card.queue == desired {
                continue;
            }
            if card.queue == CardQueue::Preview {
                // preview dues are timestamps no inactive queue can hold
                card.remove_from_filtered_deck_restoring_queue();
            }
            if version == SchedulerVersion::V1 {
                card.remove_from_filtered_deck_restoring_queue();
                let learning = matches!(card.queue, CardQueue::Learn | CardQueue::DayLearn);
                let position = if learning && card.ctype == CardType::Learn {
                    storage.next_new_position()?
                } else {
                    0
                };
                card.remove_from_learning(today, position);
            }
            card.set_queue_and_due(desired, card.due);
            card.mtime = now;
            card.flush(storage)?;
            changed += 1;
        }
        log::info!("Moved {} cards to {:?}", changed, desired);
        Ok(changed)
    })
}

/// Returns how many cards were buried or suspended before the call.
pub fn unbury_or_unsuspend_cards(storage: &SqliteStorage, ids: &[CardId], now: TimestampSecs) -> Result<usize> {
    storage.transact(|storage| {
        let mut changed = 0;
        for id in ids {
            let mut card = storage.get_card_required(*id)?;
            if card.restore_queue_after_bury_or_suspend() {
                card.mtime = now;
                card.flush(storage)?;
                changed += 1;
            }
        }
        Ok(changed)
    })
}

/// Unbury cards in `deck` and the decks beneath it.
pub fn unbury_cards_in_deck(
    storage: &SqliteStorage,
    deck: DeckId,
    mode: UnburyMode,
    now: TimestampSecs,
) -> Result<usize> {
    let deck = storage.get_deck_required(deck)?;
    let deck_ids: Vec<DeckId> = storage.deck_with_children(&deck)?.iter().map(|d| d.id).collect();
    let ids: Vec<CardId> = storage
        .cards_in_decks(&deck_ids)?
        .into_iter()
        .filter(|card| mode.queues().contains(&card.queue))
        .map(|card| card.id)
        .collect();
    unbury_or_unsuspend_cards(storage, &ids, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decks::Deck;
    use crate::notes::NoteId;

    fn create_test_storage() -> SqliteStorage {
        SqliteStorage::open_in_memory().unwrap()
    }

    fn add_card(storage: &SqliteStorage, queue: CardQueue) -> Card {
        let mut card = Card {
            note_id: NoteId(1),
            queue,
            ..Default::default()
        };
        storage.add_card(&mut card).unwrap();
        card
    }

    #[test]
    fn test_unbury_only_when_day_rolls_over() {
        let storage = create_test_storage();
        let card = add_card(&storage, CardQueue::UserBuried);

        // day 0, last unburied 0, so no change
        unbury_if_day_rolled_over(&storage, 0).unwrap();
        assert_eq!(storage.get_card_required(card.id).unwrap().queue, CardQueue::UserBuried);

        unbury_if_day_rolled_over(&storage, 1).unwrap();
        assert_eq!(storage.get_card_required(card.id).unwrap().queue, CardQueue::New);
        assert_eq!(storage.last_unburied_day().unwrap(), 1);
    }

    #[test]
    fn test_clock_moving_back_unburies() {
        let storage = create_test_storage();
        storage.set_config(ConfigKey::LastUnburied, &20u32).unwrap();
        let card = add_card(&storage, CardQueue::SchedBuried);
        unbury_if_day_rolled_over(&storage, 10).unwrap();
        assert_eq!(storage.get_card_required(card.id).unwrap().queue, CardQueue::New);
    }

    #[test]
    fn test_user_bury_is_sched_bury_on_v1() {
        let storage = create_test_storage();
        let card = add_card(&storage, CardQueue::New);
        bury_or_suspend_cards(
            &storage,
            &[card.id],
            BuryOrSuspendMode::BuryUser,
            SchedulerVersion::V1,
            0,
            TimestampSecs(5),
        )
        .unwrap();
        assert_eq!(storage.get_card_required(card.id).unwrap().queue, CardQueue::SchedBuried);

        bury_or_suspend_cards(
            &storage,
            &[card.id],
            BuryOrSuspendMode::BuryUser,
            SchedulerVersion::V2,
            0,
            TimestampSecs(5),
        )
        .unwrap();
        assert_eq!(storage.get_card_required(card.id).unwrap().queue, CardQueue::UserBuried);
    }

    #[test]
    fn test_suspend_and_unsuspend() {
        let storage = create_test_storage();
        let card = add_card(&storage, CardQueue::New);
        let suspended = bury_or_suspend_cards(
            &storage,
            &[card.id],
            BuryOrSuspendMode::Suspend,
            SchedulerVersion::V2,
            0,
            TimestampSecs(5),
        )
        .unwrap();
        assert_eq!(suspended, 1);
        let stored = storage.get_card_required(card.id).unwrap();
        assert_eq!(stored.queue, CardQueue::Suspended);
        assert_eq!(stored.mtime, TimestampSecs(5));

        assert_eq!(unbury_or_unsuspend_cards(&storage, &[card.id], TimestampSecs(6)).unwrap(), 1);
        assert_eq!(unbury_or_unsuspend_cards(&storage, &[card.id], TimestampSecs(6)).unwrap(), 0);
    }

    #[test]
    fn test_v1_suspend_drops_learning_state() {
        let storage = create_test_storage();
        let mut card = Card {
            note_id: NoteId(1),
            ctype: CardType::Review,
            queue: CardQueue::Learn,
            due: Due::Timestamp(1_700_000_000),
            interval: 3,
            remaining_steps: 1001,
            ..Default::default()
        };
        storage.add_card(&mut card).unwrap();
        bury_or_suspend_cards(
            &storage,
            &[card.id],
            BuryOrSuspendMode::Suspend,
            SchedulerVersion::V1,
            12,
            TimestampSecs(5),
        )
        .unwrap();
        let stored = storage.get_card_required(card.id).unwrap();
        assert_eq!(stored.queue, CardQueue::Suspended);
        assert_eq!(stored.due, Due::Day(12));
        assert_eq!(stored.remaining_steps, 0);
    }

    #[test]
    fn test_unbury_in_deck_by_mode() {
        let storage = create_test_storage();
        let mut deck = Deck::new_normal("Top");
        storage.add_deck(&mut deck).unwrap();
        let mut user = Card {
            deck_id: deck.id,
            queue: CardQueue::UserBuried,
            ..Default::default()
        };
        storage.add_card(&mut user).unwrap();
        let mut sched = Card {
            deck_id: deck.id,
            queue: CardQueue::SchedBuried,
            ..Default::default()
        };
        storage.add_card(&mut sched).unwrap();

        assert_eq!(
            unbury_cards_in_deck(&storage, deck.id, UnburyMode::SchedOnly, TimestampSecs(1)).unwrap(),
            1
        );
        assert_eq!(storage.get_card_required(user.id).unwrap().queue, CardQueue::UserBuried);
        assert_eq!(storage.get_card_required(sched.id).unwrap().queue, CardQueue::New);
    }
}
