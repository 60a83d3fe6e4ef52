//! In-memory study queues
//!
//! Queues hold card ids only and are rebuilt from storage on every reset.
//! A card id sits in at most one queue, and suspended or buried cards are
//! never fetched.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::timing::SchedTimingToday;
use super::Counts;
use crate::card::CardId;
use crate::config::NewReviewMix;
use crate::decks::{DailyCounter, Deck, DeckConfigResolver, DeckId, NewCardOrder, WalkingLimits};
use crate::storage::{LearningDue, Result, SqliteStorage};
use crate::timestamp::TimestampSecs;

/// Day-learning cards have no daily limit; this only bounds the query.
const DAY_LEARNING_FETCH_LIMIT: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    New,
    /// Intraday learning and preview cards, due at a timestamp
    Learning,
    Review,
    /// Learning cards due on a day
    DayLearning,
}

#[derive(Debug, Clone, Default)]
pub struct CardQueues {
    /// Scheduling day the queues were built for
    pub day: u32,
    new: VecDeque<CardId>,
    review: VecDeque<CardId>,
    /// Sorted by due, then id
    learning: Vec<LearningDue>,
    day_learning: VecDeque<CardId>,
    learn_ahead_secs: u32,
    mix: NewReviewMix,
    /// Show a new card every this many answers (0 disables distribution)
    new_card_modulus: u32,
    /// Answers since the queues were built
    reps: u32,
}

impl CardQueues {
    /// The card to show at `now`, and which queue it heads.
    pub fn next_card(&self, now: TimestampSecs) -> Option<(CardId, QueueKind)> {
        if let Some(entry) = self.learning.first() {
            if entry.due <= now.0 {
                return Some((entry.id, QueueKind::Learning));
            }
        }
        if self.time_for_new_card() {
            if let Some(id) = self.new.front() {
                return Some((*id, QueueKind::New));
            }
        }
        if let Some(id) = self.review.front() {
            return Some((*id, QueueKind::Review));
        }
        if let Some(id) = self.day_learning.front() {
            return Some((*id, QueueKind::DayLearning));
        }
        if let Some(id) = self.new.front() {
            return Some((*id, QueueKind::New));
        }
        if let Some(entry) = self.learning.first() {
            if entry.due <= now.0 + self.learn_ahead_secs as i64 {
                return Some((entry.id, QueueKind::Learning));
            }
        }
        None
    }

    fn time_for_new_card(&self) -> bool {
        if self.new.is_empty() {
            return false;
        }
        match self.mix {
            NewReviewMix::NewFirst => true,
            NewReviewMix::ReviewsFirst => false,
            NewReviewMix::Distribute => {
                self.new_card_modulus > 0 && self.reps > 0 && self.reps % self.new_card_modulus == 0
            }
        }
    }

    /// Id at the front of `kind`, if any.
    pub fn head(&self, kind: QueueKind) -> Option<CardId> {
        match kind {
            QueueKind::New => self.new.front().copied(),
            QueueKind::Review => self.review.front().copied(),
            QueueKind::DayLearning => self.day_learning.front().copied(),
            QueueKind::Learning => self.learning.first().map(|entry| entry.id),
        }
    }

    /// Take the answered card off the front of its queue.
    pub fn pop_answered(&mut self, kind: QueueKind, id: CardId) {
        assert_eq!(
            self.head(kind),
            Some(id),
            "card {} is no longer at the head of the {:?} queue",
            id,
            kind
        );
        match kind {
            QueueKind::New => {
                self.new.pop_front();
            }
            QueueKind::Review => {
                self.review.pop_front();
            }
            QueueKind::DayLearning => {
                self.day_learning.pop_front();
            }
            QueueKind::Learning => {
                self.learning.remove(0);
            }
        }
        self.reps += 1;
    }

    /// Put a card that is still learning today back in due order.
    pub fn requeue_learning(&mut self, id: CardId, due: i64) {
        let entry = LearningDue { due, id };
        let idx = self.learning.partition_point(|other| *other <= entry);
        self.learning.insert(idx, entry);
    }

    /// Drop `id` from every queue.
    pub fn remove(&mut self, id: CardId) {
        self.new.retain(|other| *other != id);
        self.review.retain(|other| *other != id);
        self.day_learning.retain(|other| *other != id);
        self.learning.retain(|entry| entry.id != id);
    }

    pub fn counts(&self, now: TimestampSecs) -> Counts {
        let cutoff = now.0 + self.learn_ahead_secs as i64;
        let intraday = self.learning.iter().filter(|entry| entry.due <= cutoff).count();
        Counts {
            new: self.new.len() as u32,
            learning: (intraday + self.day_learning.len()) as u32,
            review: self.review.len() as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.new.is_empty()
            && self.review.is_empty()
            && self.learning.is_empty()
            && self.day_learning.is_empty()
    }
}

/// Fills [`CardQueues`] for the current deck and its children
pub struct QueueBuilder<'a> {
    storage: &'a SqliteStorage,
    resolver: &'a mut DeckConfigResolver,
    timing: SchedTimingToday,
    merge_reviews: bool,
}

impl<'a> QueueBuilder<'a> {
    pub fn new(
        storage: &'a SqliteStorage,
        resolver: &'a mut DeckConfigResolver,
        timing: SchedTimingToday,
        merge_reviews: bool,
    ) -> Self {
        Self {
            storage,
            resolver,
            timing,
            merge_reviews,
        }
    }

    pub fn build(mut self) -> Result<CardQueues> {
        let mut queues = CardQueues {
            day: self.timing.days_elapsed,
            learn_ahead_secs: self.storage.learn_ahead_secs()?,
            mix: self.storage.new_review_mix()?,
            ..Default::default()
        };

        let Some(current) = self.current_deck()? else {
            log::debug!("No decks to study");
            return Ok(queues);
        };
        let active = self.storage.deck_with_children(&current)?;
        let active_ids: Vec<DeckId> = active.iter().map(|deck| deck.id).collect();

        queues.new = self.fill_new(&current, &active)?.into();
        queues.review = self.fill_review(&current, &active)?.into();
        queues.learning = self
            .storage
            .intraday_learning_cards(&active_ids, self.timing.next_day_at.0)?;
        queues.day_learning = self.fill_day_learning(&active)?.into();

        if queues.mix == NewReviewMix::Distribute && !queues.new.is_empty() && !queues.review.is_empty() {
            let total = queues.new.len() + queues.review.len();
            queues.new_card_modulus = ((total / queues.new.len()) as u32).max(2);
        }

        log::debug!(
            "Built queues for deck '{}': {} new, {} review, {} learning, {} day learning",
            current.name,
            queues.new.len(),
            queues.review.len(),
            queues.learning.len(),
            queues.day_learning.len()
        );
        Ok(queues)
    }

    /// The selected deck, falling back to the default deck and then to any deck.
    fn current_deck(&self) -> Result<Option<Deck>> {
        let id = self.storage.current_deck_id()?;
        if let Some(deck) = self.storage.get_deck(id)? {
            return Ok(Some(deck));
        }
        log::debug!("Current deck {} is missing, falling back", id);
        if let Some(deck) = self.storage.get_deck(DeckId(1))? {
            return Ok(Some(deck));
        }
        Ok(self.storage.all_decks()?.into_iter().next())
    }

    fn fill_new(&mut self, current: &Deck, active: &[Deck]) -> Result<Vec<CardId>> {
        let today = self.timing.days_elapsed;
        let mut limits = WalkingLimits::new(self.storage, self.resolver, current, today, DailyCounter::New)?;
        let mut cards = Vec::new();

        for deck in active {
            let limit = limits.limit_for(self.storage, self.resolver, deck)?;
            if limit == 0 {
                limits.consume(deck, 0, 0);
                continue;
            }
            let order = if deck.is_filtered() {
                NewCardOrder::Due
            } else {
                self.resolver.config_for_deck(self.storage, deck.id)?.new.order
            };
            let ids = match order {
                NewCardOrder::Due => self.storage.new_card_ids(deck.id, Some(limit))?,
                NewCardOrder::Random => {
                    let mut ids = self.storage.new_card_ids(deck.id, None)?;
                    let seed = (today as u64).wrapping_add(deck.id.0 as u64);
                    ids.shuffle(&mut StdRng::seed_from_u64(seed));
                    ids.truncate(limit as usize);
                    ids
                }
            };
            limits.consume(deck, limit, ids.len() as u32);
            cards.extend(ids);
        }
        Ok(cards)
    }

    fn fill_review(&mut self, current: &Deck, active: &[Deck]) -> Result<Vec<CardId>> {
        let today = self.timing.days_elapsed;
        let mut limits =
            WalkingLimits::new(self.storage, self.resolver, current, today, DailyCounter::Review)?;
        let mut cards = Vec::new();

        for deck in active {
            let limit = limits.limit_for(self.storage, self.resolver, deck)?;
            if limit == 0 {
                limits.consume(deck, 0, 0);
                continue;
            }
            let due = self.storage.review_cards_due(deck.id, today, limit)?;
            limits.consume(deck, limit, due.len() as u32);
            cards.extend(due);
        }

        if self.merge_reviews {
            cards.sort_unstable();
        }
        Ok(cards.into_iter().map(|(_, id)| id).collect())
    }

    fn fill_day_learning(&self, active: &[Deck]) -> Result<Vec<CardId>> {
        let today = self.timing.days_elapsed;
        let mut cards = Vec::new();
        for deck in active {
            cards.extend(
                self.storage
                    .day_learning_card_ids(deck.id, today, DAY_LEARNING_FETCH_LIMIT)?,
            );
        }
        Ok(cards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn learning(due: i64, id: i64) -> LearningDue {
        LearningDue { due, id: CardId(id) }
    }

    fn queues() -> CardQueues {
        CardQueues {
            new: vec![CardId(1), CardId(2)].into(),
            review: vec![CardId(3)].into(),
            learning: vec![learning(1_000, 4)],
            day_learning: vec![CardId(5)].into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_precedence_reviews_first() {
        let mut q = queues();
        assert_eq!(q.next_card(TimestampSecs(1_000)), Some((CardId(4), QueueKind::Learning)));
        assert_eq!(q.next_card(TimestampSecs(999)), Some((CardId(3), QueueKind::Review)));

        q.pop_answered(QueueKind::Review, CardId(3));
        assert_eq!(q.next_card(TimestampSecs(999)), Some((CardId(5), QueueKind::DayLearning)));
        q.pop_answered(QueueKind::DayLearning, CardId(5));
        assert_eq!(q.next_card(TimestampSecs(999)), Some((CardId(1), QueueKind::New)));
    }

    #[test]
    fn test_new_first() {
        let q = CardQueues {
            mix: NewReviewMix::NewFirst,
            ..queues()
        };
        assert_eq!(q.next_card(TimestampSecs(0)), Some((CardId(1), QueueKind::New)));
    }

    #[test]
    fn test_distribute_interleaves_new() {
        let mut q = CardQueues {
            mix: NewReviewMix::Distribute,
            new: vec![CardId(1)].into(),
            review: vec![CardId(10), CardId(11), CardId(12)].into(),
            new_card_modulus: 2,
            ..Default::default()
        };
        assert_eq!(q.next_card(TimestampSecs(0)), Some((CardId(10), QueueKind::Review)));
        q.pop_answered(QueueKind::Review, CardId(10));
        assert_eq!(q.next_card(TimestampSecs(0)), Some((CardId(11), QueueKind::Review)));
        q.pop_answered(QueueKind::Review, CardId(11));
        assert_eq!(q.next_card(TimestampSecs(0)), Some((CardId(1), QueueKind::New)));
    }

    #[test]
    fn test_learn_ahead_window() {
        let mut q = CardQueues {
            learning: vec![learning(1_100, 7)],
            ..Default::default()
        };
        assert_eq!(q.next_card(TimestampSecs(1_000)), None);
        assert_eq!(q.counts(TimestampSecs(1_000)).learning, 0);

        q.learn_ahead_secs = 200;
        assert_eq!(q.next_card(TimestampSecs(1_000)), Some((CardId(7), QueueKind::Learning)));
        assert_eq!(q.counts(TimestampSecs(1_000)).learning, 1);
    }

    #[test]
    fn test_requeue_learning_keeps_order() {
        let mut q = CardQueues::default();
        q.requeue_learning(CardId(1), 300);
        q.requeue_learning(CardId(2), 100);
        q.requeue_learning(CardId(3), 200);
        assert_eq!(q.head(QueueKind::Learning), Some(CardId(2)));
        q.remove(CardId(2));
        assert_eq!(q.head(QueueKind::Learning), Some(CardId(3)));
    }

    #[test]
    #[should_panic]
    fn test_pop_requires_head() {
        let mut q = queues();
        q.pop_answered(QueueKind::New, CardId(2));
    }

    #[test]
    fn test_counts_include_day_learning() {
        let q = queues();
        assert_eq!(
            q.counts(TimestampSecs(1_000)),
            Counts {
                new: 2,
                learning: 2,
                review: 1
            }
        );
    }
}
