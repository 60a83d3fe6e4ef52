//! Applying an answer: the algorithm's card change plus its side effects,
//! committed together, and the reverse for undo.

use rand::rngs::StdRng;
use rand::RngCore;

use super::engine::SchedulerCore;
use super::fuzz::{fuzzed_interval, seeded_rng};
use super::learning::{LearningSteps, SECS_PER_DAY};
use super::{AnswerContext, AnswerOutcome, Grade, IntervalAlgorithm, Result, SchedulerError};
use crate::card::{Card, CardId, CardQueue, CardType, Due};
use crate::decks::{DailyCounter, NewConfig, ResolvedConfig};
use crate::notes::{NoteId, LEECH_TAG};
use crate::storage::{self, RevlogEntry, RevlogId, SqliteStorage};
use crate::timestamp::TimestampSecs;
use crate::undo::{ReviewUndo, UndoLog};

// ==================== Shared Card Changes ====================

/// Make the card a review card due `interval` days from today, returning it
/// home if it was borrowed by a filtered deck.
pub(super) fn reschedule_as_review(card: &mut Card, interval: u32, today: u32) {
    card.ctype = CardType::Review;
    card.remaining_steps = 0;
    card.remove_from_filtered_deck_before_reschedule();
    card.set_queue_and_due(CardQueue::Review, day_after(today, interval));
}

/// The day `interval` days after `today`, saturating on corrupt intervals.
pub(super) fn day_after(today: u32, interval: u32) -> Due {
    let day = today.saturating_add(interval).min(i32::MAX as u32);
    Due::Day(day as i32)
}

pub(super) fn graduating_interval(new: &NewConfig, easy: bool, fuzz: Option<&mut dyn RngCore>) -> u32 {
    let interval = if easy {
        new.graduating_interval_easy
    } else {
        new.graduating_interval_good
    }
    .max(1);
    match fuzz {
        Some(rng) => fuzzed_interval(interval, rng),
        None => interval,
    }
}

/// Learning delays are logged as negative seconds, or as days once they
/// reach a day.
pub(super) fn learning_interval_log(delay_secs: u32) -> i32 {
    if (delay_secs as i64) < SECS_PER_DAY {
        -(delay_secs as i32)
    } else {
        (delay_secs as i64 / SECS_PER_DAY) as i32
    }
}

fn last_interval_log(card: &Card, config: &ResolvedConfig) -> i32 {
    match card.ctype {
        CardType::New => 0,
        CardType::Review => card.interval as i32,
        CardType::Learn => learning_interval_log(
            LearningSteps::new(&config.config.new.steps_mins).delay_secs_for_left(card.remaining_steps),
        ),
        CardType::Relearn => learning_interval_log(
            LearningSteps::new(&config.config.lapse.steps_mins).delay_secs_for_left(card.remaining_steps),
        ),
    }
}

/// The daily counter an answer is charged to, by the queue it came from.
pub(super) fn counter_for_queue(queue: CardQueue) -> DailyCounter {
    match queue {
        CardQueue::New => DailyCounter::New,
        CardQueue::Review => DailyCounter::Review,
        _ => DailyCounter::Learn,
    }
}

// ==================== Siblings ====================

#[derive(Debug, Default)]
struct SiblingsTouched {
    /// Dropped from today's queues
    removed: Vec<CardId>,
    /// Also buried in storage
    buried: Vec<CardId>,
}

/// New siblings and review siblings due today are kept out of today's
/// session; they are only buried when the options ask for it.
fn bury_siblings(
    storage: &SqliteStorage,
    card: &Card,
    today: u32,
    bury_new: bool,
    bury_reviews: bool,
) -> storage::Result<SiblingsTouched> {
    let mut touched = SiblingsTouched::default();
    for mut sibling in storage.cards_of_note(card.note_id)? {
        if sibling.id == card.id {
            continue;
        }
        let bury = match sibling.queue {
            CardQueue::New => bury_new,
            CardQueue::Review if sibling.due.day().map(|due| due <= today as i32).unwrap_or(false) => {
                bury_reviews
            }
            _ => continue,
        };
        touched.removed.push(sibling.id);
        if bury {
            sibling.set_queue_and_due(CardQueue::SchedBuried, sibling.due);
            sibling.flush(storage)?;
            touched.buried.push(sibling.id);
        }
    }
    if !touched.buried.is_empty() {
        log::debug!("Buried {} siblings of card {}", touched.buried.len(), card.id);
    }
    Ok(touched)
}

/// Tag the note as a leech when the answer made it one. Returns whether the
/// note was already tagged.
fn tag_leech(storage: &SqliteStorage, note_id: NoteId, leeched: bool) -> storage::Result<bool> {
    let Some(mut note) = storage.get_note(note_id)? else {
        return Ok(false);
    };
    let was_leech = note.has_tag(LEECH_TAG);
    if leeched && note.add_tag(LEECH_TAG) {
        storage.update_note(&note)?;
        log::info!("Note {} is now a leech", note_id);
    }
    Ok(was_leech)
}

// ==================== Answering ====================

impl<A: IntervalAlgorithm> SchedulerCore<A> {
    pub(super) fn answer(
        &mut self,
        storage: &SqliteStorage,
        undo: &mut UndoLog,
        card: &Card,
        grade: Grade,
        now: TimestampSecs,
    ) -> Result<AnswerOutcome> {
        if !self.algorithm.accepts(grade) {
            return Err(SchedulerError::InvalidGrade {
                grade: grade.as_u8(),
                version: self.algorithm.version(),
            });
        }

        let served = match self.current {
            Some(served) if served.id == card.id => served,
            _ => panic!("card {} is not the card last returned by get_card", card.id),
        };
        let at_head = self.queues.as_ref().and_then(|q| q.head(served.kind));
        assert_eq!(
            at_head,
            Some(card.id),
            "card {} is no longer at the head of its queue",
            card.id
        );
        let stored = storage.get_card(card.id)?;
        assert!(
            stored.as_ref() == Some(card),
            "card {} does not match its stored state",
            card.id
        );

        let timing = self.timing_at(storage, now)?;
        let config = self.resolver.config_for(storage, card)?;
        let previewing = config.previewing();
        let today = timing.days_elapsed;
        let counted = counter_for_queue(card.queue);
        let counted_deck = card.deck_id;
        let max_millis = config.config.review.max_answer_secs as u128 * 1000;
        let taken_millis = served.served_at.elapsed().as_millis().min(max_millis) as i64;
        let last_interval = last_interval_log(card, &config);

        let mut updated = card.clone();
        let answered = {
            let mut seeded: StdRng;
            let rng: &mut dyn RngCore = if self.algorithm.fuzz_seeded_by_card() {
                seeded = seeded_rng(card);
                &mut seeded
            } else {
                &mut self.rng
            };
            let mut ctx = AnswerContext {
                timing,
                config: &config,
                rng,
                fuzz: true,
            };
            self.algorithm.answer(&mut updated, grade, &mut ctx)
        };
        if !previewing {
            updated.reps += 1;
        }
        updated.mtime = now;

        let bury_new = config.config.new.bury_siblings;
        let bury_reviews = config.config.review.bury_siblings;
        let (was_leech, siblings) = storage.transact(|storage| -> storage::Result<_> {
            updated.flush(storage)?;

            let mut entry = RevlogEntry {
                id: RevlogId(0),
                card_id: updated.id,
                button_chosen: grade.as_u8(),
                interval: answered.interval_log,
                last_interval,
                ease_factor: updated.ease_factor as u32,
                taken_millis: taken_millis as u32,
                review_kind: answered.review_kind,
            };
            storage.add_revlog_entry(&mut entry, now.as_millis())?;

            if storage.get_deck(counted_deck)?.is_some() {
                storage.update_deck_today(counted_deck, today, counted, 1, taken_millis)?;
            }
            let was_leech = tag_leech(storage, updated.note_id, answered.leeched)?;
            let siblings = bury_siblings(storage, &updated, today, bury_new, bury_reviews)?;
            Ok((was_leech, siblings))
        })?;

        undo.push_review(ReviewUndo {
            card: card.clone(),
            was_leech,
            counted,
            counted_deck,
            day: today,
            taken_millis,
            buried_siblings: siblings.buried,
        });

        let mut left_queue = true;
        if let Some(queues) = self.queues.as_mut() {
            queues.pop_answered(served.kind, card.id);
            for id in siblings.removed {
                queues.remove(id);
            }
            if let (CardQueue::Learn | CardQueue::Preview, Due::Timestamp(due)) = (updated.queue, updated.due) {
                if due < timing.next_day_at.0 {
                    queues.requeue_learning(updated.id, due);
                    left_queue = false;
                }
            }
        }
        self.current = None;

        log::debug!(
            "Answered card {} with {:?}: queue {:?}, interval {}",
            updated.id,
            grade,
            updated.queue,
            updated.interval
        );

        Ok(AnswerOutcome {
            interval_days: updated.interval,
            learning_delay_secs: answered.learning_delay_secs,
            leech: answered.leeched,
            suspended: answered.suspended,
            left_queue,
            card: updated,
        })
    }

    /// Preview the delay `grade` would give, without fuzz or side effects.
    pub(super) fn preview_interval_secs(
        &mut self,
        storage: &SqliteStorage,
        card: &Card,
        grade: Grade,
        now: TimestampSecs,
    ) -> Result<u32> {
        if !self.algorithm.accepts(grade) {
            return Err(SchedulerError::InvalidGrade {
                grade: grade.as_u8(),
                version: self.algorithm.version(),
            });
        }
        let timing = self.timing_at(storage, now)?;
        let config = self.resolver.config_for(storage, card)?;
        let mut scratch = card.clone();
        let mut rng = seeded_rng(card);
        let mut ctx = AnswerContext {
            timing,
            config: &config,
            rng: &mut rng,
            fuzz: false,
        };
        let answered = self.algorithm.answer(&mut scratch, grade, &mut ctx);
        Ok(answered
            .learning_delay_secs
            .unwrap_or_else(|| scratch.interval.saturating_mul(SECS_PER_DAY as u32)))
    }
}

// ==================== Undo ====================

/// Put everything an answer changed back the way it was, in one
/// transaction: the card row, its newest review log row, a leech tag the
/// answer added, siblings it buried, and the daily counter it charged.
pub fn undo_review(storage: &SqliteStorage, review: &ReviewUndo) -> storage::Result<()> {
    storage.transact(|storage| {
        let card = &review.card;
        if !review.was_leech {
            if let Some(mut note) = storage.get_note(card.note_id)? {
                if note.remove_tag(LEECH_TAG) {
                    storage.update_note(&note)?;
                }
            }
        }

        card.flush(storage)?;
        if let Some(entry) = storage.last_revlog_entry_for_card(card.id)? {
            storage.remove_revlog_entry(entry.id)?;
        }

        for id in &review.buried_siblings {
            if let Some(mut sibling) = storage.get_card(*id)? {
                if sibling.queue == CardQueue::SchedBuried {
                    sibling.restore_queue_from_type();
                    sibling.flush(storage)?;
                }
            }
        }

        storage.revert_deck_today(review.counted_deck, review.day, review.counted, review.taken_millis)?;
        log::debug!("Undid answer to card {}", card.id);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_huge_interval_saturates() {
        let mut card = Card {
            ctype: CardType::Review,
            queue: CardQueue::Review,
            due: Due::Day(0),
            interval: u32::MAX,
            ..Default::default()
        };
        reschedule_as_review(&mut card, u32::MAX, 100);
        assert_eq!(card.due, Due::Day(i32::MAX));
        assert_eq!(day_after(3, 4), Due::Day(7));
    }

    #[test]
    fn test_learning_interval_log() {
        assert_eq!(learning_interval_log(600), -600);
        assert_eq!(learning_interval_log(86_400), 1);
        assert_eq!(learning_interval_log(3 * 86_400 + 5), 3);
    }

    #[test]
    fn test_counter_for_queue() {
        assert_eq!(counter_for_queue(CardQueue::New), DailyCounter::New);
        assert_eq!(counter_for_queue(CardQueue::Preview), DailyCounter::Learn);
        assert_eq!(counter_for_queue(CardQueue::DayLearn), DailyCounter::Learn);
        assert_eq!(counter_for_queue(CardQueue::Review), DailyCounter::Review);
    }

    #[test]
    fn test_graduating_interval_without_fuzz() {
        let new = NewConfig::default();
        assert_eq!(graduating_interval(&new, false, None), 1);
        assert_eq!(graduating_interval(&new, true, None), 4);
    }

    #[test]
    fn test_reschedule_as_review_leaves_filtered_deck() {
        let mut card = Card {
            ctype: CardType::Relearn,
            queue: CardQueue::Learn,
            due: Due::Timestamp(1),
            deck_id: crate::decks::DeckId(7),
            original_deck_id: crate::decks::DeckId(2),
            remaining_steps: 1001,
            ..Default::default()
        };
        reschedule_as_review(&mut card, 3, 50);
        assert_eq!(card.queue, CardQueue::Review);
        assert_eq!(card.due, Due::Day(53));
        assert_eq!(card.deck_id, crate::decks::DeckId(2));
        assert_eq!(card.remaining_steps, 0);
    }
}
