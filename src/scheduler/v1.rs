//! The legacy two-button rules
//!
//! Days are whole 24 hour blocks counted from the collection's creation
//! stamp, reviews are served deck by deck, and a lapsed card keeps the
//! review type while it relearns.

use chrono::FixedOffset;

use super::answering::{day_after, graduating_interval, learning_interval_log, reschedule_as_review};
use super::filtered::answer_preview;
use super::learning::{is_last_step, reschedule_learning, LearningSteps};
use super::rules::{adjust_ease, constrained_interval, effective_ease, is_leech, lapse_interval};
use super::timing::{v1_timing_today, SchedTimingToday};
use super::{AnswerContext, CardAnswered, Grade, IntervalAlgorithm, SchedulerVersion};
use crate::card::{Card, CardQueue, CardType};
use crate::decks::{LeechAction, ResolvedConfig};
use crate::storage::RevlogKind;
use crate::timestamp::TimestampSecs;

/// Multiplier the legacy rules applied to the hidden "hard" interval
const LEGACY_HARD_FACTOR: f32 = 1.2;

#[derive(Debug, Clone, Copy, Default)]
pub struct V1Algorithm;

impl V1Algorithm {
    fn answer_new(&self, card: &mut Card, ctx: &mut AnswerContext) -> CardAnswered {
        let config = ctx.config;
        let steps = LearningSteps::new(&config.config.new.steps_mins);
        card.ctype = CardType::Learn;
        if steps.is_empty() {
            return self.graduate(card, ctx);
        }
        card.remaining_steps = steps.starting_left(ctx.timing.now.0, ctx.timing.next_day_at.0);
        let delay = steps.delay_secs_for_left(card.remaining_steps);
        schedule_step(card, delay, ctx, RevlogKind::Learning)
    }

    /// Learning, or relearning when the card is a review card.
    fn answer_learning(&self, card: &mut Card, grade: Grade, ctx: &mut AnswerContext) -> CardAnswered {
        let config = ctx.config;
        let relearning = card.ctype != CardType::Learn;
        let (steps, kind) = if relearning {
            (LearningSteps::new(&config.config.lapse.steps_mins), RevlogKind::Relearning)
        } else {
            (LearningSteps::new(&config.config.new.steps_mins), RevlogKind::Learning)
        };

        let (now, cutoff) = (ctx.timing.now.0, ctx.timing.next_day_at.0);
        if grade == Grade::Again && !steps.is_empty() {
            card.remaining_steps = steps.starting_left(now, cutoff);
            let delay = steps.delay_secs_for_left(card.remaining_steps);
            return schedule_step(card, delay, ctx, kind);
        }
        if steps.is_empty() || is_last_step(card.remaining_steps) {
            return self.graduate(card, ctx);
        }
        card.remaining_steps = steps.next_left(card.remaining_steps, now, cutoff);
        let delay = steps.delay_secs_for_left(card.remaining_steps);
        schedule_step(card, delay, ctx, kind)
    }

    fn answer_review(&self, card: &mut Card, grade: Grade, ctx: &mut AnswerContext) -> CardAnswered {
        if grade == Grade::Again {
            return self.lapse(card, ctx);
        }

        let config = ctx.config;
        let review = &config.config.review;
        let today = ctx.today();
        let days_late = card.days_late(today);
        let current = card.interval.max(1) as f32;

        let hard = constrained_interval(
            (current + (days_late / 4) as f32) * LEGACY_HARD_FACTOR,
            review,
            card.interval,
            None,
        );
        let good = constrained_interval(
            (current + (days_late / 2) as f32) * effective_ease(card, review),
            review,
            hard,
            ctx.fuzz_rng(),
        );

        card.ease_factor = adjust_ease(card.ease_factor, Grade::Good, review);
        card.interval = good;
        reschedule_as_review(card, good, today);
        CardAnswered {
            review_kind: RevlogKind::Review,
            interval_log: good as i32,
            learning_delay_secs: None,
            leeched: false,
            suspended: false,
        }
    }

    fn lapse(&self, card: &mut Card, ctx: &mut AnswerContext) -> CardAnswered {
        let config = ctx.config;
        let lapse = &config.config.lapse;
        let today = ctx.today();

        card.lapses += 1;
        card.ease_factor = adjust_ease(card.ease_factor, Grade::Again, &config.config.review);
        card.interval = lapse_interval(card, lapse);
        let leeched = is_leech(card.lapses, lapse);
        let interval = card.interval;

        let steps = LearningSteps::new(&lapse.steps_mins);
        let mut answered = if leeched && config.leech_action == LeechAction::Suspend {
            card.remaining_steps = 0;
            card.remove_from_filtered_deck_before_reschedule();
            card.set_queue_and_due(CardQueue::Suspended, day_after(today, interval));
            CardAnswered {
                review_kind: RevlogKind::Review,
                interval_log: interval as i32,
                learning_delay_secs: None,
                leeched,
                suspended: true,
            }
        } else if steps.is_empty() {
            reschedule_as_review(card, interval, today);
            CardAnswered {
                review_kind: RevlogKind::Review,
                interval_log: interval as i32,
                learning_delay_secs: None,
                leeched,
                suspended: false,
            }
        } else {
            card.remaining_steps = steps.starting_left(ctx.timing.now.0, ctx.timing.next_day_at.0);
            let delay = steps.delay_secs_for_left(card.remaining_steps);
            schedule_step(card, delay, ctx, RevlogKind::Review)
        };
        answered.leeched = leeched;
        answered
    }

    /// Learning cards take the graduating interval and starting ease;
    /// relearning cards return to review with their lapse interval.
    fn graduate(&self, card: &mut Card, ctx: &mut AnswerContext) -> CardAnswered {
        let config = ctx.config;
        let today = ctx.today();
        let (interval, kind) = if card.ctype == CardType::Learn {
            let new = &config.config.new;
            card.ease_factor = new.initial_ease;
            (graduating_interval(new, false, ctx.fuzz_rng()), RevlogKind::Learning)
        } else {
            (card.interval.max(1), RevlogKind::Relearning)
        };
        card.interval = interval;
        reschedule_as_review(card, interval, today);
        CardAnswered {
            review_kind: kind,
            interval_log: interval as i32,
            learning_delay_secs: None,
            leeched: false,
            suspended: false,
        }
    }
}

/// Learning dues are exact; only review intervals are fuzzed.
fn schedule_step(card: &mut Card, delay_secs: u32, ctx: &mut AnswerContext, kind: RevlogKind) -> CardAnswered {
    reschedule_learning(card, delay_secs, ctx, false);
    CardAnswered {
        review_kind: kind,
        interval_log: learning_interval_log(delay_secs),
        learning_delay_secs: Some(delay_secs),
        leeched: false,
        suspended: false,
    }
}

impl IntervalAlgorithm for V1Algorithm {
    fn version(&self) -> SchedulerVersion {
        SchedulerVersion::V1
    }

    fn accepts(&self, grade: Grade) -> bool {
        matches!(grade, Grade::Again | Grade::Good)
    }

    fn answer_buttons(&self, _card: &Card, _config: &ResolvedConfig) -> u8 {
        2
    }

    fn timing(
        &self,
        created: TimestampSecs,
        now: TimestampSecs,
        _offset: FixedOffset,
        _rollover_hour: u8,
    ) -> SchedTimingToday {
        v1_timing_today(created, now)
    }

    fn merges_reviews(&self) -> bool {
        false
    }

    fn answer(&self, card: &mut Card, grade: Grade, ctx: &mut AnswerContext) -> CardAnswered {
        if ctx.config.previewing() {
            return answer_preview(card, grade, ctx);
        }
        match (card.ctype, card.queue) {
            (CardType::New, _) => self.answer_new(card, ctx),
            (CardType::Learn, _) => self.answer_learning(card, grade, ctx),
            (_, CardQueue::Learn | CardQueue::DayLearn) => self.answer_learning(card, grade, ctx),
            _ => self.answer_review(card, grade, ctx),
        }
    }
}
