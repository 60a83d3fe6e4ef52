//! Four-button rules with relearning as its own card type
//!
//! Days start at a local rollover hour. A passing review gives credit for
//! lateness, and a review card studied early in a rescheduling filtered deck
//! only gains interval for the time that has actually passed.

use chrono::FixedOffset;

use super::answering::{day_after, graduating_interval, learning_interval_log, reschedule_as_review};
use super::filtered::answer_preview;
use super::learning::{is_last_step, reschedule_learning, LearningSteps};
use super::rules::{adjust_ease, early_review_interval, is_leech, lapse_interval, next_review_intervals};
use super::timing::{local_timing_today, SchedTimingToday};
use super::{AnswerContext, CardAnswered, Grade, IntervalAlgorithm, SchedulerVersion};
use crate::card::{Card, CardQueue, CardType};
use crate::decks::{LeechAction, ResolvedConfig};
use crate::storage::RevlogKind;
use crate::timestamp::TimestampSecs;

/// Answer handling shared by the v2 and v3 generations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V2Rules {
    /// Review fuzz comes from a generator seeded by the card
    pub seeded_fuzz: bool,
    /// Intraday learning dues get a few minutes of random spread
    pub learning_fuzz: bool,
}

impl V2Rules {
    pub fn answer(&self, card: &mut Card, grade: Grade, ctx: &mut AnswerContext) -> CardAnswered {
        if ctx.config.previewing() {
            return answer_preview(card, grade, ctx);
        }
        match card.ctype {
            CardType::New => self.answer_new(card, grade, ctx),
            CardType::Learn | CardType::Relearn => self.answer_learning(card, grade, ctx),
            CardType::Review => self.answer_review(card, grade, ctx),
        }
    }

    fn answer_new(&self, card: &mut Card, grade: Grade, ctx: &mut AnswerContext) -> CardAnswered {
        let config = ctx.config;
        let steps = LearningSteps::new(&config.config.new.steps_mins);
        card.ctype = CardType::Learn;
        if steps.is_empty() {
            return self.graduate(card, grade == Grade::Easy, ctx);
        }
        card.remaining_steps = steps.starting_left(ctx.timing.now.0, ctx.timing.next_day_at.0);
        let delay = steps.delay_secs_for_left(card.remaining_steps);
        self.schedule_step(card, delay, ctx, RevlogKind::Learning)
    }

    fn answer_learning(&self, card: &mut Card, grade: Grade, ctx: &mut AnswerContext) -> CardAnswered {
        let config = ctx.config;
        let relearning = card.ctype == CardType::Relearn;
        let (steps, kind) = if relearning {
            (LearningSteps::new(&config.config.lapse.steps_mins), RevlogKind::Relearning)
        } else {
            (LearningSteps::new(&config.config.new.steps_mins), RevlogKind::Learning)
        };
        if steps.is_empty() {
            return self.graduate(card, grade == Grade::Easy, ctx);
        }

        let (now, cutoff) = (ctx.timing.now.0, ctx.timing.next_day_at.0);
        let delay = match grade {
            Grade::Easy => return self.graduate(card, true, ctx),
            Grade::Good if is_last_step(card.remaining_steps) => return self.graduate(card, false, ctx),
            Grade::Good => {
                card.remaining_steps = steps.next_left(card.remaining_steps, now, cutoff);
                steps.delay_secs_for_left(card.remaining_steps)
            }
            Grade::Hard => steps.repeat_delay_secs(card.remaining_steps),
            Grade::Again => {
                card.remaining_steps = steps.starting_left(now, cutoff);
                if relearning {
                    card.interval = lapse_interval(card, &config.config.lapse);
                }
                steps.delay_secs_for_left(card.remaining_steps)
            }
        };
        self.schedule_step(card, delay, ctx, kind)
    }

    fn answer_review(&self, card: &mut Card, grade: Grade, ctx: &mut AnswerContext) -> CardAnswered {
        if grade == Grade::Again {
            return self.lapse(card, ctx);
        }

        let config = ctx.config;
        let review = &config.config.review;
        let today = ctx.today();
        let days_early = card
            .review_due_day()
            .map(|due| (due as i64 - today as i64).max(0) as u32)
            .unwrap_or(0);
        let early = config.filtered.is_some() && days_early > 0;

        let interval = if early {
            early_review_interval(card, review, days_early, grade)
        } else {
            let days_late = card.days_late(today);
            next_review_intervals(card, review, days_late, ctx.fuzz_rng()).for_grade(grade)
        };
        card.ease_factor = adjust_ease(card.ease_factor, grade, review);
        card.interval = interval;
        reschedule_as_review(card, interval, today);

        CardAnswered {
            review_kind: if early { RevlogKind::Filtered } else { RevlogKind::Review },
            interval_log: interval as i32,
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

        if leeched && config.leech_action == LeechAction::Suspend {
            card.remaining_steps = 0;
            card.remove_from_filtered_deck_before_reschedule();
            card.set_queue_and_due(CardQueue::Suspended, day_after(today, card.interval));
            return CardAnswered {
                review_kind: RevlogKind::Review,
                interval_log: card.interval as i32,
                learning_delay_secs: None,
                leeched,
                suspended: true,
            };
        }

        let steps = LearningSteps::new(&lapse.steps_mins);
        if steps.is_empty() {
            let interval = card.interval;
            reschedule_as_review(card, interval, today);
            return CardAnswered {
                review_kind: RevlogKind::Review,
                interval_log: card.interval as i32,
                learning_delay_secs: None,
                leeched,
                suspended: false,
            };
        }

        card.ctype = CardType::Relearn;
        card.remaining_steps = steps.starting_left(ctx.timing.now.0, ctx.timing.next_day_at.0);
        let delay = steps.delay_secs_for_left(card.remaining_steps);
        let mut answered = self.schedule_step(card, delay, ctx, RevlogKind::Review);
        answered.leeched = leeched;
        answered
    }

    /// Leave (re)learning for review. Relearning cards keep their lapse
    /// interval, plus a day for easy.
    fn graduate(&self, card: &mut Card, easy: bool, ctx: &mut AnswerContext) -> CardAnswered {
        let config = ctx.config;
        let today = ctx.today();
        let (interval, kind) = if card.ctype == CardType::Relearn {
            (card.interval.max(1).saturating_add(easy as u32), RevlogKind::Relearning)
        } else {
            let new = &config.config.new;
            card.ease_factor = new.initial_ease;
            (graduating_interval(new, easy, ctx.fuzz_rng()), RevlogKind::Learning)
        };
        card.interval = interval;
        reschedule_as_review(card, interval, today);
        CardAnswered {
            review_kind: kind,
            interval_log: card.interval as i32,
            learning_delay_secs: None,
            leeched: false,
            suspended: false,
        }
    }

    fn schedule_step(
        &self,
        card: &mut Card,
        delay_secs: u32,
        ctx: &mut AnswerContext,
        kind: RevlogKind,
    ) -> CardAnswered {
        let fuzz = ctx.fuzz && self.learning_fuzz;
        reschedule_learning(card, delay_secs, ctx, fuzz);
        CardAnswered {
            review_kind: kind,
            interval_log: learning_interval_log(delay_secs),
            learning_delay_secs: Some(delay_secs),
            leeched: false,
            suspended: false,
        }
    }
}

/// The 2018 scheduler
#[derive(Debug, Clone, Copy)]
pub struct V2Algorithm {
    rules: V2Rules,
}

impl Default for V2Algorithm {
    fn default() -> Self {
        Self {
            rules: V2Rules {
                seeded_fuzz: false,
                learning_fuzz: true,
            },
        }
    }
}

impl IntervalAlgorithm for V2Algorithm {
    fn version(&self) -> SchedulerVersion {
        SchedulerVersion::V2
    }

    fn accepts(&self, _grade: Grade) -> bool {
        true
    }

    fn answer_buttons(&self, _card: &Card, _config: &ResolvedConfig) -> u8 {
        4
    }

    fn timing(
        &self,
        created: TimestampSecs,
        now: TimestampSecs,
        offset: FixedOffset,
        rollover_hour: u8,
    ) -> SchedTimingToday {
        local_timing_today(created, now, offset, rollover_hour)
    }

    fn merges_reviews(&self) -> bool {
        true
    }

    fn fuzz_seeded_by_card(&self) -> bool {
        self.rules.seeded_fuzz
    }

    fn answer(&self, card: &mut Card, grade: Grade, ctx: &mut AnswerContext) -> CardAnswered {
        self.rules.answer(card, grade, ctx)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::card::{CardId, Due};
    use crate::decks::{DeckConfig, DeckId, FilteredOptions};

    pub const NOW: i64 = 1_700_000_000;

    pub fn timing() -> SchedTimingToday {
        SchedTimingToday {
            now: TimestampSecs(NOW),
            days_elapsed: 100,
            next_day_at: TimestampSecs(NOW + 20_000),
        }
    }

    pub fn resolved(config: DeckConfig) -> ResolvedConfig {
        ResolvedConfig {
            config,
            filtered: None,
            home_deck: DeckId(1),
            leech_action: LeechAction::TagOnly,
        }
    }

    pub fn answer_with(
        algorithm: &dyn IntervalAlgorithm,
        card: &mut Card,
        grade: Grade,
        config: &ResolvedConfig,
    ) -> CardAnswered {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = AnswerContext {
            timing: timing(),
            config,
            rng: &mut rng,
            fuzz: false,
        };
        algorithm.answer(card, grade, &mut ctx)
    }

    fn review_card(interval: u32, due: i32) -> Card {
        Card {
            id: CardId(1),
            ctype: CardType::Review,
            queue: CardQueue::Review,
            due: Due::Day(due),
            interval,
            ease_factor: 2500,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_card_walks_steps_and_graduates() {
        let algo = V2Algorithm::default();
        let config = resolved(DeckConfig::default());
        let mut card = Card::default();

        let answered = answer_with(&algo, &mut card, Grade::Good, &config);
        assert_eq!(card.queue, CardQueue::Learn);
        assert_eq!(card.due, Due::Timestamp(NOW + 60));
        assert_eq!(answered.learning_delay_secs, Some(60));
        assert_eq!(answered.interval_log, -60);

        answer_with(&algo, &mut card, Grade::Good, &config);
        assert_eq!(card.due, Due::Timestamp(NOW + 600));

        let answered = answer_with(&algo, &mut card, Grade::Good, &config);
        assert_eq!(card.ctype, CardType::Review);
        assert_eq!(card.queue, CardQueue::Review);
        assert_eq!(card.interval, 1);
        assert_eq!(card.ease_factor, 2500);
        assert_eq!(card.due, Due::Day(101));
        assert_eq!(answered.review_kind, RevlogKind::Learning);
    }

    #[test]
    fn test_corrupt_relearning_interval_saturates() {
        let algo = V2Algorithm::default();
        let config = resolved(DeckConfig::default());
        let mut card = Card {
            ctype: CardType::Relearn,
            queue: CardQueue::Learn,
            due: Due::Timestamp(NOW),
            interval: u32::MAX,
            remaining_steps: 1,
            ..review_card(u32::MAX, 100)
        };
        answer_with(&algo, &mut card, Grade::Easy, &config);
        assert_eq!(card.queue, CardQueue::Review);
        assert_eq!(card.interval, u32::MAX);
        assert_eq!(card.due, Due::Day(i32::MAX));
    }

    #[test]
    fn test_easy_graduates_learning_card() {
        let algo = V2Algorithm::default();
        let config = resolved(DeckConfig::default());
        let mut card = Card::default();
        answer_with(&algo, &mut card, Grade::Easy, &config);
        assert_eq!(card.queue, CardQueue::Learn);
        answer_with(&algo, &mut card, Grade::Easy, &config);
        assert_eq!(card.interval, 4);
        assert_eq!(card.due, Due::Day(104));
    }

    #[test]
    fn test_hard_repeats_step() {
        let algo = V2Algorithm::default();
        let config = resolved(DeckConfig::default());
        let mut card = Card::default();
        answer_with(&algo, &mut card, Grade::Good, &config);
        let left = card.remaining_steps;
        let answered = answer_with(&algo, &mut card, Grade::Hard, &config);
        assert_eq!(card.remaining_steps, left);
        assert_eq!(answered.learning_delay_secs, Some(330));
    }

    #[test]
    fn test_empty_steps_graduate_immediately() {
        let algo = V2Algorithm::default();
        let mut config = DeckConfig::default();
        config.new.steps_mins.clear();
        let config = resolved(config);
        let mut card = Card::default();
        answer_with(&algo, &mut card, Grade::Good, &config);
        assert_eq!(card.queue, CardQueue::Review);
        assert_eq!(card.interval, 1);
    }

    #[test]
    fn test_step_past_cutoff_moves_to_day_learning() {
        let algo = V2Algorithm::default();
        let mut config = DeckConfig::default();
        config.new.steps_mins = vec![1.0, 1_440.0];
        let config = resolved(config);
        let mut card = Card::default();
        answer_with(&algo, &mut card, Grade::Good, &config);
        answer_with(&algo, &mut card, Grade::Good, &config);
        assert_eq!(card.queue, CardQueue::DayLearn);
        assert_eq!(card.due, Due::Day(101));
    }

    #[test]
    fn test_lapse_enters_relearning() {
        let algo = V2Algorithm::default();
        let config = resolved(DeckConfig::default());
        let mut card = review_card(10, 100);
        let answered = answer_with(&algo, &mut card, Grade::Again, &config);
        assert_eq!(card.ctype, CardType::Relearn);
        assert_eq!(card.queue, CardQueue::Learn);
        assert_eq!(card.interval, 1);
        assert_eq!(card.lapses, 1);
        assert_eq!(card.ease_factor, 2300);
        assert_eq!(answered.review_kind, RevlogKind::Review);
        assert!(!answered.leeched);

        // one relearning step: good graduates with the lapse interval
        let answered = answer_with(&algo, &mut card, Grade::Good, &config);
        assert_eq!(card.ctype, CardType::Review);
        assert_eq!(card.due, Due::Day(101));
        assert_eq!(answered.review_kind, RevlogKind::Relearning);
    }

    #[test]
    fn test_leech_suspends_when_configured() {
        let algo = V2Algorithm::default();
        let mut config = resolved(DeckConfig::default());
        config.leech_action = LeechAction::Suspend;
        let mut card = review_card(10, 100);
        card.lapses = 7;
        let answered = answer_with(&algo, &mut card, Grade::Again, &config);
        assert!(answered.leeched);
        assert!(answered.suspended);
        assert_eq!(card.queue, CardQueue::Suspended);
        assert_eq!(card.ctype, CardType::Review);
        assert_eq!(card.lapses, 8);
    }

    #[test]
    fn test_passing_review() {
        let algo = V2Algorithm::default();
        let config = resolved(DeckConfig::default());
        let mut card = review_card(10, 100);
        answer_with(&algo, &mut card, Grade::Good, &config);
        assert_eq!(card.interval, 25);
        assert_eq!(card.due, Due::Day(125));
        assert_eq!(card.ease_factor, 2500);

        let mut card = review_card(10, 100);
        answer_with(&algo, &mut card, Grade::Hard, &config);
        assert_eq!(card.interval, 12);
        assert_eq!(card.ease_factor, 2350);
    }

    #[test]
    fn test_early_review_in_filtered_deck() {
        let algo = V2Algorithm::default();
        let mut config = resolved(DeckConfig::default());
        config.filtered = Some(FilteredOptions {
            deck_id: DeckId(5),
            reschedule: true,
            preview_delay_mins: 10,
        });
        let mut card = review_card(10, -100_000);
        card.deck_id = DeckId(5);
        card.original_deck_id = DeckId(1);
        card.original_due = 108;

        let answered = answer_with(&algo, &mut card, Grade::Good, &config);
        assert_eq!(answered.review_kind, RevlogKind::Filtered);
        assert_eq!(card.interval, 10);
        assert!(!card.is_filtered());
        assert_eq!(card.deck_id, DeckId(1));
    }
}
