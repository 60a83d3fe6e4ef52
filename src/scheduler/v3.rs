//! The 2021 rules: v2 answer handling with fuzz derived from the card, so an
//! answer button always shows the interval it will give.

use chrono::FixedOffset;

use super::timing::{local_timing_today, SchedTimingToday};
use super::v2::V2Rules;
use super::{AnswerContext, CardAnswered, Grade, IntervalAlgorithm, SchedulerVersion};
use crate::card::Card;
use crate::decks::ResolvedConfig;
use crate::timestamp::TimestampSecs;

#[derive(Debug, Clone, Copy)]
pub struct V3Algorithm {
    rules: V2Rules,
}

impl Default for V3Algorithm {
    fn default() -> Self {
        Self {
            rules: V2Rules {
                seeded_fuzz: true,
                learning_fuzz: false,
            },
        }
    }
}

impl IntervalAlgorithm for V3Algorithm {
    fn version(&self) -> SchedulerVersion {
        SchedulerVersion::V3
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
