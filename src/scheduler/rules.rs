//! Review interval and ease arithmetic shared by the generations

use rand::RngCore;

use super::fuzz::fuzzed_interval;
use super::Grade;
use crate::card::Card;
use crate::decks::{LapseConfig, ReviewConfig};

/// Ease change per grade, in permille
pub fn ease_delta(grade: Grade) -> i32 {
    match grade {
        Grade::Again => -200,
        Grade::Hard => -150,
        Grade::Good => 0,
        Grade::Easy => 150,
    }
}

/// Apply the grade's ease delta, never going below the configured floor.
pub fn adjust_ease(ease: u16, grade: Grade, config: &ReviewConfig) -> u16 {
    let adjusted = ease as i32 + ease_delta(grade);
    adjusted
        .max(config.minimum_ease as i32)
        .min(u16::MAX as i32) as u16
}

/// Ease to compute with; corrupt values below the floor are raised to it.
pub fn effective_ease(card: &Card, config: &ReviewConfig) -> f32 {
    card.ease_factor.max(config.minimum_ease) as f32 / 1000.0
}

/// Scale by the interval multiplier, optionally fuzz, then clamp between
/// `previous + 1` and the maximum interval.
pub fn constrained_interval(
    interval: f32,
    config: &ReviewConfig,
    previous: u32,
    fuzz: Option<&mut (dyn RngCore + '_)>,
) -> u32 {
    let mut interval = (interval * config.interval_multiplier).max(0.0) as u32;
    if let Some(rng) = fuzz {
        interval = fuzzed_interval(interval, rng);
    }
    interval
        .max(previous + 1)
        .max(1)
        .min(config.maximum_interval.max(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewIntervals {
    pub hard: u32,
    pub good: u32,
    pub easy: u32,
}

impl ReviewIntervals {
    pub fn for_grade(&self, grade: Grade) -> u32 {
        match grade {
            Grade::Hard => self.hard,
            Grade::Easy => self.easy,
            Grade::Again | Grade::Good => self.good,
        }
    }
}

/// Next intervals for a passing review. Each button is at least a day longer
/// than the one before it; lateness counts half for good and fully for easy.
pub fn next_review_intervals(
    card: &Card,
    config: &ReviewConfig,
    days_late: u32,
    mut fuzz: Option<&mut dyn RngCore>,
) -> ReviewIntervals {
    let interval = card.interval.max(1) as f32;
    let ease = effective_ease(card, config);
    let late = days_late as f32;

    let hard_min = if config.hard_multiplier > 1.0 {
        card.interval
    } else {
        0
    };
    let hard = constrained_interval(
        interval * config.hard_multiplier,
        config,
        hard_min,
        fuzz.as_deref_mut(),
    );
    let good = constrained_interval(
        (interval + (days_late / 2) as f32) * ease,
        config,
        hard,
        fuzz.as_deref_mut(),
    );
    let easy = constrained_interval(
        (interval + late) * ease * config.easy_multiplier,
        config,
        good,
        fuzz,
    );

    ReviewIntervals { hard, good, easy }
}

/// Interval for a card reviewed before it was due, from a filtered deck.
/// Only the time that has actually passed is multiplied, and the result never
/// drops below the current interval for good or easy.
pub fn early_review_interval(card: &Card, config: &ReviewConfig, days_early: u32, grade: Grade) -> u32 {
    let elapsed = card.interval.saturating_sub(days_early) as f32;
    let ease = effective_ease(card, config);
    let (factor, min_new, bonus) = match grade {
        Grade::Hard => (config.hard_multiplier, config.hard_multiplier / 2.0, 1.0),
        Grade::Easy => {
            let easy = config.easy_multiplier;
            (ease, 1.0, easy - (easy - 1.0) / 2.0)
        }
        Grade::Again | Grade::Good => (ease, 1.0, 1.0),
    };
    let interval = (elapsed * factor).max(1.0);
    let interval = (card.interval as f32 * min_new).max(interval) * bonus;
    constrained_interval(interval, config, 0, None)
}

/// Interval a lapsed card returns to review with.
pub fn lapse_interval(card: &Card, config: &LapseConfig) -> u32 {
    let scaled = (card.interval as f32 * config.multiplier).max(0.0) as u32;
    scaled.max(config.minimum_interval).max(1)
}

/// True when this lapse should flag the card: at the threshold, then every
/// half-threshold lapses after it.
pub fn is_leech(lapses: u32, config: &LapseConfig) -> bool {
    let threshold = config.leech_threshold;
    if threshold == 0 || lapses < threshold {
        return false;
    }
    (lapses - threshold) % (threshold / 2).max(1) == 0
}
