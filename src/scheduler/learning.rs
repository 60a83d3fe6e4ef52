//! Learning and relearning steps
//!
//! `remaining_steps` packs two counts: the low three digits hold how many
//! steps are left in total, the rest how many of those can still be
//! completed before the day cutoff (`today * 1000 + total`).

use super::fuzz::learning_fuzz_secs;
use super::AnswerContext;
use crate::card::{Card, CardQueue, Due};

pub(crate) const SECS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy)]
pub struct LearningSteps<'a> {
    steps_mins: &'a [f32],
}

impl<'a> LearningSteps<'a> {
    pub fn new(steps_mins: &'a [f32]) -> Self {
        Self { steps_mins }
    }

    pub fn is_empty(&self) -> bool {
        self.steps_mins.is_empty()
    }

    fn secs_at(&self, idx: usize) -> u32 {
        (self.steps_mins[idx] * 60.0).max(0.0) as u32
    }

    /// Steps count from the end: with `left` remaining, the current step is
    /// `len - left`. Out-of-range values fall back to the first step.
    pub fn delay_secs_for_left(&self, left: u32) -> u32 {
        if self.steps_mins.is_empty() {
            return 60;
        }
        let left = (left % 1000) as usize;
        let len = self.steps_mins.len();
        if left == 0 || left > len {
            self.secs_at(0)
        } else {
            self.secs_at(len - left)
        }
    }

    /// Delay for repeating the current step: halfway between it and the next.
    pub fn repeat_delay_secs(&self, left: u32) -> u32 {
        let current = self.delay_secs_for_left(left);
        let next = if self.steps_mins.len() > 1 {
            self.delay_secs_for_left((left % 1000).saturating_sub(1))
        } else {
            current * 2
        };
        (current + current.max(next)) / 2
    }

    /// How many of the last `left` steps fit before `cutoff` when started at `now`.
    pub fn left_today(&self, left: u32, now: i64, cutoff: i64) -> u32 {
        let len = self.steps_mins.len();
        let left = (left as usize).min(len);
        let mut at = now;
        let mut ok = 0;
        for (i, mins) in self.steps_mins[len - left..].iter().enumerate() {
            at += (*mins * 60.0) as i64;
            if at > cutoff {
                break;
            }
            ok = i;
        }
        ok as u32 + 1
    }

    /// Encoded counter for a card entering the first step.
    pub fn starting_left(&self, now: i64, cutoff: i64) -> u32 {
        let total = self.steps_mins.len() as u32;
        total + self.left_today(total, now, cutoff) * 1000
    }

    /// Encoded counter after moving to the next step.
    pub fn next_left(&self, left: u32, now: i64, cutoff: i64) -> u32 {
        let remaining = (left % 1000).saturating_sub(1);
        self.left_today(remaining, now, cutoff) * 1000 + remaining
    }
}

/// True if a pass at `left` finishes the last step.
pub fn is_last_step(left: u32) -> bool {
    (left % 1000) <= 1
}

/// Put a learning card `delay_secs` into the future. Delays that cross the day
/// cutoff move the card to the day-learning queue with a day due.
pub fn reschedule_learning(card: &mut Card, delay_secs: u32, ctx: &mut AnswerContext, fuzz: bool) {
    let now = ctx.timing.now.0;
    let cutoff = ctx.timing.next_day_at.0;
    let due = now + delay_secs as i64;

    if due < cutoff {
        let due = if fuzz {
            let extra = learning_fuzz_secs(delay_secs, &mut *ctx.rng) as i64;
            (due + extra).min(cutoff - 1)
        } else {
            due
        };
        card.set_queue_and_due(CardQueue::Learn, Due::Timestamp(due));
    } else {
        let ahead = (due - cutoff) / SECS_PER_DAY + 1;
        let day = ctx.timing.days_elapsed as i64 + ahead;
        card.set_queue_and_due(CardQueue::DayLearn, Due::Day(day as i32));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEPS: [f32; 3] = [1.0, 10.0, 60.0];

    #[test]
    fn test_delay_for_left() {
        let steps = LearningSteps::new(&STEPS);
        assert_eq!(steps.delay_secs_for_left(3), 60);
        assert_eq!(steps.delay_secs_for_left(2002), 600);
        assert_eq!(steps.delay_secs_for_left(1), 3600);
        // out of range counts fall back to the first step
        assert_eq!(steps.delay_secs_for_left(0), 60);
        assert_eq!(steps.delay_secs_for_left(7), 60);
    }

    #[test]
    fn test_repeat_delay_is_halfway_to_next() {
        let steps = LearningSteps::new(&STEPS);
        assert_eq!(steps.repeat_delay_secs(3), (60 + 600) / 2);
        // at the last step the "next" step wraps to the first, so the delay repeats
        assert_eq!(steps.repeat_delay_secs(1), 3600);

        let single = [10.0];
        let single = LearningSteps::new(&single);
        assert_eq!(single.repeat_delay_secs(1), 900);
    }

    #[test]
    fn test_left_today_stops_at_cutoff() {
        let steps = LearningSteps::new(&STEPS);
        let now = 1_000_000;
        assert_eq!(steps.left_today(3, now, now + 100_000), 3);
        assert_eq!(steps.left_today(3, now, now + 700), 2);
        // the first step always counts
        assert_eq!(steps.left_today(3, now, now + 10), 1);
        assert_eq!(steps.starting_left(now, now + 100_000), 3003);
    }

    #[test]
    fn test_next_left() {
        let steps = LearningSteps::new(&STEPS);
        let now = 1_000_000;
        assert_eq!(steps.next_left(3003, now, now + 100_000), 2002);
        assert!(!is_last_step(2002));
        assert!(is_last_step(1001));
    }
}
