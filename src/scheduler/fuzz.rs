//! Randomising intervals so cards added together drift apart

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::card::Card;

/// Inclusive range an interval of `interval` days may be fuzzed into.
pub fn fuzz_range(interval: u32) -> (u32, u32) {
    if interval < 2 {
        return (1, 1);
    }
    if interval == 2 {
        return (2, 3);
    }
    let fuzz = if interval < 7 {
        (interval as f32 * 0.25) as u32
    } else if interval < 30 {
        ((interval as f32 * 0.15) as u32).max(2)
    } else {
        ((interval as f32 * 0.05) as u32).max(4)
    };
    let fuzz = fuzz.max(1);
    (interval - fuzz, interval.saturating_add(fuzz))
}

pub fn fuzzed_interval(interval: u32, rng: &mut dyn RngCore) -> u32 {
    let (min, max) = fuzz_range(interval);
    rng.gen_range(min..=max)
}

/// Extra seconds added to an intraday learning delay: up to a quarter of the
/// delay, at most five minutes.
pub fn learning_fuzz_secs(delay_secs: u32, rng: &mut dyn RngCore) -> u32 {
    let max_extra = (delay_secs as f32 * 0.25) as u32;
    let max_extra = max_extra.min(300).max(1);
    rng.gen_range(0..max_extra)
}

/// A generator that gives the same fuzz for a card until it is answered again.
pub fn seeded_rng(card: &Card) -> StdRng {
    StdRng::seed_from_u64((card.id.0 as u64).wrapping_add(card.reps as u64))
}
