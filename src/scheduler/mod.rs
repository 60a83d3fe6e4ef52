//! Scheduling: queues, answers, and the generations of interval rules
//!
//! This module provides:
//! - The `Scheduling` capability shared by every generation
//! - `Scheduler`, a closed set of generations chosen per collection
//! - Queue building with daily limits, and answer processing
//! - Bury/suspend, new-card ordering, filtered decks, and migration

mod answering;
pub mod bury_and_suspend;
mod engine;
pub mod filtered;
pub mod fuzz;
pub mod learning;
pub mod new;
pub mod queue;
pub mod rules;
pub mod timing;
pub mod upgrade;
mod v1;
mod v2;
mod v3;

use std::fmt;

use chrono::FixedOffset;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::card::Card;
use crate::decks::ResolvedConfig;
use crate::storage::{RevlogKind, SqliteStorage, StorageError};
use crate::timestamp::TimestampSecs;
use crate::undo::UndoLog;

pub use answering::undo_review;
pub use self::engine::SchedulerCore;
pub use timing::SchedTimingToday;
pub use v1::V1Algorithm;
pub use v2::{V2Algorithm, V2Rules};
pub use v3::V3Algorithm;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Grade {grade} is not accepted by scheduler {version}")]
    InvalidGrade { grade: u8, version: SchedulerVersion },

    #[error("Unsupported scheduler version: {0}")]
    UnsupportedVersion(u8),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// The learner's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Grade {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl TryFrom<u8> for Grade {
    type Error = SchedulerError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Grade::Again),
            2 => Ok(Grade::Hard),
            3 => Ok(Grade::Good),
            4 => Ok(Grade::Easy),
            other => Err(SchedulerError::InvalidInput(format!(
                "grade must be 1-4, got {}",
                other
            ))),
        }
    }
}

impl Grade {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchedulerVersion {
    V1,
    V2,
    V3,
}

impl SchedulerVersion {
    /// From the stored `schedVer` and `sched2021` settings.
    pub fn from_config(sched_ver: u8, sched2021: bool) -> Result<Self> {
        match (sched_ver, sched2021) {
            (1, _) => Ok(Self::V1),
            (2, false) => Ok(Self::V2),
            (2, true) => Ok(Self::V3),
            (other, _) => Err(SchedulerError::UnsupportedVersion(other)),
        }
    }

    pub fn from_number(number: u8) -> Result<Self> {
        match number {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            3 => Ok(Self::V3),
            other => Err(SchedulerError::UnsupportedVersion(other)),
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }
}

impl fmt::Display for SchedulerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.number())
    }
}

/// Cards left to study today, after daily limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counts {
    pub new: u32,
    pub learning: u32,
    pub review: u32,
}

/// Result of answering a card
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    /// The card as it was written back
    pub card: Card,
    pub interval_days: u32,
    /// Set when the card stays in (re)learning for another step
    pub learning_delay_secs: Option<u32>,
    /// The answer made the card a leech
    pub leech: bool,
    /// The card was suspended as a leech
    pub suspended: bool,
    /// The card will not be shown again today
    pub left_queue: bool,
}

/// State an interval algorithm needs for one answer
pub struct AnswerContext<'a> {
    pub timing: SchedTimingToday,
    pub config: &'a ResolvedConfig,
    pub rng: &'a mut dyn RngCore,
    /// False when previewing intervals for the answer buttons
    pub fuzz: bool,
}

impl AnswerContext<'_> {
    pub fn today(&self) -> u32 {
        self.timing.days_elapsed
    }

    /// The generator to fuzz with, or `None` when fuzz is off.
    pub fn fuzz_rng(&mut self) -> Option<&mut dyn RngCore> {
        if self.fuzz {
            Some(&mut *self.rng)
        } else {
            None
        }
    }
}

/// What an algorithm did to a card, for the review log and the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardAnswered {
    pub review_kind: RevlogKind,
    /// Positive days, or negative seconds while learning
    pub interval_log: i32,
    pub learning_delay_secs: Option<u32>,
    pub leeched: bool,
    pub suspended: bool,
}

/// Rules that differ between scheduler generations
pub trait IntervalAlgorithm {
    fn version(&self) -> SchedulerVersion;

    fn accepts(&self, grade: Grade) -> bool;

    /// Number of answer buttons to show for a card.
    fn answer_buttons(&self, card: &Card, config: &ResolvedConfig) -> u8;

    fn timing(
        &self,
        created: TimestampSecs,
        now: TimestampSecs,
        offset: FixedOffset,
        rollover_hour: u8,
    ) -> SchedTimingToday;

    /// True to merge due reviews across decks, false to take them deck by deck.
    fn merges_reviews(&self) -> bool;

    /// True if review fuzz must come from a generator seeded by the card, so
    /// the same answer always gives the same interval.
    fn fuzz_seeded_by_card(&self) -> bool {
        false
    }

    /// Mutate `card` for `grade`. Reps, mtime and persistence are handled by
    /// the caller.
    fn answer(&self, card: &mut Card, grade: Grade, ctx: &mut AnswerContext) -> CardAnswered;
}

/// Operations every scheduler generation offers the host
pub trait Scheduling {
    fn version(&self) -> SchedulerVersion;

    /// Rebuild the queues from storage.
    fn reset(&mut self, storage: &SqliteStorage, now: TimestampSecs) -> Result<()>;

    /// Mark the queues stale; they are rebuilt on next use.
    fn invalidate(&mut self);

    fn get_card(&mut self, storage: &SqliteStorage, now: TimestampSecs) -> Result<Option<Card>>;

    fn answer_card(
        &mut self,
        storage: &SqliteStorage,
        undo: &mut UndoLog,
        card: &Card,
        grade: Grade,
        now: TimestampSecs,
    ) -> Result<AnswerOutcome>;

    fn counts(&mut self, storage: &SqliteStorage, now: TimestampSecs) -> Result<Counts>;

    fn answer_buttons(&mut self, storage: &SqliteStorage, card: &Card) -> Result<u8>;

    /// Time until the card would be due again after `grade`, without fuzz.
    fn next_interval_secs(
        &mut self,
        storage: &SqliteStorage,
        card: &Card,
        grade: Grade,
        now: TimestampSecs,
    ) -> Result<u32>;

    fn timing_today(&self, storage: &SqliteStorage, now: TimestampSecs) -> Result<SchedTimingToday>;
}

/// The scheduler generation active for a collection
pub enum Scheduler {
    V1(SchedulerCore<V1Algorithm>),
    V2(SchedulerCore<V2Algorithm>),
    V3(SchedulerCore<V3Algorithm>),
}

macro_rules! dispatch {
    ($self:ident, $sched:ident => $body:expr) => {
        match $self {
            Scheduler::V1($sched) => $body,
            Scheduler::V2($sched) => $body,
            Scheduler::V3($sched) => $body,
        }
    };
}

impl Scheduler {
    pub fn new(version: SchedulerVersion, offset: FixedOffset) -> Self {
        match version {
            SchedulerVersion::V1 => Scheduler::V1(SchedulerCore::new(V1Algorithm, offset)),
            SchedulerVersion::V2 => Scheduler::V2(SchedulerCore::new(V2Algorithm::default(), offset)),
            SchedulerVersion::V3 => Scheduler::V3(SchedulerCore::new(V3Algorithm::default(), offset)),
        }
    }

    /// The generation recorded in the collection's settings.
    pub fn from_storage(storage: &SqliteStorage, offset: FixedOffset) -> Result<Self> {
        let version = SchedulerVersion::from_config(
            storage.scheduler_version()?,
            storage.sched2021_enabled()?,
        )?;
        log::info!("Using scheduler {}", version);
        Ok(Self::new(version, offset))
    }

    pub fn seed_rng(&mut self, seed: u64) {
        dispatch!(self, s => s.seed_rng(seed))
    }
}

impl Scheduling for Scheduler {
    fn version(&self) -> SchedulerVersion {
        dispatch!(self, s => s.version())
    }

    fn reset(&mut self, storage: &SqliteStorage, now: TimestampSecs) -> Result<()> {
        dispatch!(self, s => s.reset(storage, now))
    }

    fn invalidate(&mut self) {
        dispatch!(self, s => s.invalidate())
    }

    fn get_card(&mut self, storage: &SqliteStorage, now: TimestampSecs) -> Result<Option<Card>> {
        dispatch!(self, s => s.get_card(storage, now))
    }

    fn answer_card(
        &mut self,
        storage: &SqliteStorage,
        undo: &mut UndoLog,
        card: &Card,
        grade: Grade,
        now: TimestampSecs,
    ) -> Result<AnswerOutcome> {
        dispatch!(self, s => s.answer_card(storage, undo, card, grade, now))
    }

    fn counts(&mut self, storage: &SqliteStorage, now: TimestampSecs) -> Result<Counts> {
        dispatch!(self, s => s.counts(storage, now))
    }

    fn answer_buttons(&mut self, storage: &SqliteStorage, card: &Card) -> Result<u8> {
        dispatch!(self, s => s.answer_buttons(storage, card))
    }

    fn next_interval_secs(
        &mut self,
        storage: &SqliteStorage,
        card: &Card,
        grade: Grade,
        now: TimestampSecs,
    ) -> Result<u32> {
        dispatch!(self, s => s.next_interval_secs(storage, card, grade, now))
    }

    fn timing_today(&self, storage: &SqliteStorage, now: TimestampSecs) -> Result<SchedTimingToday> {
        dispatch!(self, s => s.timing_today(storage, now))
    }
}

/// Render an interval for an answer button: "45s", "10m", "3h", "4d", "2.5mo", "1.2y".
pub fn format_interval(secs: u32) -> String {
    const MINUTE: f32 = 60.0;
    const HOUR: f32 = 3_600.0;
    const DAY: f32 = 86_400.0;
    const MONTH: f32 = 30.0 * DAY;
    const YEAR: f32 = 365.0 * DAY;

    let secs = secs as f32;
    let (value, unit) = if secs < MINUTE {
        (secs, "s")
    } else if secs < HOUR {
        (secs / MINUTE, "m")
    } else if secs < DAY {
        (secs / HOUR, "h")
    } else if secs < MONTH {
        (secs / DAY, "d")
    } else if secs < YEAR {
        (secs / MONTH, "mo")
    } else {
        (secs / YEAR, "y")
    };

    let rounded = (value * 10.0).round() / 10.0;
    if unit == "mo" || unit == "y" {
        if rounded.fract() == 0.0 {
            format!("{}{}", rounded as u32, unit)
        } else {
            format!("{:.1}{}", rounded, unit)
        }
    } else {
        format!("{}{}", value.round() as u32, unit)
    }
}
