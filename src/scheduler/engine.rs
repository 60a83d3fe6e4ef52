//! The generation-independent scheduler: queue lifecycle, serving cards, and
//! delegating answers to an [`IntervalAlgorithm`].

use std::time::Instant;

use chrono::FixedOffset;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::bury_and_suspend::unbury_if_day_rolled_over;
use super::queue::{CardQueues, QueueBuilder, QueueKind};
use super::timing::SchedTimingToday;
use super::{AnswerOutcome, Counts, Grade, IntervalAlgorithm, Result, SchedulerVersion, Scheduling};
use crate::card::{Card, CardId};
use crate::decks::DeckConfigResolver;
use crate::storage::SqliteStorage;
use crate::timestamp::TimestampSecs;
use crate::undo::UndoLog;

/// The card handed out by the last `get_card`
#[derive(Debug, Clone, Copy)]
pub(super) struct ServedCard {
    pub id: CardId,
    pub kind: QueueKind,
    pub served_at: Instant,
}

pub struct SchedulerCore<A: IntervalAlgorithm> {
    pub(super) algorithm: A,
    offset: FixedOffset,
    pub(super) resolver: DeckConfigResolver,
    pub(super) queues: Option<CardQueues>,
    pub(super) current: Option<ServedCard>,
    pub(super) rng: StdRng,
}

impl<A: IntervalAlgorithm> SchedulerCore<A> {
    pub fn new(algorithm: A, offset: FixedOffset) -> Self {
        Self {
            algorithm,
            offset,
            resolver: DeckConfigResolver::new(),
            queues: None,
            current: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Make random fuzz repeatable.
    pub fn seed_rng(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    pub(super) fn timing_at(&self, storage: &SqliteStorage, now: TimestampSecs) -> Result<SchedTimingToday> {
        let created = storage.creation_stamp()?;
        let rollover = storage.rollover_hour()?;
        Ok(self.algorithm.timing(created, now, self.offset, rollover))
    }

    fn rebuild(&mut self, storage: &SqliteStorage, timing: SchedTimingToday) -> Result<()> {
        self.resolver.clear();
        self.current = None;
        unbury_if_day_rolled_over(storage, timing.days_elapsed)?;
        let queues = QueueBuilder::new(
            storage,
            &mut self.resolver,
            timing,
            self.algorithm.merges_reviews(),
        )
        .build()?;
        self.queues = Some(queues);
        Ok(())
    }

    /// Rebuild when the queues are missing or were built on another day.
    fn ensure_fresh(&mut self, storage: &SqliteStorage, timing: SchedTimingToday) -> Result<()> {
        let stale = self
            .queues
            .as_ref()
            .map(|queues| queues.day != timing.days_elapsed)
            .unwrap_or(true);
        if stale {
            log::debug!("Queues are stale, rebuilding for day {}", timing.days_elapsed);
            self.rebuild(storage, timing)?;
        }
        Ok(())
    }
}

impl<A: IntervalAlgorithm> Scheduling for SchedulerCore<A> {
    fn version(&self) -> SchedulerVersion {
        self.algorithm.version()
    }

    fn reset(&mut self, storage: &SqliteStorage, now: TimestampSecs) -> Result<()> {
        let timing = self.timing_at(storage, now)?;
        self.rebuild(storage, timing)?;
        log::info!("Scheduler {} reset for day {}", self.algorithm.version(), timing.days_elapsed);
        Ok(())
    }

    fn invalidate(&mut self) {
        self.queues = None;
        self.current = None;
        self.resolver.clear();
    }

    fn get_card(&mut self, storage: &SqliteStorage, now: TimestampSecs) -> Result<Option<Card>> {
        let timing = self.timing_at(storage, now)?;
        self.ensure_fresh(storage, timing)?;
        self.current = None;

        let Some(queues) = self.queues.as_mut() else {
            return Ok(None);
        };
        while let Some((id, kind)) = queues.next_card(now) {
            match storage.get_card(id)? {
                Some(card) => {
                    self.current = Some(ServedCard {
                        id,
                        kind,
                        served_at: Instant::now(),
                    });
                    return Ok(Some(card));
                }
                None => {
                    log::warn!("Queued card {} no longer exists, skipping", id);
                    queues.remove(id);
                }
            }
        }
        Ok(None)
    }

    fn answer_card(
        &mut self,
        storage: &SqliteStorage,
        undo: &mut UndoLog,
        card: &Card,
        grade: Grade,
        now: TimestampSecs,
    ) -> Result<AnswerOutcome> {
        self.answer(storage, undo, card, grade, now)
    }

    fn counts(&mut self, storage: &SqliteStorage, now: TimestampSecs) -> Result<Counts> {
        let timing = self.timing_at(storage, now)?;
        self.ensure_fresh(storage, timing)?;
        Ok(self
            .queues
            .as_ref()
            .map(|queues| queues.counts(now))
            .unwrap_or_default())
    }

    fn answer_buttons(&mut self, storage: &SqliteStorage, card: &Card) -> Result<u8> {
        let config = self.resolver.config_for(storage, card)?;
        Ok(self.algorithm.answer_buttons(card, &config))
    }

    fn next_interval_secs(
        &mut self,
        storage: &SqliteStorage,
        card: &Card,
        grade: Grade,
        now: TimestampSecs,
    ) -> Result<u32> {
        self.preview_interval_secs(storage, card, grade, now)
    }

    fn timing_today(&self, storage: &SqliteStorage, now: TimestampSecs) -> Result<SchedTimingToday> {
        self.timing_at(storage, now)
    }
}
