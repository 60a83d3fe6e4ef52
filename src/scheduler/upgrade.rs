//! One-way migration between scheduler generations

use chrono::FixedOffset;

use super::filtered::empty_filtered_deck;
use super::timing::{local_timing_today, v1_timing_today};
use super::{Result, SchedulerError, SchedulerVersion};
use crate::card::{Card, CardQueue, CardType, Due};
use crate::config::ConfigKey;
use crate::storage::SqliteStorage;
use crate::timestamp::TimestampSecs;

impl Card {
    /// Convert legacy state: relearning cards gain their own type, and the
    /// single legacy bury queue becomes a user bury.
    fn upgrade_from_v1(&mut self, day_shift: i32) {
        if self.ctype == CardType::Review && matches!(self.queue, CardQueue::Learn | CardQueue::DayLearn) {
            self.ctype = CardType::Relearn;
        }
        if self.queue == CardQueue::SchedBuried {
            self.queue = CardQueue::UserBuried;
        }
        if let Due::Day(day) = self.due {
            self.due = Due::Day(day + day_shift);
        }
    }
}

/// Move the collection from `from` to `to`. Settings, card rows and filtered
/// decks are rewritten in one transaction; the caller rebuilds its scheduler.
pub fn upgrade_scheduler(
    storage: &SqliteStorage,
    from: SchedulerVersion,
    to: SchedulerVersion,
    offset: FixedOffset,
    now: TimestampSecs,
) -> Result<()> {
    if to < from {
        return Err(SchedulerError::InvalidInput(format!(
            "cannot downgrade scheduler from {} to {}",
            from, to
        )));
    }
    if to == from {
        return Ok(());
    }

    storage.transact(|storage| {
        if from == SchedulerVersion::V1 {
            upgrade_cards_from_v1(storage, offset, now)?;
            storage.set_config(ConfigKey::SchedulerVersion, &2u8)?;
        }
        storage.set_config(ConfigKey::Sched2021, &(to == SchedulerVersion::V3))?;
        log::info!("Upgraded scheduler from {} to {}", from, to);
        Ok(())
    })
}

fn upgrade_cards_from_v1(storage: &SqliteStorage, offset: FixedOffset, now: TimestampSecs) -> Result<()> {
    for deck in storage.all_decks()?.iter().filter(|deck| deck.is_filtered()) {
        empty_filtered_deck(storage, deck.id)?;
    }

    let created = storage.creation_stamp()?;
    let rollover = storage.rollover_hour()?;
    let v1_today = v1_timing_today(created, now).days_elapsed as i32;
    let local_today = local_timing_today(created, now, offset, rollover).days_elapsed as i32;
    let day_shift = local_today - v1_today;

    let mut converted = 0;
    for card in storage.all_cards()? {
        let mut upgraded = card.clone();
        upgraded.upgrade_from_v1(day_shift);
        if upgraded != card {
            upgraded.flush(storage)?;
            converted += 1;
        }
    }
    log::info!("Converted {} cards for the new scheduler (day shift {})", converted, day_shift);
    Ok(())
}
