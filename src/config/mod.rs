//! Collection-wide settings with typed accessors and defaults

use serde::{Deserialize, Serialize};

use crate::decks::{DeckId, LeechAction};
use crate::storage::{Result, SqliteStorage};
use crate::timestamp::TimestampSecs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    /// Scheduler generation: 1 or 2
    SchedulerVersion,
    /// With version 2, switches to the deterministic-fuzz generation
    Sched2021,
    /// Hour at which a new scheduling day starts
    Rollover,
    /// Seconds a learning card may be shown ahead of its due time
    LearnAheadSecs,
    NewSpread,
    CurrentDeck,
    NextNewPosition,
    /// Collection creation time; day zero for generation 1
    CreationStamp,
    LastUnburied,
    /// Collection-wide caps on top of the per-deck limits
    NewPerDay,
    ReviewsPerDay,
    LeechAction,
}

impl ConfigKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SchedulerVersion => "schedVer",
            Self::Sched2021 => "sched2021",
            Self::Rollover => "rollover",
            Self::LearnAheadSecs => "collapseTime",
            Self::NewSpread => "newSpread",
            Self::CurrentDeck => "curDeck",
            Self::NextNewPosition => "nextPos",
            Self::CreationStamp => "crt",
            Self::LastUnburied => "lastUnburied",
            Self::NewPerDay => "newPerDay",
            Self::ReviewsPerDay => "revPerDay",
            Self::LeechAction => "leechAction",
        }
    }
}

/// How new cards are mixed with reviews
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NewReviewMix {
    /// Spread new cards evenly through the reviews
    Distribute,
    #[default]
    ReviewsFirst,
    NewFirst,
}

pub const DEFAULT_ROLLOVER_HOUR: u8 = 4;

impl SqliteStorage {
    fn get_config_or<T>(&self, key: ConfigKey, default: T) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        Ok(self.get_config_value(key.as_str())?.unwrap_or(default))
    }

    pub fn set_config<T: Serialize>(&self, key: ConfigKey, value: &T) -> Result<()> {
        self.set_config_value(key.as_str(), value)
    }

    /// Missing means a collection from before versions were recorded.
    pub fn scheduler_version(&self) -> Result<u8> {
        self.get_config_or(ConfigKey::SchedulerVersion, 1)
    }

    pub fn sched2021_enabled(&self) -> Result<bool> {
        self.get_config_or(ConfigKey::Sched2021, false)
    }

    pub fn rollover_hour(&self) -> Result<u8> {
        let hour: u8 = self.get_config_or(ConfigKey::Rollover, DEFAULT_ROLLOVER_HOUR)?;
        Ok(hour.min(23))
    }

    pub fn learn_ahead_secs(&self) -> Result<u32> {
        self.get_config_or(ConfigKey::LearnAheadSecs, 0)
    }

    pub fn new_review_mix(&self) -> Result<NewReviewMix> {
        self.get_config_or(ConfigKey::NewSpread, NewReviewMix::default())
    }

    pub fn current_deck_id(&self) -> Result<DeckId> {
        self.get_config_or(ConfigKey::CurrentDeck, DeckId(1))
    }

    pub fn creation_stamp(&self) -> Result<TimestampSecs> {
        self.get_config_or(ConfigKey::CreationStamp, TimestampSecs(0))
    }

    pub fn last_unburied_day(&self) -> Result<u32> {
        self.get_config_or(ConfigKey::LastUnburied, 0)
    }

    pub fn collection_new_limit(&self) -> Result<Option<u32>> {
        self.get_config_value(ConfigKey::NewPerDay.as_str())
    }

    pub fn collection_review_limit(&self) -> Result<Option<u32>> {
        self.get_config_value(ConfigKey::ReviewsPerDay.as_str())
    }

    pub fn default_leech_action(&self) -> Result<LeechAction> {
        self.get_config_or(ConfigKey::LeechAction, LeechAction::default())
    }

    /// Hand out the next new-card position and advance the counter.
    pub fn next_new_position(&self) -> Result<u32> {
        let stored: u32 = self.get_config_or(ConfigKey::NextNewPosition, 0)?;
        let after_existing = (self.max_new_position()? + 1).max(0) as u32;
        let pos = stored.max(after_existing);
        self.set_config(ConfigKey::NextNewPosition, &(pos + 1))?;
        Ok(pos)
    }
}
