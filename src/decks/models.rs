//! Deck data models

use std::fmt;

use serde::{Deserialize, Serialize};

use super::config::DeckConfigId;
use crate::timestamp::TimestampSecs;

/// Separator between the levels of a deck name ("Languages::French")
pub const DECK_SEPARATOR: &str = "::";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeckId(pub i64);

impl fmt::Display for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A deck is either a normal home for cards or a filtered view over other decks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: DeckId,
    pub name: String,
    pub mtime: TimestampSecs,
    pub kind: DeckKind,
    #[serde(default)]
    pub today: DeckToday,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DeckKind {
    Normal {
        #[serde(rename = "configId")]
        config_id: DeckConfigId,
    },
    Filtered(FilteredDeck),
}

/// Options of a filtered deck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredDeck {
    pub search: FilteredSearch,
    /// When false the deck is a preview: answers never touch interval or ease
    #[serde(default = "default_reschedule")]
    pub reschedule: bool,
    /// Delay before a previewed card failed with again/hard is shown again
    #[serde(default = "default_preview_delay")]
    pub preview_delay_mins: u32,
}

fn default_reschedule() -> bool {
    true
}

fn default_preview_delay() -> u32 {
    10
}

impl Default for FilteredDeck {
    fn default() -> Self {
        Self {
            search: FilteredSearch::default(),
            reschedule: default_reschedule(),
            preview_delay_mins: default_preview_delay(),
        }
    }
}

/// Which cards a filtered deck gathers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredSearch {
    /// Gather from this deck and its children, or the whole collection if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_deck: Option<DeckId>,
    #[serde(default)]
    pub kind: FilteredKind,
    #[serde(default = "default_filter_limit")]
    pub limit: u32,
    #[serde(default)]
    pub order: FilteredOrder,
}

fn default_filter_limit() -> u32 {
    100
}

impl Default for FilteredSearch {
    fn default() -> Self {
        Self {
            source_deck: None,
            kind: FilteredKind::default(),
            limit: default_filter_limit(),
            order: FilteredOrder::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilteredKind {
    /// Review and learning cards due today or earlier
    #[default]
    Due,
    /// Cards never studied
    New,
    /// Anything not suspended or buried
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilteredOrder {
    #[default]
    Due,
    Random,
    OldestAdded,
}

/// Per-day study counters; stale once `day` differs from the scheduler's today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckToday {
    pub day: u32,
    pub new: i32,
    pub learn: i32,
    pub review: i32,
    pub millis: i64,
}

/// Which daily counter an answer was charged to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DailyCounter {
    New,
    Learn,
    Review,
}

impl DeckToday {
    /// Counters as of `today`: zeroed if they were recorded on another day.
    pub fn for_day(self, today: u32) -> Self {
        if self.day == today {
            self
        } else {
            Self {
                day: today,
                ..Default::default()
            }
        }
    }

    pub fn get(&self, counter: DailyCounter) -> i32 {
        match counter {
            DailyCounter::New => self.new,
            DailyCounter::Learn => self.learn,
            DailyCounter::Review => self.review,
        }
    }

    pub fn adjust(&mut self, counter: DailyCounter, delta: i32) {
        match counter {
            DailyCounter::New => self.new += delta,
            DailyCounter::Learn => self.learn += delta,
            DailyCounter::Review => self.review += delta,
        }
    }
}

impl Deck {
    pub fn new_normal(name: impl Into<String>) -> Self {
        Self {
            id: DeckId(0),
            name: normalize_deck_name(&name.into()),
            mtime: TimestampSecs::now(),
            kind: DeckKind::Normal {
                config_id: DeckConfigId(1),
            },
            today: DeckToday::default(),
        }
    }

    pub fn new_filtered(name: impl Into<String>, filtered: FilteredDeck) -> Self {
        Self {
            kind: DeckKind::Filtered(filtered),
            ..Self::new_normal(name)
        }
    }

    pub fn is_filtered(&self) -> bool {
        matches!(self.kind, DeckKind::Filtered(_))
    }

    pub fn config_id(&self) -> Option<DeckConfigId> {
        match self.kind {
            DeckKind::Normal { config_id } => Some(config_id),
            DeckKind::Filtered(_) => None,
        }
    }

    pub fn filtered(&self) -> Option<&FilteredDeck> {
        match &self.kind {
            DeckKind::Filtered(filtered) => Some(filtered),
            DeckKind::Normal { .. } => None,
        }
    }

    /// Names of all ancestors, outermost first.
    pub fn ancestor_names(&self) -> Vec<String> {
        let parts: Vec<&str> = self.name.split(DECK_SEPARATOR).collect();
        (1..parts.len())
            .map(|n| parts[..n].join(DECK_SEPARATOR))
            .collect()
    }

    /// True for the deck itself and for any deck nested beneath it.
    pub fn contains(&self, other_name: &str) -> bool {
        other_name == self.name
            || other_name
                .strip_prefix(self.name.as_str())
                .map(|rest| rest.starts_with(DECK_SEPARATOR))
                .unwrap_or(false)
    }

    /// Last component of the name.
    pub fn short_name(&self) -> &str {
        self.name.rsplit(DECK_SEPARATOR).next().unwrap_or(&self.name)
    }

    pub fn depth(&self) -> usize {
        self.name.matches(DECK_SEPARATOR).count()
    }
}

/// Trim each level of a deck name and drop empty levels.
pub fn normalize_deck_name(name: &str) -> String {
    let parts: Vec<&str> = name
        .split(DECK_SEPARATOR)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        "Default".to_string()
    } else {
        parts.join(DECK_SEPARATOR)
    }
}
