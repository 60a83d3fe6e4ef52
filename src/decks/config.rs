//! Deck options: named bundles of scheduling settings shared by many decks

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::timestamp::TimestampSecs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeckConfigId(pub i64);

impl fmt::Display for DeckConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeckConfig {
    pub id: DeckConfigId,
    pub name: String,
    pub mtime: TimestampSecs,
    pub new: NewConfig,
    pub review: ReviewConfig,
    pub lapse: LapseConfig,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            id: DeckConfigId(1),
            name: "Default".to_string(),
            mtime: TimestampSecs(0),
            new: NewConfig::default(),
            review: ReviewConfig::default(),
            lapse: LapseConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewConfig {
    /// Learning steps in minutes
    pub steps_mins: Vec<f32>,
    pub per_day: u32,
    /// Interval in days after the last learning step
    pub graduating_interval_good: u32,
    /// Interval in days when a learning card is answered easy
    pub graduating_interval_easy: u32,
    /// Ease given on graduation, in permille
    pub initial_ease: u16,
    pub order: NewCardOrder,
    pub bury_siblings: bool,
}

impl Default for NewConfig {
    fn default() -> Self {
        Self {
            steps_mins: vec![1.0, 10.0],
            per_day: 20,
            graduating_interval_good: 1,
            graduating_interval_easy: 4,
            initial_ease: 2500,
            order: NewCardOrder::Due,
            bury_siblings: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReviewConfig {
    pub per_day: u32,
    pub easy_multiplier: f32,
    pub hard_multiplier: f32,
    /// Global scale applied to every computed review interval
    pub interval_multiplier: f32,
    pub maximum_interval: u32,
    pub minimum_ease: u16,
    pub bury_siblings: bool,
    /// Answer times are clamped to this many seconds before logging
    pub max_answer_secs: u32,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            per_day: 200,
            easy_multiplier: 1.3,
            hard_multiplier: 1.2,
            interval_multiplier: 1.0,
            maximum_interval: 36500,
            minimum_ease: 1300,
            bury_siblings: false,
            max_answer_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LapseConfig {
    /// Relearning steps in minutes
    pub steps_mins: Vec<f32>,
    /// Share of the old interval kept after a lapse
    pub multiplier: f32,
    pub minimum_interval: u32,
    pub leech_threshold: u32,
    /// Falls back to the collection's `leechAction` when unset
    pub leech_action: Option<LeechAction>,
}

impl Default for LapseConfig {
    fn default() -> Self {
        Self {
            steps_mins: vec![10.0],
            multiplier: 0.0,
            minimum_interval: 1,
            leech_threshold: 8,
            leech_action: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LeechAction {
    Suspend,
    #[default]
    TagOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NewCardOrder {
    /// In order added (ascending position)
    #[default]
    Due,
    Random,
}

/// A set of named presets, as read from a TOML options file.
///
/// ```toml
/// [[preset]]
/// name = "Fast"
/// [preset.new]
/// stepsMins = [1.0, 5.0]
/// perDay = 40
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeckConfigPresets {
    #[serde(default, rename = "preset")]
    pub presets: Vec<DeckConfig>,
}

impl DeckConfigPresets {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
