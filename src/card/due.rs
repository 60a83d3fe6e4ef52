//! Typed due values
//!
//! The stored `due` column means different things depending on where a card
//! sits: a position in the new-card order, a day number relative to the
//! collection's scheduling epoch, or an absolute timestamp for cards that are
//! learning within the current day. `Due` keeps the unit attached to the value
//! so that queue changes have to rewrite both together.

use serde::{Deserialize, Serialize};

use super::{CardQueue, CardType};

/// Stored learning dues above this are timestamps, below are day numbers.
pub const LEARN_TIMESTAMP_THRESHOLD: i64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value", rename_all = "camelCase")]
pub enum Due {
    /// Position in the new-card order
    Position(u32),
    /// Days since the collection's scheduling epoch
    Day(i32),
    /// Seconds since the Unix epoch
    Timestamp(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueUnit {
    Position,
    Day,
    Timestamp,
}

impl Default for Due {
    fn default() -> Self {
        Self::Position(0)
    }
}

impl Due {
    /// Decode a stored due value for a card in `queue` with type `ctype`.
    pub fn from_raw(queue: CardQueue, ctype: CardType, raw: i64) -> Self {
        match queue {
            CardQueue::New => Due::Position(raw.clamp(0, u32::MAX as i64) as u32),
            CardQueue::Review | CardQueue::DayLearn => Due::Day(clamp_day(raw)),
            CardQueue::Learn | CardQueue::Preview => Due::Timestamp(raw),
            CardQueue::Suspended | CardQueue::SchedBuried | CardQueue::UserBuried => {
                Self::from_raw_for_type(ctype, raw)
            }
        }
    }

    /// Decode a due value whose queue is not meaningful (suspended, buried, or
    /// the original due of a card sitting in a filtered deck).
    pub fn from_raw_for_type(ctype: CardType, raw: i64) -> Self {
        match ctype {
            CardType::New => Due::Position(raw.clamp(0, u32::MAX as i64) as u32),
            CardType::Review => Due::Day(clamp_day(raw)),
            CardType::Learn | CardType::Relearn => {
                if raw > LEARN_TIMESTAMP_THRESHOLD {
                    Due::Timestamp(raw)
                } else {
                    Due::Day(clamp_day(raw))
                }
            }
        }
    }

    pub fn to_raw(self) -> i64 {
        match self {
            Due::Position(pos) => pos as i64,
            Due::Day(day) => day as i64,
            Due::Timestamp(secs) => secs,
        }
    }

    pub fn unit(self) -> DueUnit {
        match self {
            Due::Position(_) => DueUnit::Position,
            Due::Day(_) => DueUnit::Day,
            Due::Timestamp(_) => DueUnit::Timestamp,
        }
    }

    pub fn position(self) -> Option<u32> {
        match self {
            Due::Position(pos) => Some(pos),
            _ => None,
        }
    }

    pub fn day(self) -> Option<i32> {
        match self {
            Due::Day(day) => Some(day),
            _ => None,
        }
    }

    pub fn timestamp(self) -> Option<i64> {
        match self {
            Due::Timestamp(secs) => Some(secs),
            _ => None,
        }
    }
}

fn clamp_day(raw: i64) -> i32 {
    raw.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_by_queue() {
        assert_eq!(Due::from_raw(CardQueue::New, CardType::New, 12), Due::Position(12));
        assert_eq!(Due::from_raw(CardQueue::Review, CardType::Review, 400), Due::Day(400));
        assert_eq!(
            Due::from_raw(CardQueue::Learn, CardType::Learn, 1_600_000_000),
            Due::Timestamp(1_600_000_000)
        );
        assert_eq!(Due::from_raw(CardQueue::DayLearn, CardType::Relearn, 33), Due::Day(33));
    }

    #[test]
    fn test_suspended_learning_card_keeps_magnitude() {
        let intraday = Due::from_raw(CardQueue::Suspended, CardType::Learn, 1_700_000_000);
        assert_eq!(intraday.unit(), DueUnit::Timestamp);

        let interday = Due::from_raw(CardQueue::UserBuried, CardType::Relearn, 120);
        assert_eq!(interday, Due::Day(120));
    }

    #[test]
    fn test_negative_position_is_clamped() {
        assert_eq!(Due::from_raw(CardQueue::New, CardType::New, -5), Due::Position(0));
    }
}
