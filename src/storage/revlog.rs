//! Review log rows

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{Result, SqliteStorage};
use crate::card::CardId;
use crate::timestamp::TimestampMillis;

/// Millisecond timestamp of the answer, unique per row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevlogId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RevlogKind {
    Learning,
    Review,
    Relearning,
    /// Answered in a filtered deck without rescheduling, or reviewed early
    Filtered,
    /// Changed outside of review, e.g. reset to new
    Manual,
}

impl RevlogKind {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Learning => 0,
            Self::Review => 1,
            Self::Relearning => 2,
            Self::Filtered => 3,
            Self::Manual => 4,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Learning,
            1 => Self::Review,
            2 => Self::Relearning,
            3 => Self::Filtered,
            _ => Self::Manual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevlogEntry {
    pub id: RevlogId,
    pub card_id: CardId,
    /// 1-4, or 0 for manual changes
    pub button_chosen: u8,
    /// Positive values are days, negative values are seconds
    pub interval: i32,
    pub last_interval: i32,
    /// Ease factor after the answer, in permille
    pub ease_factor: u32,
    pub taken_millis: u32,
    pub review_kind: RevlogKind,
}

fn row_to_entry(row: &Row) -> rusqlite::Result<RevlogEntry> {
    Ok(RevlogEntry {
        id: RevlogId(row.get(0)?),
        card_id: CardId(row.get(1)?),
        button_chosen: row.get(2)?,
        interval: row.get(3)?,
        last_interval: row.get(4)?,
        ease_factor: row.get::<_, i64>(5)?.max(0) as u32,
        taken_millis: row.get::<_, i64>(6)?.max(0) as u32,
        review_kind: RevlogKind::from_u8(row.get(7)?),
    })
}

impl SqliteStorage {
    // ==================== Review Log ====================

    /// Append an entry. Its id becomes `at`, bumped past the newest existing
    /// row so ids stay unique and increasing.
    pub fn add_revlog_entry(&self, entry: &mut RevlogEntry, at: TimestampMillis) -> Result<RevlogId> {
        let max_id: i64 = self
            .conn
            .query_row("SELECT COALESCE(MAX(id), 0) FROM revlog", [], |row| row.get(0))?;
        entry.id = RevlogId(at.0.max(max_id + 1));
        self.conn.execute(
            "INSERT INTO revlog (id, cid, ease, ivl, lastIvl, factor, time, type) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.id.0,
                entry.card_id.0,
                entry.button_chosen,
                entry.interval,
                entry.last_interval,
                entry.ease_factor,
                entry.taken_millis,
                entry.review_kind.as_u8(),
            ],
        )?;
        Ok(entry.id)
    }

    /// The most recent entry for a card, by id.
    pub fn last_revlog_entry_for_card(&self, card: CardId) -> Result<Option<RevlogEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT id, cid, ease, ivl, lastIvl, factor, time, type FROM revlog \
                 WHERE cid = ? ORDER BY id DESC LIMIT 1",
                params![card.0],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    pub fn revlog_for_card(&self, card: CardId) -> Result<Vec<RevlogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, cid, ease, ivl, lastIvl, factor, time, type FROM revlog \
             WHERE cid = ? ORDER BY id",
        )?;
        let entries = stmt
            .query_map(params![card.0], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn remove_revlog_entry(&self, id: RevlogId) -> Result<()> {
        self.conn
            .execute("DELETE FROM revlog WHERE id = ?", params![id.0])?;
        Ok(())
    }

    pub fn revlog_count(&self) -> Result<u32> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM revlog", [], |row| row.get(0))?;
        Ok(count as u32)
    }
}
