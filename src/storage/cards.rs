//! Card rows

use rusqlite::{params, OptionalExtension, Row};

use super::{ids_to_sql, Result, SqliteStorage, StorageError};
use crate::card::{Card, CardId, CardQueue, CardType, Due};
use crate::decks::DeckId;
use crate::notes::NoteId;
use crate::timestamp::{TimestampMillis, TimestampSecs};

const CARD_COLUMNS: &str =
    "id, nid, did, ord, mod, type, queue, due, ivl, factor, reps, lapses, left, odue, odid";

/// An intraday learning card and the second it becomes due
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LearningDue {
    pub due: i64,
    pub id: CardId,
}

fn row_to_card(row: &Row) -> rusqlite::Result<Card> {
    let id = CardId(row.get(0)?);
    let raw_type: u8 = row.get(5)?;
    let raw_queue: i8 = row.get(6)?;
    let ctype = CardType::from_u8(raw_type).unwrap_or_else(|| {
        log::warn!("Card {} has unknown type {}, treating as new", id, raw_type);
        CardType::New
    });
    let queue = CardQueue::from_i8(raw_queue).unwrap_or_else(|| {
        log::warn!("Card {} has unknown queue {}, treating as new", id, raw_queue);
        CardQueue::New
    });
    let raw_due: i64 = row.get(7)?;
    let raw_ivl: i64 = row.get(8)?;
    let raw_factor: i64 = row.get(9)?;
    if raw_ivl < 0 || raw_factor < 0 {
        log::warn!(
            "Card {} has corrupt interval {} / factor {}, clamping",
            id,
            raw_ivl,
            raw_factor
        );
    }

    Ok(Card {
        id,
        note_id: NoteId(row.get(1)?),
        deck_id: DeckId(row.get(2)?),
        template_idx: row.get(3)?,
        mtime: TimestampSecs(row.get(4)?),
        ctype,
        queue,
        due: Due::from_raw(queue, ctype, raw_due),
        interval: raw_ivl.clamp(0, u32::MAX as i64) as u32,
        ease_factor: raw_factor.clamp(0, u16::MAX as i64) as u16,
        reps: row.get::<_, i64>(10)?.max(0) as u32,
        lapses: row.get::<_, i64>(11)?.max(0) as u32,
        remaining_steps: row.get::<_, i64>(12)?.max(0) as u32,
        original_due: row.get(13)?,
        original_deck_id: DeckId(row.get(14)?),
    })
}

impl SqliteStorage {
    // ==================== Card Operations ====================

    pub fn get_card(&self, id: CardId) -> Result<Option<Card>> {
        let card = self
            .conn
            .query_row(
                &format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?"),
                params![id.0],
                row_to_card,
            )
            .optional()?;
        Ok(card)
    }

    pub fn get_card_required(&self, id: CardId) -> Result<Card> {
        self.get_card(id)?.ok_or(StorageError::CardNotFound(id))
    }

    /// Insert a card, assigning it a fresh id if it has none.
    pub fn add_card(&self, card: &mut Card) -> Result<()> {
        if card.id.0 == 0 {
            let max_id: i64 = self
                .conn
                .query_row("SELECT COALESCE(MAX(id), 0) FROM cards", [], |row| row.get(0))?;
            card.id = CardId(TimestampMillis::now().0.max(max_id + 1));
        }
        self.write_card(card, "INSERT")
    }

    pub fn update_card(&self, card: &Card) -> Result<()> {
        if card.id.0 == 0 {
            return Err(StorageError::InvalidInput("card has no id".into()));
        }
        self.write_card(card, "REPLACE")
    }

    fn write_card(&self, card: &Card, verb: &str) -> Result<()> {
        self.conn.execute(
            &format!(
                "{verb} INTO cards ({CARD_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                card.id.0,
                card.note_id.0,
                card.deck_id.0,
                card.template_idx,
                card.mtime.0,
                card.ctype.as_u8(),
                card.queue.as_i8(),
                card.due.to_raw(),
                card.interval,
                card.ease_factor,
                card.reps,
                card.lapses,
                card.remaining_steps,
                card.original_due,
                card.original_deck_id.0,
            ],
        )?;
        Ok(())
    }

    pub fn remove_card(&self, id: CardId) -> Result<()> {
        self.conn
            .execute("DELETE FROM cards WHERE id = ?", params![id.0])?;
        Ok(())
    }

    fn query_cards(&self, where_clause: &str, args: impl rusqlite::Params) -> Result<Vec<Card>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {CARD_COLUMNS} FROM cards WHERE {where_clause}"))?;
        let cards = stmt
            .query_map(args, row_to_card)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    pub fn all_cards(&self) -> Result<Vec<Card>> {
        self.query_cards("1 ORDER BY id", [])
    }

    pub fn cards_of_note(&self, note_id: NoteId) -> Result<Vec<Card>> {
        self.query_cards("nid = ? ORDER BY ord", params![note_id.0])
    }

    /// Cards whose current deck is one of `decks`.
    pub fn cards_in_decks(&self, decks: &[DeckId]) -> Result<Vec<Card>> {
        let list = ids_to_sql(decks.iter().map(|d| d.0));
        self.query_cards(&format!("did IN {list} ORDER BY id"), [])
    }

    pub fn cards_in_queues(&self, queues: &[CardQueue]) -> Result<Vec<Card>> {
        let list = ids_to_sql(queues.iter().map(|q| q.as_i8() as i64));
        self.query_cards(&format!("queue IN {list} ORDER BY id"), [])
    }

    /// Cards sitting in filtered deck `deck`.
    pub fn cards_in_filtered_deck(&self, deck: DeckId) -> Result<Vec<Card>> {
        self.query_cards("did = ? AND odid != 0 ORDER BY id", params![deck.0])
    }

    // ==================== Queue Queries ====================

    /// New cards in `deck` in position order.
    pub fn new_card_ids(&self, deck: DeckId, limit: Option<u32>) -> Result<Vec<CardId>> {
        let limit = limit.map(i64::from).unwrap_or(-1);
        let mut stmt = self.conn.prepare(
            "SELECT id FROM cards WHERE did = ? AND queue = 0 ORDER BY due, ord, id LIMIT ?",
        )?;
        let ids = stmt
            .query_map(params![deck.0, limit], |row| Ok(CardId(row.get(0)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Review cards in `deck` due on or before `today` as (due, id), oldest due first.
    pub fn review_cards_due(&self, deck: DeckId, today: u32, limit: u32) -> Result<Vec<(i32, CardId)>> {
        let mut stmt = self.conn.prepare(
            "SELECT due, id FROM cards WHERE did = ? AND queue = 2 AND due <= ? \
             ORDER BY due, id LIMIT ?",
        )?;
        let cards = stmt
            .query_map(params![deck.0, today, limit], |row| {
                Ok((row.get(0)?, CardId(row.get(1)?)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    /// Intraday learning and preview cards in `decks` due before `cutoff`.
    pub fn intraday_learning_cards(&self, decks: &[DeckId], cutoff: i64) -> Result<Vec<LearningDue>> {
        let list = ids_to_sql(decks.iter().map(|d| d.0));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT due, id FROM cards WHERE did IN {list} AND queue IN (1, 4) AND due < ? \
             ORDER BY due, id"
        ))?;
        let cards = stmt
            .query_map(params![cutoff], |row| {
                Ok(LearningDue {
                    due: row.get(0)?,
                    id: CardId(row.get(1)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    /// Interday learning cards in `deck` due on or before `today`.
    pub fn day_learning_card_ids(&self, deck: DeckId, today: u32, limit: u32) -> Result<Vec<CardId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM cards WHERE did = ? AND queue = 3 AND due <= ? ORDER BY due, id LIMIT ?",
        )?;
        let ids = stmt
            .query_map(params![deck.0, today, limit], |row| Ok(CardId(row.get(0)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Highest position used by any new card, or -1 when there are none.
    pub fn max_new_position(&self) -> Result<i64> {
        let pos = self.conn.query_row(
            "SELECT COALESCE(MAX(due), -1) FROM cards WHERE type = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(pos)
    }

    /// Shift the positions of new cards at or after `start` by `by`.
    pub fn shift_new_positions(&self, start: u32, by: u32, excluding: &[CardId]) -> Result<()> {
        let list = ids_to_sql(excluding.iter().map(|c| c.0));
        self.conn.execute(
            &format!(
                "UPDATE cards SET due = due + ?, mod = ? \
                 WHERE type = 0 AND due >= ? AND id NOT IN {list}"
            ),
            params![by, TimestampSecs::now().0, start],
        )?;
        Ok(())
    }

    pub fn card_count(&self) -> Result<u32> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;
        Ok(count as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_storage() -> SqliteStorage {
        SqliteStorage::open_in_memory().unwrap()
    }

    fn new_card(storage: &SqliteStorage, deck: i64, pos: u32) -> Card {
        let mut card = Card::new(NoteId(1), 0, DeckId(deck), pos);
        storage.add_card(&mut card).unwrap();
        card
    }

    #[test]
    fn test_add_assigns_increasing_ids() {
        let storage = create_test_storage();
        let first = new_card(&storage, 1, 0);
        let second = new_card(&storage, 1, 1);
        assert!(first.id.0 > 0);
        assert!(second.id > first.id);
        assert_eq!(storage.get_card(first.id).unwrap(), Some(first));
    }

    #[test]
    fn test_update_roundtrips_every_field() {
        let storage = create_test_storage();
        let mut card = new_card(&storage, 1, 0);
        card.ctype = CardType::Relearn;
        card.set_queue_and_due(CardQueue::Learn, Due::Timestamp(1_700_000_123));
        card.interval = 12;
        card.ease_factor = 2150;
        card.reps = 9;
        card.lapses = 2;
        card.remaining_steps = 19_002;
        storage.update_card(&card).unwrap();
        assert_eq!(storage.get_card_required(card.id).unwrap(), card);
    }

    #[test]
    fn test_corrupt_numbers_are_clamped() {
        let storage = create_test_storage();
        let card = new_card(&storage, 1, 0);
        storage
            .execute_raw(&format!(
                "UPDATE cards SET ivl = -5, factor = -1, queue = 2, type = 2 WHERE id = {}",
                card.id
            ))
            .unwrap();
        let loaded = storage.get_card_required(card.id).unwrap();
        assert_eq!(loaded.interval, 0);
        assert_eq!(loaded.ease_factor, 0);
    }

    #[test]
    fn test_queue_queries_respect_queue_and_due() {
        let storage = create_test_storage();
        let new = new_card(&storage, 1, 3);
        let _other_deck = new_card(&storage, 2, 0);

        let mut review = new_card(&storage, 1, 0);
        review.ctype = CardType::Review;
        review.set_queue_and_due(CardQueue::Review, Due::Day(10));
        storage.update_card(&review).unwrap();

        let mut buried = new_card(&storage, 1, 0);
        buried.ctype = CardType::Review;
        buried.set_queue_and_due(CardQueue::UserBuried, Due::Day(5));
        storage.update_card(&buried).unwrap();

        let mut learning = new_card(&storage, 1, 0);
        learning.ctype = CardType::Learn;
        learning.set_queue_and_due(CardQueue::Learn, Due::Timestamp(1_000));
        storage.update_card(&learning).unwrap();

        assert_eq!(storage.new_card_ids(DeckId(1), None).unwrap(), vec![new.id]);
        assert_eq!(storage.review_cards_due(DeckId(1), 10, 50).unwrap(), vec![(10, review.id)]);
        assert!(storage.review_cards_due(DeckId(1), 9, 50).unwrap().is_empty());
        assert_eq!(
            storage.intraday_learning_cards(&[DeckId(1)], 2_000).unwrap(),
            vec![LearningDue {
                due: 1_000,
                id: learning.id
            }]
        );
        assert_eq!(storage.max_new_position().unwrap(), 3);
    }
}
