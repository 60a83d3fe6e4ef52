//! Deck and deck option rows

use rusqlite::{params, OptionalExtension, Row};

use super::{Result, SqliteStorage, StorageError};
use crate::decks::{DailyCounter, Deck, DeckConfig, DeckConfigId, DeckId, DeckKind, DeckToday};
use crate::timestamp::{TimestampMillis, TimestampSecs};

fn row_to_deck(row: &Row) -> rusqlite::Result<(Deck, String, String)> {
    Ok((
        Deck {
            id: DeckId(row.get(0)?),
            name: row.get(1)?,
            mtime: TimestampSecs(row.get(2)?),
            // filled in from the JSON columns below
            kind: DeckKind::Normal {
                config_id: DeckConfigId(1),
            },
            today: DeckToday::default(),
        },
        row.get(3)?,
        row.get(4)?,
    ))
}

fn finish_deck((mut deck, kind, today): (Deck, String, String)) -> Result<Deck> {
    deck.kind = serde_json::from_str(&kind)?;
    deck.today = serde_json::from_str(&today)?;
    Ok(deck)
}

impl SqliteStorage {
    // ==================== Deck Operations ====================

    pub fn get_deck(&self, id: DeckId) -> Result<Option<Deck>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, mtime, kind, today FROM decks WHERE id = ?",
                params![id.0],
                row_to_deck,
            )
            .optional()?;
        row.map(finish_deck).transpose()
    }

    pub fn get_deck_required(&self, id: DeckId) -> Result<Deck> {
        self.get_deck(id)?.ok_or(StorageError::DeckNotFound(id))
    }

    /// Names compare case-insensitively.
    pub fn get_deck_by_name(&self, name: &str) -> Result<Option<Deck>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, mtime, kind, today FROM decks WHERE name = ?",
                params![name],
                row_to_deck,
            )
            .optional()?;
        row.map(finish_deck).transpose()
    }

    /// All decks, ordered by name so parents precede their children.
    pub fn all_decks(&self) -> Result<Vec<Deck>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, mtime, kind, today FROM decks ORDER BY name COLLATE NOCASE")?;
        let rows = stmt
            .query_map([], row_to_deck)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(finish_deck).collect()
    }

    /// Insert a deck, assigning an id if it has none.
    pub fn add_deck(&self, deck: &mut Deck) -> Result<()> {
        if deck.id.0 == 0 {
            let max_id: i64 = self
                .conn
                .query_row("SELECT COALESCE(MAX(id), 0) FROM decks", [], |row| row.get(0))?;
            deck.id = DeckId(TimestampMillis::now().0.max(max_id + 1));
        }
        self.conn.execute(
            "INSERT INTO decks (id, name, mtime, kind, today) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                deck.id.0,
                deck.name,
                deck.mtime.0,
                serde_json::to_string(&deck.kind)?,
                serde_json::to_string(&deck.today)?,
            ],
        )?;
        Ok(())
    }

    pub fn update_deck(&self, deck: &Deck) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE decks SET name = ?2, mtime = ?3, kind = ?4, today = ?5 WHERE id = ?1",
            params![
                deck.id.0,
                deck.name,
                deck.mtime.0,
                serde_json::to_string(&deck.kind)?,
                serde_json::to_string(&deck.today)?,
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::DeckNotFound(deck.id));
        }
        Ok(())
    }

    pub fn remove_deck(&self, id: DeckId) -> Result<()> {
        self.conn
            .execute("DELETE FROM decks WHERE id = ?", params![id.0])?;
        Ok(())
    }

    /// The deck plus its ancestors, innermost first. Missing ancestors are skipped.
    pub fn deck_with_ancestors(&self, deck: &Deck) -> Result<Vec<Deck>> {
        let mut decks = vec![deck.clone()];
        for name in deck.ancestor_names().into_iter().rev() {
            if let Some(parent) = self.get_deck_by_name(&name)? {
                decks.push(parent);
            }
        }
        Ok(decks)
    }

    /// The deck plus every deck nested beneath it, ordered by name.
    pub fn deck_with_children(&self, deck: &Deck) -> Result<Vec<Deck>> {
        Ok(self
            .all_decks()?
            .into_iter()
            .filter(|d| deck.contains(&d.name))
            .collect())
    }

    /// Add `delta` to one of today's counters on `deck` and all its ancestors.
    pub fn update_deck_today(
        &self,
        deck: DeckId,
        today: u32,
        counter: DailyCounter,
        delta: i32,
        millis: i64,
    ) -> Result<()> {
        let deck = self.get_deck_required(deck)?;
        for mut deck in self.deck_with_ancestors(&deck)? {
            let mut counts = deck.today.for_day(today);
            counts.adjust(counter, delta);
            counts.millis += millis;
            deck.today = counts;
            self.update_deck(&deck)?;
        }
        Ok(())
    }

    /// Undo an earlier [`update_deck_today`](Self::update_deck_today) made on
    /// `day`. Decks whose counters have since rolled over are left alone.
    pub fn revert_deck_today(
        &self,
        deck: DeckId,
        day: u32,
        counter: DailyCounter,
        millis: i64,
    ) -> Result<()> {
        let deck = match self.get_deck(deck)? {
            Some(deck) => deck,
            None => return Ok(()),
        };
        for mut deck in self.deck_with_ancestors(&deck)? {
            if deck.today.day != day {
                continue;
            }
            deck.today.adjust(counter, -1);
            deck.today.millis -= millis;
            self.update_deck(&deck)?;
        }
        Ok(())
    }

    // ==================== Deck Options ====================

    pub fn get_deck_config(&self, id: DeckConfigId) -> Result<Option<DeckConfig>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT config FROM deck_config WHERE id = ?",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|json| serde_json::from_str(&json).map_err(StorageError::from))
            .transpose()
    }

    pub fn all_deck_configs(&self) -> Result<Vec<DeckConfig>> {
        let mut stmt = self
            .conn
            .prepare("SELECT config FROM deck_config ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(StorageError::from))
            .collect()
    }

    /// Insert or replace a config. An id of 0 allocates a new one.
    pub fn add_or_update_deck_config(&self, config: &mut DeckConfig) -> Result<()> {
        if config.id.0 == 0 {
            let max_id: i64 = self.conn.query_row(
                "SELECT COALESCE(MAX(id), 0) FROM deck_config",
                [],
                |row| row.get(0),
            )?;
            config.id = DeckConfigId(max_id + 1);
        }
        self.conn.execute(
            "INSERT OR REPLACE INTO deck_config (id, name, mtime, config) VALUES (?1, ?2, ?3, ?4)",
            params![
                config.id.0,
                config.name,
                config.mtime.0,
                serde_json::to_string(config)?,
            ],
        )?;
        Ok(())
    }

    pub fn remove_deck_config(&self, id: DeckConfigId) -> Result<()> {
        self.conn
            .execute("DELETE FROM deck_config WHERE id = ?", params![id.0])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(storage: &SqliteStorage, name: &str) -> Deck {
        let mut deck = Deck::new_normal(name);
        storage.add_deck(&mut deck).unwrap();
        deck
    }

    #[test]
    fn test_deck_roundtrip_and_lookup_by_name() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let deck = add(&storage, "Languages");
        assert_eq!(storage.get_deck(deck.id).unwrap(), Some(deck.clone()));
        assert_eq!(
            storage.get_deck_by_name("languages").unwrap().map(|d| d.id),
            Some(deck.id)
        );
        assert!(storage.get_deck(DeckId(999)).unwrap().is_none());
    }

    #[test]
    fn test_today_counter_updates_ancestors() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let parent = add(&storage, "A");
        let child = add(&storage, "A::B");
        let sibling = add(&storage, "A::C");

        storage
            .update_deck_today(child.id, 12, DailyCounter::Review, 1, 3_000)
            .unwrap();

        let child = storage.get_deck_required(child.id).unwrap();
        let parent = storage.get_deck_required(parent.id).unwrap();
        let sibling = storage.get_deck_required(sibling.id).unwrap();
        assert_eq!(child.today.day, 12);
        assert_eq!(child.today.review, 1);
        assert_eq!(child.today.millis, 3_000);
        assert_eq!(parent.today.review, 1);
        assert_eq!(sibling.today.review, 0);

        storage
            .revert_deck_today(child.id, 12, DailyCounter::Review, 3_000)
            .unwrap();
        let parent = storage.get_deck_required(parent.id).unwrap();
        assert_eq!(parent.today.review, 0);
        assert_eq!(parent.today.millis, 0);
    }

    #[test]
    fn test_children_in_name_order() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let root = add(&storage, "A");
        add(&storage, "A::Z");
        add(&storage, "A::B");
        add(&storage, "AB");
        let names: Vec<String> = storage
            .deck_with_children(&root)
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["A", "A::B", "A::Z"]);
    }

    #[test]
    fn test_config_allocation() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let mut config = DeckConfig {
            id: DeckConfigId(0),
            name: "Custom".into(),
            ..Default::default()
        };
        storage.add_or_update_deck_config(&mut config).unwrap();
        assert_eq!(config.id, DeckConfigId(1));
        assert_eq!(storage.get_deck_config(config.id).unwrap(), Some(config));
        assert_eq!(storage.all_deck_configs().unwrap().len(), 1);
    }
}
