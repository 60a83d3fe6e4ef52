//! Resolving the effective options for a card
//!
//! A card in a normal deck uses that deck's options. A card in a filtered deck
//! uses its home deck's options, combined with the filtered deck's own
//! reschedule and preview settings. Missing decks or options fall back to
//! options id 1 and then to the built-in defaults; absence is never an error.

use std::collections::HashMap;

use super::{Deck, DeckConfig, DeckConfigId, DeckId, LeechAction};
use crate::card::Card;
use crate::storage::{Result, SqliteStorage};

/// Settings a filtered deck layers over the home deck's options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilteredOptions {
    pub deck_id: DeckId,
    pub reschedule: bool,
    pub preview_delay_mins: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub config: DeckConfig,
    pub filtered: Option<FilteredOptions>,
    pub home_deck: DeckId,
    pub leech_action: LeechAction,
}

impl ResolvedConfig {
    /// Answers only move the card between queues; interval and ease stay put.
    pub fn previewing(&self) -> bool {
        self.filtered.map(|f| !f.reschedule).unwrap_or(false)
    }

    pub fn preview_delay_secs(&self) -> i64 {
        self.filtered
            .map(|f| f.preview_delay_mins as i64 * 60)
            .unwrap_or(0)
    }
}

/// Caches deck and options lookups until the next queue reset
#[derive(Debug, Default)]
pub struct DeckConfigResolver {
    decks: HashMap<DeckId, Option<Deck>>,
    configs: HashMap<DeckConfigId, Option<DeckConfig>>,
    default_leech_action: Option<LeechAction>,
}

impl DeckConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.decks.clear();
        self.configs.clear();
        self.default_leech_action = None;
    }

    pub fn deck(&mut self, storage: &SqliteStorage, id: DeckId) -> Result<Option<Deck>> {
        if let Some(deck) = self.decks.get(&id) {
            return Ok(deck.clone());
        }
        let deck = storage.get_deck(id)?;
        self.decks.insert(id, deck.clone());
        Ok(deck)
    }

    fn stored_config(
        &mut self,
        storage: &SqliteStorage,
        id: DeckConfigId,
    ) -> Result<Option<DeckConfig>> {
        if let Some(config) = self.configs.get(&id) {
            return Ok(config.clone());
        }
        let config = storage.get_deck_config(id)?;
        self.configs.insert(id, config.clone());
        Ok(config)
    }

    /// Options of a normal deck, with fallbacks. Filtered or missing decks get
    /// the fallback options.
    pub fn config_for_deck(&mut self, storage: &SqliteStorage, id: DeckId) -> Result<DeckConfig> {
        let config_id = self
            .deck(storage, id)?
            .and_then(|deck| deck.config_id())
            .unwrap_or(DeckConfigId(1));

        if let Some(config) = self.stored_config(storage, config_id)? {
            return Ok(config);
        }
        if config_id != DeckConfigId(1) {
            log::debug!("Deck {} points at missing options {}, using defaults", id, config_id);
            if let Some(config) = self.stored_config(storage, DeckConfigId(1))? {
                return Ok(config);
            }
        }
        Ok(DeckConfig::default())
    }

    pub fn config_for(&mut self, storage: &SqliteStorage, card: &Card) -> Result<ResolvedConfig> {
        let current = self.deck(storage, card.deck_id)?;
        let filtered = current.as_ref().and_then(|deck| {
            deck.filtered().map(|f| FilteredOptions {
                deck_id: deck.id,
                reschedule: f.reschedule,
                preview_delay_mins: f.preview_delay_mins,
            })
        });

        let home_deck = card.home_deck_id();
        let config = self.config_for_deck(storage, home_deck)?;
        let leech_action = match config.lapse.leech_action {
            Some(action) => action,
            None => self.default_leech_action(storage)?,
        };

        Ok(ResolvedConfig {
            config,
            filtered,
            home_deck,
            leech_action,
        })
    }

    fn default_leech_action(&mut self, storage: &SqliteStorage) -> Result<LeechAction> {
        if let Some(action) = self.default_leech_action {
            return Ok(action);
        }
        let action = storage.default_leech_action()?;
        self.default_leech_action = Some(action);
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{CardQueue, CardType, Due};
    use crate::config::ConfigKey;
    use crate::decks::{DeckKind, FilteredDeck};
    use crate::notes::NoteId;

    fn create_test_storage() -> SqliteStorage {
        SqliteStorage::open_in_memory().unwrap()
    }

    fn add_deck(storage: &SqliteStorage, mut deck: Deck) -> Deck {
        storage.add_deck(&mut deck).unwrap();
        deck
    }

    #[test]
    fn test_missing_everything_gives_defaults() {
        let storage = create_test_storage();
        let mut resolver = DeckConfigResolver::new();
        let card = Card::new(NoteId(1), 0, DeckId(42), 0);
        let resolved = resolver.config_for(&storage, &card).unwrap();
        assert_eq!(resolved.config, DeckConfig::default());
        assert!(resolved.filtered.is_none());
        assert!(!resolved.previewing());
        assert_eq!(resolved.leech_action, LeechAction::TagOnly);
    }

    #[test]
    fn test_missing_config_falls_back_to_first() {
        let storage = create_test_storage();
        let mut base = DeckConfig {
            name: "Base".into(),
            ..Default::default()
        };
        base.new.per_day = 7;
        storage.add_or_update_deck_config(&mut base).unwrap();

        let mut deck = Deck::new_normal("Orphan");
        deck.kind = DeckKind::Normal {
            config_id: DeckConfigId(99),
        };
        let deck = add_deck(&storage, deck);

        let mut resolver = DeckConfigResolver::new();
        let config = resolver.config_for_deck(&storage, deck.id).unwrap();
        assert_eq!(config.new.per_day, 7);
    }

    #[test]
    fn test_filtered_deck_merges_home_options() {
        let storage = create_test_storage();
        let mut custom = DeckConfig {
            id: DeckConfigId(0),
            name: "Custom".into(),
            ..Default::default()
        };
        custom.lapse.leech_threshold = 3;
        storage.add_or_update_deck_config(&mut custom).unwrap();
        storage
            .set_config(ConfigKey::LeechAction, &LeechAction::Suspend)
            .unwrap();

        let mut home = Deck::new_normal("Home");
        home.kind = DeckKind::Normal {
            config_id: custom.id,
        };
        let home = add_deck(&storage, home);
        let filtered = add_deck(
            &storage,
            Deck::new_filtered(
                "Cram",
                FilteredDeck {
                    reschedule: false,
                    preview_delay_mins: 5,
                    ..Default::default()
                },
            ),
        );

        let card = Card {
            deck_id: filtered.id,
            original_deck_id: home.id,
            ctype: CardType::Review,
            queue: CardQueue::Review,
            due: Due::Day(0),
            original_due: 30,
            ..Default::default()
        };

        let mut resolver = DeckConfigResolver::new();
        let resolved = resolver.config_for(&storage, &card).unwrap();
        assert_eq!(resolved.config.lapse.leech_threshold, 3);
        assert_eq!(resolved.home_deck, home.id);
        assert!(resolved.previewing());
        assert_eq!(resolved.preview_delay_secs(), 300);
        assert_eq!(resolved.leech_action, LeechAction::Suspend);
    }

    #[test]
    fn test_cache_is_dropped_on_clear() {
        let storage = create_test_storage();
        let mut config = DeckConfig::default();
        storage.add_or_update_deck_config(&mut config).unwrap();
        let deck = add_deck(&storage, Deck::new_normal("A"));

        let mut resolver = DeckConfigResolver::new();
        assert_eq!(resolver.config_for_deck(&storage, deck.id).unwrap().new.per_day, 20);

        config.new.per_day = 5;
        storage.add_or_update_deck_config(&mut config).unwrap();
        assert_eq!(resolver.config_for_deck(&storage, deck.id).unwrap().new.per_day, 20);

        resolver.clear();
        assert_eq!(resolver.config_for_deck(&storage, deck.id).unwrap().new.per_day, 5);
    }
}
