use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use mnemos_lib::config::ConfigKey;
use mnemos_lib::decks::{Deck, DeckConfig};
use mnemos_lib::{CardId, Collection};

const SETTINGS_FILE: &str = "settings.toml";
const COLLECTION_FILE: &str = "collection.db";

/// Optional `settings.toml` in the data directory
///
/// ```toml
/// collection = "/home/me/cards/collection.db"
/// learn_ahead_mins = 20
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub collection: Option<PathBuf>,
    pub learn_ahead_mins: Option<u32>,
    /// Seed for interval fuzz, for repeatable sessions
    pub seed: Option<u64>,
}

impl Settings {
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Shared application state for CLI commands
pub struct App {
    pub collection: Collection,
    pub path: PathBuf,
}

impl App {
    /// Open the collection named on the command line, in the settings file,
    /// or in the default data directory, in that order.
    pub fn open(collection: Option<&Path>) -> Result<Self> {
        let data_dir = dirs::data_local_dir()
            .map(|dir| dir.join("mnemos"))
            .context("Failed to get data directory")?;
        let settings = Settings::load(&data_dir)?;

        let path = collection
            .map(Path::to_path_buf)
            .or(settings.collection.clone())
            .unwrap_or_else(|| data_dir.join(COLLECTION_FILE));
        let mut collection = Collection::open(&path)
            .with_context(|| format!("Failed to open collection at {}", path.display()))?;

        if let Some(mins) = settings.learn_ahead_mins {
            collection.set_config(ConfigKey::LearnAheadSecs, &(mins * 60))?;
            collection.save()?;
        }
        if let Some(seed) = settings.seed {
            collection.seed_rng(seed);
        }
        Ok(Self { collection, path })
    }

    pub fn close(self) -> Result<()> {
        self.collection.close().context("Failed to save collection")
    }

    /// Find a deck by name (case-insensitive, exact match before prefix match)
    pub fn find_deck(&self, name: &str) -> Result<Deck> {
        let decks = self.collection.storage().all_decks().context("Failed to list decks")?;
        let name_lower = name.to_lowercase();

        if let Some(deck) = decks.iter().find(|d| d.name.to_lowercase() == name_lower) {
            return Ok(deck.clone());
        }

        let matches: Vec<&Deck> = decks
            .iter()
            .filter(|d| d.name.to_lowercase().starts_with(&name_lower))
            .collect();

        match matches.len() {
            0 => bail!(
                "No deck matching '{}'. Available decks:\n{}",
                name,
                decks.iter().map(|d| format!("  - {}", d.name)).collect::<Vec<_>>().join("\n")
            ),
            1 => Ok(matches[0].clone()),
            _ => bail!(
                "Ambiguous deck name '{}'. Matches:\n{}",
                name,
                matches.iter().map(|d| format!("  - {}", d.name)).collect::<Vec<_>>().join("\n")
            ),
        }
    }

    pub fn find_preset(&self, name: &str) -> Result<DeckConfig> {
        let configs = self.collection.deck_configs().context("Failed to list deck options")?;
        configs
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .with_context(|| format!("No deck options named '{}'", name))
    }

    pub fn card_ids(ids: &[i64]) -> Vec<CardId> {
        ids.iter().copied().map(CardId).collect()
    }
}
