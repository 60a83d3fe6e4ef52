use anyhow::{bail, Context, Result};

use mnemos_lib::decks::{DeckKind, FilteredDeck, FilteredKind, FilteredOrder, FilteredSearch};
use mnemos_lib::timestamp::TimestampSecs;

use crate::app::App;
use crate::{FilterArg, FilterOrderArg, OutputFormat};

pub struct BuildRequest<'a> {
    pub name: &'a str,
    pub kind: FilterArg,
    pub limit: u32,
    pub order: FilterOrderArg,
    pub source: Option<&'a str>,
    pub preview: bool,
}

impl BuildRequest<'_> {
    fn to_filtered(&self, app: &App) -> Result<FilteredDeck> {
        let source_deck = match self.source {
            Some(name) => Some(app.find_deck(name)?.id),
            None => None,
        };
        Ok(FilteredDeck {
            search: FilteredSearch {
                source_deck,
                kind: match self.kind {
                    FilterArg::Due => FilteredKind::Due,
                    FilterArg::New => FilteredKind::New,
                    FilterArg::Any => FilteredKind::Any,
                },
                limit: self.limit,
                order: match self.order {
                    FilterOrderArg::Due => FilteredOrder::Due,
                    FilterOrderArg::Random => FilteredOrder::Random,
                    FilterOrderArg::Added => FilteredOrder::OldestAdded,
                },
            },
            reschedule: !self.preview,
            ..Default::default()
        })
    }
}

pub fn run_build(app: &mut App, request: BuildRequest, format: &OutputFormat) -> Result<()> {
    let filtered = request.to_filtered(app)?;
    let existing = app.collection.storage().get_deck_by_name(request.name)?;
    let deck_id = match existing {
        Some(mut deck) => {
            if !deck.is_filtered() {
                bail!("\"{}\" is a normal deck", deck.name);
            }
            deck.kind = DeckKind::Filtered(filtered);
            app.collection.storage().update_deck(&deck)?;
            deck.id
        }
        None => app
            .collection
            .add_filtered_deck(request.name, filtered)
            .context("Failed to create filtered deck")?,
    };

    let moved = app
        .collection
        .build_filtered_deck(deck_id, TimestampSecs::now())
        .context("Failed to build filtered deck")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "id": deck_id, "cards": moved })),
        OutputFormat::Plain => println!("Moved {} cards into \"{}\"", moved, request.name),
    }
    Ok(())
}

pub fn run_empty(app: &mut App, name: &str) -> Result<()> {
    let deck = app.find_deck(name)?;
    if !deck.is_filtered() {
        bail!("\"{}\" is not a filtered deck", deck.name);
    }
    let returned = app
        .collection
        .empty_filtered_deck(deck.id)
        .context("Failed to empty filtered deck")?;
    println!("Returned {} cards from \"{}\"", returned, deck.name);
    Ok(())
}
