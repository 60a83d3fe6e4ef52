use anyhow::{Context, Result};

use crate::app::App;
use crate::OutputFormat;

pub fn run(
    app: &mut App,
    deck_name: &str,
    count: u32,
    cards_per_note: u16,
    tags: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let deck = app.collection.add_deck(deck_name).context("Failed to find or create deck")?;
    let tags: Vec<String> = tags
        .map(|t| {
            t.split(',')
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut added = Vec::new();
    for _ in 0..count {
        let (note, cards) = app
            .collection
            .add_note(deck, cards_per_note, tags.clone())
            .context("Failed to add note")?;
        added.push((note, cards));
    }

    match format {
        OutputFormat::Json => {
            let output: Vec<_> = added
                .iter()
                .map(|(note, cards)| serde_json::json!({ "noteId": note, "cardIds": cards }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            let card_total: usize = added.iter().map(|(_, cards)| cards.len()).sum();
            println!("Added {} notes ({} cards) to \"{}\"", added.len(), card_total, deck_name);
            if !tags.is_empty() {
                println!("  Tags: {}", tags.iter().map(|t| format!("#{}", t)).collect::<Vec<_>>().join(" "));
            }
        }
    }

    Ok(())
}
