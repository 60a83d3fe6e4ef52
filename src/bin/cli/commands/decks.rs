use anyhow::{Context, Result};

use crate::app::App;
use crate::render::terminal::{paint, Color};
use crate::OutputFormat;

pub fn run_list(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let decks = app.collection.decks().context("Failed to list decks")?;
    let current = app.collection.current_deck()?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&decks)?);
        }
        OutputFormat::Plain => {
            for deck in &decks {
                let marker = if deck.id == current { "* " } else { "  " };
                let depth = deck.name.matches("::").count();
                let short = deck.name.rsplit("::").next().unwrap_or(&deck.name);
                let filtered = if deck.filtered {
                    paint(" [filtered]", Color::GRAY, use_color)
                } else {
                    String::new()
                };
                println!(
                    "{}{}{} ({} cards){}",
                    marker,
                    "  ".repeat(depth),
                    short,
                    deck.card_count,
                    filtered
                );
            }
        }
    }

    Ok(())
}

pub fn run_add(app: &mut App, name: &str, format: &OutputFormat) -> Result<()> {
    let id = app.collection.add_deck(name).context("Failed to add deck")?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "id": id, "name": name })),
        OutputFormat::Plain => println!("Added deck \"{}\" ({})", name, id),
    }
    Ok(())
}

pub fn run_use(app: &mut App, name: &str) -> Result<()> {
    let deck = app.find_deck(name)?;
    app.collection.set_current_deck(deck.id)?;
    println!("Now studying \"{}\"", deck.name);
    Ok(())
}

pub fn run_remove(app: &mut App, name: &str) -> Result<()> {
    let deck = app.find_deck(name)?;
    app.collection
        .remove_deck(deck.id)
        .with_context(|| format!("Failed to remove deck '{}'", deck.name))?;
    println!("Removed deck \"{}\"", deck.name);
    Ok(())
}
