use anyhow::Result;

use crate::app::App;
use crate::render::terminal::render_counts;
use crate::OutputFormat;

pub fn run(app: &mut App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let counts = app.collection.counts()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&counts)?),
        OutputFormat::Plain => {
            let deck = app.collection.storage().get_deck(app.collection.current_deck()?)?;
            let name = deck.map(|d| d.name).unwrap_or_else(|| "(no deck)".to_string());
            println!("{}: {}", name, render_counts(&counts, use_color));
        }
    }
    Ok(())
}
