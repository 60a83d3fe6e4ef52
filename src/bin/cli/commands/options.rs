use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use mnemos_lib::decks::{DeckConfigId, DeckConfigPresets};
use mnemos_lib::timestamp::TimestampSecs;

use crate::app::App;
use crate::render::terminal::{paint, Color};
use crate::OutputFormat;

pub fn run_show(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let configs = app.collection.deck_configs()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&configs)?),
        OutputFormat::Plain => {
            for config in &configs {
                println!("{} ({})", paint(&config.name, Color::BOLD, use_color), config.id);
                let steps: Vec<String> = config.new.steps_mins.iter().map(|s| format!("{}m", s)).collect();
                println!("  New: {}/day, steps {}", config.new.per_day, steps.join(" "));
                println!(
                    "  Reviews: {}/day, max interval {}d",
                    config.review.per_day, config.review.maximum_interval
                );
                let action = config
                    .lapse
                    .leech_action
                    .map(|action| format!("{:?}", action).to_lowercase())
                    .unwrap_or_else(|| "collection default".to_string());
                println!("  Lapses: leech after {} ({})", config.lapse.leech_threshold, action);
            }
        }
    }
    Ok(())
}

pub fn run_import(app: &mut App, file: &Path) -> Result<()> {
    let text = fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let presets = DeckConfigPresets::from_toml(&text)
        .with_context(|| format!("Failed to parse {}", file.display()))?
        .presets;

    let existing = app.collection.deck_configs()?;
    let now = TimestampSecs::now();
    for mut preset in presets {
        preset.id = existing
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(&preset.name))
            .map(|c| c.id)
            .unwrap_or(DeckConfigId(0));
        let replaced = preset.id.0 != 0;
        app.collection.add_or_update_deck_config(&mut preset, now)?;
        let verb = if replaced { "Updated" } else { "Added" };
        println!("{} options \"{}\" ({})", verb, preset.name, preset.id);
    }
    Ok(())
}

pub fn run_use(app: &mut App, deck_name: &str, preset_name: &str) -> Result<()> {
    let deck = app.find_deck(deck_name)?;
    let preset = app.find_preset(preset_name)?;
    app.collection.set_deck_config(deck.id, preset.id)?;
    println!("\"{}\" now uses options \"{}\"", deck.name, preset.name);
    Ok(())
}
