use anyhow::{Context, Result};

use mnemos_lib::timestamp::TimestampSecs;

use crate::app::App;

pub fn run_suspend(app: &mut App, ids: &[i64]) -> Result<()> {
    let changed = app
        .collection
        .suspend_cards(&App::card_ids(ids), TimestampSecs::now())
        .context("Failed to suspend cards")?;
    println!("Suspended {} cards", changed);
    Ok(())
}

pub fn run_unsuspend(app: &mut App, ids: &[i64]) -> Result<()> {
    let changed = app
        .collection
        .restore_cards(&App::card_ids(ids), TimestampSecs::now())
        .context("Failed to unsuspend cards")?;
    println!("Restored {} cards", changed);
    Ok(())
}

pub fn run_bury(app: &mut App, ids: &[i64]) -> Result<()> {
    let changed = app
        .collection
        .bury_cards(&App::card_ids(ids), true, TimestampSecs::now())
        .context("Failed to bury cards")?;
    println!("Buried {} cards until tomorrow", changed);
    Ok(())
}

pub fn run_sort(app: &mut App, deck_name: &str, random: bool) -> Result<()> {
    let deck = app.find_deck(deck_name)?;
    let changed = app
        .collection
        .sort_deck(deck.id, random, TimestampSecs::now())
        .context("Failed to sort deck")?;
    let how = if random { "randomly" } else { "by note" };
    println!("Repositioned {} new cards in \"{}\" {}", changed, deck.name, how);
    Ok(())
}

pub fn run_forget(app: &mut App, ids: &[i64], log: bool) -> Result<()> {
    app.collection
        .reschedule_cards_as_new(&App::card_ids(ids), log, TimestampSecs::now())
        .context("Failed to reset cards")?;
    println!("Reset {} cards to new", ids.len());
    Ok(())
}
