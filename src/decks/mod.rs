//! Decks, deck options, and the limits they impose
//!
//! This module provides:
//! - Deck models (normal and filtered) with per-day counters
//! - Deck options presets shared between decks
//! - Resolution of the effective options for a card
//! - Daily new/review limits walked across the deck tree

pub mod config;
pub mod limits;
pub mod models;
pub mod resolver;

pub use config::{
    DeckConfig, DeckConfigId, DeckConfigPresets, LapseConfig, LeechAction, NewCardOrder,
    NewConfig, ReviewConfig,
};
pub use limits::WalkingLimits;
pub use models::*;
pub use resolver::{DeckConfigResolver, FilteredOptions, ResolvedConfig};
