//! Daily study limits across the deck tree
//!
//! A deck can show at most `per_day - studied_today` cards of a kind, and never
//! more than any of its ancestors has left. Cards taken by one child use up
//! the parent's allowance for the others. Collection-wide caps, when set,
//! act as a limit on a virtual root above every deck.

use std::collections::HashMap;

use super::{DailyCounter, Deck, DeckConfigResolver};
use crate::storage::{Result, SqliteStorage};

/// Key for the virtual root that carries collection-wide caps
const ROOT: &str = "";

/// The limit a single deck imposes on itself, ignoring its ancestors.
pub fn own_limit(
    storage: &SqliteStorage,
    resolver: &mut DeckConfigResolver,
    deck: &Deck,
    today: u32,
    kind: DailyCounter,
) -> Result<u32> {
    if deck.is_filtered() {
        return Ok(u32::MAX);
    }
    let config = resolver.config_for_deck(storage, deck.id)?;
    let per_day = match kind {
        DailyCounter::New => config.new.per_day,
        DailyCounter::Review => config.review.per_day,
        DailyCounter::Learn => return Ok(u32::MAX),
    };
    let done = deck.today.for_day(today).get(kind);
    Ok((per_day as i64 - done as i64).clamp(0, u32::MAX as i64) as u32)
}

/// Remaining allowances, consumed deck by deck while a queue is filled
#[derive(Debug, Clone)]
pub struct WalkingLimits {
    kind: DailyCounter,
    today: u32,
    remaining: HashMap<String, u32>,
}

impl WalkingLimits {
    /// Seed the walk for studying `current`: its ancestors' limits and the
    /// collection cap apply before any deck in the tree is visited.
    pub fn new(
        storage: &SqliteStorage,
        resolver: &mut DeckConfigResolver,
        current: &Deck,
        today: u32,
        kind: DailyCounter,
    ) -> Result<Self> {
        let mut limits = Self {
            kind,
            today,
            remaining: HashMap::new(),
        };

        let cap = match kind {
            DailyCounter::New => storage.collection_new_limit()?,
            DailyCounter::Review => storage.collection_review_limit()?,
            DailyCounter::Learn => None,
        };
        if let Some(cap) = cap {
            let done = studied_today(storage, today, kind)?;
            limits
                .remaining
                .insert(ROOT.to_string(), (cap as i64 - done as i64).max(0) as u32);
        }

        for name in current.ancestor_names() {
            if let Some(parent) = storage.get_deck_by_name(&name)? {
                let own = own_limit(storage, resolver, &parent, today, kind)?;
                let limit = own.min(limits.inherited(&parent));
                limits.remaining.insert(key(&parent.name), limit);
            }
        }
        Ok(limits)
    }

    /// Smallest allowance left among the deck's ancestors and the root.
    fn inherited(&self, deck: &Deck) -> u32 {
        let mut limit = self.remaining.get(ROOT).copied().unwrap_or(u32::MAX);
        for name in deck.ancestor_names() {
            if let Some(remaining) = self.remaining.get(&key(&name)) {
                limit = limit.min(*remaining);
            }
        }
        limit
    }

    /// How many cards `deck` may contribute right now.
    pub fn limit_for(
        &self,
        storage: &SqliteStorage,
        resolver: &mut DeckConfigResolver,
        deck: &Deck,
    ) -> Result<u32> {
        if let Some(remaining) = self.remaining.get(&key(&deck.name)) {
            return Ok(*remaining);
        }
        let own = own_limit(storage, resolver, deck, self.today, self.kind)?;
        Ok(own.min(self.inherited(deck)))
    }

    /// Record that `deck` contributed `taken` cards under a limit of `limit`.
    pub fn consume(&mut self, deck: &Deck, limit: u32, taken: u32) {
        self.remaining
            .insert(key(&deck.name), limit.saturating_sub(taken));
        if let Some(root) = self.remaining.get_mut(ROOT) {
            *root = root.saturating_sub(taken);
        }
        for name in deck.ancestor_names() {
            if let Some(remaining) = self.remaining.get_mut(&key(&name)) {
                *remaining = remaining.saturating_sub(taken);
            }
        }
    }
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

/// Cards of `kind` studied today across the whole collection.
fn studied_today(storage: &SqliteStorage, today: u32, kind: DailyCounter) -> Result<u32> {
    let total: i64 = storage
        .all_decks()?
        .iter()
        .filter(|deck| deck.depth() == 0)
        .map(|deck| deck.today.for_day(today).get(kind) as i64)
        .sum();
    Ok(total.max(0) as u32)
}
