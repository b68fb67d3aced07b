//! Store state - the data model shared by all three stores.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::PokemonType;

/// Number of entries in the Kanto pokedex; stands in for the total before
/// the list store has learned the real count.
pub const KANTO_DEX_COUNT: u32 = 151;

/// A pokemon in the user's collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaughtPokemon {
    pub id: u32,
    pub name: String,
    pub image_url: String,
    pub types: Vec<String>,
    /// ISO-8601 timestamp assigned when the pokemon was first caught.
    pub caught_at: String,
}

/// What the presentation layer hands to `catch`; the timestamp is stamped on insert.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCatch {
    pub id: u32,
    pub name: String,
    pub image_url: String,
    pub types: Vec<String>,
}

impl NewCatch {
    pub fn into_caught(self, caught_at: String) -> CaughtPokemon {
        CaughtPokemon {
            id: self.id,
            name: self.name,
            image_url: self.image_url,
            types: self.types,
            caught_at,
        }
    }
}

impl From<&PokemonDetailDisplay> for NewCatch {
    fn from(detail: &PokemonDetailDisplay) -> Self {
        Self {
            id: detail.id,
            name: detail.name.clone(),
            image_url: detail.image_url.clone(),
            types: detail.types.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatchStatus {
    Caught,
    Uncaught,
}

/// One row of the accumulated pokemon list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PokemonListItem {
    pub id: u32,
    pub name: String,
    pub sprite_url: String,
    pub types: Vec<String>,
}

/// The pokemon currently shown on the detail view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PokemonDetailDisplay {
    pub id: u32,
    pub name: String,
    pub image_url: String,
    pub types: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListStatus {
    #[default]
    Idle,
    Loading,
    LoadingMore,
    Success,
    Error,
}

impl ListStatus {
    pub fn is_fetching(self) -> bool {
        matches!(self, ListStatus::Loading | ListStatus::LoadingMore)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetailStatus {
    #[default]
    Idle,
    Loading,
    Success,
    NotFound,
    Error,
}

/// Caught collection plus the session-only hydration flag.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectionState {
    /// Replaced wholesale on every change, so `Arc::ptr_eq` tells observers
    /// whether anything happened.
    pub collection: Arc<Vec<CaughtPokemon>>,
    pub hydrated: bool,
}

impl CollectionState {
    pub fn is_caught(&self, id: u32) -> bool {
        self.collection.iter().any(|pokemon| pokemon.id == id)
    }

    pub fn catch_status_of(&self, id: u32) -> CatchStatus {
        if self.is_caught(id) {
            CatchStatus::Caught
        } else {
            CatchStatus::Uncaught
        }
    }

    pub fn count(&self) -> usize {
        self.collection.len()
    }

    /// Newest catch first.
    pub fn sorted_by_recent(&self) -> Vec<CaughtPokemon> {
        let mut sorted = self.collection.as_ref().clone();
        sorted.sort_by(|a, b| caught_at_key(b).cmp(&caught_at_key(a)));
        sorted
    }

    /// Fraction of `total` caught, clamped to `[0, 1]`.
    pub fn progress(&self, total: u32) -> f64 {
        if total == 0 {
            return 0.0;
        }
        (self.count() as f64 / f64::from(total)).min(1.0)
    }

    /// Caught count per primary type, in type order.
    pub fn count_by_primary_type(&self) -> Vec<(PokemonType, usize)> {
        let mut counts: BTreeMap<PokemonType, usize> = BTreeMap::new();
        for pokemon in self.collection.iter() {
            let primary = pokemon
                .types
                .first()
                .map(|name| PokemonType::parse(name))
                .unwrap_or(PokemonType::Unknown);
            *counts.entry(primary).or_default() += 1;
        }
        counts.into_iter().collect()
    }
}

fn caught_at_key(pokemon: &CaughtPokemon) -> i64 {
    chrono::DateTime::parse_from_rfc3339(&pokemon.caught_at)
        .map(|at| at.timestamp_millis())
        .unwrap_or(i64::MIN)
}

/// Paginated list cache plus session-only search and status.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListState {
    pub items: Vec<PokemonListItem>,
    pub status: ListStatus,
    pub search_query: String,
    pub current_offset: u32,
    pub total_count: u32,
}

impl ListState {
    pub fn has_next_page(&self, page_size: u32) -> bool {
        self.current_offset.saturating_add(page_size) < self.total_count
    }

    /// How far through `total_count` the loaded pages reach.
    pub fn loaded_through(&self, page_size: u32) -> u32 {
        self.current_offset
            .saturating_add(page_size)
            .min(self.total_count)
    }

    pub fn is_fetching_next_page(&self) -> bool {
        self.status == ListStatus::LoadingMore
    }

    /// Total to show against the collection count.
    pub fn dex_total(&self) -> u32 {
        if self.total_count > 0 {
            self.total_count
        } else {
            KANTO_DEX_COUNT
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetailState {
    pub current_detail: Option<PokemonDetailDisplay>,
    pub status: DetailStatus,
}
