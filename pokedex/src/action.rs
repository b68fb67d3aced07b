//! Actions for the three stores.
//!
//! Plain setters mirror the store operations; `*Fetch` intents and `*Did*`
//! results are dispatched by the orchestrators around remote calls.

use serde::{Deserialize, Serialize};

use crate::persist::PersistedList;
use crate::query::DetailQuery;
use crate::state::{
    CaughtPokemon, DetailStatus, ListStatus, NewCatch, PokemonDetailDisplay, PokemonListItem,
};

#[derive(tui_dispatch::Action, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CollectionAction {
    /// Insert unless the id is already caught. `caught_at` is stamped by the caller.
    Catch { pokemon: NewCatch, caught_at: String },
    Release(u32),
    /// Wholesale replace from hydration or another tab's write.
    ReplaceAll(Vec<CaughtPokemon>),
    SetHydrated(bool),
}

#[derive(tui_dispatch::Action, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ListAction {
    SetItems(Vec<PokemonListItem>),
    AppendItems(Vec<PokemonListItem>),
    SetStatus(ListStatus),
    SetSearchQuery(String),
    SetCurrentOffset(u32),
    SetTotalCount(u32),
    Reset,

    /// Restore the persisted subset.
    DidHydrate(PersistedList),

    /// Intent: fetch the page at the current offset.
    PageFetch { limit: u32, force: bool },
    /// Intent: advance to the next page if there is one and nothing is in flight.
    NextPage { page_size: u32 },
    PageDidLoad {
        offset: u32,
        items: Vec<PokemonListItem>,
        total_count: u32,
    },
    PageDidError { offset: u32, message: String },
}

#[derive(tui_dispatch::Action, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DetailAction {
    SetCurrentDetail(PokemonDetailDisplay),
    SetStatus(DetailStatus),
    /// Leaving the detail view.
    Clear,

    DetailFetch { query: DetailQuery, force: bool },
    DetailDidLoad(PokemonDetailDisplay),
    DetailDidNotFound,
    DetailDidError(String),
}
