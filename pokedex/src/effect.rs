//! Effects - side effects declared by the reducers

use crate::persist::PersistedList;
use crate::query::DetailQuery;
use crate::state::CaughtPokemon;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CollectionEffect {
    /// Write the collection envelope to durable storage.
    Persist(Vec<CaughtPokemon>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListEffect {
    /// Fetch one page of summaries, then every detail on it.
    FetchPage { offset: u32, limit: u32, force: bool },
    Persist(PersistedList),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetailEffect {
    FetchDetail { query: DetailQuery, force: bool },
}
