//! Client-side state for a Pokedex: a paginated, cached pokemon list, a detail
//! lookup, and a caught collection persisted to storage and kept in sync
//! across tabs.
//!
//! Each store is a `tui_dispatch::EffectStore` with a pure reducer. The
//! orchestrators ([`CollectionSync`], [`PokemonList`], [`PokemonDetail`]) run
//! the effects those reducers declare.

pub mod action;
pub mod api;
pub mod collection;
pub mod config;
pub mod debounce;
pub mod effect;
pub mod error;
pub mod persist;
pub mod pokemon_detail;
pub mod pokemon_list;
pub mod query;
pub mod reducer;
pub mod sprite;
pub mod state;
pub mod storage;
pub mod store;
pub mod types;

pub use api::{PokeApiClient, PokemonRecord, PokemonSource, SpriteSet, SummaryPage, SummaryRef};
pub use collection::{CollectionSync, SharedCollectionStore};
pub use config::Config;
pub use pokemon_detail::{PokemonDetail, SharedDetailStore};
pub use pokemon_list::{ListOptions, PokemonList, SharedListStore};
pub use query::{DetailKey, DetailQuery, ResponseCache, RetryPolicy};
pub use state::{
    CatchStatus, CaughtPokemon, DetailStatus, ListStatus, NewCatch, PokemonDetailDisplay,
    PokemonListItem,
};
pub use storage::{ChangeNotifier, FileStorage, MemoryStorage, Storage, StorageChange};
pub use store::{CollectionStore, DetailStore, ListStore};
pub use types::PokemonType;
