//! Versioned JSON envelopes for the persisted subset of each store.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::state::{CaughtPokemon, ListState, PokemonListItem};

pub const POKEDEX_STORAGE_KEY: &str = "pokedex-store";
pub const POKEDEX_SCHEMA_VERSION: u32 = 1;

pub const POKEMON_LIST_STORAGE_KEY: &str = "pokemon-list-store";
pub const POKEMON_LIST_SCHEMA_VERSION: u32 = 0;

/// `{ "state": {...}, "version": n }`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub state: T,
    pub version: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCollection {
    pub collection: Vec<CaughtPokemon>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedList {
    pub items: Vec<PokemonListItem>,
    pub current_offset: u32,
    pub total_count: u32,
}

impl PersistedList {
    pub fn from_state(state: &ListState) -> Self {
        Self {
            items: state.items.clone(),
            current_offset: state.current_offset,
            total_count: state.total_count,
        }
    }
}

pub fn encode<T: Serialize>(state: &T, version: u32) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Envelope { state, version })
}

/// Decodes an envelope written by this schema version.
pub fn decode<T: DeserializeOwned>(raw: &str, version: u32) -> Result<T, DecodeError> {
    let envelope: Envelope<T> = serde_json::from_str(raw)?;
    if envelope.version != version {
        return Err(DecodeError::VersionMismatch {
            found: envelope.version,
            expected: version,
        });
    }
    Ok(envelope.state)
}

#[derive(Deserialize)]
struct LooseEnvelope {
    state: LooseCollectionState,
}

#[derive(Deserialize)]
struct LooseCollectionState {
    #[serde(default)]
    collection: Option<Vec<CaughtPokemon>>,
}

/// Reads `state.collection` from a collection envelope written by another tab.
///
/// The version is neither checked nor required. `Ok(None)` means the payload decoded but carried
/// no collection sequence.
pub fn decode_synced_collection(raw: &str) -> Result<Option<Vec<CaughtPokemon>>, DecodeError> {
    let envelope: LooseEnvelope = serde_json::from_str(raw)?;
    Ok(envelope.state.collection)
}
