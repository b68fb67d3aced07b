//! Remote pokemon data source and the PokeAPI client behind it.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::error::SourceError;
use crate::query::{DETAIL_STALE_TIME, LIST_STALE_TIME};

pub const API_BASE: &str = "https://pokeapi.co/api/v2";

/// Reference to a pokemon resource in a list page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRef {
    pub name: String,
    pub url: String,
}

/// One page of `GET /pokemon`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryPage {
    pub results: Vec<SummaryRef>,
    pub count: u32,
}

/// The sprite URLs we care about; any may be missing upstream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteSet {
    pub front_default: Option<String>,
    pub official_artwork: Option<String>,
}

/// `GET /pokemon/{id_or_name}`, reduced to the fields the stores use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokemonRecord {
    pub id: u32,
    pub name: String,
    /// Type names in slot order.
    pub types: Vec<String>,
    pub sprites: SpriteSet,
}

/// `force` asks the source to skip any cache of its own.
#[async_trait(?Send)]
pub trait PokemonSource {
    async fn list_summaries(
        &self,
        offset: u32,
        limit: u32,
        force: bool,
    ) -> Result<SummaryPage, SourceError>;

    /// Fails with `SourceError::NotFound` when the pokemon does not exist.
    async fn detail(&self, id_or_name: &str, force: bool) -> Result<PokemonRecord, SourceError>;
}

#[derive(Clone, Debug, Deserialize)]
struct NamedResource {
    name: String,
}

#[derive(Clone, Debug, Deserialize)]
struct PokemonResponse {
    id: u32,
    name: String,
    types: Vec<PokemonTypeSlot>,
    sprites: serde_json::Value,
}

#[derive(Clone, Debug, Deserialize)]
struct PokemonTypeSlot {
    slot: u8,
    #[serde(rename = "type")]
    type_info: NamedResource,
}

impl From<PokemonResponse> for PokemonRecord {
    fn from(response: PokemonResponse) -> Self {
        let mut slots = response.types;
        slots.sort_by_key(|slot| slot.slot);
        PokemonRecord {
            id: response.id,
            name: response.name,
            types: slots.into_iter().map(|slot| slot.type_info.name).collect(),
            sprites: SpriteSet {
                front_default: pointer_string(&response.sprites, "/front_default"),
                official_artwork: pointer_string(
                    &response.sprites,
                    "/other/official-artwork/front_default",
                ),
            },
        }
    }
}

fn pointer_string(value: &serde_json::Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(|val| val.as_str())
        .map(|s| s.to_string())
}

/// HTTP client for PokeAPI with an optional on-disk body cache.
///
/// Cached bodies expire on the same schedule as the in-memory response cache.
pub struct PokeApiClient {
    client: reqwest::Client,
    base_url: String,
    cache_dir: Option<PathBuf>,
    page_max_age: Duration,
    detail_max_age: Duration,
}

impl PokeApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache_dir: None,
            page_max_age: LIST_STALE_TIME,
            detail_max_age: DETAIL_STALE_TIME,
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_cache_max_age(mut self, pages: Duration, details: Duration) -> Self {
        self.page_max_age = pages;
        self.detail_max_age = details;
        self
    }

    async fn fetch_json_cached<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        resource: &str,
        max_age: Option<Duration>,
    ) -> Result<T, SourceError> {
        let bytes = self.fetch_bytes_cached(url, resource, max_age).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(value),
            Err(err) => {
                if let Some(path) = self.cache_path(url) {
                    let _ = fs::remove_file(&path).await;
                }
                Err(SourceError::Decode(err.to_string()))
            }
        }
    }

    /// `max_age` of `None` skips the cache read; the response is still written back.
    async fn fetch_bytes_cached(
        &self,
        url: &str,
        resource: &str,
        max_age: Option<Duration>,
    ) -> Result<Vec<u8>, SourceError> {
        let cache_path = self.cache_path(url);
        if let (Some(path), Some(max_age)) = (&cache_path, max_age) {
            if let Some(bytes) = read_cache(path, max_age).await {
                tracing::debug!(%url, "http cache hit");
                return Ok(bytes);
            }
        }

        tracing::debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(resource.to_string()));
        }
        let response = response.error_for_status()?;
        let bytes = response.bytes().await?.to_vec();
        if let Some(path) = &cache_path {
            write_cache(path, &bytes).await;
        }
        Ok(bytes)
    }

    fn cache_path(&self, url: &str) -> Option<PathBuf> {
        let root = self.cache_dir.as_ref()?;
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let digest = hex::encode(hasher.finalize());
        Some(root.join("http").join(digest))
    }
}

impl Default for PokeApiClient {
    fn default() -> Self {
        Self::new(API_BASE)
    }
}

#[async_trait(?Send)]
impl PokemonSource for PokeApiClient {
    async fn list_summaries(
        &self,
        offset: u32,
        limit: u32,
        force: bool,
    ) -> Result<SummaryPage, SourceError> {
        let url = format!("{}/pokemon?offset={offset}&limit={limit}", self.base_url);
        let max_age = (!force).then_some(self.page_max_age);
        self.fetch_json_cached(&url, "pokemon list", max_age).await
    }

    async fn detail(&self, id_or_name: &str, force: bool) -> Result<PokemonRecord, SourceError> {
        let url = format!("{}/pokemon/{id_or_name}", self.base_url);
        let max_age = (!force).then_some(self.detail_max_age);
        let response: PokemonResponse = self.fetch_json_cached(&url, id_or_name, max_age).await?;
        Ok(response.into())
    }
}

/// Reads a cached body unless it is older than `max_age`.
async fn read_cache(path: &Path, max_age: Duration) -> Option<Vec<u8>> {
    let modified = fs::metadata(path).await.ok()?.modified().ok()?;
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    if age >= max_age {
        return None;
    }
    fs::read(path).await.ok()
}

async fn write_cache(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent).await;
    }
    if let Err(err) = fs::write(path, bytes).await {
        tracing::warn!(path = %path.display(), error = %err, "failed to write http cache");
    }
}
