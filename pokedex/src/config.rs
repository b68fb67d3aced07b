use std::path::PathBuf;
use std::time::Duration;

use crate::api::API_BASE;
use crate::pokemon_list::{ListOptions, DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_DEBOUNCE};
use crate::query::RetryPolicy;
use crate::storage::FileStorage;

#[derive(clap::Args, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// PokeAPI base URL
    #[arg(long, default_value = API_BASE)]
    pub api_base: String,

    /// Directory for persisted stores (default: platform data dir)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Directory for the HTTP response cache (default: platform cache dir)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Skip the on-disk HTTP response cache
    #[arg(long)]
    pub no_http_cache: bool,

    /// Pokemon per list page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..))]
    pub page_size: u32,

    /// Search debounce in milliseconds
    #[arg(long, default_value_t = 300)]
    pub search_debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: API_BASE.to_string(),
            data_dir: None,
            cache_dir: None,
            no_http_cache: false,
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE.as_millis() as u64,
        }
    }
}

impl Config {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(FileStorage::default_dir)
    }

    /// `None` when the HTTP cache is disabled.
    pub fn http_cache_dir(&self) -> Option<PathBuf> {
        if self.no_http_cache {
            return None;
        }
        self.cache_dir.clone().or_else(|| {
            dirs_next::cache_dir().map(|dir| dir.join("pokedex"))
        })
    }

    pub fn list_options(&self) -> ListOptions {
        ListOptions {
            page_size: self.page_size,
            search_debounce: Duration::from_millis(self.search_debounce_ms),
            retry: RetryPolicy::LIST,
        }
    }
}
