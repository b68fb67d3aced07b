//! List orchestrator: pages through pokemon summaries, gathers each page's
//! details, and keeps the list store and its persisted subset in step.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::watch;

use crate::action::ListAction;
use crate::api::{PokemonRecord, PokemonSource, SummaryPage};
use crate::debounce::Debounced;
use crate::effect::ListEffect;
use crate::error::{PageError, SourceError};
use crate::persist::{
    decode, encode, PersistedList, POKEMON_LIST_SCHEMA_VERSION, POKEMON_LIST_STORAGE_KEY,
};
use crate::query::{DetailKey, ResponseCache, RetryPolicy};
use crate::sprite::{extract_pokemon_id, resolve_list_sprite_url};
use crate::state::{ListState, ListStatus, PokemonListItem};
use crate::storage::Storage;
use crate::store::{ListStore, ListenerId};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListOptions {
    pub page_size: u32,
    pub search_debounce: Duration,
    pub retry: RetryPolicy,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
            retry: RetryPolicy::LIST,
        }
    }
}

pub type SharedListStore = Rc<RefCell<ListStore>>;

pub struct PokemonList {
    store: SharedListStore,
    source: Rc<dyn PokemonSource>,
    cache: Rc<ResponseCache>,
    storage: Rc<dyn Storage>,
    options: ListOptions,
    search: Debounced<String>,
}

impl PokemonList {
    pub fn new(
        store: SharedListStore,
        source: Rc<dyn PokemonSource>,
        cache: Rc<ResponseCache>,
        storage: Rc<dyn Storage>,
        options: ListOptions,
    ) -> Self {
        let initial_query = store.borrow().state().search_query.clone();
        Self {
            store,
            source,
            cache,
            storage,
            options,
            search: Debounced::new(initial_query, options.search_debounce),
        }
    }

    /// Restores the persisted page cache, then fetches the page at the restored offset.
    pub async fn mount(
        store: SharedListStore,
        source: Rc<dyn PokemonSource>,
        cache: Rc<ResponseCache>,
        storage: Rc<dyn Storage>,
        options: ListOptions,
    ) -> Self {
        let list = Self::new(store, source, cache, storage, options);
        list.rehydrate().await;
        list.load().await;
        list
    }

    pub async fn rehydrate(&self) {
        let raw = match self.storage.get_item(POKEMON_LIST_STORAGE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read persisted list");
                return;
            }
        };
        match decode::<PersistedList>(&raw, POKEMON_LIST_SCHEMA_VERSION) {
            Ok(persisted) => {
                tracing::debug!(
                    items = persisted.items.len(),
                    offset = persisted.current_offset,
                    "hydrated list"
                );
                self.run(ListAction::DidHydrate(persisted)).await;
            }
            Err(err) => tracing::warn!(error = %err, "ignoring persisted list"),
        }
    }

    /// Fetches the page at the current offset, using a fresh cached response if there is one.
    pub async fn load(&self) {
        self.run(ListAction::PageFetch {
            limit: self.options.page_size,
            force: false,
        })
        .await;
    }

    /// Advances one page. No-op on the last page or while a fetch is in flight.
    pub async fn fetch_next_page(&self) {
        self.run(ListAction::NextPage {
            page_size: self.options.page_size,
        })
        .await;
    }

    /// Refetches the current page, bypassing cached responses.
    pub async fn retry(&self) {
        self.run(ListAction::PageFetch {
            limit: self.options.page_size,
            force: true,
        })
        .await;
    }

    /// Back to an empty first-page state, persisted.
    pub async fn reset(&self) {
        self.run(ListAction::Reset).await;
    }

    /// Updates the raw query now; filtering follows once it settles.
    pub fn set_search_query(&self, query: impl Into<String>) {
        let query = query.into();
        let dispatched = self
            .store
            .borrow_mut()
            .dispatch(ListAction::SetSearchQuery(query.clone()));
        dispatched.notify();
        self.search.set(query);
    }

    pub fn search_query(&self) -> String {
        self.store.borrow().state().search_query.clone()
    }

    pub fn debounced_query(&self) -> String {
        self.search.get()
    }

    pub fn debounced_query_changes(&self) -> watch::Receiver<String> {
        self.search.subscribe()
    }

    /// Accumulated items, filtered by the settled search query.
    pub fn items(&self) -> Vec<PokemonListItem> {
        let query = self.search.get().to_lowercase();
        let store = self.store.borrow();
        let items = &store.state().items;
        if query.is_empty() {
            return items.clone();
        }
        items
            .iter()
            .filter(|item| item.name.to_lowercase().contains(&query))
            .cloned()
            .collect()
    }

    pub fn status(&self) -> ListStatus {
        self.store.borrow().state().status
    }

    pub fn has_next_page(&self) -> bool {
        self.store
            .borrow()
            .state()
            .has_next_page(self.options.page_size)
    }

    pub fn is_fetching_next_page(&self) -> bool {
        self.store.borrow().state().is_fetching_next_page()
    }

    pub fn total_count(&self) -> u32 {
        self.store.borrow().state().total_count
    }

    /// Total to measure collection progress against.
    pub fn dex_total(&self) -> u32 {
        self.store.borrow().state().dex_total()
    }

    /// Number of pokemon the loaded pages cover.
    pub fn loaded_through(&self) -> u32 {
        self.store
            .borrow()
            .state()
            .loaded_through(self.options.page_size)
    }

    pub fn current_offset(&self) -> u32 {
        self.store.borrow().state().current_offset
    }

    pub fn subscribe(&self, callback: impl Fn(&ListState) + 'static) -> ListenerId {
        self.store.borrow_mut().subscribe(callback)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.store.borrow_mut().unsubscribe(id)
    }

    async fn run(&self, action: ListAction) {
        let mut queue = VecDeque::from([action]);
        while let Some(next) = queue.pop_front() {
            let dispatched = self.store.borrow_mut().dispatch(next);
            for effect in dispatched.notify() {
                if let Some(follow_up) = self.handle_effect(effect).await {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    async fn handle_effect(&self, effect: ListEffect) -> Option<ListAction> {
        match effect {
            ListEffect::FetchPage {
                offset,
                limit,
                force,
            } => Some(match self.fetch_page(offset, limit, force).await {
                Ok((items, total_count)) => ListAction::PageDidLoad {
                    offset,
                    items,
                    total_count,
                },
                Err(err) => {
                    tracing::warn!(offset, error = %err, "failed to load pokemon page");
                    ListAction::PageDidError {
                        offset,
                        message: err.to_string(),
                    }
                }
            }),
            ListEffect::Persist(persisted) => {
                self.persist(&persisted).await;
                None
            }
        }
    }

    async fn persist(&self, persisted: &PersistedList) {
        let raw = match encode(persisted, POKEMON_LIST_SCHEMA_VERSION) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode list");
                return;
            }
        };
        if let Err(err) = self.storage.set_item(POKEMON_LIST_STORAGE_KEY, &raw).await {
            tracing::warn!(error = %err, "failed to persist list");
        }
    }

    async fn fetch_page(
        &self,
        offset: u32,
        limit: u32,
        force: bool,
    ) -> Result<(Vec<PokemonListItem>, u32), PageError> {
        let page = self.summaries(offset, limit, force).await?;
        let ids = page
            .results
            .iter()
            .map(|summary| extract_pokemon_id(&summary.url))
            .collect::<Result<Vec<_>, _>>()?;

        let records = join_all(ids.iter().map(|&id| self.detail_by_id(id, force))).await;
        let mut items = Vec::with_capacity(records.len());
        for record in records {
            items.push(list_item(record?));
        }
        tracing::debug!(offset, count = items.len(), total = page.count, "page loaded");
        Ok((items, page.count))
    }

    async fn summaries(
        &self,
        offset: u32,
        limit: u32,
        force: bool,
    ) -> Result<SummaryPage, SourceError> {
        let key = (offset, limit);
        if !force {
            if let Some(page) = self.cache.pages.get_fresh(&key) {
                return Ok(page);
            }
        }
        let source = &self.source;
        let page = self
            .options
            .retry
            .run("list", || source.list_summaries(offset, limit, force))
            .await?;
        self.cache.pages.insert(key, page.clone());
        Ok(page)
    }

    async fn detail_by_id(&self, id: u32, force: bool) -> Result<PokemonRecord, SourceError> {
        let key = DetailKey::Id(id);
        if !force {
            if let Some(record) = self.cache.details.get_fresh(&key) {
                return Ok(record);
            }
        }
        let source = &self.source;
        let lookup = id.to_string();
        let record = self
            .options
            .retry
            .run("detail", || source.detail(&lookup, force))
            .await?;
        self.cache.insert_detail(key, record.clone());
        Ok(record)
    }
}

fn list_item(record: PokemonRecord) -> PokemonListItem {
    PokemonListItem {
        id: record.id,
        sprite_url: resolve_list_sprite_url(&record.sprites, record.id),
        name: record.name,
        types: record.types,
    }
}
