//! Scripted in-memory `PokemonSource` shared by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use pokedex::error::SourceError;
use pokedex::{
    CollectionStore, CollectionSync, ListOptions, ListStore, MemoryStorage, PokemonList,
    PokemonRecord, PokemonSource, ResponseCache, SpriteSet, SummaryPage, SummaryRef,
};

pub const KANTO: u32 = 151;

/// Pokemon without any upstream sprites.
pub const SPRITELESS_ID: u32 = 25;

fn name_for(id: u32) -> String {
    match id {
        1 => "bulbasaur".into(),
        2 => "ivysaur".into(),
        3 => "venusaur".into(),
        4 => "charmander".into(),
        5 => "charmeleon".into(),
        6 => "charizard".into(),
        7 => "squirtle".into(),
        25 => "pikachu".into(),
        _ => format!("pokemon-{id}"),
    }
}

fn types_for(id: u32) -> Vec<String> {
    match id {
        1..=3 => vec!["grass".into(), "poison".into()],
        4 | 5 => vec!["fire".into()],
        6 => vec!["fire".into(), "flying".into()],
        7 => vec!["water".into()],
        25 => vec!["electric".into()],
        _ => vec!["normal".into()],
    }
}

pub fn record(id: u32) -> PokemonRecord {
    let sprites = if id == SPRITELESS_ID {
        SpriteSet::default()
    } else {
        SpriteSet {
            front_default: Some(format!("https://sprites.test/front/{id}.png")),
            official_artwork: Some(format!("https://sprites.test/art/{id}.png")),
        }
    };
    PokemonRecord {
        id,
        name: name_for(id),
        types: types_for(id),
        sprites,
    }
}

pub struct FakeSource {
    total: u32,
    list_calls: Cell<usize>,
    detail_calls: RefCell<Vec<String>>,
    list_failures: Cell<u32>,
    detail_failures: Cell<u32>,
    bad_summary_url: Cell<bool>,
    forced_calls: Cell<usize>,
}

impl FakeSource {
    pub fn kanto() -> Rc<Self> {
        Rc::new(Self {
            total: KANTO,
            list_calls: Cell::new(0),
            detail_calls: RefCell::new(Vec::new()),
            list_failures: Cell::new(0),
            detail_failures: Cell::new(0),
            bad_summary_url: Cell::new(false),
            forced_calls: Cell::new(0),
        })
    }

    /// The next `n` list calls fail with a transport error.
    pub fn fail_next_lists(&self, n: u32) {
        self.list_failures.set(n);
    }

    /// The next `n` detail calls fail with a transport error.
    pub fn fail_next_details(&self, n: u32) {
        self.detail_failures.set(n);
    }

    pub fn serve_bad_summary_urls(&self, bad: bool) {
        self.bad_summary_url.set(bad);
    }

    /// Calls that asked the source to skip its own cache.
    pub fn forced_calls(&self) -> usize {
        self.forced_calls.get()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.get()
    }

    pub fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.borrow().clone()
    }

    fn take_failure(counter: &Cell<u32>) -> bool {
        let remaining = counter.get();
        if remaining == 0 {
            return false;
        }
        counter.set(remaining - 1);
        true
    }
}

#[async_trait(?Send)]
impl PokemonSource for FakeSource {
    async fn list_summaries(
        &self,
        offset: u32,
        limit: u32,
        force: bool,
    ) -> Result<SummaryPage, SourceError> {
        self.list_calls.set(self.list_calls.get() + 1);
        self.forced_calls.set(self.forced_calls.get() + usize::from(force));
        tokio::task::yield_now().await;
        if Self::take_failure(&self.list_failures) {
            return Err(SourceError::Transport("503 Service Unavailable".into()));
        }
        let end = offset.saturating_add(limit).min(self.total);
        let results = (offset + 1..=end)
            .map(|id| SummaryRef {
                name: name_for(id),
                url: if self.bad_summary_url.get() {
                    format!("https://pokeapi.co/api/v2/pokemon-species/{id}/")
                } else {
                    format!("https://pokeapi.co/api/v2/pokemon/{id}/")
                },
            })
            .collect();
        Ok(SummaryPage {
            results,
            count: self.total,
        })
    }

    async fn detail(&self, id_or_name: &str, force: bool) -> Result<PokemonRecord, SourceError> {
        self.detail_calls.borrow_mut().push(id_or_name.to_string());
        self.forced_calls.set(self.forced_calls.get() + usize::from(force));
        tokio::task::yield_now().await;
        if Self::take_failure(&self.detail_failures) {
            return Err(SourceError::Transport("connection reset".into()));
        }
        let id = match id_or_name.parse::<u32>() {
            Ok(id) => Some(id),
            Err(_) => (1..=self.total).find(|id| name_for(*id) == id_or_name),
        };
        match id {
            Some(id) if (1..=self.total).contains(&id) => Ok(record(id)),
            _ => Err(SourceError::NotFound(id_or_name.to_string())),
        }
    }
}

pub async fn mount_collection(storage: &MemoryStorage) -> CollectionSync {
    let store = Rc::new(RefCell::new(CollectionStore::new()));
    CollectionSync::mount(store, Rc::new(storage.clone()), storage).await
}

pub fn list_over(
    source: &Rc<FakeSource>,
    cache: &Rc<ResponseCache>,
    storage: &MemoryStorage,
    options: ListOptions,
) -> PokemonList {
    let store = Rc::new(RefCell::new(ListStore::with_defaults()));
    PokemonList::new(
        store,
        source.clone(),
        Rc::clone(cache),
        Rc::new(storage.clone()),
        options,
    )
}

pub fn ids(items: &[pokedex::PokemonListItem]) -> Vec<u32> {
    items.iter().map(|item| item.id).collect()
}
