//! Detail orchestrator: resolves one pokemon by id or name for the detail view.

use std::cell::RefCell;
use std::rc::Rc;

use crate::action::DetailAction;
use crate::api::{PokemonRecord, PokemonSource};
use crate::effect::DetailEffect;
use crate::error::SourceError;
use crate::query::{DetailQuery, ResponseCache, RetryPolicy};
use crate::sprite::resolve_official_artwork_url;
use crate::state::{DetailState, DetailStatus, NewCatch, PokemonDetailDisplay};
use crate::store::{DetailStore, ListenerId};

pub type SharedDetailStore = Rc<RefCell<DetailStore>>;

/// An open detail view. Dropping it clears the detail store.
pub struct PokemonDetail {
    store: SharedDetailStore,
    source: Rc<dyn PokemonSource>,
    cache: Rc<ResponseCache>,
    retry: RetryPolicy,
    query: Option<DetailQuery>,
}

impl PokemonDetail {
    /// Opens the view for `id_or_name`. Invalid input leaves the view idle and never fetches.
    pub fn open(
        store: SharedDetailStore,
        source: Rc<dyn PokemonSource>,
        cache: Rc<ResponseCache>,
        id_or_name: &str,
    ) -> Self {
        let query = match DetailQuery::parse(id_or_name) {
            Ok(query) => Some(query),
            Err(err) => {
                tracing::debug!(error = %err, "detail lookup disabled");
                None
            }
        };
        Self {
            store,
            source,
            cache,
            retry: RetryPolicy::DETAIL,
            query,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn query(&self) -> Option<&DetailQuery> {
        self.query.as_ref()
    }

    pub async fn load(&self) {
        self.fetch(false).await;
    }

    /// Refetches, bypassing cached responses.
    pub async fn retry(&self) {
        self.fetch(true).await;
    }

    async fn fetch(&self, force: bool) {
        let Some(query) = self.query.clone() else {
            return;
        };
        let dispatched = self
            .store
            .borrow_mut()
            .dispatch(DetailAction::DetailFetch { query, force });
        for effect in dispatched.notify() {
            let result = self.handle_effect(effect).await;
            let dispatched = self.store.borrow_mut().dispatch(result);
            dispatched.notify();
        }
    }

    async fn handle_effect(&self, effect: DetailEffect) -> DetailAction {
        match effect {
            DetailEffect::FetchDetail { query, force } => match self.record(&query, force).await {
                Ok(record) => DetailAction::DetailDidLoad(display(record)),
                Err(SourceError::NotFound(lookup)) => {
                    tracing::debug!(%lookup, "pokemon not found");
                    DetailAction::DetailDidNotFound
                }
                Err(err) => {
                    tracing::warn!(lookup = %query.lookup, error = %err, "failed to load pokemon");
                    DetailAction::DetailDidError(err.to_string())
                }
            },
        }
    }

    async fn record(&self, query: &DetailQuery, force: bool) -> Result<PokemonRecord, SourceError> {
        if !force {
            if let Some(record) = self.cache.details.get_fresh(&query.key) {
                return Ok(record);
            }
        }
        let source = &self.source;
        let record = self
            .retry
            .run("detail", || source.detail(&query.lookup, force))
            .await?;
        self.cache.insert_detail(query.key.clone(), record.clone());
        Ok(record)
    }

    pub fn detail(&self) -> Option<PokemonDetailDisplay> {
        self.store.borrow().state().current_detail.clone()
    }

    pub fn status(&self) -> DetailStatus {
        self.store.borrow().state().status
    }

    /// The loaded pokemon as something `CollectionSync::catch` accepts.
    pub fn to_catch(&self) -> Option<NewCatch> {
        self.store
            .borrow()
            .state()
            .current_detail
            .as_ref()
            .map(NewCatch::from)
    }

    pub fn subscribe(&self, callback: impl Fn(&DetailState) + 'static) -> ListenerId {
        self.store.borrow_mut().subscribe(callback)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.store.borrow_mut().unsubscribe(id)
    }

    /// Closes the view.
    pub fn leave(self) {}
}

impl Drop for PokemonDetail {
    fn drop(&mut self) {
        let dispatched = match self.store.try_borrow_mut() {
            Ok(mut store) => store.dispatch(DetailAction::Clear),
            Err(_) => {
                tracing::warn!("detail store busy, not cleared");
                return;
            }
        };
        dispatched.notify();
    }
}

fn display(record: PokemonRecord) -> PokemonDetailDisplay {
    PokemonDetailDisplay {
        id: record.id,
        image_url: resolve_official_artwork_url(&record.sprites, record.id),
        name: record.name,
        types: record.types,
    }
}
