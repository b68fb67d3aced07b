//! Collection synchronizer: hydrates the caught collection from storage,
//! persists every change, and follows writes made by other tabs.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};

use crate::action::CollectionAction;
use crate::effect::CollectionEffect;
use crate::persist::{
    decode, decode_synced_collection, encode, PersistedCollection, POKEDEX_SCHEMA_VERSION,
    POKEDEX_STORAGE_KEY,
};
use crate::state::{CatchStatus, CaughtPokemon, CollectionState, NewCatch};
use crate::storage::{ChangeNotifier, Storage, StorageChange, StorageListener, Subscription};
use crate::store::{CollectionStore, ListenerId};

pub type SharedCollectionStore = Rc<RefCell<CollectionStore>>;

/// Binds one collection store to durable storage for as long as it is mounted.
pub struct CollectionSync {
    store: SharedCollectionStore,
    storage: Rc<dyn Storage>,
    subscription: Option<Subscription>,
}

impl CollectionSync {
    /// Registers the cross-tab listener, then hydrates the store if no one has yet.
    pub async fn mount(
        store: SharedCollectionStore,
        storage: Rc<dyn Storage>,
        notifier: &dyn ChangeNotifier,
    ) -> Self {
        let subscription = notifier.subscribe(sync_listener(Rc::downgrade(&store)));
        let sync = Self {
            store,
            storage,
            subscription: Some(subscription),
        };
        sync.hydrate().await;
        sync
    }

    async fn hydrate(&self) {
        if !self.store.borrow_mut().begin_hydration() {
            return;
        }

        let persisted = match self.storage.get_item(POKEDEX_STORAGE_KEY).await {
            Ok(Some(raw)) => match decode::<PersistedCollection>(&raw, POKEDEX_SCHEMA_VERSION) {
                Ok(persisted) => Some(persisted.collection),
                Err(err) => {
                    tracing::warn!(error = %err, "ignoring persisted collection");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read persisted collection");
                None
            }
        };

        if let Some(collection) = persisted {
            tracing::debug!(count = collection.len(), "hydrated collection");
            self.run(CollectionAction::ReplaceAll(collection)).await;
        }
        self.run(CollectionAction::SetHydrated(true)).await;
    }

    /// Adds `pokemon` stamped with the current time. Already caught is a no-op.
    pub async fn catch(&self, pokemon: NewCatch) {
        let caught_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.run(CollectionAction::Catch { pokemon, caught_at })
            .await;
    }

    pub async fn release(&self, id: u32) {
        self.run(CollectionAction::Release(id)).await;
    }

    async fn run(&self, action: CollectionAction) {
        // Observers and effects run after the borrow ends.
        let dispatched = self.store.borrow_mut().dispatch(action);
        for effect in dispatched.notify() {
            self.handle_effect(effect).await;
        }
    }

    async fn handle_effect(&self, effect: CollectionEffect) {
        match effect {
            CollectionEffect::Persist(collection) => {
                let raw = match encode(&PersistedCollection { collection }, POKEDEX_SCHEMA_VERSION)
                {
                    Ok(raw) => raw,
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to encode collection");
                        return;
                    }
                };
                if let Err(err) = self.storage.set_item(POKEDEX_STORAGE_KEY, &raw).await {
                    tracing::warn!(error = %err, "failed to persist collection");
                }
            }
        }
    }

    pub fn collection(&self) -> Arc<Vec<CaughtPokemon>> {
        Arc::clone(&self.store.borrow().state().collection)
    }

    pub fn sorted_by_recent(&self) -> Vec<CaughtPokemon> {
        self.store.borrow().state().sorted_by_recent()
    }

    pub fn count(&self) -> usize {
        self.store.borrow().state().count()
    }

    pub fn hydrated(&self) -> bool {
        self.store.borrow().state().hydrated
    }

    pub fn is_caught(&self, id: u32) -> bool {
        self.store.borrow().state().is_caught(id)
    }

    pub fn catch_status_of(&self, id: u32) -> CatchStatus {
        self.store.borrow().state().catch_status_of(id)
    }

    pub fn subscribe(&self, callback: impl Fn(&CollectionState) + 'static) -> ListenerId {
        self.store.borrow_mut().subscribe(callback)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.store.borrow_mut().unsubscribe(id)
    }

    pub fn store(&self) -> &SharedCollectionStore {
        &self.store
    }

    /// Stops following other tabs. The store keeps its state.
    pub fn unmount(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

fn sync_listener(store: Weak<RefCell<CollectionStore>>) -> StorageListener {
    Box::new(move |change: &StorageChange| {
        if change.key != POKEDEX_STORAGE_KEY {
            return;
        }
        let Some(raw) = change.new_value.as_deref().filter(|raw| !raw.is_empty()) else {
            return;
        };
        let collection = match decode_synced_collection(raw) {
            Ok(Some(collection)) => collection,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring malformed collection from another tab");
                return;
            }
        };
        let Some(store) = store.upgrade() else {
            return;
        };
        let count = collection.len();
        let dispatched = match store.try_borrow_mut() {
            Ok(mut store) => store.dispatch(CollectionAction::ReplaceAll(collection)),
            Err(_) => {
                tracing::warn!("collection store busy, dropping cross-tab update");
                return;
            }
        };
        tracing::debug!(count, "collection synced from another tab");
        dispatched.notify();
    })
}
