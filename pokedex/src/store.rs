//! Effect stores with change observers.

use std::rc::Rc;

use tui_dispatch::{DispatchResult, EffectStore};

use crate::action::{CollectionAction, DetailAction, ListAction};
use crate::effect::{CollectionEffect, DetailEffect, ListEffect};
use crate::reducer::{collection_reducer, detail_reducer, list_reducer};
use crate::state::{CollectionState, DetailState, ListState};

pub type ListenerId = u64;

type Callback<S> = Rc<dyn Fn(&S)>;

/// Callbacks run after every dispatch that changed state.
pub struct Listeners<S> {
    next_id: ListenerId,
    callbacks: Vec<(ListenerId, Callback<S>)>,
}

impl<S> Listeners<S> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            callbacks: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, callback: impl Fn(&S) + 'static) -> ListenerId {
        self.next_id += 1;
        self.callbacks.push((self.next_id, Rc::new(callback)));
        self.next_id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(listener, _)| *listener != id);
        self.callbacks.len() != before
    }

    pub fn snapshot(&self) -> Vec<Callback<S>> {
        self.callbacks
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl<S> Default for Listeners<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Effects declared by one dispatch, plus the observer calls it still owes.
///
/// Stores live in a `RefCell`; release the borrow, then call [`Dispatched::notify`]
/// so observers can read the store through its accessors.
#[must_use = "observers only run on `notify`"]
pub struct Dispatched<S, E> {
    changed: bool,
    effects: Vec<E>,
    pending: Option<(S, Vec<Callback<S>>)>,
}

impl<S, E> Dispatched<S, E> {
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Runs the owed observer calls and hands back the effects.
    pub fn notify(self) -> Vec<E> {
        if let Some((state, callbacks)) = self.pending {
            for callback in callbacks {
                callback(&state);
            }
        }
        self.effects
    }
}

/// An `EffectStore` whose changes are pushed to subscribers.
pub struct ObservedStore<S, A, E> {
    inner: EffectStore<S, A, E>,
    listeners: Listeners<S>,
}

impl<S, A, E> ObservedStore<S, A, E>
where
    S: Clone,
    A: tui_dispatch::Action,
{
    pub fn new(state: S, reducer: fn(&mut S, A) -> DispatchResult<E>) -> Self {
        Self {
            inner: EffectStore::new(state, reducer),
            listeners: Listeners::new(),
        }
    }

    pub fn state(&self) -> &S {
        self.inner.state()
    }

    /// Runs the reducer. Observers see a snapshot of the new state once the
    /// result is notified.
    pub fn dispatch(&mut self, action: A) -> Dispatched<S, E> {
        let result = self.inner.dispatch(action);
        let pending = (result.changed && !self.listeners.is_empty())
            .then(|| (self.inner.state().clone(), self.listeners.snapshot()));
        Dispatched {
            changed: result.changed,
            effects: result.effects,
            pending,
        }
    }

    pub fn subscribe(&mut self, callback: impl Fn(&S) + 'static) -> ListenerId {
        self.listeners.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

pub type ListStore = ObservedStore<ListState, ListAction, ListEffect>;
pub type DetailStore = ObservedStore<DetailState, DetailAction, DetailEffect>;

impl ListStore {
    pub fn with_defaults() -> Self {
        Self::new(ListState::default(), list_reducer)
    }
}

impl DetailStore {
    pub fn with_defaults() -> Self {
        Self::new(DetailState::default(), detail_reducer)
    }
}

/// The caught collection store. Hydration is requested at most once per store.
pub struct CollectionStore {
    inner: ObservedStore<CollectionState, CollectionAction, CollectionEffect>,
    hydration_requested: bool,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self {
            inner: ObservedStore::new(CollectionState::default(), collection_reducer),
            hydration_requested: false,
        }
    }

    pub fn state(&self) -> &CollectionState {
        self.inner.state()
    }

    pub fn dispatch(
        &mut self,
        action: CollectionAction,
    ) -> Dispatched<CollectionState, CollectionEffect> {
        self.inner.dispatch(action)
    }

    /// Returns `true` for the first caller only.
    pub fn begin_hydration(&mut self) -> bool {
        !std::mem::replace(&mut self.hydration_requested, true)
    }

    pub fn subscribe(&mut self, callback: impl Fn(&CollectionState) + 'static) -> ListenerId {
        self.inner.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.inner.unsubscribe(id)
    }
}

impl Default for CollectionStore {
    fn default() -> Self {
        Self::new()
    }
}
