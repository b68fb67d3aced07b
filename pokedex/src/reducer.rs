//! Reducers - pure functions: (state, action) -> DispatchResult

use std::collections::HashSet;
use std::sync::Arc;

use tui_dispatch::DispatchResult;

use crate::action::{CollectionAction, DetailAction, ListAction};
use crate::effect::{CollectionEffect, DetailEffect, ListEffect};
use crate::persist::PersistedList;
use crate::state::{
    CollectionState, DetailState, DetailStatus, ListState, ListStatus, PokemonListItem,
};

pub fn collection_reducer(
    state: &mut CollectionState,
    action: CollectionAction,
) -> DispatchResult<CollectionEffect> {
    match action {
        CollectionAction::Catch { pokemon, caught_at } => {
            if state.is_caught(pokemon.id) {
                return DispatchResult::unchanged();
            }
            let mut next = state.collection.as_ref().clone();
            next.push(pokemon.into_caught(caught_at));
            state.collection = Arc::new(next);
            DispatchResult::changed_with(persist_collection(state))
        }

        CollectionAction::Release(id) => {
            if !state.is_caught(id) {
                return DispatchResult::unchanged();
            }
            let next = state
                .collection
                .iter()
                .filter(|pokemon| pokemon.id != id)
                .cloned()
                .collect();
            state.collection = Arc::new(next);
            DispatchResult::changed_with(persist_collection(state))
        }

        CollectionAction::ReplaceAll(collection) => {
            state.collection = Arc::new(collection);
            DispatchResult::changed()
        }

        CollectionAction::SetHydrated(hydrated) => {
            if state.hydrated == hydrated {
                return DispatchResult::unchanged();
            }
            state.hydrated = hydrated;
            DispatchResult::changed()
        }
    }
}

fn persist_collection(state: &CollectionState) -> CollectionEffect {
    CollectionEffect::Persist(state.collection.as_ref().clone())
}

pub fn list_reducer(state: &mut ListState, action: ListAction) -> DispatchResult<ListEffect> {
    match action {
        ListAction::SetItems(items) => {
            state.items = items;
            DispatchResult::changed_with(persist_list(state))
        }

        ListAction::AppendItems(items) => {
            if !append_unique(state, items) {
                return DispatchResult::unchanged();
            }
            DispatchResult::changed_with(persist_list(state))
        }

        ListAction::SetStatus(status) => {
            if state.status == status {
                return DispatchResult::unchanged();
            }
            state.status = status;
            DispatchResult::changed()
        }

        ListAction::SetSearchQuery(query) => {
            if state.search_query == query {
                return DispatchResult::unchanged();
            }
            state.search_query = query;
            DispatchResult::changed()
        }

        ListAction::SetCurrentOffset(offset) => {
            state.current_offset = offset;
            DispatchResult::changed_with(persist_list(state))
        }

        ListAction::SetTotalCount(total) => {
            state.total_count = total;
            DispatchResult::changed_with(persist_list(state))
        }

        ListAction::Reset => {
            *state = ListState::default();
            DispatchResult::changed_with(persist_list(state))
        }

        ListAction::DidHydrate(persisted) => {
            state.items = persisted.items;
            state.current_offset = persisted.current_offset;
            state.total_count = persisted.total_count;
            DispatchResult::changed()
        }

        ListAction::PageFetch { limit, force } => {
            state.status = loading_status(state.current_offset);
            DispatchResult::changed_with(ListEffect::FetchPage {
                offset: state.current_offset,
                limit,
                force,
            })
        }

        ListAction::NextPage { page_size } => {
            if !state.has_next_page(page_size) || state.status.is_fetching() {
                return DispatchResult::unchanged();
            }
            state.current_offset += page_size;
            state.status = loading_status(state.current_offset);
            DispatchResult::changed_with_many(vec![
                persist_list(state),
                ListEffect::FetchPage {
                    offset: state.current_offset,
                    limit: page_size,
                    force: false,
                },
            ])
        }

        ListAction::PageDidLoad {
            offset,
            items,
            total_count,
        } => {
            // A page for an offset we have since moved away from.
            if offset != state.current_offset {
                return DispatchResult::unchanged();
            }
            if offset == 0 {
                state.items = items;
            } else {
                append_unique(state, items);
            }
            state.total_count = total_count;
            state.status = ListStatus::Success;
            DispatchResult::changed_with(persist_list(state))
        }

        ListAction::PageDidError { offset, .. } => {
            if offset != state.current_offset {
                return DispatchResult::unchanged();
            }
            state.status = ListStatus::Error;
            DispatchResult::changed()
        }
    }
}

fn loading_status(offset: u32) -> ListStatus {
    if offset > 0 {
        ListStatus::LoadingMore
    } else {
        ListStatus::Loading
    }
}

/// Appends items whose id is not already present. Returns whether anything was added.
fn append_unique(state: &mut ListState, items: Vec<PokemonListItem>) -> bool {
    let mut seen: HashSet<u32> = state.items.iter().map(|item| item.id).collect();
    let before = state.items.len();
    for item in items {
        if seen.insert(item.id) {
            state.items.push(item);
        }
    }
    state.items.len() != before
}

fn persist_list(state: &ListState) -> ListEffect {
    ListEffect::Persist(PersistedList::from_state(state))
}

pub fn detail_reducer(state: &mut DetailState, action: DetailAction) -> DispatchResult<DetailEffect> {
    match action {
        DetailAction::SetCurrentDetail(detail) => {
            state.current_detail = Some(detail);
            DispatchResult::changed()
        }

        DetailAction::SetStatus(status) => {
            if state.status == status {
                return DispatchResult::unchanged();
            }
            state.status = status;
            DispatchResult::changed()
        }

        DetailAction::Clear => {
            if state.current_detail.is_none() && state.status == DetailStatus::Idle {
                return DispatchResult::unchanged();
            }
            *state = DetailState::default();
            DispatchResult::changed()
        }

        DetailAction::DetailFetch { query, force } => {
            state.status = DetailStatus::Loading;
            DispatchResult::changed_with(DetailEffect::FetchDetail { query, force })
        }

        DetailAction::DetailDidLoad(detail) => {
            state.current_detail = Some(detail);
            state.status = DetailStatus::Success;
            DispatchResult::changed()
        }

        DetailAction::DetailDidNotFound => {
            state.status = DetailStatus::NotFound;
            DispatchResult::changed()
        }

        DetailAction::DetailDidError(_) => {
            state.status = DetailStatus::Error;
            DispatchResult::changed()
        }
    }
}
