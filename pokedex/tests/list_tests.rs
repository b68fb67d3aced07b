//! List orchestrator against the scripted source: pagination, caching,
//! persistence, search debounce, and failure handling.

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use futures_util::future::join;
use pokedex::persist::{
    decode, PersistedList, POKEMON_LIST_SCHEMA_VERSION, POKEMON_LIST_STORAGE_KEY,
};
use pokedex::sprite::build_sprite_url;
use pokedex::{ListOptions, ListStatus, MemoryStorage, ResponseCache, RetryPolicy};
use pretty_assertions::assert_eq;
use tokio::time::sleep;

use common::{ids, list_over, FakeSource, KANTO, SPRITELESS_ID};

fn options() -> ListOptions {
    ListOptions::default()
}

fn persisted(storage: &MemoryStorage) -> PersistedList {
    let raw = storage.peek(POKEMON_LIST_STORAGE_KEY).unwrap();
    decode(&raw, POKEMON_LIST_SCHEMA_VERSION).unwrap()
}

#[tokio::test]
async fn test_first_page_loads_and_persists() {
    let source = FakeSource::kanto();
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    let list = list_over(&source, &cache, &storage, options());

    assert_eq!(list.status(), ListStatus::Idle);
    list.rehydrate().await;
    list.load().await;

    assert_eq!(list.status(), ListStatus::Success);
    assert_eq!(ids(&list.items()), (1..=20).collect::<Vec<_>>());
    assert_eq!(list.total_count(), KANTO);
    assert!(list.has_next_page());
    assert_eq!(source.list_calls(), 1);
    assert_eq!(source.detail_calls().len(), 20);

    let saved = persisted(&storage);
    assert_eq!(saved.current_offset, 0);
    assert_eq!(saved.total_count, KANTO);
    assert_eq!(saved.items.len(), 20);
}

#[tokio::test]
async fn test_list_sprites_fall_back_to_conventional_url() {
    let source = FakeSource::kanto();
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    let list = list_over(&source, &cache, &storage, options());

    list.load().await;
    list.fetch_next_page().await;

    let items = list.items();
    let pikachu = items.iter().find(|item| item.id == SPRITELESS_ID).unwrap();
    assert_eq!(pikachu.sprite_url, build_sprite_url(SPRITELESS_ID));
    assert_eq!(items[0].sprite_url, "https://sprites.test/front/1.png");
    assert_eq!(items[5].types, vec!["fire".to_string(), "flying".to_string()]);
}

#[tokio::test]
async fn test_next_page_appends_and_advances_offset() {
    let source = FakeSource::kanto();
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    let list = list_over(&source, &cache, &storage, options());

    list.load().await;
    list.fetch_next_page().await;

    assert_eq!(list.current_offset(), 20);
    assert_eq!(ids(&list.items()), (1..=40).collect::<Vec<_>>());
    assert_eq!(list.status(), ListStatus::Success);
    assert!(!list.is_fetching_next_page());
    assert_eq!(persisted(&storage).current_offset, 20);
    assert_eq!(persisted(&storage).items.len(), 40);
}

#[tokio::test]
async fn test_pages_through_to_the_end() {
    let source = FakeSource::kanto();
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    let list = list_over(&source, &cache, &storage, options());

    list.load().await;
    while list.has_next_page() {
        list.fetch_next_page().await;
    }

    assert_eq!(list.current_offset(), 140);
    assert_eq!(ids(&list.items()), (1..=KANTO).collect::<Vec<_>>());
    assert_eq!(source.list_calls(), 8);

    list.fetch_next_page().await;
    assert_eq!(list.current_offset(), 140);
    assert_eq!(source.list_calls(), 8);
}

#[tokio::test]
async fn test_next_page_is_ignored_while_a_page_is_in_flight() {
    let source = FakeSource::kanto();
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    let list = list_over(&source, &cache, &storage, options());
    list.load().await;

    join(list.fetch_next_page(), list.fetch_next_page()).await;

    assert_eq!(list.current_offset(), 20);
    assert_eq!(list.items().len(), 40);
    assert_eq!(source.list_calls(), 2);
}

#[tokio::test]
async fn test_fresh_page_is_served_from_cache_and_retry_refetches() {
    let source = FakeSource::kanto();
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    let list = list_over(&source, &cache, &storage, options());

    list.load().await;
    list.load().await;
    assert_eq!(source.list_calls(), 1);
    assert_eq!(source.detail_calls().len(), 20);

    assert_eq!(source.forced_calls(), 0);

    list.retry().await;
    assert_eq!(source.list_calls(), 2);
    assert_eq!(source.forced_calls(), 21);
    assert_eq!(list.status(), ListStatus::Success);
    assert_eq!(list.items().len(), 20);
}

#[tokio::test(start_paused = true)]
async fn test_stale_page_is_refetched() {
    let source = FakeSource::kanto();
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    let list = list_over(&source, &cache, &storage, options());

    list.load().await;
    tokio::time::advance(Duration::from_secs(5 * 60 + 1)).await;
    list.load().await;

    assert_eq!(source.list_calls(), 2);
    // Details are fresh for longer than pages.
    assert_eq!(source.detail_calls().len(), 20);
}

#[tokio::test(start_paused = true)]
async fn test_list_failure_sets_error_and_retry_recovers() {
    let source = FakeSource::kanto();
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    let list = list_over(&source, &cache, &storage, options());

    source.fail_next_lists(3);
    list.load().await;

    assert_eq!(list.status(), ListStatus::Error);
    assert_eq!(source.list_calls(), 3);
    assert!(list.items().is_empty());

    list.retry().await;
    assert_eq!(list.status(), ListStatus::Success);
    assert_eq!(list.items().len(), 20);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let source = FakeSource::kanto();
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    let list = list_over(&source, &cache, &storage, options());

    source.fail_next_lists(2);
    source.fail_next_details(1);
    list.load().await;

    assert_eq!(list.status(), ListStatus::Success);
    assert_eq!(source.list_calls(), 3);
    assert_eq!(source.detail_calls().len(), 21);
}

#[tokio::test]
async fn test_any_detail_failure_fails_the_page() {
    let source = FakeSource::kanto();
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    let list = list_over(
        &source,
        &cache,
        &storage,
        ListOptions {
            retry: RetryPolicy::none(),
            ..options()
        },
    );

    source.fail_next_details(1);
    list.load().await;

    assert_eq!(list.status(), ListStatus::Error);
    assert!(list.items().is_empty());
    assert_eq!(storage.peek(POKEMON_LIST_STORAGE_KEY), None);
}

#[tokio::test]
async fn test_unrecognized_summary_url_fails_the_page() {
    let source = FakeSource::kanto();
    source.serve_bad_summary_urls(true);
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    let list = list_over(&source, &cache, &storage, options());

    list.load().await;

    assert_eq!(list.status(), ListStatus::Error);
    assert!(source.detail_calls().is_empty());
}

#[tokio::test]
async fn test_rehydrated_list_resumes_at_saved_offset() {
    let source = FakeSource::kanto();
    let storage = MemoryStorage::new();
    {
        let cache = Rc::new(ResponseCache::default());
        let list = list_over(&source, &cache, &storage, options());
        list.load().await;
        list.fetch_next_page().await;
    }

    let cache = Rc::new(ResponseCache::default());
    let list = list_over(&source, &cache, &storage, options());
    list.rehydrate().await;
    assert_eq!(list.current_offset(), 20);
    assert_eq!(list.items().len(), 40);
    assert_eq!(list.status(), ListStatus::Idle);

    list.load().await;
    assert_eq!(list.status(), ListStatus::Success);
    assert_eq!(ids(&list.items()), (1..=40).collect::<Vec<_>>());
    assert!(list.has_next_page());
}

#[tokio::test]
async fn test_reset_clears_and_persists_empty_list() {
    let source = FakeSource::kanto();
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    let list = list_over(&source, &cache, &storage, options());
    list.load().await;
    list.fetch_next_page().await;

    list.reset().await;

    assert!(list.items().is_empty());
    assert_eq!(list.current_offset(), 0);
    assert_eq!(list.status(), ListStatus::Idle);
    assert_eq!(persisted(&storage), PersistedList::default());
}

#[tokio::test]
async fn test_wrong_list_version_is_ignored() {
    let source = FakeSource::kanto();
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    storage.seed(
        POKEMON_LIST_STORAGE_KEY,
        r#"{"state":{"items":[],"currentOffset":60,"totalCount":151},"version":3}"#,
    );
    let list = list_over(&source, &cache, &storage, options());

    list.rehydrate().await;

    assert_eq!(list.current_offset(), 0);
    assert_eq!(list.total_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_search_filters_only_after_typing_settles() {
    let source = FakeSource::kanto();
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    let list = list_over(&source, &cache, &storage, options());
    list.load().await;

    for query in ["c", "ch", "cha", "char"] {
        list.set_search_query(query);
        sleep(Duration::from_millis(100)).await;
    }

    assert_eq!(list.search_query(), "char");
    assert_eq!(list.debounced_query(), "");
    assert_eq!(list.items().len(), 20);

    sleep(Duration::from_millis(201)).await;

    assert_eq!(list.debounced_query(), "char");
    let names: Vec<String> = list.items().into_iter().map(|item| item.name).collect();
    assert_eq!(names, vec!["charmander", "charmeleon", "charizard"]);
}

#[tokio::test(start_paused = true)]
async fn test_search_is_case_insensitive_and_clears() {
    let source = FakeSource::kanto();
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    let list = list_over(&source, &cache, &storage, options());
    list.load().await;

    list.set_search_query("SAUR");
    sleep(Duration::from_millis(301)).await;
    assert_eq!(ids(&list.items()), vec![1, 2, 3]);

    list.set_search_query("");
    sleep(Duration::from_millis(301)).await;
    assert_eq!(list.items().len(), 20);
}

#[tokio::test(start_paused = true)]
async fn test_search_query_is_not_persisted() {
    let source = FakeSource::kanto();
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    let list = list_over(&source, &cache, &storage, options());
    list.load().await;
    let before = storage.peek(POKEMON_LIST_STORAGE_KEY);

    list.set_search_query("pika");
    sleep(Duration::from_millis(301)).await;

    assert_eq!(storage.peek(POKEMON_LIST_STORAGE_KEY), before);
    let raw = before.unwrap();
    assert!(!raw.contains("searchQuery"));
    assert!(!raw.contains("status"));
}

#[tokio::test]
async fn test_observers_can_read_the_list_while_it_loads() {
    let source = FakeSource::kanto();
    let cache = Rc::new(ResponseCache::default());
    let storage = MemoryStorage::new();
    let list = Rc::new(list_over(&source, &cache, &storage, options()));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let (reader, sink) = (Rc::downgrade(&list), Rc::clone(&seen));
    list.subscribe(move |state| {
        if let Some(list) = reader.upgrade() {
            sink.borrow_mut()
                .push((state.status, list.items().len(), list.has_next_page()));
        }
    });

    list.load().await;

    assert_eq!(
        *seen.borrow(),
        vec![(ListStatus::Loading, 0, false), (ListStatus::Success, 20, true)]
    );
}
