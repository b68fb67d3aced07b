//! Durable key/value storage and cross-tab change notifications.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use async_trait::async_trait;
use tokio::fs;

use crate::error::StorageError;

#[async_trait(?Send)]
pub trait Storage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// A write to shared storage made by someone else (another tab or process).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    pub new_value: Option<String>,
}

pub type StorageListener = Box<dyn Fn(&StorageChange)>;

/// Process-wide "storage changed" notifications.
pub trait ChangeNotifier {
    fn subscribe(&self, listener: StorageListener) -> Subscription;
}

type Origin = u64;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Origin, Rc<dyn Fn(&StorageChange)>)>,
}

/// Fan-out of storage changes to listeners, skipping the writer's own listeners.
#[derive(Clone, Default)]
pub struct StorageEvents {
    registry: Rc<RefCell<Registry>>,
}

impl StorageEvents {
    fn subscribe(&self, origin: Origin, listener: StorageListener) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.push((id, origin, Rc::from(listener)));
        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    fn emit(&self, origin: Origin, change: &StorageChange) {
        // Snapshot first: listeners may subscribe or unsubscribe while running.
        let targets: Vec<Rc<dyn Fn(&StorageChange)>> = self
            .registry
            .borrow()
            .listeners
            .iter()
            .filter(|(_, listener_origin, _)| *listener_origin != origin)
            .map(|(_, _, listener)| Rc::clone(listener))
            .collect();
        for listener in targets {
            listener(change);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }
}

/// Keeps a listener registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .borrow_mut()
                .listeners
                .retain(|(id, _, _)| *id != self.id);
        }
    }
}

#[derive(Default)]
struct SharedMemory {
    items: RefCell<HashMap<String, String>>,
    events: StorageEvents,
    next_tab: RefCell<u64>,
}

/// In-process storage shared by any number of tab handles.
///
/// Each handle from [`MemoryStorage::tab`] behaves like one browser tab: its
/// writes notify listeners subscribed through the other handles.
#[derive(Clone)]
pub struct MemoryStorage {
    shared: Rc<SharedMemory>,
    origin: Origin,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let shared = Rc::new(SharedMemory::default());
        Self::handle(shared)
    }

    /// Another tab over the same backing store.
    pub fn tab(&self) -> Self {
        Self::handle(Rc::clone(&self.shared))
    }

    fn handle(shared: Rc<SharedMemory>) -> Self {
        let origin = {
            let mut next = shared.next_tab.borrow_mut();
            *next += 1;
            *next
        };
        Self { shared, origin }
    }

    pub fn events(&self) -> &StorageEvents {
        &self.shared.events
    }

    /// Writes without notifying anyone, like seeding storage before the app starts.
    pub fn seed(&self, key: &str, value: &str) {
        self.shared
            .items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    pub fn peek(&self, key: &str) -> Option<String> {
        self.shared.items.borrow().get(key).cloned()
    }

    /// Delivers a raw change notification to every other handle's listeners.
    pub fn broadcast(&self, change: StorageChange) {
        self.shared.events.emit(self.origin, &change);
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Storage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.peek(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let previous = self
            .shared
            .items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            self.broadcast(StorageChange {
                key: key.to_string(),
                new_value: Some(value.to_string()),
            });
        }
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let previous = self.shared.items.borrow_mut().remove(key);
        if previous.is_some() {
            self.broadcast(StorageChange {
                key: key.to_string(),
                new_value: None,
            });
        }
        Ok(())
    }
}

impl ChangeNotifier for MemoryStorage {
    fn subscribe(&self, listener: StorageListener) -> Subscription {
        self.shared.events.subscribe(self.origin, listener)
    }
}

const FILE_LISTENER_ORIGIN: Origin = 0;
const EXTERNAL_ORIGIN: Origin = Origin::MAX;

/// One JSON file per key under a directory.
///
/// Writes by other processes are picked up by [`FileStorage::poll_external_changes`].
pub struct FileStorage {
    dir: PathBuf,
    events: StorageEvents,
    snapshot: RefCell<HashMap<String, Option<String>>>,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            events: StorageEvents::default(),
            snapshot: RefCell::new(HashMap::new()),
        }
    }

    pub fn default_dir() -> PathBuf {
        dirs_next::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pokedex")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Re-reads every key seen so far and notifies listeners of the ones that
    /// changed on disk since this process last read or wrote them.
    pub async fn poll_external_changes(&self) -> Result<usize, StorageError> {
        let keys: Vec<String> = self.snapshot.borrow().keys().cloned().collect();
        let mut changed = 0;
        for key in keys {
            let current = self.read(&key).await?;
            let previous = self
                .snapshot
                .borrow_mut()
                .insert(key.clone(), current.clone());
            if previous.as_ref() != Some(&current) {
                changed += 1;
                tracing::debug!(%key, "external storage change");
                self.events.emit(
                    EXTERNAL_ORIGIN,
                    &StorageChange {
                        key,
                        new_value: current,
                    },
                );
            }
        }
        Ok(changed)
    }
}

#[async_trait(?Send)]
impl Storage for FileStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self.read(key).await?;
        self.snapshot
            .borrow_mut()
            .insert(key.to_string(), value.clone());
        Ok(value)
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).await?;
        fs::write(self.path_for(key), value).await?;
        self.snapshot
            .borrow_mut()
            .insert(key.to_string(), Some(value.to_string()));
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        self.snapshot.borrow_mut().insert(key.to_string(), None);
        Ok(())
    }
}

impl ChangeNotifier for FileStorage {
    fn subscribe(&self, listener: StorageListener) -> Subscription {
        self.events.subscribe(FILE_LISTENER_ORIGIN, listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<StorageChange>>>, StorageListener) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let listener: StorageListener = Box::new(move |change: &StorageChange| sink.borrow_mut().push(change.clone()));
        (seen, listener)
    }

    #[tokio::test]
    async fn test_writes_notify_other_tabs_only() {
        let tab_a = MemoryStorage::new();
        let tab_b = tab_a.tab();
        let (seen_a, listener_a) = recorder();
        let (seen_b, listener_b) = recorder();
        let _sub_a = tab_a.subscribe(listener_a);
        let _sub_b = tab_b.subscribe(listener_b);

        tab_a.set_item("k", "v1").await.unwrap();

        assert!(seen_a.borrow().is_empty());
        assert_eq!(
            seen_b.borrow().as_slice(),
            &[StorageChange {
                key: "k".into(),
                new_value: Some("v1".into())
            }]
        );
    }

    #[tokio::test]
    async fn test_unchanged_write_does_not_notify() {
        let tab_a = MemoryStorage::new();
        let tab_b = tab_a.tab();
        let (seen_b, listener_b) = recorder();
        let _sub = tab_b.subscribe(listener_b);

        tab_a.set_item("k", "v1").await.unwrap();
        tab_a.set_item("k", "v1").await.unwrap();
        tab_a.remove_item("k").await.unwrap();
        tab_a.remove_item("k").await.unwrap();

        assert_eq!(seen_b.borrow().len(), 2);
        assert_eq!(seen_b.borrow()[1].new_value, None);
    }

    #[tokio::test]
    async fn test_dropping_subscription_unsubscribes() {
        let tab_a = MemoryStorage::new();
        let tab_b = tab_a.tab();
        let (seen_b, listener_b) = recorder();
        let sub = tab_b.subscribe(listener_b);
        assert_eq!(tab_a.events().listener_count(), 1);

        sub.unsubscribe();
        tab_a.set_item("k", "v1").await.unwrap();

        assert_eq!(tab_a.events().listener_count(), 0);
        assert!(seen_b.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_file_storage_round_trip_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        assert_eq!(storage.get_item("pokedex-store").await.unwrap(), None);
        storage.set_item("pokedex-store", "{}").await.unwrap();
        assert_eq!(
            storage.get_item("pokedex-store").await.unwrap().as_deref(),
            Some("{}")
        );
        storage.remove_item("pokedex-store").await.unwrap();
        storage.remove_item("pokedex-store").await.unwrap();
        assert_eq!(storage.get_item("pokedex-store").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_storage_polls_writes_from_other_processes() {
        let dir = tempfile::tempdir().unwrap();
        let ours = FileStorage::new(dir.path());
        let theirs = FileStorage::new(dir.path());
        let (seen, listener) = recorder();
        let _sub = ours.subscribe(listener);

        ours.set_item("pokedex-store", "a").await.unwrap();
        assert_eq!(ours.poll_external_changes().await.unwrap(), 0);

        theirs.set_item("pokedex-store", "b").await.unwrap();
        assert_eq!(ours.poll_external_changes().await.unwrap(), 1);
        assert_eq!(ours.poll_external_changes().await.unwrap(), 0);

        assert_eq!(
            seen.borrow().as_slice(),
            &[StorageChange {
                key: "pokedex-store".into(),
                new_value: Some("b".into())
            }]
        );
    }
}
