//! Trailing-edge debounce over a `watch` channel.

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Holds the last value that stayed unchanged for `delay`.
///
/// Every `set` cancels the pending commit and schedules a new one, so only the
/// final value of a burst is ever observed. Requires a tokio runtime.
pub struct Debounced<T> {
    delay: Duration,
    committed: Arc<watch::Sender<T>>,
    pending: RefCell<Option<JoinHandle<()>>>,
}

impl<T> Debounced<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(initial: T, delay: Duration) -> Self {
        let (committed, _) = watch::channel(initial);
        Self {
            delay,
            committed: Arc::new(committed),
            pending: RefCell::new(None),
        }
    }

    pub fn set(&self, value: T) {
        self.cancel();
        if self.delay.is_zero() {
            self.committed.send_replace(value);
            return;
        }
        let deadline = Instant::now() + self.delay;
        let committed = Arc::clone(&self.committed);
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            committed.send_replace(value);
        });
        *self.pending.borrow_mut() = Some(handle);
    }

    /// The committed value.
    pub fn get(&self) -> T {
        self.committed.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.committed.subscribe()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .borrow()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn cancel(&self) {
        if let Some(handle) = self.pending.borrow_mut().take() {
            handle.abort();
        }
    }
}

impl<T> Drop for Debounced<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.get_mut().take() {
            handle.abort();
        }
    }
}
