//! Query keys, freshness cache, and retry policy for remote calls.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::api::{PokemonRecord, SummaryPage};
use crate::error::{SourceError, ValidationError};

pub const LIST_STALE_TIME: Duration = Duration::from_secs(5 * 60);
pub const DETAIL_STALE_TIME: Duration = Duration::from_secs(10 * 60);

/// Cache key for a detail lookup.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetailKey {
    Id(u32),
    Name(String),
}

/// A validated id-or-name detail lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailQuery {
    pub key: DetailKey,
    /// Path segment sent upstream: trimmed and lowercased input.
    pub lookup: String,
}

impl DetailQuery {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty);
        }
        if !trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
        {
            return Err(ValidationError::InvalidCharacters(trimmed.to_string()));
        }
        let lookup = trimmed.to_ascii_lowercase();
        let key = match trimmed.parse::<u32>() {
            Ok(id) if id > 0 => DetailKey::Id(id),
            _ => DetailKey::Name(lookup.clone()),
        };
        Ok(Self { key, lookup })
    }

    pub fn by_id(id: u32) -> Self {
        Self {
            key: DetailKey::Id(id),
            lookup: id.to_string(),
        }
    }
}

/// Bounded retries with exponential backoff. Not-found is never retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Default for list pages and the per-page detail fan-out.
    pub const LIST: RetryPolicy = RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
    };

    /// Detail view lookups.
    pub const DETAIL: RetryPolicy = RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
    };

    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::LIST
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!(%label, attempt, ?delay, error = %err, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

struct Entry<V> {
    value: V,
    fetched_at: Instant,
}

/// Successful responses keyed by query, fresh for a fixed window.
pub struct QueryCache<K, V> {
    stale_time: Duration,
    entries: RefCell<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash, V: Clone> QueryCache<K, V> {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            stale_time,
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub fn get_fresh(&self, key: &K) -> Option<V> {
        let entries = self.entries.borrow();
        let entry = entries.get(key)?;
        if entry.fetched_at.elapsed() < self.stale_time {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.borrow_mut().insert(
            key,
            Entry {
                value,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Response cache shared by the list and detail orchestrators.
pub struct ResponseCache {
    pub pages: QueryCache<(u32, u32), SummaryPage>,
    pub details: QueryCache<DetailKey, PokemonRecord>,
}

impl ResponseCache {
    pub fn new(list_stale_time: Duration, detail_stale_time: Duration) -> Self {
        Self {
            pages: QueryCache::new(list_stale_time),
            details: QueryCache::new(detail_stale_time),
        }
    }

    /// Stores a detail under both its requested key and its numeric id.
    pub fn insert_detail(&self, key: DetailKey, record: PokemonRecord) {
        let id_key = DetailKey::Id(record.id);
        if key != id_key {
            self.details.insert(id_key, record.clone());
        }
        self.details.insert(key, record);
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(LIST_STALE_TIME, DETAIL_STALE_TIME)
    }
}
