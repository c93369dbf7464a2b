//
//  octopus-client
//  api/cache.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Single-Flight Cache
//!
//! Memoizes asynchronous lookups by key so that concurrent callers asking for
//! the same key share one in-flight resolution, and later callers get the
//! settled value without another request.
//!
//! ## Lifecycle
//!
//! | State | Entered when | Left when |
//! |-------|--------------|-----------|
//! | absent | start, failure, invalidation | a caller launches a resolution |
//! | pending | a caller launches a resolution | it settles |
//! | resolved | the resolution succeeds | invalidation or `clear` |
//!
//! Failures are never memoized: every caller joined to the failed attempt
//! receives the same error, and the next caller starts a fresh attempt.
//!
//! Each entry carries the id of the attempt that created it. A resolution that
//! settles after its entry was invalidated finds a different id (or none) and
//! leaves the cache untouched.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tracing::{debug, warn};

use super::common::ApiError;

type Flight<V> = Shared<BoxFuture<'static, Result<V, ApiError>>>;

/// Observable state of one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// A resolution is in flight.
    Pending,
    /// A value is memoized.
    Resolved,
}

enum Slot<V: Clone> {
    Pending { attempt: u64, flight: Flight<V> },
    Resolved(V),
}

/// Keyed memoization of asynchronous lookups with request coalescing.
///
/// # Example
///
/// ```rust,ignore
/// let cache: SingleFlightCache<String, u32> = SingleFlightCache::new();
/// let value = cache
///     .get_or_resolve("answer".to_string(), || async { Ok(42) })
///     .await?;
/// ```
pub struct SingleFlightCache<K, V: Clone> {
    slots: Mutex<HashMap<K, Slot<V>>>,
    attempts: AtomicU64,
}

impl<K, V> Default for SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            attempts: AtomicU64::new(0),
        }
    }

    /// Returns the memoized value for `key`, joining or launching a
    /// resolution as needed.
    ///
    /// # Parameters
    ///
    /// * `key` - Cache key
    /// * `resolve` - Called at most once per attempt, only when no entry exists
    ///
    /// # Returns
    ///
    /// The settled value, or the error of the attempt this caller joined.
    pub async fn get_or_resolve<F, Fut>(&self, key: K, resolve: F) -> Result<V, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let (attempt, flight) = {
            let mut slots = self.lock();
            match slots.get(&key) {
                Some(Slot::Resolved(value)) => return Ok(value.clone()),
                Some(Slot::Pending { attempt, flight }) => {
                    debug!("Joining in-flight lookup for {:?}", key);
                    (*attempt, flight.clone())
                }
                None => {
                    let attempt = self.attempts.fetch_add(1, Ordering::Relaxed);
                    let flight = resolve().boxed().shared();
                    slots.insert(
                        key.clone(),
                        Slot::Pending {
                            attempt,
                            flight: flight.clone(),
                        },
                    );
                    (attempt, flight)
                }
            }
        };

        let result = flight.await;
        self.settle(&key, attempt, &result);
        result
    }

    /// Records the outcome of `attempt`, unless its entry has since been
    /// invalidated or replaced.
    fn settle(&self, key: &K, attempt: u64, result: &Result<V, ApiError>) {
        let mut slots = self.lock();
        let current = matches!(
            slots.get(key),
            Some(Slot::Pending { attempt: a, .. }) if *a == attempt
        );
        if !current {
            return;
        }
        match result {
            Ok(value) => {
                slots.insert(key.clone(), Slot::Resolved(value.clone()));
            }
            Err(error) => {
                warn!("Lookup for {:?} failed, evicting: {}", key, error);
                slots.remove(key);
            }
        }
    }

    /// Drops the entry for `key`. An in-flight resolution still completes for
    /// the callers already joined to it, but is not memoized.
    pub fn invalidate(&self, key: &K) {
        self.lock().remove(key);
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Returns the state of the entry for `key`, if present.
    pub fn state(&self, key: &K) -> Option<CacheState> {
        self.lock().get(key).map(|slot| match slot {
            Slot::Pending { .. } => CacheState::Pending,
            Slot::Resolved(_) => CacheState::Resolved,
        })
    }

    /// Returns the number of entries, pending ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
