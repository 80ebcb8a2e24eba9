//! In-process result cache with TTL expiry, LRU eviction and
//! single-flight computation.
//!
//! Concurrent requests for the same fingerprint attach to one flight: the
//! first caller computes and publishes the result on the flight, the rest
//! wait on its lock and take that result. Different fingerprints never
//! block each other.

mod fingerprint;

pub use fingerprint::Fingerprint;

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lru::LruCache;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CacheError<E> {
    #[error("computing {fingerprint} failed: {source}")]
    Compute {
        fingerprint: Fingerprint,
        #[source]
        source: E,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

struct CacheEntry<T> {
    payload: Arc<T>,
    computed_at: Instant,
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.computed_at) < self.ttl
    }
}

/// One in-flight computation. The holder of `result` computes; on success
/// it leaves the payload in the slot for everyone queued behind it.
struct Flight<T> {
    result: tokio::sync::Mutex<Option<Arc<T>>>,
}

pub struct ResultCache<T> {
    entries: Mutex<LruCache<Fingerprint, CacheEntry<T>>>,
    in_flight: Mutex<HashMap<Fingerprint, Arc<Flight<T>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<T> ResultCache<T> {
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Return the stored payload if it is younger than its TTL, otherwise
    /// run `compute` once (across concurrent callers) and store the result.
    /// A failed compute leaves the cache as it was; the next waiter, if
    /// any, computes again.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        fingerprint: &Fingerprint,
        ttl: Duration,
        compute: F,
    ) -> Result<Arc<T>, CacheError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.lookup(fingerprint) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(fingerprint = fingerprint.short(), "Result cache hit");
            return Ok(hit);
        }

        let flight = FlightGuard::register(self, fingerprint);
        let mut slot = flight.flight.result.lock().await;

        // Published by the caller that held the flight before us. Taken
        // regardless of TTL or eviction.
        if let Some(shared) = slot.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(fingerprint = fingerprint.short(), "Joined in-flight result");
            return Ok(shared.clone());
        }

        // A flight that finished between our lookup and registration.
        if let Some(hit) = self.lookup(fingerprint) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(fingerprint = fingerprint.short(), "Result cache hit after wait");
            return Ok(hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(fingerprint = fingerprint.short(), "Result cache miss, computing");

        let value = compute().await.map_err(|source| CacheError::Compute {
            fingerprint: fingerprint.clone(),
            source,
        })?;

        let payload = Arc::new(value);
        *slot = Some(payload.clone());
        self.insert(fingerprint.clone(), payload.clone(), ttl);
        Ok(payload)
    }

    /// Fresh payload for `fingerprint`, without computing.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<T>> {
        self.lookup(fingerprint)
    }

    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        self.entries().pop(fingerprint).is_some()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        let expired: Vec<Fingerprint> = entries
            .iter()
            .filter(|(_, e)| !e.is_fresh(now))
            .map(|(fp, _)| fp.clone())
            .collect();
        for fp in &expired {
            entries.pop(fp);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fingerprints with a computation registered or waiting.
    pub fn in_flight(&self) -> usize {
        self.flights().len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// `LruCache::get` marks the entry most recently used.
    fn lookup(&self, fingerprint: &Fingerprint) -> Option<Arc<T>> {
        let now = Instant::now();
        let mut entries = self.entries();

        let found = entries
            .get(fingerprint)
            .map(|e| e.is_fresh(now).then(|| e.payload.clone()));
        match found {
            None => None,
            Some(Some(payload)) => Some(payload),
            Some(None) => {
                entries.pop(fingerprint);
                debug!(fingerprint = fingerprint.short(), "Result cache entry expired");
                None
            }
        }
    }

    fn insert(&self, fingerprint: Fingerprint, payload: Arc<T>, ttl: Duration) {
        let entry = CacheEntry {
            payload,
            computed_at: Instant::now(),
            ttl,
        };
        let displaced = self.entries().push(fingerprint.clone(), entry);
        if let Some((evicted, _)) = displaced.filter(|(fp, _)| *fp != fingerprint) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(fingerprint = evicted.short(), "Evicted least recently used result");
        }
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<Fingerprint, CacheEntry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flights(&self) -> MutexGuard<'_, HashMap<Fingerprint, Arc<Flight<T>>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A caller's registration in the single-flight table. Dropping it (also
/// when the caller's future is cancelled) removes the table entry once no
/// other caller holds or waits on the flight.
struct FlightGuard<'a, T> {
    cache: &'a ResultCache<T>,
    fingerprint: Fingerprint,
    flight: Arc<Flight<T>>,
}

impl<'a, T> FlightGuard<'a, T> {
    fn register(cache: &'a ResultCache<T>, fingerprint: &Fingerprint) -> Self {
        let flight = cache
            .flights()
            .entry(fingerprint.clone())
            .or_insert_with(|| {
                Arc::new(Flight {
                    result: tokio::sync::Mutex::new(None),
                })
            })
            .clone();
        Self {
            cache,
            fingerprint: fingerprint.clone(),
            flight,
        }
    }
}

impl<T> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        let mut flights = self.cache.flights();
        let last_holder = flights
            .get(&self.fingerprint)
            .is_some_and(|f| Arc::ptr_eq(f, &self.flight) && Arc::strong_count(f) == 2);
        if last_holder {
            flights.remove(&self.fingerprint);
        }
    }
}
