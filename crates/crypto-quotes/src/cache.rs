//! Single-flight TTL Cache
//!
//! Process-wide map from key to a slot guarded by an async mutex. The first
//! caller to find a slot empty or expired runs the producer while holding the
//! slot; everyone else asking for the same key queues on that mutex and sees
//! the freshly stored value. Different keys never contend past the short
//! map lookup.
//!
//! ```text
//!   caller A ──lock(slot "k")──▶ miss ──producer()──▶ store ──unlock──▶ value
//!   caller B ──lock(slot "k")······················waits·······▶ hit ──▶ value
//! ```
//!
//! A producer that fails (or whose future is dropped) stores nothing, so the
//! next caller in line becomes the new writer.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

/// A value together with how long it may be served
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expiring<V> {
    pub value: V,
    pub ttl: Duration,
}

impl<V> Expiring<V> {
    pub const fn new(value: V, ttl: Duration) -> Self {
        Self { value, ttl }
    }
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

type Slot<V> = Arc<AsyncMutex<Option<Entry<V>>>>;

/// In-memory cache with per-key single-flight population
pub struct TtlCache<V> {
    slots: Mutex<HashMap<String, Slot<V>>>,
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Number of slots held, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Existing slot for `key`, or a new one after sweeping dead slots
    fn slot(&self, key: &str) -> Slot<V> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get(key) {
            return Arc::clone(slot);
        }

        evict_expired(&mut slots, Instant::now());

        let slot = Slot::<V>::default();
        slots.insert(key.to_owned(), Arc::clone(&slot));
        slot
    }
}

/// Drop slots that are empty or expired and that no caller holds.
///
/// Slots are only cloned under the map lock, so a strong count of one means
/// nobody is waiting on or populating it.
fn evict_expired<V>(slots: &mut HashMap<String, Slot<V>>, now: Instant) {
    let before = slots.len();
    slots.retain(|_, slot| {
        Arc::strong_count(slot) > 1
            || slot
                .try_lock()
                .map_or(true, |entry| entry.as_ref().is_some_and(|e| e.is_fresh(now)))
    });

    let evicted = before - slots.len();
    if evicted > 0 {
        tracing::debug!(evicted, remaining = slots.len(), "swept expired cache slots");
    }
}

impl<V: Clone> TtlCache<V> {
    /// Return the unexpired value for `key`, or run `producer` and store what
    /// it yields for the TTL it chose.
    ///
    /// Producer errors are handed back to this caller only and are not cached.
    pub async fn get_or_populate<F, Fut, E>(&self, key: &str, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Expiring<V>, E>>,
    {
        let slot = self.slot(key);
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref().filter(|e| e.is_fresh(Instant::now())) {
            tracing::trace!(key, "cache hit");
            return Ok(cached.value.clone());
        }

        tracing::debug!(key, "cache miss, populating");
        let Expiring { value, ttl } = producer().await?;

        *entry = Some(Entry {
            value: value.clone(),
            expires_at: Instant::now() + ttl,
        });
        Ok(value)
    }

    /// Peek at the unexpired value for `key` without populating it
    pub async fn get(&self, key: &str) -> Option<V> {
        let slot = self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()?;

        let entry = slot.lock().await;
        entry
            .as_ref()
            .filter(|e| e.is_fresh(Instant::now()))
            .map(|e| e.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    async fn produce(
        calls: &AtomicUsize,
        value: &'static str,
        ttl: Duration,
    ) -> Result<Expiring<&'static str>, ()> {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(250)).await;
        Ok(Expiring::new(value, ttl))
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_populate_once() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(61);

        let (a, b) = tokio::join!(
            cache.get_or_populate("k", || produce(&calls, "first", ttl)),
            cache.get_or_populate("k", || produce(&calls, "second", ttl)),
        );

        assert_eq!(a, Ok("first"));
        assert_eq!(b, Ok("first"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_thundering_herd_collapses() {
        let cache = &TtlCache::new();
        let calls = &AtomicUsize::new(0);
        let ttl = Duration::from_secs(61);

        let results = futures::future::join_all(
            (0..32).map(move |_| cache.get_or_populate("herd", move || produce(calls, "v", ttl))),
        )
        .await;

        assert!(results.iter().all(|r| *r == Ok("v")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(61);

        cache.get_or_populate("k", || produce(&calls, "v1", ttl)).await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        let hit = cache.get_or_populate("k", || produce(&calls, "v2", ttl)).await;
        assert_eq!(hit, Ok("v1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k").await, None);
        let refreshed = cache.get_or_populate("k", || produce(&calls, "v2", ttl)).await;
        assert_eq!(refreshed, Ok("v2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_slots_are_swept_on_insert() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(61);

        for i in 0..100 {
            let key = format!("k{i}");
            cache.get_or_populate(&key, || produce(&calls, "v", ttl)).await.unwrap();
        }
        assert_eq!(cache.len(), 100);

        tokio::time::advance(Duration::from_secs(30)).await;
        cache.get_or_populate("fresh", || produce(&calls, "v", ttl)).await.unwrap();
        assert_eq!(cache.len(), 101);

        tokio::time::advance(Duration::from_secs(3600)).await;
        cache.get_or_populate("other", || produce(&calls, "v", ttl)).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("other").await, Some("v"));
        assert_eq!(cache.get("k0").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_live_entries() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);

        cache.get_or_populate("short", || produce(&calls, "s", Duration::from_secs(5))).await.unwrap();
        cache.get_or_populate("long", || produce(&calls, "l", Duration::from_secs(3600))).await.unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        cache.get_or_populate("new", || produce(&calls, "n", Duration::from_secs(5))).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("long").await, Some("l"));
        assert_eq!(cache.get("short").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_not_cached() {
        let cache: TtlCache<&'static str> = TtlCache::new();

        let failed = cache
            .get_or_populate("k", || async { Err::<Expiring<&'static str>, _>("boom") })
            .await;
        assert_eq!(failed, Err("boom"));
        assert_eq!(cache.get("k").await, None);

        let ok = cache
            .get_or_populate("k", || async {
                Ok::<_, &str>(Expiring::new("v", Duration::from_secs(1)))
            })
            .await;
        assert_eq!(ok, Ok("v"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_producer_leaves_slot_empty() {
        let cache: TtlCache<&'static str> = TtlCache::new();

        let abandoned = tokio::time::timeout(
            Duration::from_secs(1),
            cache.get_or_populate("k", || std::future::pending::<Result<Expiring<&'static str>, ()>>()),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(cache.get("k").await, None);

        let next = cache
            .get_or_populate("k", || async { Ok::<_, ()>(Expiring::new("v", Duration::from_secs(5))) })
            .await;
        assert_eq!(next, Ok("v"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_populate_in_parallel() {
        let cache: TtlCache<u8> = TtlCache::new();
        let barrier = Barrier::new(2);

        // Each producer waits for the other; serialized keys would never finish.
        let both = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(
                cache.get_or_populate("a", || async {
                    barrier.wait().await;
                    Ok::<_, ()>(Expiring::new(1, Duration::from_secs(5)))
                }),
                cache.get_or_populate("b", || async {
                    barrier.wait().await;
                    Ok::<_, ()>(Expiring::new(2, Duration::from_secs(5)))
                }),
            )
        })
        .await;

        assert_eq!(both, Ok((Ok(1), Ok(2))));
        assert_eq!(cache.len(), 2);
    }
}
