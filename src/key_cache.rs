use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::DEFAULT_SWEEP_INTERVAL;
use crate::error::Error;
use crate::error::Result;

/// Longest lifetime an entry or token can be given, about 136 years
pub(crate) const MAX_LIFETIME: Duration = Duration::from_secs(u32::MAX as u64);

/// Instant `lifetime` from now, with the lifetime capped at [`MAX_LIFETIME`]
///
/// Lifetimes that would overflow the clock expire immediately.
pub(crate) fn expiry_after(lifetime: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(lifetime.min(MAX_LIFETIME)).unwrap_or(now)
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

type Entries<K, V> = Arc<RwLock<HashMap<K, CacheEntry<V>>>>;

/// In-memory key/value store where every entry carries an absolute expiry instant
///
/// Expired entries are never returned, and a background task owned by the cache
/// removes them on a fixed interval. The task stops when the cache is shut down or
/// dropped. Constructing a cache outside a tokio runtime fails with
/// [`Error::NoRuntime`].
pub struct KeyCache<K, V> {
    entries: Entries<K, V>,
    shutdown: CancellationToken,
    sweeper: JoinHandle<()>,
}

impl<K, V> KeyCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache swept once per minute
    pub fn new() -> Result<Self> {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }

    /// Create a cache swept every `interval`
    pub fn with_sweep_interval(interval: Duration) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let entries: Entries<K, V> = Arc::new(RwLock::new(HashMap::new()));
        let shutdown = CancellationToken::new();
        let sweeper = runtime.spawn(sweep_loop(
            Arc::clone(&entries),
            interval,
            shutdown.clone(),
        ));

        Ok(Self {
            entries,
            shutdown,
            sweeper,
        })
    }

    /// Look up a live entry
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    /// Insert or overwrite an entry
    pub async fn set(&self, key: K, value: V, expires_at: Instant) {
        let mut entries = self.entries.write().await;
        entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Insert an entry unless a live one already exists for `key`
    ///
    /// Returns whether the entry was inserted.
    pub async fn add(&self, key: K, value: V, expires_at: Instant) -> bool {
        let mut entries = self.entries.write().await;
        if entries
            .get(&key)
            .is_some_and(|entry| entry.is_live(Instant::now()))
        {
            return false;
        }

        entries.insert(key, CacheEntry { value, expires_at });
        true
    }

    /// Remove every expired entry, returning how many were dropped
    pub async fn purge_expired(&self) -> usize {
        purge(&self.entries).await
    }

    /// Number of stored entries, including expired ones not yet swept
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Stop the background sweep
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether the background sweep has exited
    pub fn is_shut_down(&self) -> bool {
        self.sweeper.is_finished()
    }
}

impl<K, V> Drop for KeyCache<K, V> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn purge<K, V>(entries: &RwLock<HashMap<K, CacheEntry<V>>>) -> usize {
    let mut entries = entries.write().await;
    let before = entries.len();
    let now = Instant::now();
    entries.retain(|_, entry| entry.is_live(now));
    before - entries.len()
}

async fn sweep_loop<K, V>(entries: Entries<K, V>, period: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let removed = purge(&entries).await;
                if removed > 0 {
                    debug!(removed, "Swept expired cache entries");
                }
            }
        }
    }

    debug!("Cache sweep stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_hidden_before_sweep() {
        let cache = KeyCache::new().unwrap();
        cache
            .set("kid", "cert".to_string(), Instant::now() + Duration::from_secs(5))
            .await;
        assert_eq!(cache.get(&"kid").await.as_deref(), Some("cert"));

        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(cache.get(&"kid").await, None);
        assert_eq!(cache.len().await, 1, "Entry stays stored until swept");
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_entries_past_their_expiry() {
        let cache = KeyCache::with_sweep_interval(Duration::from_secs(60)).unwrap();
        cache.set("stale", 1, Instant::now()).await;
        cache
            .set("fresh", 2, Instant::now() + Duration::from_secs(3600))
            .await;

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&"fresh").await, Some(2));
    }

    #[tokio::test]
    async fn add_does_not_replace_live_entry() {
        let cache = KeyCache::new().unwrap();
        let expiry = Instant::now() + Duration::from_secs(60);

        assert!(cache.add("kid", 1, expiry).await);
        assert!(!cache.add("kid", 2, expiry).await);
        assert_eq!(cache.get(&"kid").await, Some(1));
    }

    #[tokio::test]
    async fn add_replaces_expired_entry() {
        let cache = KeyCache::new().unwrap();
        cache.set("kid", 1, Instant::now()).await;

        assert!(cache.add("kid", 2, Instant::now() + Duration::from_secs(60)).await);
        assert_eq!(cache.get(&"kid").await, Some(2));
    }

    #[tokio::test]
    async fn shutdown_stops_sweeper() {
        let cache: KeyCache<String, String> = KeyCache::new().unwrap();
        cache.shutdown();

        for _ in 0..10 {
            if cache.is_shut_down() {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert!(cache.is_shut_down());
    }

    #[test]
    fn construction_outside_runtime_fails() {
        let result: Result<KeyCache<String, String>> = KeyCache::new();
        assert!(matches!(result, Err(Error::NoRuntime)));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_lifetime_is_capped() {
        let now = Instant::now();
        assert_eq!(expiry_after(Duration::MAX), now + MAX_LIFETIME);
        assert_eq!(
            expiry_after(Duration::from_secs(60)),
            now + Duration::from_secs(60)
        );
    }
}
