use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::error::StatsError;

/// How a call site treats upstream data it fetched earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    AlwaysRefetch,
    ReuseFor(Duration),
}

impl CachePolicy {
    /// `0` means always refetch.
    pub fn from_ttl_secs(ttl_secs: u64) -> Self {
        if ttl_secs == 0 {
            CachePolicy::AlwaysRefetch
        } else {
            CachePolicy::ReuseFor(Duration::from_secs(ttl_secs))
        }
    }
}

#[derive(Clone)]
struct CachedValue<V> {
    value: V,
    fetched_at: Instant,
}

/// Fetch-through cache owned by a single call site.
///
/// Only successful fetches are stored; an error is handed back to the caller
/// and the next call goes upstream again.
pub struct CachedFetch<K, V> {
    policy: CachePolicy,
    entries: Arc<RwLock<HashMap<K, CachedValue<V>>>>,
}

impl<K, V> CachedFetch<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<V, StatsError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, StatsError>>,
    {
        let ttl = match self.policy {
            CachePolicy::AlwaysRefetch => return fetch().await,
            CachePolicy::ReuseFor(ttl) => ttl,
        };

        if let Some(value) = self.fresh(&key, ttl).await {
            debug!("Cache hit for {:?}", key);
            return Ok(value);
        }

        let value = fetch().await?;
        self.entries.write().await.insert(
            key,
            CachedValue {
                value: value.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(value)
    }

    async fn fresh(&self, key: &K, ttl: Duration) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|cached| cached.fetched_at.elapsed() <= ttl)
            .map(|cached| cached.value.clone())
    }

    /// Drop entries older than the reuse window, returning how many went.
    pub async fn purge_expired(&self) -> usize {
        let CachePolicy::ReuseFor(ttl) = self.policy else {
            return 0;
        };
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, cached| cached.fetched_at.elapsed() <= ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn counted(calls: &AtomicUsize, value: &str) -> Result<String, StatsError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value.to_string())
    }

    #[test]
    fn test_policy_from_ttl() {
        assert_eq!(CachePolicy::from_ttl_secs(0), CachePolicy::AlwaysRefetch);
        assert_eq!(
            CachePolicy::from_ttl_secs(60),
            CachePolicy::ReuseFor(Duration::from_secs(60))
        );
    }

    #[tokio::test]
    async fn test_always_refetch_never_stores() {
        let cache = CachedFetch::<(), String>::new(CachePolicy::AlwaysRefetch);
        let calls = AtomicUsize::new(0);

        cache.get_or_fetch((), || counted(&calls, "a")).await.unwrap();
        cache.get_or_fetch((), || counted(&calls, "b")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reuse_within_window_then_refetch() {
        let cache = CachedFetch::<String, String>::new(CachePolicy::ReuseFor(Duration::from_secs(60)));
        let calls = AtomicUsize::new(0);

        let first = cache.get_or_fetch("addr".to_string(), || counted(&calls, "1T")).await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        let second = cache.get_or_fetch("addr".to_string(), || counted(&calls, "2T")).await.unwrap();
        assert_eq!(first, "1T");
        assert_eq!(second, "1T");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        let third = cache.get_or_fetch("addr".to_string(), || counted(&calls, "3T")).await.unwrap();
        assert_eq!(third, "3T");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let cache = CachedFetch::<String, String>::new(CachePolicy::ReuseFor(Duration::from_secs(60)));
        let calls = AtomicUsize::new(0);

        cache.get_or_fetch("a".to_string(), || counted(&calls, "1")).await.unwrap();
        let other = cache.get_or_fetch("b".to_string(), || counted(&calls, "2")).await.unwrap();
        assert_eq!(other, "2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_not_cached() {
        let cache = CachedFetch::<(), String>::new(CachePolicy::ReuseFor(Duration::from_secs(60)));

        let err = cache
            .get_or_fetch((), || async { Err(StatsError::UpstreamStatus(503)) })
            .await
            .unwrap_err();
        assert!(matches!(err, StatsError::UpstreamStatus(503)));
        assert_eq!(cache.len().await, 0);

        let value = cache
            .get_or_fetch((), || async { Ok("recovered".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "recovered");
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = CachedFetch::<String, String>::new(CachePolicy::ReuseFor(Duration::from_secs(60)));
        let calls = AtomicUsize::new(0);

        cache.get_or_fetch("old".to_string(), || counted(&calls, "1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.get_or_fetch("new".to_string(), || counted(&calls, "2")).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);
    }
}
