use async_trait::async_trait;
use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard,
    },
    time::Duration,
};
use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};
use web_utils::unix_timestamp;

use crate::{
    error::StatsError,
    series::{RollingSeries, Sample},
};

const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Where a chart gets its next hashrate reading from
#[async_trait]
pub trait HashrateSource: Send + Sync {
    async fn current_hashrate(&self) -> Result<String, StatsError>;
}

/// A rolling series plus the source that refreshes it.
pub struct SeriesFeed {
    source: Arc<dyn HashrateSource>,
    series: RwLock<RollingSeries>,
    last_sample_at: AtomicU64,
}

impl SeriesFeed {
    pub fn new(source: Arc<dyn HashrateSource>, seed: Sample, capacity: usize) -> Self {
        Self {
            source,
            series: RwLock::new(RollingSeries::seeded(capacity, seed)),
            last_sample_at: AtomicU64::new(unix_timestamp()),
        }
    }

    /// Fetch one reading and append it. A failed fetch is logged and skipped.
    pub async fn tick(&self) -> bool {
        match self.source.current_hashrate().await {
            Ok(hashrate) => {
                let now = unix_timestamp();
                self.append(Sample::at(now, hashrate));
                true
            }
            Err(e) => {
                warn!("Chart refresh failed: {}", e);
                false
            }
        }
    }

    fn read_series(&self) -> RwLockReadGuard<'_, RollingSeries> {
        match self.series.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn append(&self, sample: Sample) {
        let mut guard = match self.series.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.append(sample);
        self.last_sample_at.store(unix_timestamp(), Ordering::Relaxed);
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.read_series().to_vec()
    }

    pub fn capacity(&self) -> usize {
        self.read_series().capacity()
    }

    /// Unix seconds of the last successful append (or of the seed).
    pub fn last_sample_at(&self) -> u64 {
        self.last_sample_at.load(Ordering::Relaxed)
    }
}

/// A mounted chart: a seeded feed and the timer task that refreshes it.
///
/// Unmounting (or dropping) the view aborts the timer, so no tick runs after it.
pub struct ChartView {
    feed: Arc<SeriesFeed>,
    refresh_interval: Duration,
    timer: JoinHandle<()>,
}

impl ChartView {
    /// Must be called from within a tokio runtime.
    pub fn mount(
        source: Arc<dyn HashrateSource>,
        seed: Sample,
        capacity: usize,
        refresh_interval: Duration,
    ) -> Self {
        let refresh_interval = refresh_interval.max(MIN_REFRESH_INTERVAL);
        let feed = Arc::new(SeriesFeed::new(source, seed, capacity));
        let timer = tokio::spawn(run_refresh_timer(feed.clone(), refresh_interval));
        Self {
            feed,
            refresh_interval,
            timer,
        }
    }

    pub fn feed(&self) -> &Arc<SeriesFeed> {
        &self.feed
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.feed.samples()
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// No sample for two refresh intervals.
    pub fn is_stale(&self, now: u64) -> bool {
        now.saturating_sub(self.feed.last_sample_at()) > 2 * self.refresh_interval.as_secs()
    }

    pub fn unmount(self) {}
}

impl Drop for ChartView {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

async fn run_refresh_timer(feed: Arc<SeriesFeed>, period: Duration) {
    // The seed is the first sample, so the first tick waits one full period
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        feed.tick().await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChartKey {
    Pool,
    User(String),
}

impl fmt::Display for ChartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartKey::Pool => write!(f, "pool"),
            ChartKey::User(address) => write!(f, "user {}", address),
        }
    }
}

struct MountedView {
    view: ChartView,
    last_seen: Instant,
}

/// Chart views shared by the web handlers, one per key.
///
/// A view is mounted the first time a page for its key renders and stays
/// mounted while its series keeps being read. `reap_idle` unmounts user
/// views nobody has looked at for `idle_timeout`; the pool view, once mounted,
/// lives until `unmount` or `unmount_all`.
pub struct ChartRegistry {
    views: Mutex<HashMap<ChartKey, MountedView>>,
    capacity: usize,
    refresh_interval: Duration,
    idle_timeout: Duration,
}

impl ChartRegistry {
    pub fn new(capacity: usize, refresh_interval: Duration, idle_timeout: Duration) -> Self {
        Self {
            views: Mutex::new(HashMap::new()),
            capacity,
            refresh_interval,
            idle_timeout,
        }
    }

    fn lock_views(&self) -> MutexGuard<'_, HashMap<ChartKey, MountedView>> {
        match self.views.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Mount the view for `key` seeded with `seed_hashrate` unless one is
    /// already mounted, and return its samples.
    pub fn mount_or_touch<F>(&self, key: ChartKey, seed_hashrate: &str, make_source: F) -> Vec<Sample>
    where
        F: FnOnce() -> Arc<dyn HashrateSource>,
    {
        let mut views = self.lock_views();
        let mounted = views.entry(key.clone()).or_insert_with(|| {
            info!("Mounting chart view for {}", key);
            MountedView {
                view: ChartView::mount(
                    make_source(),
                    Sample::at(unix_timestamp(), seed_hashrate),
                    self.capacity,
                    self.refresh_interval,
                ),
                last_seen: Instant::now(),
            }
        });
        mounted.last_seen = Instant::now();
        mounted.view.samples()
    }

    /// Samples of a mounted view; counts as activity for idle reaping.
    pub fn samples(&self, key: &ChartKey) -> Option<Vec<Sample>> {
        let mut views = self.lock_views();
        let mounted = views.get_mut(key)?;
        mounted.last_seen = Instant::now();
        Some(mounted.view.samples())
    }

    /// `None` when nothing is mounted for `key`.
    pub fn is_stale(&self, key: &ChartKey, now: u64) -> Option<bool> {
        self.lock_views().get(key).map(|mounted| mounted.view.is_stale(now))
    }

    pub fn is_mounted(&self, key: &ChartKey) -> bool {
        self.lock_views().contains_key(key)
    }

    pub fn unmount(&self, key: &ChartKey) -> bool {
        match self.lock_views().remove(key) {
            Some(mounted) => {
                info!("Unmounting chart view for {}", key);
                mounted.view.unmount();
                true
            }
            None => false,
        }
    }

    /// Unmount every user view idle for longer than the idle timeout.
    pub fn reap_idle(&self) -> usize {
        let mut views = self.lock_views();
        let before = views.len();
        views.retain(|key, mounted| {
            let keep =
                *key == ChartKey::Pool || mounted.last_seen.elapsed() <= self.idle_timeout;
            if !keep {
                debug!("Reaping idle chart view for {}", key);
            }
            keep
        });
        before - views.len()
    }

    pub fn unmount_all(&self) {
        let mut views = self.lock_views();
        if !views.is_empty() {
            info!("Unmounting {} chart view(s)", views.len());
        }
        views.clear();
    }

    pub fn len(&self) -> usize {
        self.lock_views().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Returns "1T", "2T", ... or fails when `failing` is set.
    struct CountingSource {
        calls: AtomicUsize,
        failing: bool,
    }

    impl CountingSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failing: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failing: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HashrateSource for CountingSource {
        async fn current_hashrate(&self) -> Result<String, StatsError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failing {
                Err(StatsError::UpstreamStatus(502))
            } else {
                Ok(format!("{}T", n))
            }
        }
    }

    fn as_source(source: &Arc<CountingSource>) -> Arc<dyn HashrateSource> {
        source.clone()
    }

    const TEN_MINUTES: Duration = Duration::from_secs(600);

    #[tokio::test]
    async fn test_feed_tick_appends() {
        let source = CountingSource::new();
        let feed = SeriesFeed::new(source.clone(), Sample::new("seed", "0.5T"), 14);

        assert!(feed.tick().await);
        assert!(feed.tick().await);

        let hashrates: Vec<String> = feed.samples().into_iter().map(|s| s.hashrate).collect();
        assert_eq!(hashrates, vec!["0.5T", "1T", "2T"]);
    }

    #[tokio::test]
    async fn test_feed_failed_tick_is_skipped() {
        let source = CountingSource::failing();
        let feed = SeriesFeed::new(source.clone(), Sample::new("seed", "0.5T"), 14);

        assert!(!feed.tick().await);
        assert_eq!(source.calls(), 1);
        assert_eq!(feed.samples().len(), 1);
    }

    #[tokio::test]
    async fn test_feed_respects_capacity() {
        let source = CountingSource::new();
        let feed = SeriesFeed::new(source, Sample::new("seed", "0T"), 14);
        for _ in 0..20 {
            feed.tick().await;
        }
        let samples = feed.samples();
        assert_eq!(samples.len(), 14);
        assert_eq!(samples.first().unwrap().hashrate, "7T");
        assert_eq!(samples.last().unwrap().hashrate, "20T");
    }

    #[test]
    fn test_feed_survives_poisoned_lock() {
        let feed = Arc::new(SeriesFeed::new(CountingSource::new(), Sample::new("seed", "1T"), 14));

        let holder = feed.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.series.write().unwrap();
            panic!("writer died holding the series lock");
        })
        .join();
        assert!(feed.series.is_poisoned());

        feed.append(Sample::new("after", "2T"));
        let hashrates: Vec<String> = feed.samples().into_iter().map(|s| s.hashrate).collect();
        assert_eq!(hashrates, vec!["1T", "2T"]);
        assert_eq!(feed.capacity(), 14);
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_ticks_on_interval() {
        let source = CountingSource::new();
        let view = ChartView::mount(source.clone(), Sample::new("seed", "0T"), 14, TEN_MINUTES);

        // Seeded, no tick yet
        assert_eq!(view.samples().len(), 1);
        time::sleep(TEN_MINUTES - Duration::from_secs(1)).await;
        assert_eq!(source.calls(), 0);

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(view.samples().len(), 2);

        time::sleep(TEN_MINUTES * 3).await;
        assert_eq!(source.calls(), 4);
        assert_eq!(view.samples().last().unwrap().hashrate, "4T");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_stops_timer() {
        let source = CountingSource::new();
        let view = ChartView::mount(source.clone(), Sample::new("seed", "0T"), 14, TEN_MINUTES);
        let feed = view.feed().clone();

        time::sleep(TEN_MINUTES + Duration::from_secs(1)).await;
        assert_eq!(source.calls(), 1);

        view.unmount();
        time::sleep(TEN_MINUTES * 6).await;
        assert_eq!(source.calls(), 1);
        // the aborted timer task released its handle on the feed
        assert_eq!(Arc::strong_count(&feed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_staleness() {
        let source = CountingSource::failing();
        let view = ChartView::mount(source, Sample::new("seed", "0T"), 14, TEN_MINUTES);
        let now = view.feed().last_sample_at();

        assert!(!view.is_stale(now));
        assert!(!view.is_stale(now + 1200));
        assert!(view.is_stale(now + 1201));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_mounts_once_per_key() {
        let registry = ChartRegistry::new(14, TEN_MINUTES, Duration::from_secs(3600));
        let source = CountingSource::new();

        let samples = registry.mount_or_touch(ChartKey::Pool, "274P", || as_source(&source));
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].hashrate, "274P");

        // Second render keeps the existing series and ignores the new seed
        let samples = registry.mount_or_touch(ChartKey::Pool, "999P", || {
            panic!("view already mounted")
        });
        assert_eq!(samples[0].hashrate, "274P");

        registry.mount_or_touch(ChartKey::User("bc1qabc".to_string()), "1T", || as_source(&source));
        assert_eq!(registry.len(), 2);
        assert!(registry.samples(&ChartKey::User("nobody".to_string())).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_reaps_idle_views() {
        let registry = ChartRegistry::new(14, TEN_MINUTES, Duration::from_secs(3600));
        let pool_source = CountingSource::new();
        let user_source = CountingSource::new();
        let user_key = ChartKey::User("bc1qabc".to_string());

        registry.mount_or_touch(ChartKey::Pool, "1P", || as_source(&pool_source));
        registry.mount_or_touch(user_key.clone(), "1T", || as_source(&user_source));

        time::sleep(Duration::from_secs(1800)).await;
        assert!(registry.samples(&ChartKey::Pool).is_some());

        time::sleep(Duration::from_secs(2000)).await;
        assert_eq!(registry.reap_idle(), 1);
        assert!(registry.is_mounted(&ChartKey::Pool));
        assert!(!registry.is_mounted(&user_key));

        let user_calls = user_source.calls();
        time::sleep(TEN_MINUTES * 3).await;
        assert_eq!(user_source.calls(), user_calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_view_survives_reaping() {
        let registry = ChartRegistry::new(14, TEN_MINUTES, Duration::from_secs(60));
        let source = CountingSource::new();
        registry.mount_or_touch(ChartKey::Pool, "1P", || as_source(&source));

        time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(registry.reap_idle(), 0);
        assert!(registry.is_mounted(&ChartKey::Pool));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_unmount_all() {
        let registry = ChartRegistry::new(14, TEN_MINUTES, Duration::from_secs(3600));
        let source = CountingSource::new();
        registry.mount_or_touch(ChartKey::Pool, "1P", || as_source(&source));
        assert!(registry.unmount(&ChartKey::Pool));
        assert!(!registry.unmount(&ChartKey::Pool));

        registry.mount_or_touch(ChartKey::Pool, "1P", || as_source(&source));
        registry.unmount_all();
        assert!(registry.is_empty());

        time::sleep(TEN_MINUTES * 2).await;
        assert_eq!(source.calls(), 0);
    }
}
