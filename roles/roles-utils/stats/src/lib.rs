pub mod cache;
pub mod error;
pub mod pool_status;
pub mod series;
pub mod stats_client;
pub mod stats_poller;
pub mod user_stats;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock_upstream;

pub use cache::{CachePolicy, CachedFetch};
pub use error::StatsError;
pub use pool_status::{HashrateWindow, PoolStatusRecord};
pub use series::{RollingSeries, Sample, DEFAULT_SERIES_CAPACITY};
pub use stats_client::{CkpoolClient, PoolHashrate, UserHashrate};
pub use stats_poller::{ChartKey, ChartRegistry, ChartView, HashrateSource, SeriesFeed};
pub use user_stats::{UserRecord, WorkerRecord};
