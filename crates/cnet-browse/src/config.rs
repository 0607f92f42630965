//! Engine configuration and the shared runtime handle.

use std::sync::Arc;
use std::time::Duration;

use cnet_browse_core::{EventLoop, ThreadPool, ThreadPoolConfig};

use crate::error::Result;

/// Default number of rows above which sorting is switched off.
pub const DEFAULT_SORT_LIMIT: usize = 100_000;

/// Default polling interval for sort progress.
pub const DEFAULT_SORT_PROGRESS_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration for a browse engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseConfig {
    /// Tables with more visible rows than this are not sorted.
    pub sort_limit: usize,
    /// Whether tables sort at all.
    pub sorting_enabled: bool,
    /// How often a running sort reports its comparison count.
    pub sort_progress_interval: Duration,
    /// Worker pool settings.
    pub thread_pool: ThreadPoolConfig,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            sort_limit: DEFAULT_SORT_LIMIT,
            sorting_enabled: true,
            sort_progress_interval: DEFAULT_SORT_PROGRESS_INTERVAL,
            thread_pool: ThreadPoolConfig::default(),
        }
    }
}

impl BrowseConfig {
    /// Set the sort limit.
    pub fn with_sort_limit(mut self, limit: usize) -> Self {
        self.sort_limit = limit;
        self
    }

    /// Enable or disable sorting.
    pub fn with_sorting_enabled(mut self, enabled: bool) -> Self {
        self.sorting_enabled = enabled;
        self
    }

    /// Set the sort progress polling interval.
    pub fn with_sort_progress_interval(mut self, interval: Duration) -> Self {
        self.sort_progress_interval = interval;
        self
    }

    /// Set the worker thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.thread_pool.num_threads = Some(threads);
        self
    }
}

/// The event loop and worker pool shared by every model of one engine.
///
/// Models only touch their state from the thread that drives the event
/// loop; workers hand results back by posting to it.
#[derive(Debug, Clone)]
pub struct Runtime {
    event_loop: EventLoop,
    pool: Arc<ThreadPool>,
    config: Arc<BrowseConfig>,
}

impl Runtime {
    /// Build a runtime from `config`.
    pub fn new(config: BrowseConfig) -> Result<Self> {
        let pool = ThreadPool::new(config.thread_pool.clone())?;
        tracing::debug!(
            target: "cnet_browse",
            threads = pool.num_threads(),
            sort_limit = config.sort_limit,
            "browse runtime created"
        );
        Ok(Self {
            event_loop: EventLoop::new(),
            pool: Arc::new(pool),
            config: Arc::new(config),
        })
    }

    /// The main-thread event loop.
    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// The worker pool.
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    /// The configuration this runtime was built from.
    pub fn config(&self) -> &BrowseConfig {
        &self.config
    }

    /// Pump the event loop until `predicate` holds or `timeout` elapses.
    pub fn process_until<P>(&self, predicate: P, timeout: Duration) -> bool
    where
        P: FnMut() -> bool,
    {
        self.event_loop.process_until(predicate, timeout)
    }

    /// Run queued callbacks and due timers without blocking.
    pub fn process_pending(&self) -> usize {
        self.event_loop.process_pending()
    }
}

static_assertions::assert_impl_all!(Runtime: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BrowseConfig::default();
        assert_eq!(config.sort_limit, 100_000);
        assert!(config.sorting_enabled);
        assert_eq!(config.sort_progress_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_builder_methods() {
        let config = BrowseConfig::default()
            .with_sort_limit(10)
            .with_sorting_enabled(false)
            .with_threads(2);
        assert_eq!(config.sort_limit, 10);
        assert!(!config.sorting_enabled);
        assert_eq!(config.thread_pool.num_threads, Some(2));
    }

    #[test]
    fn test_runtime_uses_config() {
        let runtime = Runtime::new(BrowseConfig::default().with_threads(2)).unwrap();
        assert_eq!(runtime.pool().num_threads(), 2);
        assert_eq!(runtime.config().sort_limit, DEFAULT_SORT_LIMIT);
    }
}
