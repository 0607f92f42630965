//! Worker pool for background passes.
//!
//! Work is spawned together with a callback; the result is handed to the
//! callback on the thread that processes the given [`EventLoop`]. Work may
//! itself use rayon's parallel iterators, which run on the same pool.
//!
//! # Example
//!
//! ```
//! use cnet_browse_core::{CancellationToken, EventLoop, ThreadPool, ThreadPoolConfig};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::time::Duration;
//!
//! let event_loop = EventLoop::new();
//! let pool = ThreadPool::new(ThreadPoolConfig::with_threads(2)).unwrap();
//! let token = CancellationToken::new();
//! token.cancel();
//!
//! let done = Arc::new(AtomicBool::new(false));
//! let d = done.clone();
//! let worker_token = token.clone();
//! pool.spawn_with_callback(
//!     &event_loop,
//!     move || (!worker_token.is_cancelled()).then_some(42),
//!     move |answer| {
//!         assert_eq!(answer, None);
//!         d.store(true, Ordering::SeqCst);
//!     },
//! );
//! assert!(event_loop.process_until(|| done.load(Ordering::SeqCst), Duration::from_secs(5)));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::{ThreadPool as RayonThreadPool, ThreadPoolBuilder};

use crate::error::{CoreError, ThreadPoolError};
use crate::event_loop::EventLoop;

/// A flag shared between a model and the pass it launched.
///
/// Passes poll it between units of work and give up once it is raised.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Raise the flag. Raising it twice is harmless.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadPoolConfig {
    /// Number of worker threads. `None` means one per CPU core.
    pub num_threads: Option<usize>,
    /// Name prefix for worker threads.
    pub thread_name: String,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_name: "cnet-browse-worker".to_string(),
        }
    }
}

impl ThreadPoolConfig {
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
            ..Default::default()
        }
    }
}

/// A rayon pool whose results come back through an event loop.
pub struct ThreadPool {
    pool: RayonThreadPool,
    /// Spawned tasks that have not finished running.
    in_flight: Arc<AtomicUsize>,
}

impl ThreadPool {
    pub fn new(config: ThreadPoolConfig) -> Result<Self, CoreError> {
        let name = config.thread_name.clone();
        let mut builder = ThreadPoolBuilder::new()
            .thread_name(move |index| format!("{name}-{index}"))
            .panic_handler(|_| {
                tracing::error!(
                    target: "cnet_browse_core::threadpool",
                    "worker task panicked; its callback will not run"
                );
            });
        if let Some(num_threads) = config.num_threads {
            builder = builder.num_threads(num_threads);
        }

        let pool = builder
            .build()
            .map_err(|e| ThreadPoolError::CreationFailed(e.to_string()))?;

        tracing::debug!(
            target: "cnet_browse_core::threadpool",
            threads = pool.current_num_threads(),
            "thread pool created"
        );

        Ok(Self {
            pool,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Tasks still running or queued.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run `task` on the pool and post `callback(result)` to `event_loop`.
    pub fn spawn_with_callback<F, T, C>(&self, event_loop: &EventLoop, task: F, callback: C)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        let in_flight = InFlight::enter(&self.in_flight);
        let event_loop = event_loop.clone();

        self.pool.spawn(move || {
            let result = task();
            drop(in_flight);
            event_loop.post(move || callback(result));
        });
    }
}

/// Counts a task as in flight until dropped, including by a panic.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("num_threads", &self.num_threads())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

static_assertions::assert_impl_all!(ThreadPool: Send, Sync);
static_assertions::assert_impl_all!(CancellationToken: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_callback_runs_on_event_loop_thread() {
        let pool = ThreadPool::new(ThreadPoolConfig::with_threads(2)).unwrap();
        let event_loop = EventLoop::new();
        let result = Arc::new(Mutex::new(None));
        let main_thread = std::thread::current().id();

        let r = result.clone();
        pool.spawn_with_callback(
            &event_loop,
            || (1..=10).sum::<i32>(),
            move |sum| {
                *r.lock() = Some((sum, std::thread::current().id()));
            },
        );

        assert!(event_loop.process_until(|| result.lock().is_some(), TIMEOUT));
        assert_eq!(*result.lock(), Some((55, main_thread)));
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn test_callbacks_wait_for_the_event_loop() {
        let pool = ThreadPool::new(ThreadPoolConfig::with_threads(4)).unwrap();
        let event_loop = EventLoop::new();
        let results = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let r = results.clone();
            pool.spawn_with_callback(&event_loop, move || i * 2, move |x| r.lock().push(x));
        }
        // Nothing is delivered until the loop runs.
        std::thread::sleep(Duration::from_millis(20));
        assert!(results.lock().is_empty());

        assert!(event_loop.process_until(|| results.lock().len() == 10, TIMEOUT));
        let mut got = results.lock().clone();
        got.sort_unstable();
        assert_eq!(got, (0..10).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_cancelled_task_stops_early() {
        let pool = ThreadPool::new(ThreadPoolConfig::with_threads(2)).unwrap();
        let event_loop = EventLoop::new();
        let started = Arc::new(AtomicBool::new(false));
        let outcome = Arc::new(Mutex::new(None));

        let token = CancellationToken::new();
        let worker_token = token.clone();
        let s = started.clone();
        let o = outcome.clone();
        pool.spawn_with_callback(
            &event_loop,
            move || {
                s.store(true, Ordering::SeqCst);
                let mut steps = 0u64;
                while !worker_token.is_cancelled() {
                    steps += 1;
                    std::thread::sleep(Duration::from_millis(1));
                }
                (steps, worker_token.is_cancelled())
            },
            move |result| *o.lock() = Some(result),
        );

        while !started.load(Ordering::SeqCst) {
            std::thread::yield_now();
        }
        token.cancel();
        token.cancel();
        assert!(event_loop.process_until(|| outcome.lock().is_some(), TIMEOUT));
        assert!(matches!(*outcome.lock(), Some((_, true))));
    }

    #[test]
    fn test_panicking_task_leaves_pool_usable() {
        let pool = ThreadPool::new(ThreadPoolConfig::with_threads(1)).unwrap();
        let event_loop = EventLoop::new();
        let delivered = Arc::new(AtomicBool::new(false));

        pool.spawn_with_callback(&event_loop, || panic!("boom"), |_: ()| {});
        let d = delivered.clone();
        pool.spawn_with_callback(&event_loop, || 1, move |_| d.store(true, Ordering::SeqCst));

        assert!(event_loop.process_until(|| delivered.load(Ordering::SeqCst), TIMEOUT));
        assert_eq!(pool.in_flight(), 0);
    }
}
