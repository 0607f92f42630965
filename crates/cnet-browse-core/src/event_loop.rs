//! Main-thread event loop.
//!
//! Background work never touches model state directly. Workers post their
//! results to an [`EventLoop`], and the thread that owns the models (the
//! "main" thread) executes them when it calls [`EventLoop::process_pending`]
//! or [`EventLoop::process_until`]. Timers registered on the loop fire from
//! the same calls, which makes the loop the single place where model
//! callbacks and progress polls are serialized.
//!
//! # Example
//!
//! ```
//! use cnet_browse_core::EventLoop;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::time::Duration;
//!
//! let event_loop = EventLoop::new();
//! let done = Arc::new(AtomicBool::new(false));
//!
//! let flag = done.clone();
//! let poster = event_loop.clone();
//! std::thread::spawn(move || {
//!     poster.post(move || flag.store(true, Ordering::SeqCst));
//! });
//!
//! assert!(event_loop.process_until(|| done.load(Ordering::SeqCst), Duration::from_secs(5)));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use parking_lot::Mutex;

use crate::error::Result;
use crate::timer::{TimerId, TimerManager};

/// Longest single wait while blocked in [`EventLoop::process_until`].
///
/// Bounds how late a predicate that depends on state outside the loop is
/// re-checked.
const MAX_WAIT_SLICE: Duration = Duration::from_millis(20);

/// A closure waiting to run on the event loop thread.
type Invocation = Box<dyn FnOnce() + Send>;

struct EventLoopInner {
    sender: Sender<Invocation>,
    receiver: Receiver<Invocation>,
    timers: Mutex<TimerManager>,
}

/// A cloneable handle to a main-thread invocation queue with timers.
///
/// All clones share one queue. Posting is allowed from any thread; processing
/// is expected to happen on the thread that owns the models.
#[derive(Clone)]
pub struct EventLoop {
    inner: Arc<EventLoopInner>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    /// Create a new, empty event loop.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            inner: Arc::new(EventLoopInner {
                sender,
                receiver,
                timers: Mutex::new(TimerManager::new()),
            }),
        }
    }

    /// Queue a closure to run on the event loop thread.
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // The loop owns a receiver, so the channel cannot be disconnected.
        if self.inner.sender.send(Box::new(task)).is_err() {
            tracing::warn!(target: "cnet_browse_core::event_loop", "event loop queue closed, invocation dropped");
        }
    }

    /// Start a repeating timer whose callback runs on the event loop thread.
    pub fn start_repeating_timer<F>(&self, interval: Duration, callback: F) -> TimerId
    where
        F: FnMut() + Send + 'static,
    {
        self.inner
            .timers
            .lock()
            .start(interval, callback)
    }

    /// Stop a timer.
    pub fn stop_timer(&self, id: TimerId) -> Result<()> {
        self.inner.timers.lock().stop(id)
    }

    /// Run every due timer and every queued invocation without blocking.
    ///
    /// Invocations queued while processing (for example by a slot that posts
    /// follow-up work) are run in the same call. Returns the number of
    /// callbacks executed.
    #[tracing::instrument(skip(self), target = "cnet_browse_core::event_loop", level = "trace")]
    pub fn process_pending(&self) -> usize {
        let mut executed = self.process_timers();

        loop {
            match self.inner.receiver.try_recv() {
                Ok(invocation) => {
                    invocation();
                    executed += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        if executed > 0 {
            tracing::trace!(target: "cnet_browse_core::event_loop", executed, "processed pending work");
        }
        executed
    }

    /// Process events until `predicate` returns true or `timeout` elapses.
    ///
    /// Blocks between events. Returns whether the predicate was satisfied.
    pub fn process_until<P>(&self, mut predicate: P, timeout: Duration) -> bool
    where
        P: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;

        loop {
            self.process_pending();
            if predicate() {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(target: "cnet_browse_core::event_loop", ?timeout, "process_until timed out");
                return false;
            }

            let mut wait = (deadline - now).min(MAX_WAIT_SLICE);
            if let Some(next_timer) = self.inner.timers.lock().time_until_next() {
                wait = wait.min(next_timer);
            }

            match self.inner.receiver.recv_timeout(wait) {
                Ok(invocation) => invocation(),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
            }
        }
    }

    fn process_timers(&self) -> usize {
        // Callbacks run without the manager lock so they may start or stop timers.
        let fired = self.inner.timers.lock().process_expired();
        let count = fired.len();
        for callback in fired {
            (callback.lock().as_mut())();
        }
        count
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending", &self.inner.receiver.len())
            .field("timers", &self.inner.timers.lock().active_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(EventLoop: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_post_and_process() {
        let event_loop = EventLoop::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = counter.clone();
            event_loop.post(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(event_loop.process_pending(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_nested_post_runs_in_same_pass() {
        let event_loop = EventLoop::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let inner_loop = event_loop.clone();
        let c = counter.clone();
        event_loop.post(move || {
            let c = c.clone();
            inner_loop.post(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        });

        event_loop.process_pending();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cross_thread_post() {
        let event_loop = EventLoop::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let event_loop = event_loop.clone();
                let counter = counter.clone();
                std::thread::spawn(move || {
                    event_loop.post(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(event_loop.process_until(
            || counter.load(Ordering::SeqCst) == 4,
            Duration::from_secs(5)
        ));
    }

    #[test]
    fn test_repeating_timer_fires_until_stopped() {
        let event_loop = EventLoop::new();
        let ticks = Arc::new(AtomicUsize::new(0));

        let t = ticks.clone();
        let id = event_loop.start_repeating_timer(Duration::from_millis(1), move || {
            t.fetch_add(1, Ordering::SeqCst);
        });

        assert!(event_loop.process_until(
            || ticks.load(Ordering::SeqCst) >= 3,
            Duration::from_secs(5)
        ));
        event_loop.stop_timer(id).unwrap();
        assert!(event_loop.stop_timer(id).is_err());

        let after_stop = ticks.load(Ordering::SeqCst);
        event_loop.process_until(|| false, Duration::from_millis(10));
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_process_until_times_out() {
        let event_loop = EventLoop::new();
        assert!(!event_loop.process_until(|| false, Duration::from_millis(10)));
    }
}
