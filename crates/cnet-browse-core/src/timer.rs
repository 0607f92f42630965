//! Timer system for the browse runtime.
//!
//! Repeating timers whose callbacks run on the [`EventLoop`](crate::EventLoop)
//! thread while it processes events. Tables use them to poll sort progress.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::error::{Result, TimerError};

new_key_type! {
    /// A unique identifier for a timer.
    pub struct TimerId;
}

/// A timer callback, shared so it can be invoked outside the manager lock.
pub(crate) type TimerCallback = Arc<Mutex<Box<dyn FnMut() + Send + 'static>>>;

/// Internal timer data.
struct TimerData {
    /// When this timer should next fire.
    next_fire: Instant,
    interval: Duration,
    /// The callback invoked when the timer fires.
    callback: TimerCallback,
}

/// An entry in the timer queue (min-heap by fire time).
#[derive(Debug, Clone, Copy)]
struct TimerQueueEntry {
    id: TimerId,
    fire_time: Instant,
}

impl PartialEq for TimerQueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_time == other.fire_time
    }
}

impl Eq for TimerQueueEntry {}

impl PartialOrd for TimerQueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerQueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap (BinaryHeap is max-heap by default).
        other.fire_time.cmp(&self.fire_time)
    }
}

/// Manages the timers of one event loop.
pub(crate) struct TimerManager {
    /// All registered timers.
    timers: SlotMap<TimerId, TimerData>,
    /// Priority queue of pending timer fires (min-heap by fire time).
    queue: BinaryHeap<TimerQueueEntry>,
}

impl TimerManager {
    /// Create a new timer manager.
    pub fn new() -> Self {
        Self {
            timers: SlotMap::with_key(),
            queue: BinaryHeap::new(),
        }
    }

    /// Register a timer firing every `interval`, first after one interval.
    pub fn start<F>(&mut self, interval: Duration, callback: F) -> TimerId
    where
        F: FnMut() + Send + 'static,
    {
        let next_fire = Instant::now() + interval;
        let data = TimerData {
            next_fire,
            interval,
            callback: Arc::new(Mutex::new(Box::new(callback))),
        };

        let id = self.timers.insert(data);
        self.queue.push(TimerQueueEntry {
            id,
            fire_time: next_fire,
        });

        id
    }

    /// Stop and remove a timer.
    ///
    /// Returns `Ok(())` if the timer was found and removed, or an error if not found.
    pub fn stop(&mut self, id: TimerId) -> Result<()> {
        match self.timers.remove(id) {
            Some(_) => Ok(()),
            None => Err(TimerError::InvalidTimerId.into()),
        }
    }

    /// Get the duration until the next timer fires, if any.
    pub fn time_until_next(&mut self) -> Option<Duration> {
        // Drop queue entries of removed or rescheduled timers.
        while let Some(entry) = self.queue.peek() {
            let live = self
                .timers
                .get(entry.id)
                .is_some_and(|t| t.next_fire == entry.fire_time);
            if live {
                break;
            }
            self.queue.pop();
        }

        self.queue
            .peek()
            .map(|entry| entry.fire_time.saturating_duration_since(Instant::now()))
    }

    /// Collect the callbacks of every timer due now and reschedule them.
    #[tracing::instrument(skip(self), target = "cnet_browse_core::timer", level = "trace")]
    pub fn process_expired(&mut self) -> Vec<TimerCallback> {
        let now = Instant::now();
        let mut fired = Vec::new();
        let mut rescheduled = Vec::new();

        while let Some(entry) = self.queue.peek().copied() {
            if entry.fire_time > now {
                break;
            }
            self.queue.pop();

            let id = entry.id;
            let Some(timer) = self.timers.get_mut(id) else {
                continue;
            };
            if timer.next_fire != entry.fire_time {
                continue;
            }

            tracing::trace!(target: "cnet_browse_core::timer", ?id, "timer fired");
            fired.push(timer.callback.clone());

            timer.next_fire = now + timer.interval;
            rescheduled.push(TimerQueueEntry {
                id,
                fire_time: timer.next_fire,
            });
        }

        // Pushed after the sweep so a zero interval cannot fire twice per call.
        self.queue.extend(rescheduled);
        fired
    }

    /// Get the number of active timers.
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Default for TimerManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[test]
    fn test_due_timer_fires_once_per_sweep() {
        let mut manager = TimerManager::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let id = manager.start(Duration::ZERO, move || {
            h.fetch_add(1, AtomicOrdering::SeqCst);
        });

        let fired = manager.process_expired();
        assert_eq!(fired.len(), 1);
        for callback in fired {
            (callback.lock().as_mut())();
        }
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 1);
        assert!(manager.timers.contains_key(id));
        assert_eq!(manager.active_count(), 1);
        assert!(manager.time_until_next().is_some());
    }

    #[test]
    fn test_future_timer_is_not_due() {
        let mut manager = TimerManager::new();
        manager.start(Duration::from_secs(60), || {});
        assert!(manager.process_expired().is_empty());
        assert!(manager.time_until_next().is_some_and(|d| d > Duration::from_secs(30)));
    }

    #[test]
    fn test_stop_removes_timer() {
        let mut manager = TimerManager::new();
        let id = manager.start(Duration::from_secs(60), || {});

        assert!(manager.stop(id).is_ok());
        assert!(manager.stop(id).is_err());
        assert_eq!(manager.time_until_next(), None);
    }
}
