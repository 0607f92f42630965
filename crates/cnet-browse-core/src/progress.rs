//! Integer progress reporting for background operations.
//!
//! A [`ProgressCounter`] holds a `(min, max)` range and a current value and
//! announces changes through signals. Rebuild, filter and sort each own one;
//! hosts connect to the signals to drive progress bars.
//!
//! # Example
//!
//! ```
//! use cnet_browse_core::ProgressCounter;
//!
//! let progress = ProgressCounter::new();
//! progress.value_changed().connect(|value| println!("{value}"));
//!
//! progress.set_range(0, 200);
//! progress.set_value(50);
//! assert_eq!(progress.value(), 50);
//! assert_eq!(progress.range(), (0, 200));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::Mutex;

use crate::signal::Signal;

struct ProgressInner {
    value: AtomicI32,
    range: Mutex<(i32, i32)>,
    value_changed: Signal<i32>,
    range_changed: Signal<(i32, i32)>,
}

/// A cloneable, thread-safe integer progress counter.
///
/// All clones share state and signals.
#[derive(Clone)]
pub struct ProgressCounter {
    inner: Arc<ProgressInner>,
}

impl Default for ProgressCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCounter {
    /// Create a counter with range `(0, 0)` and value 0.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ProgressInner {
                value: AtomicI32::new(0),
                range: Mutex::new((0, 0)),
                value_changed: Signal::new(),
                range_changed: Signal::new(),
            }),
        }
    }

    /// Current value.
    pub fn value(&self) -> i32 {
        self.inner.value.load(Ordering::Acquire)
    }

    /// Current `(min, max)` range.
    pub fn range(&self) -> (i32, i32) {
        *self.inner.range.lock()
    }

    /// Set the value, emitting `value_changed` if it differs.
    pub fn set_value(&self, value: i32) {
        let old = self.inner.value.swap(value, Ordering::AcqRel);
        if old != value {
            self.inner.value_changed.emit(value);
        }
    }

    /// Set the range, emitting `range_changed` if it differs.
    pub fn set_range(&self, min: i32, max: i32) {
        let changed = {
            let mut range = self.inner.range.lock();
            let changed = *range != (min, max);
            *range = (min, max);
            changed
        };
        if changed {
            self.inner.range_changed.emit((min, max));
        }
    }

    /// Reset to range `(0, 0)` and value 0.
    pub fn reset(&self) {
        self.set_range(0, 0);
        self.set_value(0);
    }

    /// Signal emitted with the new value.
    pub fn value_changed(&self) -> &Signal<i32> {
        &self.inner.value_changed
    }

    /// Signal emitted with the new `(min, max)` range.
    pub fn range_changed(&self) -> &Signal<(i32, i32)> {
        &self.inner.range_changed
    }
}

impl std::fmt::Debug for ProgressCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressCounter")
            .field("value", &self.value())
            .field("range", &self.range())
            .finish()
    }
}

static_assertions::assert_impl_all!(ProgressCounter: Send, Sync);
