//! Signal/slot system for the browse runtime.
//!
//! Models announce state changes by emitting signals; views, tables and
//! tests observe them by connecting slots (closures).
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The main signal type for emitting notifications
//! - [`ConnectionId`] - Unique identifier returned when connecting a slot
//!
//! Slots run on the emitting thread. Models emit only from the thread that
//! processes their event loop, so worker results reach slots through
//! [`EventLoop::post`](crate::EventLoop::post), never through a signal.
//!
//! # Re-entrancy
//!
//! The connection list is snapshotted before slots run, so a slot may emit
//! other signals, connect new slots, or disconnect itself. Slots connected
//! during an emission first run on the next emission.
//!
//! # Example
//!
//! ```
//! use cnet_browse_core::Signal;
//!
//! let counts_changed = Signal::<(i64, i64)>::new();
//!
//! let conn_id = counts_changed.connect(|(visible, total)| {
//!     println!("{visible} of {total} visible");
//! });
//!
//! counts_changed.emit((10, 2000));
//! counts_changed.disconnect(conn_id);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal that can have multiple connected slots.
///
/// # Type Parameter
///
/// - `Args`: The argument type passed to connected slots. Use `()` for signals
///   with no arguments, or a tuple like `(i64, i64)` for multiple arguments.
///
/// # Thread Safety
///
/// `Signal<Args>` is `Send + Sync` when `Args` is `Send`, and can be shared
/// between threads.
pub struct Signal<Args> {
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
}

impl<Args: Clone + Send + 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Clone + Send + 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Connect a slot (closure) that runs during [`emit`](Self::emit).
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` otherwise.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Emit the signal, invoking all connected slots before returning.
    #[tracing::instrument(skip_all, target = "cnet_browse_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        let snapshot: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        tracing::trace!(target: "cnet_browse_core::signal", connection_count = snapshot.len(), "emitting signal");

        for slot in snapshot {
            slot(&args);
        }
    }
}

impl<Args> fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connections.lock().len())
            .finish()
    }
}

static_assertions::assert_impl_all!(Signal<Vec<u64>>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn test_signal_connect_emit() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(AtomicI32::new(0));

        let r = received.clone();
        signal.connect(move |value| {
            r.store(*value, Ordering::SeqCst);
        });

        signal.emit(42);
        assert_eq!(received.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_signal_disconnect() {
        let signal = Signal::<i32>::new();
        let counter = Arc::new(AtomicI32::new(0));

        let c = counter.clone();
        let id = signal.connect(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        signal.emit(1);
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        signal.emit(2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_connection_count() {
        let signal = Signal::<i32>::new();
        let a = signal.connect(|_| {});
        let _b = signal.connect(|_| {});
        assert_eq!(signal.connection_count(), 2);
        signal.disconnect(a);
        assert_eq!(signal.connection_count(), 1);
    }

    #[test]
    fn test_slot_connected_during_emit_runs_next_time() {
        let signal = Arc::new(Signal::<()>::new());
        let counter = Arc::new(AtomicI32::new(0));

        let s = Arc::downgrade(&signal);
        let c = counter.clone();
        signal.connect(move |_| {
            if let Some(signal) = s.upgrade() {
                let c = c.clone();
                signal.connect(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        signal.emit(());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        signal.emit(());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_slot_may_disconnect_itself() {
        let signal = Arc::new(Signal::<()>::new());
        let counter = Arc::new(AtomicI32::new(0));
        let own_id = Arc::new(Mutex::new(None));

        let s = Arc::downgrade(&signal);
        let c = counter.clone();
        let id_slot = own_id.clone();
        let id = signal.connect(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            if let (Some(signal), Some(id)) = (s.upgrade(), *id_slot.lock()) {
                signal.disconnect(id);
            }
        });
        *own_id.lock() = Some(id);

        signal.emit(());
        signal.emit(());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_signal_with_multiple_args() {
        let signal = Signal::<(i64, i64)>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let r = received.clone();
        signal.connect(move |(visible, total)| {
            r.lock().push((*visible, *total));
        });

        signal.emit((-1, 2000));
        signal.emit((10, 2000));
        assert_eq!(*received.lock(), vec![(-1, 2000), (10, 2000)]);
    }
}
