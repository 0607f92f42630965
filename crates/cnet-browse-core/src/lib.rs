//! Runtime plumbing for the control-network browse engine.
//!
//! This crate provides the pieces the engine's models are built on:
//!
//! - **Signal/Slot System**: Type-safe change notification
//! - **Event Loop**: A main-thread invocation queue with repeating timers
//! - **Thread Pool**: Background work delivered through the event loop, with
//!   cooperative cancellation
//! - **Progress**: Integer progress counters with change signals
//!
//! # Example
//!
//! ```
//! use cnet_browse_core::{EventLoop, ThreadPool, ThreadPoolConfig};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::time::Duration;
//!
//! let event_loop = EventLoop::new();
//! let pool = ThreadPool::new(ThreadPoolConfig::with_threads(2)).unwrap();
//! let total = Arc::new(AtomicUsize::new(0));
//!
//! let t = total.clone();
//! pool.spawn_with_callback(
//!     &event_loop,
//!     || (1..=100).sum::<usize>(),
//!     move |sum| t.store(sum, Ordering::SeqCst),
//! );
//!
//! assert!(event_loop.process_until(|| total.load(Ordering::SeqCst) == 5050, Duration::from_secs(5)));
//! ```

mod error;
mod event_loop;
pub mod logging;
pub mod progress;
pub mod signal;
pub mod threadpool;
mod timer;

pub use error::{CoreError, Result, ThreadPoolError, TimerError};
pub use event_loop::EventLoop;
pub use progress::ProgressCounter;
pub use signal::{ConnectionId, Signal};
pub use threadpool::{CancellationToken, ThreadPool, ThreadPoolConfig};
pub use timer::TimerId;
