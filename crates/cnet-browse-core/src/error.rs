//! Error types for the browse runtime.

use std::fmt;

/// The main error type for runtime operations.
#[derive(Debug)]
pub enum CoreError {
    /// Timer-related error.
    Timer(TimerError),
    /// Thread pool error.
    ThreadPool(ThreadPoolError),
    /// The event loop did not reach the awaited state in time.
    Timeout,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timer(err) => write!(f, "Timer error: {err}"),
            Self::ThreadPool(err) => write!(f, "Thread pool error: {err}"),
            Self::Timeout => write!(f, "Timed out waiting for the event loop"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Timer(err) => Some(err),
            Self::ThreadPool(err) => Some(err),
            Self::Timeout => None,
        }
    }
}

/// Timer-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// The timer ID is invalid or has already been removed.
    InvalidTimerId,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimerId => write!(f, "Invalid or expired timer ID"),
        }
    }
}

impl std::error::Error for TimerError {}

impl From<TimerError> for CoreError {
    fn from(err: TimerError) -> Self {
        Self::Timer(err)
    }
}

/// Thread pool errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadPoolError {
    /// The underlying pool could not be built.
    CreationFailed(String),
}

impl fmt::Display for ThreadPoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreationFailed(msg) => write!(f, "Failed to create thread pool: {msg}"),
        }
    }
}

impl std::error::Error for ThreadPoolError {}

impl From<ThreadPoolError> for CoreError {
    fn from(err: ThreadPoolError) -> Self {
        Self::ThreadPool(err)
    }
}

/// A specialized Result type for runtime operations.
pub type Result<T> = std::result::Result<T, CoreError>;
