//! Logging targets for the browse runtime.
//!
//! The runtime uses the `tracing` crate for instrumentation. To see logs,
//! install a subscriber in the host application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("cnet_browse_core=debug")
//!     .init();
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Runtime crate target.
    pub const CORE: &str = "cnet_browse_core";
    /// Event loop target.
    pub const EVENT_LOOP: &str = "cnet_browse_core::event_loop";
    /// Timer system target.
    pub const TIMER: &str = "cnet_browse_core::timer";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "cnet_browse_core::signal";
    /// Worker pool target.
    pub const THREADPOOL: &str = "cnet_browse_core::threadpool";
}
