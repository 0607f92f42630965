//! Logging targets for the browse engine.
//!
//! The engine logs through `tracing`. Enable a subsystem with a directive
//! such as `RUST_LOG=cnet_browse::sort=debug`.

/// Target names for log filtering.
pub mod targets {
    /// Engine crate target.
    pub const BROWSE: &str = "cnet_browse";
    /// Tree build and range queries.
    pub const TREE: &str = "cnet_browse::tree";
    /// Filter workers.
    pub const FILTER: &str = "cnet_browse::filter";
    /// Table models and edits.
    pub const TABLE: &str = "cnet_browse::table";
    /// Sort workers.
    pub const SORT: &str = "cnet_browse::sort";
    /// Control network store.
    pub const NETWORK: &str = "cnet_browse::network";
    /// Selection coordination.
    pub const SELECTION: &str = "cnet_browse::selection";
}
