//! A headless browse engine for control networks.
//!
//! The engine projects a mutable [`ControlNetwork`] of points, measures and
//! images into two kinds of views:
//!
//! - **Trees** ([`TreeModel`]): hierarchical projections in one of three
//!   [`TreeLayout`]s, built and filtered on a worker pool. Filtering threads
//!   a linked list of visible items through the tree so row queries cost
//!   `O(visible)`.
//! - **Tables** ([`TableModel`]): flat lists of points or measures, sorted
//!   in the background by the primary column of a [`ColumnList`], with
//!   editable cells and deletion policies.
//!
//! Selection is shared between views through [`SelectionCoordinator`], and
//! [`BrowseEngine`] wires a complete set of models together.
//!
//! All background work reports back on the [`Runtime`]'s event loop; call
//! [`Runtime::process_pending`] or [`Runtime::process_until`] from the
//! thread that owns the views.
//!
//! # Example
//!
//! ```
//! use cnet_browse::{BrowseConfig, BrowseEngine, ControlMeasure, ControlNetwork, ControlPoint, Runtime};
//! use std::time::Duration;
//!
//! let runtime = Runtime::new(BrowseConfig::default()).unwrap();
//! let network = ControlNetwork::new();
//! let p1 = network.add_point(ControlPoint::new("P1"));
//! network.add_measure(p1, ControlMeasure::new("cube-a")).unwrap();
//!
//! let engine = BrowseEngine::new(&runtime, network);
//! engine.rebuild_all();
//! assert!(runtime.process_until(|| engine.is_idle(), Duration::from_secs(5)));
//! assert_eq!(engine.measure_table().visible_row_count(), Some(1));
//! ```

pub mod column;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod filter;
pub mod logging;
pub mod network;
pub mod selection;
pub mod table;
pub mod tree;
pub mod value;

pub use column::{Column, ColumnList, ColumnListState, ColumnState};
pub use config::{BrowseConfig, Runtime};
pub use engine::BrowseEngine;
pub use entity::{EntityKind, EntityRef};
pub use error::{BrowseError, Result, UserErrorKind};
pub use filter::{FilterGroup, FilterLevel, FilterLevels, FilterMode, FilterSet, LeafFilter, Predicate};
pub use network::{ControlMeasure, ControlNetwork, ControlPoint, MeasureId, PointId, SurfacePoint};
pub use selection::{ClickModifiers, ColumnSelection, SelectionCoordinator};
pub use table::{TableKind, TableModel, TableSignals, UserWarning};
pub use tree::{ItemKind, KindMask, TreeItem, TreeLayout, TreeModel, TreeSignals};
pub use value::CellValue;
