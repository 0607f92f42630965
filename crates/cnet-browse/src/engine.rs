//! Engine wiring.
//!
//! [`BrowseEngine`] assembles the models a browser window needs over one
//! control network: a tree per layout, the point and measure tables over
//! the point tree, and a selection coordinator per view.

use std::sync::{Arc, Weak};

use cnet_browse_core::ConnectionId;
use parking_lot::Mutex;

use crate::config::Runtime;
use crate::filter::FilterSet;
use crate::network::ControlNetwork;
use crate::selection::SelectionCoordinator;
use crate::table::{TableKind, TableModel};
use crate::tree::{KindMask, TreeItem, TreeLayout, TreeModel};

/// Every model of a browser over one network, connected.
pub struct BrowseEngine {
    network: ControlNetwork,
    point_tree: Arc<TreeModel>,
    image_tree: Arc<TreeModel>,
    connection_tree: Arc<TreeModel>,
    point_table: Arc<TableModel>,
    measure_table: Arc<TableModel>,
    tree_selection: SelectionCoordinator,
    point_selection: SelectionCoordinator,
    measure_selection: SelectionCoordinator,
    connections: Mutex<Vec<ConnectionId>>,
}

impl BrowseEngine {
    /// Create and wire every model. Nothing is built until
    /// [`rebuild_all`](Self::rebuild_all).
    pub fn new(runtime: &Runtime, network: ControlNetwork) -> Self {
        let point_tree = TreeModel::new(runtime, network.clone(), TreeLayout::PointMeasure);
        let image_tree = TreeModel::new(runtime, network.clone(), TreeLayout::ImagePoint);
        let connection_tree = TreeModel::new(runtime, network.clone(), TreeLayout::ImageImage);

        let point_table = TableModel::new(point_tree.clone(), TableKind::Points);
        let measure_table = TableModel::new(point_tree.clone(), TableKind::Measures);

        let engine = Self {
            network,
            tree_selection: SelectionCoordinator::for_tree(point_tree.clone(), KindMask::ALL),
            point_selection: SelectionCoordinator::for_table(point_table.clone()),
            measure_selection: SelectionCoordinator::for_table(measure_table.clone()),
            point_tree,
            image_tree,
            connection_tree,
            point_table,
            measure_table,
            connections: Mutex::new(Vec::new()),
        };
        engine.connect();
        engine
    }

    fn connect(&self) {
        let mut connections = self.connections.lock();

        for table in [&self.point_table, &self.measure_table] {
            let tree = Arc::downgrade(&self.point_tree);
            table.signals().request_tree_rebuild.connect(move |_| {
                if let Some(tree) = tree.upgrade() {
                    tree.rebuild();
                }
            });
        }

        let tables: Vec<Weak<TableModel>> = [&self.point_table, &self.measure_table]
            .into_iter()
            .map(Arc::downgrade)
            .collect();
        connections.push(self.point_tree.signals().tree_selection_changed.connect(
            move |items: &Vec<TreeItem>| {
                for table in tables.iter().filter_map(Weak::upgrade) {
                    table.handle_tree_selection_changed(items);
                }
            },
        ));
    }

    pub fn network(&self) -> &ControlNetwork {
        &self.network
    }

    /// The tree of points and their measures.
    pub fn point_tree(&self) -> &Arc<TreeModel> {
        &self.point_tree
    }

    /// The tree of images, their points and measures.
    pub fn image_tree(&self) -> &Arc<TreeModel> {
        &self.image_tree
    }

    /// The tree of images and the images they connect to.
    pub fn connection_tree(&self) -> &Arc<TreeModel> {
        &self.connection_tree
    }

    pub fn trees(&self) -> [&Arc<TreeModel>; 3] {
        [&self.point_tree, &self.image_tree, &self.connection_tree]
    }

    pub fn point_table(&self) -> &Arc<TableModel> {
        &self.point_table
    }

    pub fn measure_table(&self) -> &Arc<TableModel> {
        &self.measure_table
    }

    pub fn tree_selection(&self) -> &SelectionCoordinator {
        &self.tree_selection
    }

    pub fn point_selection(&self) -> &SelectionCoordinator {
        &self.point_selection
    }

    pub fn measure_selection(&self) -> &SelectionCoordinator {
        &self.measure_selection
    }

    /// Rebuild every tree in the background.
    pub fn rebuild_all(&self) {
        tracing::debug!(target: "cnet_browse::tree", "rebuilding all trees");
        for tree in self.trees() {
            tree.rebuild();
        }
    }

    /// Install `filter` on every tree and apply it.
    pub fn set_filter(&self, filter: FilterSet) {
        for tree in self.trees() {
            tree.set_filter(filter.clone());
        }
    }

    /// Freeze or thaw every tree.
    pub fn set_frozen(&self, frozen: bool) {
        for tree in self.trees() {
            tree.set_frozen(frozen);
        }
    }

    /// Whether no tree is building or filtering and no table is sorting.
    pub fn is_idle(&self) -> bool {
        self.trees().iter().all(|tree| tree.is_idle())
            && !self.point_table.is_sorting()
            && !self.measure_table.is_sorting()
    }
}

impl Drop for BrowseEngine {
    fn drop(&mut self) {
        let signals = self.point_tree.signals();
        for id in self.connections.lock().drain(..) {
            signals.tree_selection_changed.disconnect(id);
        }
    }
}

impl std::fmt::Debug for BrowseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowseEngine")
            .field("point_tree", &self.point_tree)
            .field("point_table", &self.point_table)
            .field("measure_table", &self.measure_table)
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(BrowseEngine: Send, Sync);
