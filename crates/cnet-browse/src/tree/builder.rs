//! Tree construction.
//!
//! Each top-level entity becomes one subtree, built independently on the
//! worker pool and grafted under a fresh root in network order.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use cnet_browse_core::CancellationToken;
use rayon::prelude::*;

use super::item::{ItemKind, ItemTree, Node};
use crate::entity::EntityRef;
use crate::network::{ControlNetwork, NetworkStore, PointId};

/// The shape of a tree model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeLayout {
    /// Root → points → measures.
    PointMeasure,
    /// Root → images → points with a measure in the image → measures.
    ImagePoint,
    /// Root → images → connected images.
    ImageImage,
}

impl TreeLayout {
    /// Kind of the items directly under the root.
    pub fn top_level_kind(self) -> ItemKind {
        match self {
            Self::PointMeasure => ItemKind::PointParent,
            Self::ImagePoint => ItemKind::ImageParent,
            Self::ImageImage => ItemKind::ConnectionParent,
        }
    }

    pub(crate) fn top_level_entities(self, store: &NetworkStore) -> Vec<EntityRef> {
        match self {
            Self::PointMeasure => store
                .point_ids()
                .iter()
                .map(|&id| EntityRef::Point(id))
                .collect(),
            Self::ImagePoint | Self::ImageImage => store
                .image_serials()
                .iter()
                .map(|serial| EntityRef::Image(serial.clone()))
                .collect(),
        }
    }

    pub(crate) fn top_level_count(self, store: &NetworkStore) -> usize {
        match self {
            Self::PointMeasure => store.point_count(),
            Self::ImagePoint | Self::ImageImage => store.image_serials().len(),
        }
    }
}

/// Nodes of one subtree with indices local to it. Local node 0 is the
/// subtree's top and has no parent.
struct SubtreeBuilder {
    nodes: Vec<Node>,
}

impl SubtreeBuilder {
    fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn push(&mut self, kind: ItemKind, entity: Option<EntityRef>, parent: Option<u32>) -> u32 {
        let index = self.nodes.len() as u32;
        let mut node = Node::new(kind, entity);
        node.parent = parent;
        if let Some(parent) = parent {
            let siblings = &mut self.nodes[parent as usize].children;
            node.row = siblings.len() as u32;
            siblings.push(index);
        }
        self.nodes.push(node);
        index
    }

    fn close(&mut self, index: u32) {
        self.nodes[index as usize].subtree_end = self.nodes.len() as u32;
    }

    fn leaf(&mut self, kind: ItemKind, entity: Option<EntityRef>, parent: u32) {
        let index = self.push(kind, entity, Some(parent));
        self.close(index);
    }

    fn point(&mut self, store: &NetworkStore, id: PointId, parent: Option<u32>) {
        let index = self.push(ItemKind::PointParent, Some(EntityRef::Point(id)), parent);
        if let Some(point) = store.point(id) {
            for &measure in point.measures() {
                self.leaf(ItemKind::MeasureLeaf, Some(EntityRef::Measure(measure)), index);
            }
        }
        self.close(index);
    }

    fn image_points(&mut self, store: &NetworkStore, serial: &EntityRef) {
        let index = self.push(ItemKind::ImageParent, Some(serial.clone()), None);
        if let EntityRef::Image(serial) = serial {
            let mut seen = HashSet::new();
            for &measure in store.measures_in_cube(serial) {
                let Some(point) = store.measure(measure).and_then(|m| m.parent()) else {
                    continue;
                };
                if seen.insert(point) {
                    self.point(store, point, Some(index));
                }
            }
        }
        self.close(index);
    }

    fn image_connections(&mut self, store: &NetworkStore, serial: &EntityRef) {
        let index = self.push(ItemKind::ConnectionParent, Some(serial.clone()), None);
        if let EntityRef::Image(serial) = serial {
            let adjacent = store.adjacent_images(serial);
            if adjacent.is_empty() {
                self.leaf(ItemKind::NullLeaf, None, index);
            }
            for other in adjacent {
                self.leaf(ItemKind::ImageLeaf, Some(EntityRef::Image(other)), index);
            }
        }
        self.close(index);
    }
}

fn build_subtree(store: &NetworkStore, layout: TreeLayout, top: &EntityRef) -> Vec<Node> {
    let mut builder = SubtreeBuilder::new();
    match (layout, top) {
        (TreeLayout::PointMeasure, EntityRef::Point(id)) => builder.point(store, *id, None),
        (TreeLayout::ImagePoint, _) => builder.image_points(store, top),
        (TreeLayout::ImageImage, _) => builder.image_connections(store, top),
        (TreeLayout::PointMeasure, _) => {}
    }
    builder.nodes
}

/// Append subtrees under a new root, rebasing their indices.
fn graft(network: ControlNetwork, subtrees: Vec<Vec<Node>>) -> ItemTree {
    let total = 1 + subtrees.iter().map(Vec::len).sum::<usize>();
    let mut nodes = Vec::with_capacity(total);
    let mut root = Node::new(ItemKind::Root, None);
    root.subtree_end = total as u32;
    nodes.push(root);

    for subtree in subtrees.into_iter().filter(|s| !s.is_empty()) {
        let offset = nodes.len() as u32;
        let row = nodes[0].children.len() as u32;
        nodes[0].children.push(offset);
        for mut node in subtree {
            match node.parent {
                Some(parent) => node.parent = Some(parent + offset),
                None => {
                    node.parent = Some(0);
                    node.row = row;
                }
            }
            for child in &mut node.children {
                *child += offset;
            }
            node.subtree_end += offset;
            nodes.push(node);
        }
    }

    ItemTree::from_nodes(network, nodes)
}

/// Build a complete tree. Returns `None` if `token` was cancelled.
///
/// Subtrees are built in parallel, each under its own short read lock, and
/// appended in network order. `on_progress` receives the number of finished
/// subtrees and may be called from any worker thread.
pub(crate) fn build_tree<P>(
    network: &ControlNetwork,
    layout: TreeLayout,
    token: &CancellationToken,
    on_progress: P,
) -> Option<ItemTree>
where
    P: Fn(usize) + Sync,
{
    let tops = layout.top_level_entities(&network.read());
    let finished = AtomicUsize::new(0);

    let subtrees: Option<Vec<Vec<Node>>> = tops
        .par_iter()
        .map(|top| {
            if token.is_cancelled() {
                return None;
            }
            let nodes = build_subtree(&network.read(), layout, top);
            on_progress(finished.fetch_add(1, Ordering::Relaxed) + 1);
            Some(nodes)
        })
        .collect();

    let Some(subtrees) = subtrees else {
        tracing::debug!(target: "cnet_browse::tree", ?layout, "tree build cancelled");
        return None;
    };
    let tree = graft(network.clone(), subtrees);
    tracing::debug!(
        target: "cnet_browse::tree",
        ?layout,
        nodes = tree.len(),
        top_level = tree.top_level().len(),
        "tree built"
    );
    Some(tree)
}
