//! Tree items.
//!
//! An [`ItemTree`] is an immutable arena of nodes in preorder, produced by a
//! build worker and shared behind an `Arc`. Each top-level subtree occupies
//! a contiguous index range, so filter workers can own disjoint slices.
//! Per-item state that changes after the build (expansion, selection, and
//! the dead mark set when the backing entity is destroyed) lives in atomics.
//!
//! [`TreeItem`] is the public handle: the tree plus a node index.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::entity::{EntityKind, EntityRef};
use crate::error::{BrowseError, Result};
use crate::filter::FilterLevel;
use crate::network::ControlNetwork;
use crate::value::{BUSY_TEXT, CellValue};

/// The role of an item in its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Root,
    PointParent,
    MeasureLeaf,
    ImageParent,
    ImageLeaf,
    ConnectionParent,
    /// Placeholder for rows not yet known while a filter runs.
    BusyLeaf,
    /// Placeholder child of an image with no connections.
    NullLeaf,
}

impl ItemKind {
    /// Whether items of this kind refer to a network entity.
    pub fn has_entity(self) -> bool {
        !matches!(self, Self::Root | Self::BusyLeaf | Self::NullLeaf)
    }

    /// Whether items of this kind may have children.
    pub fn is_parent(self) -> bool {
        matches!(
            self,
            Self::Root | Self::PointParent | Self::ImageParent | Self::ConnectionParent
        )
    }

    /// The filter level used when evaluating items of this kind.
    pub fn filter_level(self) -> Option<FilterLevel> {
        match self {
            Self::PointParent => Some(FilterLevel::Point),
            Self::MeasureLeaf => Some(FilterLevel::Measure),
            Self::ImageParent | Self::ConnectionParent => Some(FilterLevel::Image),
            Self::ImageLeaf => Some(FilterLevel::Connection),
            Self::Root | Self::BusyLeaf | Self::NullLeaf => None,
        }
    }

    /// Whether this kind is selected by `mask`.
    ///
    /// Busy placeholders match every mask; null placeholders only match
    /// [`KindMask::ALL`].
    pub fn matches(self, mask: KindMask) -> bool {
        match self {
            Self::PointParent => mask.points,
            Self::MeasureLeaf => mask.measures,
            Self::ImageParent | Self::ImageLeaf | Self::ConnectionParent => mask.images,
            Self::BusyLeaf => true,
            Self::NullLeaf => mask == KindMask::ALL,
            Self::Root => false,
        }
    }
}

/// A set of item kinds for range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindMask {
    pub points: bool,
    pub measures: bool,
    pub images: bool,
}

impl KindMask {
    pub const NONE: KindMask = KindMask {
        points: false,
        measures: false,
        images: false,
    };

    pub const POINTS: KindMask = KindMask {
        points: true,
        ..Self::NONE
    };

    pub const MEASURES: KindMask = KindMask {
        measures: true,
        ..Self::NONE
    };

    pub const IMAGES: KindMask = KindMask {
        images: true,
        ..Self::NONE
    };

    pub const ALL: KindMask = KindMask {
        points: true,
        measures: true,
        images: true,
    };

    pub fn union(self, other: KindMask) -> KindMask {
        KindMask {
            points: self.points || other.points,
            measures: self.measures || other.measures,
            images: self.images || other.images,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct NodeFlags {
    expanded: AtomicBool,
    selected: AtomicBool,
    dead: AtomicBool,
}

/// One node of the arena.
#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) kind: ItemKind,
    pub(crate) entity: Option<EntityRef>,
    pub(crate) parent: Option<u32>,
    /// Index among the parent's children.
    pub(crate) row: u32,
    pub(crate) children: Vec<u32>,
    /// One past the last node of this node's subtree.
    pub(crate) subtree_end: u32,
    pub(crate) flags: NodeFlags,
}

impl Node {
    pub(crate) fn new(kind: ItemKind, entity: Option<EntityRef>) -> Self {
        Self {
            kind,
            entity,
            parent: None,
            row: 0,
            children: Vec::new(),
            subtree_end: 0,
            flags: NodeFlags::default(),
        }
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.flags.dead.load(Ordering::Acquire)
    }

    pub(crate) fn is_selected(&self) -> bool {
        self.flags.selected.load(Ordering::Acquire)
    }

    pub(crate) fn is_expanded(&self) -> bool {
        self.flags.expanded.load(Ordering::Acquire)
    }
}

/// An immutable arena of tree nodes. Index 0 is the root.
pub struct ItemTree {
    network: ControlNetwork,
    pub(crate) nodes: Vec<Node>,
    entity_index: HashMap<EntityRef, Vec<u32>>,
}

impl ItemTree {
    /// A tree holding only a root.
    pub(crate) fn empty(network: ControlNetwork) -> Self {
        let mut root = Node::new(ItemKind::Root, None);
        root.subtree_end = 1;
        Self::from_nodes(network, vec![root])
    }

    /// A one-node tree whose root is a busy placeholder.
    pub(crate) fn busy(network: ControlNetwork) -> Self {
        let mut busy = Node::new(ItemKind::BusyLeaf, None);
        busy.subtree_end = 1;
        Self::from_nodes(network, vec![busy])
    }

    /// Wrap prepared preorder nodes and index their entities.
    pub(crate) fn from_nodes(network: ControlNetwork, nodes: Vec<Node>) -> Self {
        let mut entity_index: HashMap<EntityRef, Vec<u32>> = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            if let Some(entity) = &node.entity {
                entity_index
                    .entry(entity.clone())
                    .or_default()
                    .push(index as u32);
            }
        }
        Self {
            network,
            nodes,
            entity_index,
        }
    }

    pub fn network(&self) -> &ControlNetwork {
        &self.network
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub(crate) fn node(&self, index: u32) -> &Node {
        &self.nodes[index as usize]
    }

    pub(crate) fn top_level(&self) -> &[u32] {
        &self.nodes[0].children
    }

    /// Nodes referring to `entity`.
    pub(crate) fn nodes_for(&self, entity: &EntityRef) -> &[u32] {
        self.entity_index
            .get(entity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Mark every node of `entity` dead. Returns how many were marked.
    pub(crate) fn mark_dead(&self, entity: &EntityRef) -> usize {
        let nodes = self.nodes_for(entity);
        for &index in nodes {
            let flags = &self.node(index).flags;
            flags.dead.store(true, Ordering::Release);
            flags.selected.store(false, Ordering::Release);
        }
        nodes.len()
    }

    fn set_selected_raw(&self, index: u32, selected: bool) {
        self.node(index)
            .flags
            .selected
            .store(selected, Ordering::Release);
    }

    /// Set the selection flag with point/measure propagation.
    pub(crate) fn set_selected(&self, index: u32, selected: bool) {
        let node = self.node(index);
        if selected && (node.is_dead() || !node.kind.has_entity()) {
            return;
        }
        self.set_selected_raw(index, selected);
        match node.kind {
            ItemKind::PointParent if selected => {
                for &child in &node.children {
                    if self.node(child).kind == ItemKind::MeasureLeaf && !self.node(child).is_dead() {
                        self.set_selected_raw(child, true);
                    }
                }
            }
            ItemKind::MeasureLeaf if !selected => {
                if let Some(parent) = node.parent {
                    if self.node(parent).kind == ItemKind::PointParent {
                        self.set_selected_raw(parent, false);
                    }
                }
            }
            _ => {}
        }
    }

    /// Set the selection flag on every node of a kind in `mask`.
    pub(crate) fn set_all_selected(&self, selected: bool, mask: KindMask) {
        for (index, node) in self.nodes.iter().enumerate() {
            if node.kind.has_entity() && node.kind.matches(mask) {
                if selected && node.is_dead() {
                    continue;
                }
                self.set_selected_raw(index as u32, selected);
            }
        }
    }
}

impl fmt::Debug for ItemTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemTree")
            .field("nodes", &self.nodes.len())
            .field("top_level", &self.top_level().len())
            .finish()
    }
}

static_assertions::assert_impl_all!(ItemTree: Send, Sync);

/// A handle to one item of a tree.
///
/// Handles keep their tree alive. Two handles are equal when they name the
/// same node of the same tree; handles from an older build never equal
/// handles from a newer one.
#[derive(Clone)]
pub struct TreeItem {
    tree: Arc<ItemTree>,
    index: u32,
}

impl TreeItem {
    pub(crate) fn new(tree: Arc<ItemTree>, index: u32) -> Self {
        Self { tree, index }
    }

    pub(crate) fn tree(&self) -> &Arc<ItemTree> {
        &self.tree
    }

    pub(crate) fn index(&self) -> u32 {
        self.index
    }

    pub(crate) fn belongs_to(&self, tree: &Arc<ItemTree>) -> bool {
        Arc::ptr_eq(&self.tree, tree)
    }

    fn node(&self) -> &Node {
        self.tree.node(self.index)
    }

    pub fn kind(&self) -> ItemKind {
        self.node().kind
    }

    pub fn is_busy(&self) -> bool {
        self.kind() == ItemKind::BusyLeaf
    }

    /// The kind of entity behind this item, if any.
    pub fn entity_kind(&self) -> Option<EntityKind> {
        self.node().entity.as_ref().map(EntityRef::kind)
    }

    /// The backing entity, or `None` after it was destroyed.
    ///
    /// Fails with `Programmer` for items that never have one.
    pub fn entity(&self) -> Result<Option<&EntityRef>> {
        let node = self.node();
        if !node.kind.has_entity() {
            return Err(BrowseError::programmer(format!(
                "{:?} item has no entity",
                node.kind
            )));
        }
        Ok(if node.is_dead() { None } else { node.entity.as_ref() })
    }

    /// Whether the backing entity has been destroyed.
    pub fn is_dead(&self) -> bool {
        self.node().is_dead()
    }

    pub fn parent(&self) -> Option<TreeItem> {
        self.node()
            .parent
            .filter(|&p| p != 0)
            .map(|p| TreeItem::new(self.tree.clone(), p))
    }

    /// Index among the parent's children.
    pub fn row(&self) -> usize {
        self.node().row as usize
    }

    pub fn child_count(&self) -> usize {
        self.node().children.len()
    }

    /// Child at `row`. Fails with `Programmer` on leaf kinds.
    pub fn child(&self, row: usize) -> Result<TreeItem> {
        let node = self.node();
        if !node.kind.is_parent() {
            return Err(BrowseError::programmer(format!(
                "{:?} item has no children",
                node.kind
            )));
        }
        node.children
            .get(row)
            .map(|&c| TreeItem::new(self.tree.clone(), c))
            .ok_or_else(|| BrowseError::programmer(format!("child row {row} out of range")))
    }

    pub fn children(&self) -> Vec<TreeItem> {
        self.node()
            .children
            .iter()
            .map(|&c| TreeItem::new(self.tree.clone(), c))
            .collect()
    }

    pub fn is_expanded(&self) -> bool {
        self.node().is_expanded()
    }

    pub fn set_expanded(&self, expanded: bool) {
        self.node()
            .flags
            .expanded
            .store(expanded, Ordering::Release);
    }

    pub fn is_selectable(&self) -> bool {
        self.kind().has_entity() && !self.is_dead()
    }

    pub fn is_selected(&self) -> bool {
        self.node().is_selected()
    }

    /// Select or deselect. Selecting a point selects its measures;
    /// deselecting a measure deselects its point.
    pub fn set_selected(&self, selected: bool) {
        self.tree.set_selected(self.index, selected);
    }

    /// Text shown for the item in a tree view.
    pub fn display_name(&self) -> String {
        let node = self.node();
        match (&node.entity, node.kind) {
            (_, ItemKind::BusyLeaf) => BUSY_TEXT.to_string(),
            (Some(entity), _) if !node.is_dead() => {
                entity.display_name(&self.tree.network.read())
            }
            _ => String::new(),
        }
    }

    /// Read a cell.
    pub fn data(&self, title: &str) -> Result<CellValue> {
        let node = self.node();
        match node.kind {
            ItemKind::BusyLeaf => Ok(CellValue::text(BUSY_TEXT)),
            ItemKind::NullLeaf => Ok(CellValue::Empty),
            ItemKind::Root => Err(BrowseError::programmer("root item has no data")),
            _ => match &node.entity {
                Some(entity) if !node.is_dead() => entity.value(&self.tree.network.read(), title),
                _ => Ok(CellValue::Empty),
            },
        }
    }

    pub fn formatted(&self, title: &str) -> Result<String> {
        Ok(self.data(title)?.formatted())
    }

    pub fn is_editable(&self, title: &str) -> bool {
        match self.entity() {
            Ok(Some(entity)) => entity.is_editable(&self.tree.network.read(), title),
            _ => false,
        }
    }

    /// Write a cell from user text.
    pub fn set_data(&self, title: &str, text: &str) -> Result<()> {
        match self.entity()? {
            Some(entity) => entity.set(&self.tree.network, title, text),
            None => Err(BrowseError::not_found("entity", self.display_name())),
        }
    }

    /// Warning to confirm before writing `text`, or an empty string.
    pub fn warning_message(&self, title: &str, text: &str) -> String {
        match self.entity() {
            Ok(Some(entity)) => entity.warning_message(&self.tree.network.read(), title, text),
            _ => String::new(),
        }
    }

    pub fn can_delete(&self) -> Result<()> {
        match self.entity()? {
            Some(entity) => entity.can_delete(&self.tree.network.read()),
            None => Err(BrowseError::not_found("entity", self.display_name())),
        }
    }

    pub fn delete_from_network(&self) -> Result<()> {
        match self.entity()? {
            Some(entity) => entity.delete_from_network(&self.tree.network),
            None => Err(BrowseError::not_found("entity", self.display_name())),
        }
    }
}

impl PartialEq for TreeItem {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree) && self.index == other.index
    }
}

impl Eq for TreeItem {}

impl Hash for TreeItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.tree), state);
        self.index.hash(state);
    }
}

impl fmt::Debug for TreeItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.node();
        f.debug_struct("TreeItem")
            .field("kind", &node.kind)
            .field("index", &self.index)
            .field("entity", &node.entity)
            .field("dead", &node.is_dead())
            .finish()
    }
}

static_assertions::assert_impl_all!(TreeItem: Send, Sync);
