//! The visible linked list.
//!
//! A [`VisibleList`] is the result of filtering one [`ItemTree`]: a
//! visibility flag per node plus `first_visible_child`, `last_visible_child`
//! and `next_visible_peer` links that skip hidden nodes. Walking it costs
//! time proportional to the number of visible items.
//!
//! A list is only meaningful for the tree it was computed from.

use std::sync::atomic::{AtomicUsize, Ordering};

use cnet_browse_core::CancellationToken;
use rayon::prelude::*;

use super::item::ItemTree;
use crate::filter::FilterSet;
use crate::network::NetworkStore;

#[derive(Debug, Clone, Default)]
pub(crate) struct VisibleList {
    visible: Vec<bool>,
    first_child: Vec<Option<u32>>,
    last_child: Vec<Option<u32>>,
    next_peer: Vec<Option<u32>>,
    visible_top_level: usize,
}

/// Links of one top-level subtree, indexed relative to its first node.
struct SubtreeLinks {
    offset: u32,
    visible: Vec<bool>,
    first_child: Vec<Option<u32>>,
    last_child: Vec<Option<u32>>,
    next_peer: Vec<Option<u32>>,
}

impl SubtreeLinks {
    fn new(offset: u32, len: usize) -> Self {
        Self {
            offset,
            visible: vec![false; len],
            first_child: vec![None; len],
            last_child: vec![None; len],
            next_peer: vec![None; len],
        }
    }

    fn slot(&self, index: u32) -> usize {
        (index - self.offset) as usize
    }

    /// Decide visibility of `index` and its descendants and thread their
    /// links. `inherited` is the parent's own acceptance, used at levels
    /// the filter has no opinion about.
    fn decide(
        &mut self,
        tree: &ItemTree,
        store: &NetworkStore,
        filter: &FilterSet,
        index: u32,
        inherited: bool,
    ) -> bool {
        let node = tree.node(index);
        let accepted = match (node.kind.filter_level(), &node.entity) {
            (Some(level), Some(entity)) => filter.evaluate(store, entity, level).unwrap_or(inherited),
            _ => inherited,
        };

        let mut previous: Option<u32> = None;
        for &child in &node.children {
            if self.decide(tree, store, filter, child, accepted) {
                match previous {
                    None => {
                        let slot = self.slot(index);
                        self.first_child[slot] = Some(child);
                    }
                    Some(previous) => {
                        let slot = self.slot(previous);
                        self.next_peer[slot] = Some(child);
                    }
                }
                previous = Some(child);
            }
        }

        let slot = self.slot(index);
        self.last_child[slot] = previous;
        let visible = accepted || previous.is_some();
        self.visible[slot] = visible;
        visible
    }
}

impl VisibleList {
    /// A list in which nothing is visible.
    pub(crate) fn hidden(tree: &ItemTree) -> Self {
        let len = tree.len();
        let mut visible = vec![false; len];
        if let Some(root) = visible.first_mut() {
            *root = true;
        }
        Self {
            visible,
            first_child: vec![None; len],
            last_child: vec![None; len],
            next_peer: vec![None; len],
            visible_top_level: 0,
        }
    }

    /// Filter `tree`. Returns `None` if `token` is cancelled first.
    ///
    /// Top-level subtrees are decided in parallel and reduced in order.
    /// `on_progress` receives the number of finished subtrees.
    pub(crate) fn compute<P>(
        tree: &ItemTree,
        filter: &FilterSet,
        token: &CancellationToken,
        on_progress: P,
    ) -> Option<Self>
    where
        P: Fn(usize) + Sync,
    {
        let accept_all = filter.is_empty();
        let finished = AtomicUsize::new(0);

        let subtrees: Option<Vec<SubtreeLinks>> = tree
            .top_level()
            .par_iter()
            .map(|&top| {
                if token.is_cancelled() {
                    return None;
                }
                let end = tree.node(top).subtree_end;
                let mut links = SubtreeLinks::new(top, (end - top) as usize);
                links.decide(tree, &tree.network().read(), filter, top, accept_all);
                on_progress(finished.fetch_add(1, Ordering::Relaxed) + 1);
                Some(links)
            })
            .collect();
        let subtrees = subtrees?;

        let mut list = Self::hidden(tree);
        let mut previous_top: Option<u32> = None;
        for links in subtrees {
            let top = links.offset;
            let start = top as usize;
            let end = start + links.visible.len();
            list.visible[start..end].copy_from_slice(&links.visible);
            list.first_child[start..end].copy_from_slice(&links.first_child);
            list.last_child[start..end].copy_from_slice(&links.last_child);
            list.next_peer[start..end].copy_from_slice(&links.next_peer);

            if links.visible[0] {
                match previous_top {
                    None => list.first_child[0] = Some(top),
                    Some(previous) => list.next_peer[previous as usize] = Some(top),
                }
                previous_top = Some(top);
                list.visible_top_level += 1;
            }
        }
        list.last_child[0] = previous_top;
        Some(list)
    }

    pub(crate) fn is_visible(&self, index: u32) -> bool {
        self.visible.get(index as usize).copied().unwrap_or(false)
    }

    pub(crate) fn first_visible_child(&self, index: u32) -> Option<u32> {
        self.first_child.get(index as usize).copied().flatten()
    }

    pub(crate) fn last_visible_child(&self, index: u32) -> Option<u32> {
        self.last_child.get(index as usize).copied().flatten()
    }

    pub(crate) fn next_visible_peer(&self, index: u32) -> Option<u32> {
        self.next_peer.get(index as usize).copied().flatten()
    }

    pub(crate) fn visible_top_level_count(&self) -> usize {
        self.visible_top_level
    }

    /// The item after `index` in linear order. Collapsed parents are
    /// stepped over unless `ignore_expansion`.
    pub(crate) fn next_in_order(
        &self,
        tree: &ItemTree,
        index: u32,
        ignore_expansion: bool,
    ) -> Option<u32> {
        if ignore_expansion || tree.node(index).is_expanded() {
            if let Some(child) = self.first_visible_child(index) {
                return Some(child);
            }
        }
        let mut current = index;
        while current != 0 {
            if let Some(peer) = self.next_visible_peer(current) {
                return Some(peer);
            }
            current = tree.node(current).parent?;
        }
        None
    }

    /// Visible items in linear order, root excluded.
    pub(crate) fn iter<'a>(
        &'a self,
        tree: &'a ItemTree,
        ignore_expansion: bool,
    ) -> impl Iterator<Item = u32> + 'a {
        std::iter::successors(self.first_visible_child(0), move |&index| {
            self.next_in_order(tree, index, ignore_expansion)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterGroup, FilterLevel, FilterMode, LeafFilter};
    use crate::network::{ControlMeasure, ControlNetwork, ControlPoint};
    use crate::tree::builder::{TreeLayout, build_tree};
    use crate::tree::item::ItemKind;

    fn tree() -> ItemTree {
        let network = ControlNetwork::new();
        let p1 = network.add_point(ControlPoint::new("P1"));
        network.add_measure(p1, ControlMeasure::new("c1")).unwrap();
        network.add_measure(p1, ControlMeasure::new("c2")).unwrap();
        let p2 = network.add_point(ControlPoint::new("P2"));
        network
            .add_measure(p2, ControlMeasure::new("c1").with_edit_lock(true))
            .unwrap();
        let p3 = network.add_point(ControlPoint::new("P3").with_ignored(true));
        network.add_measure(p3, ControlMeasure::new("c3")).unwrap();
        build_tree(&network, TreeLayout::PointMeasure, &CancellationToken::new(), |_| {}).unwrap()
    }

    fn names(tree: &ItemTree, list: &VisibleList) -> Vec<String> {
        let store = tree.network().read();
        list.iter(tree, true)
            .map(|i| tree.node(i).entity.as_ref().unwrap().display_name(&store))
            .collect()
    }

    fn check_invariants(tree: &ItemTree, list: &VisibleList) {
        for index in 1..tree.len() as u32 {
            if list.is_visible(index) {
                let mut parent = tree.node(index).parent;
                while let Some(p) = parent {
                    assert!(list.is_visible(p));
                    parent = tree.node(p).parent;
                }
            }
            let expected: Vec<u32> = tree
                .node(index)
                .children
                .iter()
                .copied()
                .filter(|&c| list.is_visible(c))
                .collect();
            let threaded: Vec<u32> =
                std::iter::successors(list.first_visible_child(index), |&c| {
                    list.next_visible_peer(c)
                })
                .collect();
            assert_eq!(threaded, expected);
            assert_eq!(list.last_visible_child(index), expected.last().copied());
        }
    }

    #[test]
    fn test_empty_filter_shows_everything() {
        let tree = tree();
        let list = VisibleList::compute(&tree, &FilterSet::default(), &CancellationToken::new(), |_| {})
            .unwrap();
        assert_eq!(names(&tree, &list), vec!["P1", "c1", "c2", "P2", "c1", "P3", "c3"]);
        assert_eq!(list.visible_top_level_count(), 3);
        check_invariants(&tree, &list);
    }

    #[test]
    fn test_measure_filter_pulls_in_parent() {
        let tree = tree();
        let filter = FilterSet::default().with_group(
            FilterGroup::new(FilterMode::All).with_leaf(
                LeafFilter::equals_bool(FilterLevel::Measure, "Edit Locked", true).unwrap(),
            ),
        );
        let list = VisibleList::compute(&tree, &filter, &CancellationToken::new(), |_| {}).unwrap();
        assert_eq!(names(&tree, &list), vec!["P2", "c1"]);
        assert_eq!(list.visible_top_level_count(), 1);
        check_invariants(&tree, &list);
    }

    #[test]
    fn test_point_filter_inherited_by_measures() {
        let tree = tree();
        let filter = FilterSet::default().with_group(
            FilterGroup::new(FilterMode::All)
                .with_leaf(LeafFilter::equals_bool(FilterLevel::Point, "Ignored", true).unwrap()),
        );
        let list = VisibleList::compute(&tree, &filter, &CancellationToken::new(), |_| {}).unwrap();
        assert_eq!(names(&tree, &list), vec!["P3", "c3"]);
        check_invariants(&tree, &list);
    }

    #[test]
    fn test_collapsed_parents_hide_children() {
        let tree = tree();
        let list = VisibleList::compute(&tree, &FilterSet::default(), &CancellationToken::new(), |_| {})
            .unwrap();
        let tops: Vec<ItemKind> = list.iter(&tree, false).map(|i| tree.node(i).kind).collect();
        assert_eq!(tops, vec![ItemKind::PointParent; 3]);
    }

    #[test]
    fn test_cancelled_filter_returns_none() {
        let tree = tree();
        let token = CancellationToken::new();
        token.cancel();
        assert!(VisibleList::compute(&tree, &FilterSet::default(), &token, |_| {}).is_none());
    }
}
