//! The tree model.
//!
//! [`TreeModel`] owns the current [`ItemTree`] and its [`VisibleList`].
//! Rebuilds and filter passes run on the worker pool; their results are
//! installed from completion callbacks queued on the runtime's event loop,
//! so all state changes and signal emissions happen on the thread that
//! drives that loop.
//!
//! Only one build and one filter pass run at a time. A request made while
//! one is running cancels it and starts over once the cancelled worker
//! returns.

use std::sync::{Arc, Weak};

use cnet_browse_core::{CancellationToken, ConnectionId, EventLoop, ProgressCounter, Signal};
use parking_lot::Mutex;

use super::builder::{TreeLayout, build_tree};
use super::item::{ItemKind, ItemTree, KindMask, TreeItem};
use super::visible::VisibleList;
use crate::config::Runtime;
use crate::entity::EntityRef;
use crate::error::{BrowseError, Result};
use crate::filter::FilterSet;
use crate::network::ControlNetwork;

/// Signals emitted by a [`TreeModel`].
#[derive(Default)]
pub struct TreeSignals {
    // -------------------------------------------------------------------------
    // Content signals
    // -------------------------------------------------------------------------
    /// The tree or its visible set changed.
    pub model_modified: Signal<()>,

    /// Any sort over this model's items must stop.
    pub cancel_sort: Signal<()>,

    /// Args: (visible top-level items, total top-level items). The visible
    /// count is -1 while a filter pass runs.
    pub filter_counts_changed: Signal<(i64, i64)>,

    // -------------------------------------------------------------------------
    // Selection signals
    // -------------------------------------------------------------------------
    /// Items selected through the tree, or on behalf of it.
    pub tree_selection_changed: Signal<Vec<TreeItem>>,

    /// Items selected through a table.
    pub table_selection_changed: Signal<Vec<TreeItem>>,
}

struct TreeState {
    tree: Arc<ItemTree>,
    visible: Arc<VisibleList>,
    filter: Arc<FilterSet>,
    frozen: bool,
    rebuild_pending: bool,
    filter_pending: bool,
    rebuilding: bool,
    rebuild_again: bool,
    rebuild_token: Option<CancellationToken>,
    rebuild_scheduled: bool,
    /// Bumped whenever a rebuild launches; filter passes over older trees
    /// are discarded.
    rebuild_generation: u64,
    filter_running: bool,
    filter_again: bool,
    filter_token: Option<CancellationToken>,
}

/// Posts worker progress to the event loop, at most about a hundred times
/// per pass.
struct WorkerProgress {
    event_loop: EventLoop,
    counter: ProgressCounter,
    total: usize,
    step: usize,
}

impl WorkerProgress {
    fn new(event_loop: &EventLoop, counter: &ProgressCounter, total: usize) -> Self {
        counter.set_range(0, total as i32);
        counter.set_value(0);
        Self {
            event_loop: event_loop.clone(),
            counter: counter.clone(),
            total,
            step: (total / 100).max(1),
        }
    }

    fn report(&self, finished: usize) {
        if finished % self.step == 0 || finished == self.total {
            let counter = self.counter.clone();
            self.event_loop
                .post(move || counter.set_value(finished as i32));
        }
    }
}

/// A filtered, asynchronously rebuilt tree over a control network.
///
/// # Example
///
/// ```
/// use cnet_browse::{BrowseConfig, ControlNetwork, ControlPoint, KindMask, Runtime, TreeLayout, TreeModel};
/// use std::time::Duration;
///
/// let runtime = Runtime::new(BrowseConfig::default().with_threads(2)).unwrap();
/// let network = ControlNetwork::new();
/// network.add_point(ControlPoint::new("P1"));
///
/// let model = TreeModel::new(&runtime, network, TreeLayout::PointMeasure);
/// model.rebuild();
/// assert!(runtime.process_until(|| model.is_idle(), Duration::from_secs(5)));
/// assert_eq!(model.get_items(0, None, KindMask::POINTS, true).len(), 1);
/// ```
pub struct TreeModel {
    weak_self: Weak<TreeModel>,
    runtime: Runtime,
    network: ControlNetwork,
    layout: TreeLayout,
    state: Mutex<TreeState>,
    busy: TreeItem,
    signals: TreeSignals,
    filter_progress: ProgressCounter,
    rebuild_progress: ProgressCounter,
    network_connections: Mutex<Vec<(NetworkSignalKind, ConnectionId)>>,
}

#[derive(Debug, Clone, Copy)]
enum NetworkSignalKind {
    Point,
    Measure,
    Image,
}

impl TreeModel {
    /// Create an empty model. Call [`rebuild`](Self::rebuild) to populate it.
    pub fn new(runtime: &Runtime, network: ControlNetwork, layout: TreeLayout) -> Arc<Self> {
        let tree = Arc::new(ItemTree::empty(network.clone()));
        let visible = Arc::new(VisibleList::hidden(&tree));
        let busy = TreeItem::new(Arc::new(ItemTree::busy(network.clone())), 0);

        let model = Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            runtime: runtime.clone(),
            network,
            layout,
            state: Mutex::new(TreeState {
                tree,
                visible,
                filter: Arc::new(FilterSet::default()),
                frozen: false,
                rebuild_pending: false,
                filter_pending: false,
                rebuilding: false,
                rebuild_again: false,
                rebuild_token: None,
                rebuild_scheduled: false,
                rebuild_generation: 0,
                filter_running: false,
                filter_again: false,
                filter_token: None,
            }),
            busy,
            signals: TreeSignals::default(),
            filter_progress: ProgressCounter::new(),
            rebuild_progress: ProgressCounter::new(),
            network_connections: Mutex::new(Vec::new()),
        });
        model.connect_network();
        model
    }

    fn connect_network(&self) {
        let signals = self.network.signals();
        let mut connections = self.network_connections.lock();

        let weak = self.weak_self.clone();
        let id = signals.point_destroyed.connect(move |&id| {
            if let Some(model) = weak.upgrade() {
                model.handle_entity_destroyed(EntityRef::Point(id));
            }
        });
        connections.push((NetworkSignalKind::Point, id));

        let weak = self.weak_self.clone();
        let id = signals.measure_destroyed.connect(move |&id| {
            if let Some(model) = weak.upgrade() {
                model.handle_entity_destroyed(EntityRef::Measure(id));
            }
        });
        connections.push((NetworkSignalKind::Measure, id));

        let weak = self.weak_self.clone();
        let id = signals.image_destroyed.connect(move |serial| {
            if let Some(model) = weak.upgrade() {
                model.handle_entity_destroyed(EntityRef::Image(serial.clone()));
            }
        });
        connections.push((NetworkSignalKind::Image, id));
    }

    pub fn signals(&self) -> &TreeSignals {
        &self.signals
    }

    /// Progress of the running filter pass, in top-level items.
    pub fn filter_progress(&self) -> &ProgressCounter {
        &self.filter_progress
    }

    /// Progress of the running rebuild, in top-level items.
    pub fn rebuild_progress(&self) -> &ProgressCounter {
        &self.rebuild_progress
    }

    pub fn network(&self) -> &ControlNetwork {
        &self.network
    }

    pub fn layout(&self) -> TreeLayout {
        self.layout
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn is_filtering(&self) -> bool {
        self.state.lock().filter_running
    }

    pub fn is_rebuilding(&self) -> bool {
        self.state.lock().rebuilding
    }

    pub fn is_frozen(&self) -> bool {
        self.state.lock().frozen
    }

    /// No rebuild or filter pass is running or waiting to run.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        !state.rebuilding
            && !state.filter_running
            && !state.rebuild_scheduled
            && !state.rebuild_pending
            && !state.filter_pending
    }

    fn snapshot(&self) -> (Arc<ItemTree>, Arc<VisibleList>, bool) {
        let state = self.state.lock();
        (state.tree.clone(), state.visible.clone(), state.filter_running)
    }

    // -------------------------------------------------------------------------
    // Rebuild
    // -------------------------------------------------------------------------

    /// Rebuild the tree from the network in the background.
    ///
    /// While frozen the request is remembered and honored on unfreeze.
    #[tracing::instrument(skip(self), target = "cnet_browse::tree", level = "debug")]
    pub fn rebuild(&self) {
        {
            let mut state = self.state.lock();
            if state.frozen {
                state.rebuild_pending = true;
                return;
            }
        }

        self.signals.cancel_sort.emit(());

        {
            let mut state = self.state.lock();
            if state.rebuilding {
                state.rebuild_again = true;
                if let Some(token) = &state.rebuild_token {
                    token.cancel();
                }
                tracing::debug!(target: "cnet_browse::tree", "rebuild superseded");
                return;
            }
            state.rebuilding = true;
            if let Some(token) = &state.filter_token {
                token.cancel();
            }
        }
        self.launch_rebuild();
    }

    fn launch_rebuild(&self) {
        let token = CancellationToken::new();
        {
            let mut state = self.state.lock();
            state.rebuild_token = Some(token.clone());
            state.rebuild_generation += 1;
        }

        let total = self.layout.top_level_count(&self.network.read());
        let progress = WorkerProgress::new(self.runtime.event_loop(), &self.rebuild_progress, total);
        let network = self.network.clone();
        let layout = self.layout;
        let weak = self.weak_self.clone();

        tracing::debug!(target: "cnet_browse::tree", ?layout, total, "launching rebuild");
        self.runtime.pool().spawn_with_callback(
            self.runtime.event_loop(),
            move || build_tree(&network, layout, &token, |n| progress.report(n)),
            move |tree| {
                if let Some(model) = weak.upgrade() {
                    model.rebuild_done(tree);
                }
            },
        );
    }

    fn rebuild_done(&self, tree: Option<ItemTree>) {
        {
            let mut state = self.state.lock();
            if state.rebuild_again {
                state.rebuild_again = false;
                drop(state);
                self.launch_rebuild();
                return;
            }
            state.rebuilding = false;
            state.rebuild_token = None;
            match tree {
                Some(tree) => {
                    let tree = Arc::new(tree);
                    state.visible = Arc::new(VisibleList::hidden(&tree));
                    state.tree = tree;
                }
                None => {
                    tracing::debug!(target: "cnet_browse::tree", "rebuild discarded");
                    return;
                }
            }
        }

        tracing::debug!(target: "cnet_browse::tree", "rebuild installed");
        self.apply_filter();
        self.signals.model_modified.emit(());
    }

    fn handle_entity_destroyed(&self, entity: EntityRef) {
        let tree = self.state.lock().tree.clone();
        let marked = tree.mark_dead(&entity);
        if marked == 0 && self.layout != TreeLayout::ImageImage {
            return;
        }
        tracing::debug!(target: "cnet_browse::tree", ?entity, marked, "entity destroyed");
        self.signals.cancel_sort.emit(());
        self.schedule_rebuild();
    }

    /// Queue one rebuild on the event loop, coalescing repeated requests.
    fn schedule_rebuild(&self) {
        {
            let mut state = self.state.lock();
            if state.rebuild_scheduled {
                return;
            }
            state.rebuild_scheduled = true;
        }
        let weak = self.weak_self.clone();
        self.runtime.event_loop().post(move || {
            if let Some(model) = weak.upgrade() {
                model.state.lock().rebuild_scheduled = false;
                model.rebuild();
            }
        });
    }

    // -------------------------------------------------------------------------
    // Filter
    // -------------------------------------------------------------------------

    /// The filter applied by the next pass.
    pub fn filter(&self) -> Arc<FilterSet> {
        self.state.lock().filter.clone()
    }

    /// Replace the filter and re-apply it.
    pub fn set_filter(&self, filter: FilterSet) {
        self.state.lock().filter = Arc::new(filter);
        self.apply_filter();
    }

    /// Recompute the visible set in the background.
    ///
    /// Workers see a copy of the filter taken at launch. While a rebuild
    /// runs this does nothing; the rebuild applies the filter when done.
    #[tracing::instrument(skip(self), target = "cnet_browse::filter", level = "debug")]
    pub fn apply_filter(&self) {
        {
            let mut state = self.state.lock();
            if state.frozen {
                state.filter_pending = true;
                return;
            }
            if state.rebuilding {
                return;
            }
        }

        self.signals.cancel_sort.emit(());

        {
            let mut state = self.state.lock();
            if state.filter_running {
                state.filter_again = true;
                if let Some(token) = &state.filter_token {
                    token.cancel();
                }
                tracing::debug!(target: "cnet_browse::filter", "filter pass superseded");
                return;
            }
        }
        self.launch_filter();
    }

    fn launch_filter(&self) {
        let token = CancellationToken::new();
        let (tree, filter, generation) = {
            let mut state = self.state.lock();
            state.filter_running = true;
            state.filter_again = false;
            state.filter_token = Some(token.clone());
            (state.tree.clone(), state.filter.clone(), state.rebuild_generation)
        };

        let total = tree.top_level().len();
        let progress = WorkerProgress::new(self.runtime.event_loop(), &self.filter_progress, total);
        self.signals
            .filter_counts_changed
            .emit((-1, total as i64));

        let weak = self.weak_self.clone();
        tracing::debug!(target: "cnet_browse::filter", total, "launching filter pass");
        self.runtime.pool().spawn_with_callback(
            self.runtime.event_loop(),
            move || {
                let visible = VisibleList::compute(&tree, &filter, &token, |n| progress.report(n));
                visible.map(|visible| (tree, visible))
            },
            move |result| {
                if let Some(model) = weak.upgrade() {
                    model.filter_done(generation, result);
                }
            },
        );
    }

    fn filter_done(&self, generation: u64, result: Option<(Arc<ItemTree>, VisibleList)>) {
        let counts = {
            let mut state = self.state.lock();
            if state.filter_again && !state.rebuilding {
                drop(state);
                self.launch_filter();
                return;
            }
            state.filter_running = false;
            state.filter_again = false;
            state.filter_token = None;

            let current = !state.rebuilding
                && generation == state.rebuild_generation;
            match result {
                Some((tree, visible)) if current && Arc::ptr_eq(&tree, &state.tree) => {
                    let counts = (
                        visible.visible_top_level_count() as i64,
                        tree.top_level().len() as i64,
                    );
                    state.visible = Arc::new(visible);
                    Some(counts)
                }
                _ => None,
            }
        };

        match counts {
            Some((visible, total)) => {
                tracing::debug!(target: "cnet_browse::filter", visible, total, "filter pass installed");
                self.signals.model_modified.emit(());
                self.signals.filter_counts_changed.emit((visible, total));
            }
            None => {
                tracing::debug!(target: "cnet_browse::filter", "filter pass discarded");
                self.filter_progress.reset();
            }
        }
    }

    // -------------------------------------------------------------------------
    // Freezing
    // -------------------------------------------------------------------------

    /// Suspend rebuilds and filter passes. Unfreezing runs whatever was
    /// requested meanwhile, rebuild first.
    pub fn set_frozen(&self, frozen: bool) {
        let (rebuild, filter) = {
            let mut state = self.state.lock();
            state.frozen = frozen;
            if frozen {
                return;
            }
            (
                std::mem::take(&mut state.rebuild_pending),
                std::mem::take(&mut state.filter_pending),
            )
        };
        if rebuild {
            self.rebuild();
        } else if filter {
            self.apply_filter();
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// The busy placeholder used to pad range queries.
    pub fn busy_item(&self) -> TreeItem {
        self.busy.clone()
    }

    /// Items directly under the root, visible or not.
    pub fn top_level_items(&self) -> Vec<TreeItem> {
        let tree = self.state.lock().tree.clone();
        tree.top_level()
            .iter()
            .map(|&index| TreeItem::new(tree.clone(), index))
            .collect()
    }

    /// Items of the current tree that refer to `entity`.
    pub fn find_items(&self, entity: &EntityRef) -> Vec<TreeItem> {
        let tree = self.state.lock().tree.clone();
        tree.nodes_for(entity)
            .iter()
            .map(|&index| TreeItem::new(tree.clone(), index))
            .collect()
    }

    /// Whether `item` is in the current visible set.
    pub fn is_visible(&self, item: &TreeItem) -> bool {
        let (tree, visible, _) = self.snapshot();
        item.belongs_to(&tree) && visible.is_visible(item.index())
    }

    /// Visible items of a kind in `mask`, rows `start..end` in linear order.
    ///
    /// `end == None` grabs everything from `start` on. While a filter pass
    /// runs and `end` is given, the result is padded with busy items to
    /// exactly `end - start` entries.
    pub fn get_items(
        &self,
        start: usize,
        end: Option<usize>,
        mask: KindMask,
        ignore_expansion: bool,
    ) -> Vec<TreeItem> {
        let (tree, visible, filtering) = self.snapshot();
        let mut items = Vec::new();
        let mut row = 0usize;

        for index in visible.iter(&tree, ignore_expansion) {
            if end.is_some_and(|end| row >= end) {
                break;
            }
            if tree.node(index).kind.matches(mask) {
                if row >= start {
                    items.push(TreeItem::new(tree.clone(), index));
                }
                row += 1;
            }
        }

        if filtering {
            if let Some(end) = end {
                let wanted = end.saturating_sub(start);
                items.resize(wanted.max(items.len()), self.busy.clone());
            }
        }
        items
    }

    /// Visible items from `first` to `last` inclusive, in the order they
    /// are met walking from `first`. If `last` comes earlier in the tree,
    /// the walk runs backwards from `first`.
    ///
    /// Endpoints are always included; other items must match `mask`.
    /// Fails with `NotVisible` if either endpoint is not visible.
    pub fn items_between(
        &self,
        first: &TreeItem,
        last: &TreeItem,
        mask: KindMask,
        ignore_expansion: bool,
    ) -> Result<Vec<TreeItem>> {
        let (tree, visible, _) = self.snapshot();
        if !first.belongs_to(&tree) || !last.belongs_to(&tree) {
            return Err(BrowseError::NotVisible);
        }
        let (a, b) = (first.index(), last.index());

        let mut range = std::collections::VecDeque::new();
        let mut forward: Option<bool> = None;
        for index in visible.iter(&tree, ignore_expansion) {
            let item = || TreeItem::new(tree.clone(), index);
            match forward {
                None => {
                    if index != a && index != b {
                        continue;
                    }
                    range.push_back(item());
                    if a == b {
                        return Ok(range.into());
                    }
                    forward = Some(index == a);
                }
                Some(forward) => {
                    let is_endpoint = index == a || index == b;
                    if is_endpoint || tree.node(index).kind.matches(mask) {
                        if forward {
                            range.push_back(item());
                        } else {
                            range.push_front(item());
                        }
                    }
                    if is_endpoint {
                        return Ok(range.into());
                    }
                }
            }
        }
        Err(BrowseError::NotVisible)
    }

    /// Selected visible items. Empty while a filter pass runs.
    pub fn selected_items(&self, mask: KindMask) -> Vec<TreeItem> {
        let (tree, visible, filtering) = self.snapshot();
        if filtering {
            return Vec::new();
        }
        visible
            .iter(&tree, true)
            .filter(|&index| {
                let node = tree.node(index);
                node.kind.matches(mask) && node.is_selected()
            })
            .map(|index| TreeItem::new(tree.clone(), index))
            .collect()
    }

    /// Row of `item` among visible items matching `mask`.
    pub fn index_of_visible_item(
        &self,
        item: &TreeItem,
        mask: KindMask,
        ignore_expansion: bool,
    ) -> Option<usize> {
        let (tree, visible, _) = self.snapshot();
        if !item.belongs_to(&tree) {
            return None;
        }
        visible
            .iter(&tree, ignore_expansion)
            .filter(|&index| tree.node(index).kind.matches(mask))
            .position(|index| index == item.index())
    }

    /// Select or deselect every item of a kind in `mask`.
    pub fn set_global_selection(&self, selected: bool, mask: KindMask) {
        let tree = self.state.lock().tree.clone();
        tree.set_all_selected(selected, mask);
    }

    pub fn top_level_item_count(&self) -> usize {
        self.state.lock().tree.top_level().len()
    }

    /// Visible top-level items, or `None` while a filter pass runs.
    pub fn visible_top_level_item_count(&self) -> Option<usize> {
        let (_, visible, filtering) = self.snapshot();
        (!filtering).then(|| visible.visible_top_level_count())
    }

    /// Items of a kind in `mask`, visible or not.
    pub fn item_count(&self, mask: KindMask) -> usize {
        let tree = self.state.lock().tree.clone();
        tree.nodes
            .iter()
            .filter(|node| node.kind != ItemKind::Root && node.kind.matches(mask))
            .count()
    }

    /// Visible items of a kind in `mask`, or `None` while a filter pass runs.
    pub fn visible_item_count(&self, mask: KindMask, ignore_expansion: bool) -> Option<usize> {
        let (tree, visible, filtering) = self.snapshot();
        if filtering {
            return None;
        }
        Some(
            visible
                .iter(&tree, ignore_expansion)
                .filter(|&index| tree.node(index).kind.matches(mask))
                .count(),
        )
    }
}

impl Drop for TreeModel {
    fn drop(&mut self) {
        {
            let state = self.state.lock();
            for token in [&state.rebuild_token, &state.filter_token].into_iter().flatten() {
                token.cancel();
            }
        }
        let signals = self.network.signals();
        for (kind, id) in self.network_connections.lock().drain(..) {
            match kind {
                NetworkSignalKind::Point => signals.point_destroyed.disconnect(id),
                NetworkSignalKind::Measure => signals.measure_destroyed.disconnect(id),
                NetworkSignalKind::Image => signals.image_destroyed.disconnect(id),
            };
        }
    }
}

impl std::fmt::Debug for TreeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TreeModel")
            .field("layout", &self.layout)
            .field("tree", &state.tree)
            .field("rebuilding", &state.rebuilding)
            .field("filtering", &state.filter_running)
            .field("frozen", &state.frozen)
            .finish()
    }
}

static_assertions::assert_impl_all!(TreeModel: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrowseConfig;
    use crate::filter::{FilterGroup, FilterLevel, FilterMode, LeafFilter};
    use crate::network::{ControlMeasure, ControlPoint};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn setup() -> (Runtime, ControlNetwork, Arc<TreeModel>) {
        let runtime = Runtime::new(BrowseConfig::default().with_threads(2)).unwrap();
        let network = ControlNetwork::new();
        for (id, serials) in [("P1", &["c1", "c2"][..]), ("P2", &["c1"]), ("P3", &["c2", "c3", "c4"])] {
            let p = network.add_point(ControlPoint::new(id));
            for serial in serials {
                network.add_measure(p, ControlMeasure::new(*serial)).unwrap();
            }
        }
        let model = TreeModel::new(&runtime, network.clone(), TreeLayout::PointMeasure);
        model.rebuild();
        assert!(runtime.process_until(|| model.is_idle(), TIMEOUT));
        (runtime, network, model)
    }

    fn names(items: &[TreeItem]) -> Vec<String> {
        items.iter().map(TreeItem::display_name).collect()
    }

    #[test]
    fn test_get_items_ranges() {
        let (_runtime, _network, model) = setup();

        let all = model.get_items(0, None, KindMask::ALL, true);
        assert_eq!(all.len(), 9);
        let points = model.get_items(1, Some(3), KindMask::POINTS, true);
        assert_eq!(names(&points), vec!["P2", "P3"]);
        // Not filtering: a short tail is not padded.
        assert_eq!(model.get_items(2, Some(10), KindMask::POINTS, true).len(), 1);
        // Collapsed points hide their measures.
        assert_eq!(model.get_items(0, None, KindMask::ALL, false).len(), 3);
        model.top_level_items()[0].set_expanded(true);
        assert_eq!(model.get_items(0, None, KindMask::ALL, false).len(), 5);
    }

    #[test]
    fn test_items_between_in_both_directions() {
        let (_runtime, _network, model) = setup();
        let points = model.get_items(0, None, KindMask::POINTS, true);

        let forward = model
            .items_between(&points[0], &points[2], KindMask::POINTS, true)
            .unwrap();
        assert_eq!(names(&forward), vec!["P1", "P2", "P3"]);

        let backward = model
            .items_between(&points[2], &points[0], KindMask::POINTS, true)
            .unwrap();
        assert_eq!(names(&backward), vec!["P3", "P2", "P1"]);

        let single = model
            .items_between(&points[1], &points[1], KindMask::POINTS, true)
            .unwrap();
        assert_eq!(single, vec![points[1].clone()]);
    }

    #[test]
    fn test_items_between_requires_visible_endpoints() {
        let (runtime, _network, model) = setup();
        let points = model.get_items(0, None, KindMask::POINTS, true);

        model.set_filter(FilterSet::default().with_group(
            FilterGroup::new(FilterMode::All)
                .with_leaf(LeafFilter::contains(FilterLevel::Point, "Point ID", "P3").unwrap()),
        ));
        assert!(runtime.process_until(|| model.is_idle(), TIMEOUT));

        let err = model
            .items_between(&points[0], &points[2], KindMask::POINTS, true)
            .unwrap_err();
        assert!(matches!(err, BrowseError::NotVisible));
    }

    #[test]
    fn test_selection_propagates_between_points_and_measures() {
        let (_runtime, _network, model) = setup();
        let p1 = &model.top_level_items()[0];

        p1.set_selected(true);
        assert_eq!(model.selected_items(KindMask::ALL).len(), 3);

        p1.children()[0].set_selected(false);
        assert!(!p1.is_selected());
        assert_eq!(names(&model.selected_items(KindMask::ALL)), vec!["c2"]);

        model.set_global_selection(true, KindMask::POINTS);
        assert_eq!(model.selected_items(KindMask::POINTS).len(), 3);
        model.set_global_selection(false, KindMask::ALL);
        assert!(model.selected_items(KindMask::ALL).is_empty());
    }

    #[test]
    fn test_counts() {
        let (_runtime, _network, model) = setup();
        assert_eq!(model.top_level_item_count(), 3);
        assert_eq!(model.visible_top_level_item_count(), Some(3));
        assert_eq!(model.item_count(KindMask::MEASURES), 6);
        assert_eq!(model.visible_item_count(KindMask::MEASURES, true), Some(6));
        let p3 = &model.top_level_items()[2];
        assert_eq!(model.index_of_visible_item(p3, KindMask::POINTS, true), Some(2));
        assert_eq!(model.index_of_visible_item(p3, KindMask::ALL, true), Some(5));
    }

    #[test]
    fn test_frozen_model_defers_work() {
        let (runtime, network, model) = setup();
        model.set_frozen(true);
        network.add_point(ControlPoint::new("P4"));
        model.rebuild();
        model.apply_filter();
        runtime.process_pending();
        assert!(!model.is_rebuilding());
        assert_eq!(model.top_level_item_count(), 3);

        model.set_frozen(false);
        assert!(model.is_rebuilding());
        assert!(runtime.process_until(|| model.is_idle(), TIMEOUT));
        assert_eq!(model.top_level_item_count(), 4);
        assert_eq!(model.visible_top_level_item_count(), Some(4));
    }

    #[test]
    fn test_deleted_point_marks_items_and_rebuilds() {
        let (runtime, network, model) = setup();
        let p2 = model.top_level_items()[1].clone();
        let id = network.read().find_point("P2").unwrap();

        network.delete_point(id).unwrap();
        assert!(p2.is_dead());
        assert!(!p2.is_selectable());
        assert_eq!(p2.formatted("Point ID").unwrap(), "");

        assert!(runtime.process_until(
            || model.is_idle() && model.top_level_item_count() == 2,
            TIMEOUT
        ));
        assert_eq!(names(&model.top_level_items()), vec!["P1", "P3"]);
    }

    #[test]
    fn test_filter_result_discarded_during_rebuild() {
        let (_runtime, _network, model) = setup();
        let modified = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let m = modified.clone();
        model.signals().model_modified.connect(move |_| {
            m.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        let hide_all = FilterSet::default().with_group(
            FilterGroup::default()
                .with_leaf(LeafFilter::contains(FilterLevel::Point, "Point ID", "nothing").unwrap()),
        );
        let (tree, generation) = {
            let mut state = model.state.lock();
            state.rebuilding = true;
            state.filter_running = true;
            (state.tree.clone(), state.rebuild_generation)
        };
        let visible =
            VisibleList::compute(&tree, &hide_all, &CancellationToken::new(), |_| {}).unwrap();
        assert_eq!(visible.visible_top_level_count(), 0);

        // Same tree, but a rebuild is pending.
        model.filter_done(generation, Some((tree.clone(), visible)));
        assert_eq!(model.visible_top_level_item_count(), Some(3));
        assert_eq!(modified.load(std::sync::atomic::Ordering::SeqCst), 0);

        // Same tree, no rebuild pending, but launched before the last rebuild.
        model.state.lock().rebuilding = false;
        model.state.lock().filter_running = true;
        let visible =
            VisibleList::compute(&tree, &hide_all, &CancellationToken::new(), |_| {}).unwrap();
        model.filter_done(generation.wrapping_sub(1), Some((tree, visible)));
        assert_eq!(model.visible_top_level_item_count(), Some(3));
        assert_eq!(modified.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(!model.is_filtering());
    }

    #[test]
    fn test_root_data_is_a_programmer_error() {
        let (_runtime, _network, model) = setup();
        let p1 = &model.top_level_items()[0];
        let root = TreeItem::new(p1.tree().clone(), 0);
        assert!(matches!(root.data("Point ID"), Err(BrowseError::Programmer(_))));
        assert!(matches!(root.entity(), Err(BrowseError::Programmer(_))));
        assert!(matches!(p1.children()[0].child(0), Err(BrowseError::Programmer(_))));
        assert_eq!(p1.parent(), None);
        assert_eq!(p1.children()[1].parent().as_ref(), Some(p1));
    }
}
