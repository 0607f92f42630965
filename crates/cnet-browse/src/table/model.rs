//! The table model.

use std::sync::{Arc, Weak};

use cnet_browse_core::{ConnectionId, ProgressCounter, Signal, TimerId};
use parking_lot::Mutex;

use super::sort::{SortControl, SortOutcome, estimated_comparisons, sort_items};
use super::{TableKind, UserWarning};
use crate::column::ColumnList;
use crate::error::{BrowseError, Result};
use crate::tree::{ItemKind, TreeItem, TreeModel};

/// Signals emitted by a [`TableModel`].
#[derive(Default)]
pub struct TableSignals {
    /// Rows changed; views should re-query.
    pub model_modified: Signal<()>,

    /// A notice for the user. Sorting warnings repeat on every sort request
    /// that is refused.
    pub user_warning: Signal<UserWarning>,

    /// An edit changed network structure and the tree must be rebuilt.
    pub request_tree_rebuild: Signal<()>,

    /// Items of this table's kind selected elsewhere.
    pub tree_selection_changed: Signal<Vec<TreeItem>>,

    /// Items selected in this table. Forwarded to the tree model.
    pub table_selection_changed: Signal<Vec<TreeItem>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortState {
    Idle,
    Sorting,
    SortCancelPending,
}

struct TableState {
    sorted_items: Vec<TreeItem>,
    /// Column `sorted_items` is ordered by, once a sort has finished.
    sorted_by: Option<String>,
    sort_state: SortState,
    sorting_enabled: bool,
    sort_limit: usize,
    warning: UserWarning,
    /// Identifies the live sort; completions from older sorts are ignored.
    generation: u64,
    control: Arc<SortControl>,
    progress_timer: Option<TimerId>,
}

impl TableState {
    fn sorting_active(&self) -> bool {
        self.sorting_enabled && self.warning == UserWarning::None
    }
}

/// A flat view of one item kind of a [`TreeModel`].
pub struct TableModel {
    weak_self: Weak<TableModel>,
    kind: TableKind,
    tree: Arc<TreeModel>,
    columns: ColumnList,
    state: Mutex<TableState>,
    signals: TableSignals,
    sort_progress: ProgressCounter,
    tree_connections: Mutex<Vec<ConnectionId>>,
}

impl TableModel {
    /// Create a table over `tree`, with sorting settings from the tree's
    /// runtime configuration.
    pub fn new(tree: Arc<TreeModel>, kind: TableKind) -> Arc<Self> {
        let config = tree.runtime().config();
        let state = TableState {
            sorted_items: Vec::new(),
            sorted_by: None,
            sort_state: SortState::Idle,
            sorting_enabled: config.sorting_enabled,
            sort_limit: config.sort_limit,
            warning: if config.sorting_enabled {
                UserWarning::None
            } else {
                UserWarning::SortingDisabled
            },
            generation: 0,
            control: Arc::new(SortControl::default()),
            progress_timer: None,
        };

        let table = Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            kind,
            tree,
            columns: kind.create_columns(),
            state: Mutex::new(state),
            signals: TableSignals::default(),
            sort_progress: ProgressCounter::new(),
            tree_connections: Mutex::new(Vec::new()),
        });
        table.connect_signals();
        table.rebuild_sort();
        table
    }

    fn connect_signals(&self) {
        let tree_signals = self.tree.signals();
        let mut connections = self.tree_connections.lock();

        let weak = self.weak_self.clone();
        connections.push(tree_signals.cancel_sort.connect(move |_| {
            if let Some(table) = weak.upgrade() {
                table.cancel_sort();
            }
        }));

        let weak = self.weak_self.clone();
        connections.push(tree_signals.model_modified.connect(move |_| {
            if let Some(table) = weak.upgrade() {
                table.rebuild_sort();
            }
        }));

        let weak = self.weak_self.clone();
        self.columns.sort_outdated.connect(move |_| {
            if let Some(table) = weak.upgrade() {
                table.sort();
            }
        });

        let tree = Arc::downgrade(&self.tree);
        self.signals.table_selection_changed.connect(move |items| {
            if let Some(tree) = tree.upgrade() {
                tree.signals().table_selection_changed.emit(items.clone());
            }
        });
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn tree(&self) -> &Arc<TreeModel> {
        &self.tree
    }

    pub fn columns(&self) -> &ColumnList {
        &self.columns
    }

    pub fn signals(&self) -> &TableSignals {
        &self.signals
    }

    /// Sort progress in comparisons, against an `n · log₂ n` estimate.
    pub fn sort_progress(&self) -> &ProgressCounter {
        &self.sort_progress
    }

    pub fn is_sorting(&self) -> bool {
        self.state.lock().sort_state != SortState::Idle
    }

    pub fn sorting_enabled(&self) -> bool {
        self.state.lock().sorting_enabled
    }

    pub fn sort_limit(&self) -> usize {
        self.state.lock().sort_limit
    }

    /// The current sorting notice.
    pub fn user_warning(&self) -> UserWarning {
        self.state.lock().warning
    }

    // -------------------------------------------------------------------------
    // Rows
    // -------------------------------------------------------------------------

    /// Visible rows of this table's kind, or `None` while filtering.
    pub fn visible_row_count(&self) -> Option<usize> {
        self.tree.visible_item_count(self.kind.mask(), true)
    }

    /// Rows `start..end`, `end == None` meaning to the last row.
    ///
    /// Rows come from the sorted sequence while sorting is active and from
    /// the tree in linear order otherwise. While a filter pass runs,
    /// missing rows up to `end` are busy items.
    pub fn items(&self, start: usize, end: Option<usize>) -> Vec<TreeItem> {
        let state = self.state.lock();
        if !state.sorting_active() {
            drop(state);
            return self.tree.get_items(start, end, self.kind.mask(), true);
        }

        let sorted = &state.sorted_items;
        let stop = end.unwrap_or(sorted.len());
        let mut items: Vec<TreeItem> = sorted
            .get(start.min(sorted.len())..stop.min(sorted.len()))
            .map(<[TreeItem]>::to_vec)
            .unwrap_or_default();
        drop(state);

        if let Some(end) = end {
            if self.tree.is_filtering() {
                items.resize(end.saturating_sub(start).max(items.len()), self.tree.busy_item());
            }
        }
        items
    }

    /// Rows from `first` to `last` inclusive, walking from `first`.
    ///
    /// Fails with `NotVisible` if either endpoint is not a current row.
    pub fn items_between(&self, first: &TreeItem, last: &TreeItem) -> Result<Vec<TreeItem>> {
        let state = self.state.lock();
        if !state.sorting_active() {
            drop(state);
            return self
                .tree
                .items_between(first, last, self.kind.mask(), true);
        }

        let sorted = &state.sorted_items;
        let a = sorted.iter().position(|item| item == first);
        let b = sorted.iter().position(|item| item == last);
        match (a, b) {
            (Some(a), Some(b)) if a <= b => Ok(sorted[a..=b].to_vec()),
            (Some(a), Some(b)) => Ok(sorted[b..=a].iter().rev().cloned().collect()),
            _ => Err(BrowseError::NotVisible),
        }
    }

    // -------------------------------------------------------------------------
    // Sorting
    // -------------------------------------------------------------------------

    /// Recompute the sorting notice, emitting it when it is not `None` or
    /// when it changed. Returns whether sorting is active.
    fn refresh_sort_warning(&self) -> bool {
        let count = self.visible_row_count();
        let (warning, changed) = {
            let mut state = self.state.lock();
            let warning = if !state.sorting_enabled {
                UserWarning::SortingDisabled
            } else if count.is_some_and(|count| count > state.sort_limit) {
                UserWarning::SortingTableSizeLimitReached
            } else {
                UserWarning::None
            };
            let changed = warning != state.warning;
            state.warning = warning;
            if warning != UserWarning::None {
                state.sorted_items.clear();
                state.sorted_by = None;
            }
            (warning, changed)
        };
        if changed || warning != UserWarning::None {
            self.signals.user_warning.emit(warning);
        }
        warning == UserWarning::None
    }

    /// Sort the rows in the background by the primary sort column.
    ///
    /// Does nothing while the tree filters or rebuilds; the tree's
    /// `model_modified` triggers a fresh sort afterwards. A request during
    /// a running sort interrupts it and sorts again when it returns.
    #[tracing::instrument(skip(self), target = "cnet_browse::table", level = "debug")]
    pub fn sort(&self) {
        if self.tree.is_filtering() || self.tree.is_rebuilding() {
            return;
        }
        if !self.refresh_sort_warning() {
            return;
        }
        {
            let mut state = self.state.lock();
            if state.sorted_items.is_empty() {
                return;
            }
            match state.sort_state {
                SortState::Idle => {}
                SortState::Sorting => {
                    state.sort_state = SortState::SortCancelPending;
                    state.control.interrupt();
                    return;
                }
                SortState::SortCancelPending => return,
            }
        }
        self.launch_sort();
    }

    fn launch_sort(&self) {
        let Some(column) = self.columns.primary_sort_column() else {
            self.state.lock().sort_state = SortState::Idle;
            return;
        };

        let control = Arc::new(SortControl::default());
        let (items, generation) = {
            let mut state = self.state.lock();
            state.sort_state = SortState::Sorting;
            state.generation += 1;
            state.control = control.clone();
            (state.sorted_items.clone(), state.generation)
        };

        let estimate = estimated_comparisons(items.len());
        self.sort_progress.set_range(0, estimate);
        self.sort_progress.set_value(0);

        let event_loop = self.tree.runtime().event_loop().clone();
        let interval = self.tree.runtime().config().sort_progress_interval;
        let poll_control = control.clone();
        let counter = self.sort_progress.clone();
        let timer = event_loop.start_repeating_timer(interval, move || {
            let count = poll_control.compare_count().min(estimate as u64);
            counter.set_value(count as i32);
        });
        self.state.lock().progress_timer = Some(timer);

        let network = self.tree.network().clone();
        let entity_kind = self.kind.entity_kind();
        let title = column.title().to_string();
        let ascending = column.sort_ascending();
        let weak = self.weak_self.clone();
        let sorted_by = title.clone();

        tracing::debug!(
            target: "cnet_browse::sort",
            table = ?self.kind,
            column = %title,
            ascending,
            items = items.len(),
            "launching sort"
        );
        self.tree.runtime().pool().spawn_with_callback(
            &event_loop,
            move || sort_items(&network, items, entity_kind, &title, ascending, &control),
            move |outcome| {
                if let Some(table) = weak.upgrade() {
                    table.sort_done(generation, sorted_by, outcome);
                }
            },
        );
    }

    fn stop_progress(&self, timer: Option<TimerId>) {
        if let Some(timer) = timer {
            // The timer may already be gone if the runtime was torn down.
            let _ = self.tree.runtime().event_loop().stop_timer(timer);
        }
        self.sort_progress.reset();
    }

    fn sort_done(&self, generation: u64, title: String, outcome: SortOutcome) {
        let (previous, timer) = {
            let mut state = self.state.lock();
            if generation != state.generation {
                drop(state);
                // Cancelled through `cancel_sort`, which already reset progress.
                self.signals.model_modified.emit(());
                return;
            }
            let previous = state.sort_state;
            state.sort_state = SortState::Idle;
            (previous, state.progress_timer.take())
        };
        self.stop_progress(timer);

        if previous == SortState::SortCancelPending {
            tracing::debug!(target: "cnet_browse::sort", "relaunching superseded sort");
            self.sort();
            return;
        }

        match outcome {
            SortOutcome::Sorted(items) => {
                if self.tree.is_filtering() || self.tree.is_rebuilding() {
                    return;
                }
                {
                    let mut state = self.state.lock();
                    state.sorted_items = items;
                    state.sorted_by = Some(title);
                }
                self.signals.model_modified.emit(());
            }
            SortOutcome::Cancelled => {
                self.signals.model_modified.emit(());
            }
            SortOutcome::Invalidated => {
                // The tree has a rebuild queued; its model_modified re-sorts.
                tracing::debug!(target: "cnet_browse::sort", "sort result discarded");
            }
            SortOutcome::Failed(err) => {
                tracing::error!(target: "cnet_browse::sort", error = %err, "sort failed");
                self.signals.model_modified.emit(());
            }
        }
    }

    /// Interrupt a running sort. The previous row order stays in place.
    pub fn cancel_sort(&self) {
        let timer = {
            let mut state = self.state.lock();
            if state.sort_state == SortState::Idle {
                return;
            }
            state.control.interrupt();
            state.sort_state = SortState::Idle;
            state.generation += 1;
            state.progress_timer.take()
        };
        tracing::debug!(target: "cnet_browse::sort", table = ?self.kind, "sort cancelled");
        self.stop_progress(timer);
    }

    /// Refill the rows from the tree and sort them.
    pub fn rebuild_sort(&self) {
        if self.refresh_sort_warning() {
            let items = self.tree.get_items(0, None, self.kind.mask(), true);
            {
                let mut state = self.state.lock();
                state.sorted_items = items;
                state.sorted_by = None;
            }
            self.signals.model_modified.emit(());
            self.sort();
        } else {
            self.signals.model_modified.emit(());
        }
    }

    /// Flip the direction of `title`. If the rows are already sorted by
    /// `title` they are reversed in place; otherwise the table re-sorts.
    /// Both give the same order, with tied rows mirrored.
    pub fn reverse_order(&self, title: &str) -> Result<()> {
        let column = self.columns.by_title(title)?;
        self.columns
            .set_sort_ascending(title, !column.sort_ascending())?;

        let is_primary = self
            .columns
            .primary_sort_column()
            .is_some_and(|primary| primary.title() == title);
        if !is_primary {
            return Ok(());
        }

        let reversed = {
            let mut state = self.state.lock();
            if state.sort_state == SortState::Idle
                && state.sorting_active()
                && state.sorted_by.as_deref() == Some(title)
            {
                state.sorted_items.reverse();
                true
            } else {
                false
            }
        };
        if reversed {
            self.signals.model_modified.emit(());
        } else {
            self.sort();
        }
        Ok(())
    }

    pub fn set_sorting_enabled(&self, enabled: bool) {
        {
            let mut state = self.state.lock();
            if state.sorting_enabled == enabled {
                return;
            }
            state.sorting_enabled = enabled;
        }
        if enabled {
            self.rebuild_sort();
        } else {
            self.cancel_sort();
            self.refresh_sort_warning();
            self.signals.model_modified.emit(());
        }
    }

    /// Set the most rows that will be sorted. Over the limit, the sorted
    /// order is discarded and rows fall back to tree order.
    pub fn set_sort_limit(&self, limit: usize) {
        let was_active = {
            let mut state = self.state.lock();
            state.sort_limit = limit;
            state.sorting_active()
        };
        let count = self.visible_row_count();
        let over = count.is_some_and(|count| count > limit);
        if over {
            self.cancel_sort();
            self.refresh_sort_warning();
            self.signals.model_modified.emit(());
        } else if !was_active {
            self.rebuild_sort();
        }
    }

    // -------------------------------------------------------------------------
    // Edits
    // -------------------------------------------------------------------------

    /// Write a cell. A refused edit emits `user_warning`; a successful edit
    /// of a structural column emits `request_tree_rebuild`.
    pub fn set_data(&self, item: &TreeItem, title: &str, text: &str) -> Result<()> {
        let column = self.columns.by_title(title)?;
        match item.set_data(title, text) {
            Ok(()) => {
                tracing::debug!(target: "cnet_browse::table", column = title, value = text, "cell updated");
                if column.affects_network_structure() {
                    self.signals.request_tree_rebuild.emit(());
                }
                self.signals.model_modified.emit(());
                Ok(())
            }
            Err(BrowseError::User(kind)) => {
                tracing::info!(target: "cnet_browse::table", column = title, %kind, "edit refused");
                self.signals.user_warning.emit(UserWarning::EditRefused(kind));
                Err(BrowseError::User(kind))
            }
            Err(err) => Err(err),
        }
    }

    pub fn is_editable(&self, item: &TreeItem, title: &str) -> bool {
        self.columns
            .by_title(title)
            .is_ok_and(|column| !column.is_read_only())
            && item.is_editable(title)
    }

    /// Warning to confirm before writing `text`, or an empty string.
    pub fn warning_message_for(&self, item: &TreeItem, title: &str, text: &str) -> String {
        item.warning_message(title, text)
    }

    /// Delete entities behind `items`. Every item is checked first; if any
    /// is refused nothing is deleted.
    pub fn delete_items(&self, items: &[TreeItem]) -> Result<()> {
        let live: Vec<&TreeItem> = items
            .iter()
            .filter(|item| item.kind().has_entity() && !item.is_dead())
            .collect();
        for item in &live {
            if let Err(err) = item.can_delete() {
                if let BrowseError::User(kind) = err {
                    tracing::info!(target: "cnet_browse::table", %kind, "delete refused");
                    self.signals.user_warning.emit(UserWarning::EditRefused(kind));
                }
                return Err(err);
            }
        }

        // Measures first so deleting their point does not orphan the request.
        let (measures, others): (Vec<&TreeItem>, Vec<&TreeItem>) = live
            .into_iter()
            .partition(|item| item.kind() == ItemKind::MeasureLeaf);
        for item in measures.into_iter().chain(others) {
            if item.is_dead() {
                continue;
            }
            item.delete_from_network()?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    /// Re-emit `items` restricted to this table's kind. Measure tables also
    /// carry the parent point of each measure.
    pub fn handle_tree_selection_changed(&self, items: &[TreeItem]) {
        let mask = self.kind.mask();
        let mut interesting: Vec<TreeItem> = Vec::new();
        for item in items.iter().filter(|item| item.kind().matches(mask) && !item.is_busy()) {
            if !interesting.contains(item) {
                interesting.push(item.clone());
            }
        }
        if self.kind == TableKind::Measures {
            let parents: Vec<TreeItem> = interesting
                .iter()
                .filter_map(TreeItem::parent)
                .filter(|parent| parent.kind() == ItemKind::PointParent)
                .collect();
            for parent in parents {
                if !interesting.contains(&parent) {
                    interesting.push(parent);
                }
            }
        }
        self.signals.tree_selection_changed.emit(interesting);
    }
}

impl Drop for TableModel {
    fn drop(&mut self) {
        self.state.lock().control.interrupt();
        let signals = self.tree.signals();
        let connections = std::mem::take(&mut *self.tree_connections.lock());
        if let [cancel_sort, model_modified] = connections[..] {
            signals.cancel_sort.disconnect(cancel_sort);
            signals.model_modified.disconnect(model_modified);
        }
    }
}

impl std::fmt::Debug for TableModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TableModel")
            .field("kind", &self.kind)
            .field("rows", &state.sorted_items.len())
            .field("sort_state", &state.sort_state)
            .field("warning", &state.warning)
            .finish()
    }
}

static_assertions::assert_impl_all!(TableModel: Send, Sync);
