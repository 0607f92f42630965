//! Selection coordination between tree and table views.
//!
//! A [`SelectionCoordinator`] turns row and cell clicks from one view into
//! selection flags on the shared tree items and publishes the result.
//! Tables built over the same tree mirror it through the tree model's
//! `tree_selection_changed`.
//!
//! # Example
//!
//! ```ignore
//! let selection = SelectionCoordinator::for_table(measure_table.clone());
//! selection.click_row(&m3, ClickModifiers::NONE);
//! selection.click_row(&m5, ClickModifiers::RANGE);
//! selection.set_all_selected(false);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BrowseError, Result};
use crate::table::TableModel;
use crate::tree::{ItemKind, KindMask, TreeItem, TreeModel};

/// Modifier keys held during a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClickModifiers {
    /// Toggle the clicked row without touching the others.
    pub chord: bool,
    /// Extend from the last directly clicked row.
    pub range: bool,
}

impl ClickModifiers {
    /// A plain click.
    pub const NONE: Self = Self {
        chord: false,
        range: false,
    };

    pub const CHORD: Self = Self {
        chord: true,
        ..Self::NONE
    };

    pub const RANGE: Self = Self {
        range: true,
        ..Self::NONE
    };
}

/// Cells picked in a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSelection {
    pub title: String,
    pub items: Vec<TreeItem>,
}

#[derive(Debug, Default)]
struct SelectionState {
    anchor: Option<TreeItem>,
    column: Option<ColumnSelection>,
}

/// Which view a coordinator serves.
enum View {
    Tree { mask: KindMask },
    Table(Arc<TableModel>),
}

/// Applies clicks from one view to the selection of a tree model.
pub struct SelectionCoordinator {
    tree: Arc<TreeModel>,
    view: View,
    state: Mutex<SelectionState>,
}

impl SelectionCoordinator {
    /// A coordinator for a tree view showing the kinds in `mask`.
    pub fn for_tree(tree: Arc<TreeModel>, mask: KindMask) -> Self {
        Self {
            tree,
            view: View::Tree { mask },
            state: Mutex::new(SelectionState::default()),
        }
    }

    /// A coordinator for a table view.
    pub fn for_table(table: Arc<TableModel>) -> Self {
        Self {
            tree: table.tree().clone(),
            view: View::Table(table),
            state: Mutex::new(SelectionState::default()),
        }
    }

    fn mask(&self) -> KindMask {
        match &self.view {
            View::Tree { mask } => *mask,
            View::Table(table) => table.kind().mask(),
        }
    }

    fn rows_between(&self, first: &TreeItem, last: &TreeItem) -> Result<Vec<TreeItem>> {
        match &self.view {
            View::Tree { mask } => self.tree.items_between(first, last, *mask, false),
            View::Table(table) => table.items_between(first, last),
        }
    }

    /// The last directly clicked row.
    pub fn anchor(&self) -> Option<TreeItem> {
        self.state.lock().anchor.clone()
    }

    /// The current column-mode selection, if any.
    pub fn column_selection(&self) -> Option<ColumnSelection> {
        self.state.lock().column.clone()
    }

    /// Selected rows of this view's kinds, in visible order.
    pub fn selected_items(&self) -> Vec<TreeItem> {
        self.tree.selected_items(self.mask())
    }

    /// Apply a row click.
    ///
    /// A plain click selects `item` alone. A chord click toggles it. A
    /// range click selects every row from the anchor to `item`; without a
    /// visible anchor it behaves as a plain click. Any row click clears
    /// the column-mode selection.
    #[tracing::instrument(skip(self), target = "cnet_browse::selection", level = "debug")]
    pub fn click_row(&self, item: &TreeItem, modifiers: ClickModifiers) -> Result<()> {
        if !item.is_selectable() {
            return Err(BrowseError::programmer(format!(
                "{:?} items cannot be selected",
                item.kind()
            )));
        }

        let anchor = {
            let mut state = self.state.lock();
            state.column = None;
            state.anchor.clone()
        };

        let range = match (&anchor, modifiers.range) {
            (Some(anchor), true) => match self.rows_between(anchor, item) {
                Ok(rows) => Some(rows),
                Err(BrowseError::NotVisible) => None,
                Err(err) => return Err(err),
            },
            _ => None,
        };

        match range {
            Some(rows) => {
                for row in rows.iter().filter(|row| row.is_selectable()) {
                    row.set_selected(true);
                }
            }
            None if modifiers.chord => {
                item.set_selected(!item.is_selected());
                self.state.lock().anchor = Some(item.clone());
            }
            None => {
                self.tree.set_global_selection(false, KindMask::ALL);
                item.set_selected(true);
                self.state.lock().anchor = Some(item.clone());
            }
        }

        self.publish();
        Ok(())
    }

    /// Apply a click on a cell.
    ///
    /// Clicking the row-number column is a row click. Any other column
    /// selects the cell in column mode, which leaves row selection alone.
    /// Switching columns starts a new column-mode selection.
    pub fn click_cell(&self, item: &TreeItem, title: &str, modifiers: ClickModifiers) -> Result<()> {
        if title.is_empty() {
            return self.click_row(item, modifiers);
        }
        if let View::Table(table) = &self.view {
            table.columns().by_title(title)?;
        }

        let anchor = self.state.lock().anchor.clone();
        let range = match (&anchor, modifiers.range) {
            (Some(anchor), true) => self.rows_between(anchor, item).ok(),
            _ => None,
        };

        let mut state = self.state.lock();
        let mut column = match state.column.take() {
            Some(column) if column.title == title => column,
            _ => ColumnSelection {
                title: title.to_string(),
                items: Vec::new(),
            },
        };

        match range {
            Some(rows) => {
                for row in rows {
                    if !column.items.contains(&row) {
                        column.items.push(row);
                    }
                }
            }
            None if modifiers.chord => {
                if let Some(pos) = column.items.iter().position(|row| row == item) {
                    column.items.remove(pos);
                } else {
                    column.items.push(item.clone());
                }
                state.anchor = Some(item.clone());
            }
            None => {
                column.items = vec![item.clone()];
                state.anchor = Some(item.clone());
            }
        }

        tracing::trace!(
            target: "cnet_browse::selection",
            column = %column.title,
            cells = column.items.len(),
            "column selection changed"
        );
        state.column = Some(column);
        Ok(())
    }

    /// Select or deselect every item of this view's kinds.
    pub fn set_all_selected(&self, selected: bool) {
        {
            let mut state = self.state.lock();
            state.column = None;
            state.anchor = None;
        }
        self.tree.set_global_selection(selected, self.mask());
        self.publish();
    }

    /// Deselect everything if every visible row is selected, else select
    /// everything.
    pub fn toggle_all(&self) {
        let mask = self.mask();
        let selected = self.tree.selected_items(mask).len();
        let visible = self.tree.visible_item_count(mask, true).unwrap_or(0);
        self.set_all_selected(visible == 0 || selected < visible);
    }

    /// Emit the current selection.
    ///
    /// Selected measures bring their parent point along. A table view also
    /// emits its own `table_selection_changed`.
    fn publish(&self) {
        let selected = self.selected_items();
        let mut items = selected.clone();
        for item in &selected {
            if item.kind() != ItemKind::MeasureLeaf {
                continue;
            }
            if let Some(parent) = item.parent() {
                if !items.contains(&parent) {
                    items.push(parent);
                }
            }
        }

        tracing::debug!(
            target: "cnet_browse::selection",
            selected = selected.len(),
            "selection published"
        );
        if let View::Table(table) = &self.view {
            table.signals().table_selection_changed.emit(items.clone());
        }
        self.tree.signals().tree_selection_changed.emit(items);
    }
}

impl std::fmt::Debug for SelectionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let view = match &self.view {
            View::Tree { .. } => "tree",
            View::Table(_) => "table",
        };
        f.debug_struct("SelectionCoordinator")
            .field("view", &view)
            .field("mask", &self.mask())
            .finish()
    }
}

static_assertions::assert_impl_all!(SelectionCoordinator: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrowseConfig, Runtime};
    use crate::network::{ControlMeasure, ControlNetwork, ControlPoint};
    use crate::table::TableKind;
    use crate::tree::TreeLayout;
    use std::time::Duration;

    fn setup() -> (Runtime, Arc<TableModel>) {
        let runtime = Runtime::new(BrowseConfig::default().with_threads(2)).unwrap();
        let network = ControlNetwork::new();
        for (id, measures) in [("P1", 2), ("P2", 1), ("P3", 3)] {
            let p = network.add_point(ControlPoint::new(id));
            for m in 0..measures {
                network
                    .add_measure(p, ControlMeasure::new(format!("cube{m}")))
                    .unwrap();
            }
        }
        let tree = TreeModel::new(&runtime, network, TreeLayout::PointMeasure);
        tree.rebuild();
        assert!(runtime.process_until(|| tree.is_idle(), Duration::from_secs(10)));
        let table = TableModel::new(tree, TableKind::Points);
        (runtime, table)
    }

    #[test]
    fn test_plain_click_is_exclusive() {
        let (_runtime, table) = setup();
        let selection = SelectionCoordinator::for_table(table.clone());
        let rows = table.items(0, None);

        selection.click_row(&rows[0], ClickModifiers::NONE).unwrap();
        selection.click_row(&rows[2], ClickModifiers::NONE).unwrap();
        assert_eq!(selection.selected_items(), vec![rows[2].clone()]);
        assert_eq!(selection.anchor(), Some(rows[2].clone()));
    }

    #[test]
    fn test_chord_toggles_and_range_extends() {
        let (_runtime, table) = setup();
        let selection = SelectionCoordinator::for_table(table.clone());
        let rows = table.items(0, None);

        selection.click_row(&rows[0], ClickModifiers::NONE).unwrap();
        selection.click_row(&rows[2], ClickModifiers::CHORD).unwrap();
        assert_eq!(selection.selected_items(), vec![rows[0].clone(), rows[2].clone()]);

        selection.click_row(&rows[2], ClickModifiers::CHORD).unwrap();
        assert_eq!(selection.selected_items(), vec![rows[0].clone()]);

        selection.click_row(&rows[2], ClickModifiers::NONE).unwrap();
        selection.click_row(&rows[0], ClickModifiers::RANGE).unwrap();
        assert_eq!(selection.selected_items(), rows);
        assert_eq!(selection.anchor(), Some(rows[2].clone()));
    }

    #[test]
    fn test_row_click_clears_column_mode() {
        let (_runtime, table) = setup();
        let selection = SelectionCoordinator::for_table(table.clone());
        let rows = table.items(0, None);

        selection.click_cell(&rows[0], "Chooser Name", ClickModifiers::NONE).unwrap();
        selection.click_cell(&rows[1], "Chooser Name", ClickModifiers::CHORD).unwrap();
        let column = selection.column_selection().unwrap();
        assert_eq!(column.title, "Chooser Name");
        assert_eq!(column.items, vec![rows[0].clone(), rows[1].clone()]);
        assert!(selection.selected_items().is_empty());

        selection.click_cell(&rows[1], "", ClickModifiers::NONE).unwrap();
        assert_eq!(selection.column_selection(), None);
        assert_eq!(selection.selected_items(), vec![rows[1].clone()]);
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let (_runtime, table) = setup();
        let selection = SelectionCoordinator::for_table(table.clone());
        let rows = table.items(0, None);
        assert!(selection.click_cell(&rows[0], "Nope", ClickModifiers::NONE).is_err());
    }

    #[test]
    fn test_measure_selection_brings_parent() {
        let (_runtime, table) = setup();
        let tree = table.tree().clone();
        let selection = SelectionCoordinator::for_tree(tree.clone(), KindMask::ALL);

        let published = Arc::new(Mutex::new(Vec::new()));
        let p = published.clone();
        tree.signals()
            .tree_selection_changed
            .connect(move |items| *p.lock() = items.clone());

        let p2 = tree.top_level_items()[1].clone();
        let m3 = p2.child(0).unwrap();
        selection.click_row(&m3, ClickModifiers::NONE).unwrap();
        assert_eq!(*published.lock(), vec![m3.clone(), p2.clone()]);
        assert!(!p2.is_selected());

        selection.toggle_all();
        assert_eq!(selection.selected_items().len(), 9);
        selection.toggle_all();
        assert!(published.lock().is_empty());
    }
}
