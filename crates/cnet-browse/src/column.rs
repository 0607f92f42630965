//! Table columns and the sort-priority stack.
//!
//! A [`ColumnList`] keeps its columns in a fixed display order and, beside
//! it, a permutation of the same columns ordered by sort priority. The
//! first entry of that stack is the primary sort key.
//!
//! # Example
//!
//! ```
//! use cnet_browse::column::{Column, ColumnList};
//!
//! let columns = ColumnList::new(vec![
//!     Column::new("Point ID"),
//!     Column::new("Adjusted SP Lat").read_only(),
//! ]);
//! columns.raise_to_top("Adjusted SP Lat").unwrap();
//!
//! let order = columns.sorting_order_as_strings();
//! assert_eq!(order, vec!["Adjusted SP Lat", "Point ID"]);
//!
//! columns.set_sorting_order(&order);
//! assert_eq!(columns.sorting_order_as_strings(), order);
//! ```

use cnet_browse_core::Signal;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{BrowseError, Result};

/// Width given to new columns, in pixels.
pub const DEFAULT_COLUMN_WIDTH: u32 = 100;

/// A named table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    title: String,
    visible: bool,
    read_only: bool,
    affects_network_structure: bool,
    width: u32,
    ascending: bool,
}

impl Column {
    /// A visible, editable, ascending column.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            visible: true,
            read_only: false,
            affects_network_structure: false,
            width: DEFAULT_COLUMN_WIDTH,
            ascending: true,
        }
    }

    /// Mark the column read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Mark edits to this column as requiring a tree rebuild.
    pub fn affecting_network_structure(mut self) -> Self {
        self.affects_network_structure = true;
        self
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn affects_network_structure(&self) -> bool {
        self.affects_network_structure
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn sort_ascending(&self) -> bool {
        self.ascending
    }

    /// The row-number column has an empty title.
    pub fn is_row_number(&self) -> bool {
        self.title.is_empty()
    }
}

/// Persisted layout of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnState {
    pub title: String,
    pub width: u32,
    pub visible: bool,
    pub ascending: bool,
}

/// Persisted layout of a column list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnListState {
    /// Per-column layout, in display order.
    pub columns: Vec<ColumnState>,
    /// Titles by sort priority, most significant first.
    pub sort_order: Vec<String>,
}

struct ColumnListInner {
    columns: Vec<Column>,
    /// Indices into `columns`, most significant first.
    sort_order: Vec<usize>,
    /// Left edges of visible columns plus the total width.
    visible_edges: Vec<u32>,
}

impl ColumnListInner {
    fn index_of(&self, title: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.title == title)
            .ok_or_else(|| BrowseError::not_found("column", title))
    }

    fn priority_of(&self, title: &str) -> Result<usize> {
        let index = self.index_of(title)?;
        self.sort_order
            .iter()
            .position(|&i| i == index)
            .ok_or_else(|| BrowseError::programmer("column missing from sort order"))
    }

    fn rebuild_edges(&mut self) {
        self.visible_edges.clear();
        let mut x = 0u32;
        self.visible_edges.push(x);
        for column in self.columns.iter().filter(|c| c.visible) {
            x = x.saturating_add(column.width);
            self.visible_edges.push(x);
        }
    }
}

/// An ordered set of columns with a sort-priority stack.
///
/// # Signals
///
/// - `sort_outdated`: the priority stack changed and the table should re-sort
pub struct ColumnList {
    inner: RwLock<ColumnListInner>,
    /// Emitted whenever the priority stack changes.
    pub sort_outdated: Signal<()>,
}

impl ColumnList {
    /// Create a list. The initial priority stack follows display order.
    pub fn new(columns: Vec<Column>) -> Self {
        let sort_order = (0..columns.len()).collect();
        let mut inner = ColumnListInner {
            columns,
            sort_order,
            visible_edges: Vec::new(),
        };
        inner.rebuild_edges();
        Self {
            inner: RwLock::new(inner),
            sort_outdated: Signal::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().columns.is_empty()
    }

    /// All columns in display order.
    pub fn columns(&self) -> Vec<Column> {
        self.inner.read().columns.clone()
    }

    pub fn by_index(&self, index: usize) -> Result<Column> {
        self.inner
            .read()
            .columns
            .get(index)
            .cloned()
            .ok_or_else(|| BrowseError::not_found("column", format!("#{index}")))
    }

    pub fn by_title(&self, title: &str) -> Result<Column> {
        let inner = self.inner.read();
        let index = inner.index_of(title)?;
        Ok(inner.columns[index].clone())
    }

    pub fn index_of(&self, title: &str) -> Result<usize> {
        self.inner.read().index_of(title)
    }

    /// Move a column one step up the priority stack.
    pub fn raise(&self, title: &str) -> Result<()> {
        self.move_in_stack(title, |priority, _| priority.saturating_sub(1))
    }

    /// Move a column one step down the priority stack.
    pub fn lower(&self, title: &str) -> Result<()> {
        self.move_in_stack(title, |priority, len| (priority + 1).min(len - 1))
    }

    /// Make a column the primary sort key.
    pub fn raise_to_top(&self, title: &str) -> Result<()> {
        self.move_in_stack(title, |_, _| 0)
    }

    fn move_in_stack(&self, title: &str, target: impl FnOnce(usize, usize) -> usize) -> Result<()> {
        {
            let mut inner = self.inner.write();
            let from = inner.priority_of(title)?;
            let len = inner.sort_order.len();
            let to = target(from, len);
            let index = inner.sort_order.remove(from);
            inner.sort_order.insert(to, index);
        }
        tracing::trace!(target: "cnet_browse::table", title, "sort priority changed");
        self.sort_outdated.emit(());
        Ok(())
    }

    /// The priority stack, row-number column excluded.
    pub fn sorting_order(&self) -> Vec<Column> {
        let inner = self.inner.read();
        inner
            .sort_order
            .iter()
            .map(|&i| &inner.columns[i])
            .filter(|c| !c.is_row_number())
            .cloned()
            .collect()
    }

    /// The primary sort column.
    pub fn primary_sort_column(&self) -> Option<Column> {
        self.sorting_order().into_iter().next()
    }

    pub fn sorting_order_as_strings(&self) -> Vec<String> {
        self.sorting_order()
            .into_iter()
            .map(|c| c.title)
            .collect()
    }

    /// Reorder the priority stack. Unknown titles are ignored; columns not
    /// named keep their relative order after the named ones.
    pub fn set_sorting_order<S: AsRef<str>>(&self, titles: &[S]) {
        {
            let mut inner = self.inner.write();
            let mut order = Vec::with_capacity(inner.sort_order.len());
            for title in titles {
                if let Ok(index) = inner.index_of(title.as_ref()) {
                    if !order.contains(&index) {
                        order.push(index);
                    }
                }
            }
            for &index in &inner.sort_order {
                if !order.contains(&index) {
                    order.push(index);
                }
            }
            inner.sort_order = order;
        }
        self.sort_outdated.emit(());
    }

    pub fn set_visible(&self, title: &str, visible: bool) -> Result<()> {
        let mut inner = self.inner.write();
        let index = inner.index_of(title)?;
        inner.columns[index].visible = visible;
        inner.rebuild_edges();
        Ok(())
    }

    pub fn set_width(&self, title: &str, width: u32) -> Result<()> {
        let mut inner = self.inner.write();
        let index = inner.index_of(title)?;
        inner.columns[index].width = width;
        inner.rebuild_edges();
        Ok(())
    }

    pub fn set_sort_ascending(&self, title: &str, ascending: bool) -> Result<()> {
        let mut inner = self.inner.write();
        let index = inner.index_of(title)?;
        inner.columns[index].ascending = ascending;
        Ok(())
    }

    /// Visible columns in display order.
    pub fn visible_columns(&self) -> Vec<Column> {
        self.inner
            .read()
            .columns
            .iter()
            .filter(|c| c.visible)
            .cloned()
            .collect()
    }

    /// `[left, right)` of the `index`-th visible column.
    pub fn visible_x_range(&self, index: usize) -> Option<(u32, u32)> {
        let inner = self.inner.read();
        let left = *inner.visible_edges.get(index)?;
        let right = *inner.visible_edges.get(index + 1)?;
        Some((left, right))
    }

    /// Sum of the widths of visible columns.
    pub fn visible_width(&self) -> u32 {
        self.inner.read().visible_edges.last().copied().unwrap_or(0)
    }

    /// Index among visible columns of the column containing `x`.
    pub fn visible_column_at(&self, x: u32) -> Option<usize> {
        let inner = self.inner.read();
        let edges = &inner.visible_edges;
        if edges.len() < 2 || x >= edges[edges.len() - 1] {
            return None;
        }
        // partition_point gives the first edge > x; the column starts one edge earlier.
        Some(edges.partition_point(|&edge| edge <= x) - 1)
    }

    /// Snapshot the layout for persistence.
    pub fn state(&self) -> ColumnListState {
        let inner = self.inner.read();
        ColumnListState {
            columns: inner
                .columns
                .iter()
                .map(|c| ColumnState {
                    title: c.title.clone(),
                    width: c.width,
                    visible: c.visible,
                    ascending: c.ascending,
                })
                .collect(),
            sort_order: inner
                .sort_order
                .iter()
                .map(|&i| &inner.columns[i])
                .filter(|c| !c.is_row_number())
                .map(|c| c.title.clone())
                .collect(),
        }
    }

    /// Restore a persisted layout. Unknown titles are ignored.
    pub fn apply_state(&self, state: &ColumnListState) {
        {
            let mut inner = self.inner.write();
            for saved in &state.columns {
                if let Ok(index) = inner.index_of(&saved.title) {
                    let column = &mut inner.columns[index];
                    column.width = saved.width;
                    column.visible = saved.visible;
                    column.ascending = saved.ascending;
                }
            }
            inner.rebuild_edges();
        }
        self.set_sorting_order(&state.sort_order);
    }
}

impl std::fmt::Debug for ColumnList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnList")
            .field("columns", &self.len())
            .field("sort_order", &self.sorting_order_as_strings())
            .finish()
    }
}

static_assertions::assert_impl_all!(ColumnList: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample() -> ColumnList {
        ColumnList::new(vec![
            Column::new("").with_width(40),
            Column::new("A"),
            Column::new("B").with_width(50),
            Column::new("C").read_only(),
        ])
    }

    #[test]
    fn test_lookup() {
        let columns = sample();
        assert_eq!(columns.by_index(2).unwrap().title(), "B");
        assert!(columns.by_title("C").unwrap().is_read_only());
        assert!(matches!(
            columns.by_title("Z"),
            Err(BrowseError::NotFound { what: "column", .. })
        ));
        assert!(columns.by_index(9).is_err());
    }

    #[test]
    fn test_priority_moves_emit() {
        let columns = sample();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        columns.sort_outdated.connect(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(columns.sorting_order_as_strings(), vec!["A", "B", "C"]);
        columns.raise_to_top("C").unwrap();
        assert_eq!(columns.sorting_order_as_strings(), vec!["C", "A", "B"]);
        columns.lower("C").unwrap();
        assert_eq!(columns.sorting_order_as_strings(), vec!["A", "C", "B"]);
        columns.raise("B").unwrap();
        assert_eq!(columns.sorting_order_as_strings(), vec!["A", "B", "C"]);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(columns.primary_sort_column().unwrap().title(), "A");
    }

    #[test]
    fn test_sorting_order_round_trip_ignores_unknown() {
        let columns = sample();
        columns.set_sorting_order(&["B", "bogus", "C"]);
        let order = columns.sorting_order_as_strings();
        assert_eq!(order, vec!["B", "C", "A"]);

        columns.set_sorting_order(&order);
        assert_eq!(columns.sorting_order_as_strings(), order);
    }

    #[test]
    fn test_visible_x_range() {
        let columns = sample();
        assert_eq!(columns.visible_x_range(0), Some((0, 40)));
        assert_eq!(columns.visible_x_range(2), Some((140, 190)));
        assert_eq!(columns.visible_column_at(150), Some(2));
        assert_eq!(columns.visible_column_at(40), Some(1));

        columns.set_visible("A", false).unwrap();
        assert_eq!(columns.visible_x_range(1), Some((40, 90)));
        assert_eq!(columns.visible_width(), 190);
        assert_eq!(columns.visible_x_range(3), None);
        assert_eq!(columns.visible_column_at(500), None);
    }

    #[test]
    fn test_state_serde_round_trip() {
        let columns = sample();
        columns.set_width("A", 77).unwrap();
        columns.set_visible("B", false).unwrap();
        columns.set_sort_ascending("C", false).unwrap();
        columns.raise_to_top("C").unwrap();

        let json = serde_json::to_string(&columns.state()).unwrap();
        let restored: ColumnListState = serde_json::from_str(&json).unwrap();

        let fresh = sample();
        fresh.apply_state(&restored);
        assert_eq!(fresh.state(), columns.state());
        assert_eq!(fresh.by_title("A").unwrap().width(), 77);
        assert!(!fresh.by_title("C").unwrap().sort_ascending());
    }
}
