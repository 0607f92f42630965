//! Flat, sortable projections of a tree model.
//!
//! A [`TableModel`] lists the visible items of one kind, points or
//! measures, sorts them in the background by the primary column of its
//! [`ColumnList`](crate::column::ColumnList), and forwards cell edits to the
//! network.

mod model;
mod sort;

use std::fmt;

use crate::column::{Column, ColumnList};
use crate::entity::{EntityKind, MeasureColumn, PointColumn};
use crate::error::UserErrorKind;
use crate::tree::KindMask;

pub use model::{TableModel, TableSignals};

/// Width of the row-number column.
const ROW_NUMBER_WIDTH: u32 = 40;

/// The item kind a table lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Points,
    Measures,
}

impl TableKind {
    pub fn mask(self) -> KindMask {
        match self {
            Self::Points => KindMask::POINTS,
            Self::Measures => KindMask::MEASURES,
        }
    }

    pub fn entity_kind(self) -> EntityKind {
        match self {
            Self::Points => EntityKind::Point,
            Self::Measures => EntityKind::Measure,
        }
    }

    /// A fresh column list: the row-number column, then every entity column.
    pub fn create_columns(self) -> ColumnList {
        let mut columns = vec![Column::new("").with_width(ROW_NUMBER_WIDTH).read_only()];
        let entity_columns: Vec<(&'static str, bool, bool)> = match self {
            Self::Points => PointColumn::ALL
                .iter()
                .map(|c| (c.title(), c.is_read_only(), c.affects_network_structure()))
                .collect(),
            Self::Measures => MeasureColumn::ALL
                .iter()
                .map(|c| (c.title(), c.is_read_only(), c.affects_network_structure()))
                .collect(),
        };
        for (title, read_only, structural) in entity_columns {
            let mut column = Column::new(title);
            if read_only {
                column = column.read_only();
            }
            if structural {
                column = column.affecting_network_structure();
            }
            columns.push(column);
        }
        ColumnList::new(columns)
    }
}

/// Notices a table raises for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserWarning {
    #[default]
    None,
    /// Sorting is switched off.
    SortingDisabled,
    /// More rows are visible than the sort limit allows.
    SortingTableSizeLimitReached,
    /// A cell edit or deletion was refused.
    EditRefused(UserErrorKind),
}

impl fmt::Display for UserWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::SortingDisabled => f.write_str("Sorting is disabled"),
            Self::SortingTableSizeLimitReached => {
                f.write_str("Table is too large to sort; raise the sort limit to sort it")
            }
            Self::EditRefused(kind) => write!(f, "{kind}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_lists_start_with_row_number() {
        let points = TableKind::Points.create_columns();
        assert_eq!(points.len(), PointColumn::ALL.len() + 1);
        assert!(points.by_index(0).unwrap().is_row_number());
        assert!(points.by_title("Average Residual").unwrap().is_read_only());
        assert!(points.by_title("Ignored").unwrap().affects_network_structure());
        assert_eq!(points.sorting_order_as_strings()[0], "Point ID");

        let measures = TableKind::Measures.create_columns();
        assert!(measures.by_title("Residual Magnitude").unwrap().is_read_only());
        assert!(!measures.by_title("Sample").unwrap().is_read_only());
    }
}
