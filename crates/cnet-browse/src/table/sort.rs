//! The sort worker.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rayon::prelude::*;

use crate::entity::{EntityColumn, EntityKind};
use crate::error::{BrowseError, Result};
use crate::network::ControlNetwork;
use crate::tree::TreeItem;
use crate::value::CellValue;

/// Shared state between a sort worker and the table that launched it.
#[derive(Debug, Default)]
pub(crate) struct SortControl {
    pub(crate) interrupt: AtomicBool,
    pub(crate) compare_count: AtomicU64,
}

impl SortControl {
    pub(crate) fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    pub(crate) fn compare_count(&self) -> u64 {
        self.compare_count.load(Ordering::Relaxed)
    }
}

/// What a sort worker hands back.
#[derive(Debug)]
pub(crate) enum SortOutcome {
    Sorted(Vec<TreeItem>),
    /// The interrupt flag was raised.
    Cancelled,
    /// An item's entity was destroyed while the sort ran.
    Invalidated,
    Failed(BrowseError),
}

/// The expected comparison count for `n` items, `n · log₂ n`.
pub(crate) fn estimated_comparisons(n: usize) -> i32 {
    if n < 2 {
        return 0;
    }
    let n = n as f64;
    (n * n.log2()).min(i32::MAX as f64) as i32
}

/// Read the sort key of every item. All items must share one kind.
fn sort_keys(
    network: &ControlNetwork,
    items: &[TreeItem],
    entity_kind: EntityKind,
    title: &str,
) -> Result<Vec<CellValue>> {
    let Some(first) = items.first() else {
        return Ok(Vec::new());
    };
    let kind = first.kind();
    let column = EntityColumn::resolve(entity_kind, title)?;
    let store = network.read();

    items
        .iter()
        .map(|item| {
            if item.kind() != kind {
                return Err(BrowseError::programmer(format!(
                    "cannot compare {:?} with {:?}",
                    kind,
                    item.kind()
                )));
            }
            match item.entity()? {
                Some(entity) => entity.value_of(&store, column),
                None => Ok(CellValue::Empty),
            }
        })
        .collect()
}

/// Stable sort of `items` by the column `title`.
///
/// Ties are broken by tree order, so the result does not depend on the
/// order of `items`. A descending sort is the ascending order reversed:
/// tied items are mirrored, and flipping the direction of a finished sort
/// is the same as reversing it in place. Every comparison bumps `control.compare_count`. Once `control.interrupt`
/// is raised the remaining comparisons are skipped and the result is
/// discarded.
#[tracing::instrument(skip(network, items, control), target = "cnet_browse::sort", level = "debug", fields(len = items.len()))]
pub(crate) fn sort_items(
    network: &ControlNetwork,
    items: Vec<TreeItem>,
    entity_kind: EntityKind,
    title: &str,
    ascending: bool,
    control: &SortControl,
) -> SortOutcome {
    let keys = match sort_keys(network, &items, entity_kind, title) {
        Ok(keys) => keys,
        Err(err) => return SortOutcome::Failed(err),
    };

    let mut keyed: Vec<(CellValue, TreeItem)> = keys.into_iter().zip(items).collect();
    keyed.par_sort_by(|(a, item_a), (b, item_b)| {
        if control.is_interrupted() {
            return CmpOrdering::Equal;
        }
        control.compare_count.fetch_add(1, Ordering::Relaxed);
        a.compare(b).then_with(|| item_a.index().cmp(&item_b.index()))
    });
    if !ascending {
        keyed.reverse();
    }

    if control.is_interrupted() {
        tracing::debug!(target: "cnet_browse::sort", "sort interrupted");
        return SortOutcome::Cancelled;
    }
    if keyed.iter().any(|(_, item)| item.is_dead()) {
        tracing::debug!(target: "cnet_browse::sort", "sorted items were destroyed");
        return SortOutcome::Invalidated;
    }

    tracing::debug!(
        target: "cnet_browse::sort",
        comparisons = control.compare_count(),
        "sort finished"
    );
    SortOutcome::Sorted(keyed.into_iter().map(|(_, item)| item).collect())
}
