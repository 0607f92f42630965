//! Filter composition.
//!
//! A [`FilterSet`] combines [`FilterGroup`]s, each of which combines typed
//! [`LeafFilter`] predicates. Every leaf targets one [`FilterLevel`]; a group
//! only has an opinion about items at the levels its leaves target.
//! Evaluation is read-only and may run on any thread.

use std::fmt;

use crate::entity::{EntityColumn, EntityKind, EntityRef};
use crate::error::Result;
use crate::network::NetworkStore;
use crate::value::CellValue;

/// How a group or set combines its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Accept when any member accepts.
    Any,
    /// Accept when every member accepts.
    #[default]
    All,
}

/// The level of a tree item as seen by filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterLevel {
    Point,
    Measure,
    Image,
    /// An image listed as connected to another image.
    Connection,
}

impl FilterLevel {
    /// The entity kind whose columns a leaf at this level reads.
    pub fn entity_kind(self) -> EntityKind {
        match self {
            Self::Point => EntityKind::Point,
            Self::Measure => EntityKind::Measure,
            Self::Image | Self::Connection => EntityKind::Image,
        }
    }

    pub fn mask(self) -> FilterLevels {
        match self {
            Self::Point => FilterLevels::POINTS,
            Self::Measure => FilterLevels::MEASURES,
            Self::Image => FilterLevels::IMAGES,
            Self::Connection => FilterLevels::CONNECTIONS,
        }
    }
}

impl fmt::Display for FilterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Point => "points",
            Self::Measure => "measures",
            Self::Image => "images",
            Self::Connection => "connections",
        })
    }
}

/// A set of filter levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterLevels {
    pub points: bool,
    pub measures: bool,
    pub images: bool,
    pub connections: bool,
}

impl FilterLevels {
    pub const NONE: FilterLevels = FilterLevels {
        points: false,
        measures: false,
        images: false,
        connections: false,
    };

    pub const POINTS: FilterLevels = FilterLevels {
        points: true,
        ..Self::NONE
    };

    pub const MEASURES: FilterLevels = FilterLevels {
        measures: true,
        ..Self::NONE
    };

    pub const IMAGES: FilterLevels = FilterLevels {
        images: true,
        ..Self::NONE
    };

    pub const CONNECTIONS: FilterLevels = FilterLevels {
        connections: true,
        ..Self::NONE
    };

    pub fn contains(self, level: FilterLevel) -> bool {
        match level {
            FilterLevel::Point => self.points,
            FilterLevel::Measure => self.measures,
            FilterLevel::Image => self.images,
            FilterLevel::Connection => self.connections,
        }
    }

    pub fn union(self, other: FilterLevels) -> FilterLevels {
        FilterLevels {
            points: self.points || other.points,
            measures: self.measures || other.measures,
            images: self.images || other.images,
            connections: self.connections || other.connections,
        }
    }

    pub fn intersection(self, other: FilterLevels) -> FilterLevels {
        FilterLevels {
            points: self.points && other.points,
            measures: self.measures && other.measures,
            images: self.images && other.images,
            connections: self.connections && other.connections,
        }
    }

    pub fn is_empty(self) -> bool {
        self == Self::NONE
    }
}

/// The test a leaf applies to a cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Case-insensitive substring match on the formatted value.
    Contains(String),
    /// Inclusive numeric range; an open bound is unlimited. Null never matches.
    InRange { min: Option<f64>, max: Option<f64> },
    BoolEquals(bool),
    /// Case-insensitive match on an enumerated name.
    EnumEquals(String),
}

impl Predicate {
    fn matches(&self, value: &CellValue) -> Option<bool> {
        match self {
            Self::Contains(needle) => Some(
                value
                    .formatted()
                    .to_lowercase()
                    .contains(&needle.to_lowercase()),
            ),
            Self::InRange { min, max } => {
                let x = value.as_number()?;
                Some(min.is_none_or(|min| x >= min) && max.is_none_or(|max| x <= max))
            }
            Self::BoolEquals(expected) => value.as_bool().map(|b| b == *expected),
            Self::EnumEquals(name) => match value {
                CellValue::Enum(s) | CellValue::Text(s) => Some(s.eq_ignore_ascii_case(name)),
                _ => None,
            },
        }
    }
}

/// One predicate over one column at one level.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafFilter {
    level: FilterLevel,
    column: EntityColumn,
    predicate: Predicate,
    negated: bool,
}

impl LeafFilter {
    /// Build a leaf. Fails with `NotFound` if `column` is not a column of
    /// the level's entity kind.
    pub fn new(level: FilterLevel, column: &str, predicate: Predicate) -> Result<Self> {
        Ok(Self {
            level,
            column: EntityColumn::resolve(level.entity_kind(), column)?,
            predicate,
            negated: false,
        })
    }

    pub fn contains(level: FilterLevel, column: &str, needle: impl Into<String>) -> Result<Self> {
        Self::new(level, column, Predicate::Contains(needle.into()))
    }

    pub fn in_range(
        level: FilterLevel,
        column: &str,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<Self> {
        Self::new(level, column, Predicate::InRange { min, max })
    }

    pub fn equals_bool(level: FilterLevel, column: &str, expected: bool) -> Result<Self> {
        Self::new(level, column, Predicate::BoolEquals(expected))
    }

    pub fn equals_enum(level: FilterLevel, column: &str, name: impl Into<String>) -> Result<Self> {
        Self::new(level, column, Predicate::EnumEquals(name.into()))
    }

    /// Invert the predicate. Values the predicate cannot judge still fail.
    pub fn negated(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn level(&self) -> FilterLevel {
        self.level
    }

    pub fn column_title(&self) -> &'static str {
        self.column.title()
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn evaluate(&self, store: &NetworkStore, entity: &EntityRef) -> bool {
        let Ok(value) = entity.value_of(store, self.column) else {
            return false;
        };
        match self.predicate.matches(&value) {
            Some(matched) => matched != self.negated,
            None => false,
        }
    }
}

/// An ordered list of leaves combined with one mode.
///
/// A group evaluates only at the levels it is effective at. Unless set
/// with [`with_levels`](Self::with_levels), those are the levels its
/// leaves target.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterGroup {
    mode: FilterMode,
    leaves: Vec<LeafFilter>,
    effective: Option<FilterLevels>,
}

impl FilterGroup {
    pub fn new(mode: FilterMode) -> Self {
        Self {
            mode,
            leaves: Vec::new(),
            effective: None,
        }
    }

    /// Restrict the group to `levels`. Leaves at other levels are kept
    /// but not evaluated.
    pub fn with_levels(mut self, levels: FilterLevels) -> Self {
        self.effective = Some(levels);
        self
    }

    pub fn set_levels(&mut self, levels: Option<FilterLevels>) {
        self.effective = levels;
    }

    pub fn with_leaf(mut self, leaf: LeafFilter) -> Self {
        self.leaves.push(leaf);
        self
    }

    pub fn push(&mut self, leaf: LeafFilter) {
        self.leaves.push(leaf);
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn leaves(&self) -> &[LeafFilter] {
        &self.leaves
    }

    /// Levels at which this group has at least one leaf.
    pub fn leaf_levels(&self) -> FilterLevels {
        self.leaves
            .iter()
            .fold(FilterLevels::NONE, |acc, leaf| acc.union(leaf.level.mask()))
    }

    /// Levels this group is effective at.
    pub fn levels(&self) -> FilterLevels {
        self.effective.unwrap_or_else(|| self.leaf_levels())
    }

    /// True when the group is effective at `level` and has a leaf there.
    pub fn is_effective_at(&self, level: FilterLevel) -> bool {
        self.levels().contains(level) && self.leaves.iter().any(|leaf| leaf.level == level)
    }

    /// Evaluate the leaves targeting `level`. Short-circuits per mode.
    pub fn evaluate(&self, store: &NetworkStore, entity: &EntityRef, level: FilterLevel) -> bool {
        let mut leaves = self.leaves.iter().filter(|leaf| leaf.level == level);
        match self.mode {
            FilterMode::Any => leaves.any(|leaf| leaf.evaluate(store, entity)),
            FilterMode::All => leaves.all(|leaf| leaf.evaluate(store, entity)),
        }
    }
}

/// The complete filter applied by a tree model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterSet {
    mode: FilterMode,
    groups: Vec<FilterGroup>,
}

impl FilterSet {
    pub fn new(mode: FilterMode) -> Self {
        Self {
            mode,
            groups: Vec::new(),
        }
    }

    pub fn with_group(mut self, group: FilterGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn push(&mut self, group: FilterGroup) {
        self.groups.push(group);
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn groups(&self) -> &[FilterGroup] {
        &self.groups
    }

    /// True when no group has an effective leaf; such a set accepts
    /// everything.
    pub fn is_empty(&self) -> bool {
        self.levels().is_empty()
    }

    /// Levels at which some group is effective and has a leaf.
    pub fn levels(&self) -> FilterLevels {
        self.groups.iter().fold(FilterLevels::NONE, |acc, g| {
            acc.union(FilterLevels::intersection(g.levels(), g.leaf_levels()))
        })
    }

    /// Evaluate `entity` at `level`.
    ///
    /// Returns `None` when no group is effective at `level`, leaving the
    /// decision to the caller.
    pub fn evaluate(
        &self,
        store: &NetworkStore,
        entity: &EntityRef,
        level: FilterLevel,
    ) -> Option<bool> {
        let mut groups = self.groups.iter().filter(|g| g.is_effective_at(level)).peekable();
        groups.peek()?;
        Some(match self.mode {
            FilterMode::Any => groups.any(|g| g.evaluate(store, entity, level)),
            FilterMode::All => groups.all(|g| g.evaluate(store, entity, level)),
        })
    }
}

static_assertions::assert_impl_all!(FilterSet: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrowseError;
    use crate::network::{ControlMeasure, ControlNetwork, ControlPoint, PointId};

    fn network() -> (ControlNetwork, PointId, PointId) {
        let network = ControlNetwork::new();
        let a = network.add_point(ControlPoint::new("alpha").with_edit_lock(true));
        let b = network.add_point(ControlPoint::new("beta"));
        network
            .update_point(b, |p| p.adjusted.latitude = Some(12.5))
            .unwrap();
        network.add_measure(a, ControlMeasure::new("cube1")).unwrap();
        (network, a, b)
    }

    #[test]
    fn test_leaf_rejects_unknown_column() {
        let err = LeafFilter::contains(FilterLevel::Point, "Sample", "x").unwrap_err();
        assert!(matches!(err, BrowseError::NotFound { .. }));
        assert!(LeafFilter::contains(FilterLevel::Measure, "Sample", "x").is_ok());
    }

    #[test]
    fn test_predicates() {
        let (network, a, b) = network();
        let store = network.read();
        let a = EntityRef::Point(a);
        let b = EntityRef::Point(b);

        let contains = LeafFilter::contains(FilterLevel::Point, "Point ID", "ALP").unwrap();
        assert!(contains.evaluate(&store, &a));
        assert!(!contains.evaluate(&store, &b));
        assert!(contains.clone().negated().evaluate(&store, &b));

        let locked = LeafFilter::equals_bool(FilterLevel::Point, "Edit Lock", true).unwrap();
        assert!(locked.evaluate(&store, &a));
        assert!(!locked.evaluate(&store, &b));

        let lat = LeafFilter::in_range(FilterLevel::Point, "Adjusted SP Lat", Some(10.0), None)
            .unwrap();
        assert!(lat.evaluate(&store, &b));
        // Null latitude fails the range test, negated or not.
        assert!(!lat.evaluate(&store, &a));
        assert!(!lat.clone().negated().evaluate(&store, &a));

        let free = LeafFilter::equals_enum(FilterLevel::Point, "Point Type", "free").unwrap();
        assert!(free.evaluate(&store, &a));
    }

    #[test]
    fn test_set_effectiveness_and_modes() {
        let (network, a, b) = network();
        let store = network.read();
        let a = EntityRef::Point(a);
        let b = EntityRef::Point(b);

        let set = FilterSet::new(FilterMode::Any)
            .with_group(
                FilterGroup::new(FilterMode::All)
                    .with_leaf(LeafFilter::contains(FilterLevel::Point, "Point ID", "a").unwrap())
                    .with_leaf(
                        LeafFilter::equals_bool(FilterLevel::Point, "Edit Lock", false).unwrap(),
                    ),
            )
            .with_group(
                FilterGroup::new(FilterMode::Any).with_leaf(
                    LeafFilter::equals_bool(FilterLevel::Measure, "Ignored", true).unwrap(),
                ),
            );

        assert_eq!(set.levels(), FilterLevels::POINTS.union(FilterLevels::MEASURES));
        // "beta" contains "a" and is unlocked; "alpha" is locked.
        assert_eq!(set.evaluate(&store, &b, FilterLevel::Point), Some(true));
        assert_eq!(set.evaluate(&store, &a, FilterLevel::Point), Some(false));
        assert_eq!(set.evaluate(&store, &a, FilterLevel::Image), None);
    }

    #[test]
    fn test_group_effective_levels() {
        let (network, a, b) = network();
        let store = network.read();
        let a = EntityRef::Point(a);

        let group = FilterGroup::new(FilterMode::All)
            .with_leaf(LeafFilter::contains(FilterLevel::Point, "Point ID", "beta").unwrap())
            .with_leaf(LeafFilter::equals_bool(FilterLevel::Measure, "Ignored", true).unwrap());
        assert_eq!(group.levels(), FilterLevels::POINTS.union(FilterLevels::MEASURES));
        assert!(group.is_effective_at(FilterLevel::Point));

        let group = group.with_levels(FilterLevels::MEASURES.union(FilterLevels::IMAGES));
        assert!(!group.is_effective_at(FilterLevel::Point));
        assert!(group.is_effective_at(FilterLevel::Measure));
        // Effective without leaves still has nothing to evaluate.
        assert!(!group.is_effective_at(FilterLevel::Image));

        let set = FilterSet::default().with_group(group);
        assert_eq!(set.levels(), FilterLevels::MEASURES);
        assert_eq!(set.evaluate(&store, &a, FilterLevel::Point), None);
        assert_eq!(set.evaluate(&store, &EntityRef::Point(b), FilterLevel::Point), None);

        let disabled = FilterSet::default().with_group(
            FilterGroup::default()
                .with_leaf(LeafFilter::contains(FilterLevel::Point, "Point ID", "beta").unwrap())
                .with_levels(FilterLevels::NONE),
        );
        assert!(disabled.is_empty());
    }

    #[test]
    fn test_empty_set() {
        let set = FilterSet::default().with_group(FilterGroup::new(FilterMode::Any));
        assert!(set.is_empty());
        assert!(set.levels().is_empty());
    }
}
