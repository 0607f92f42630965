//! Uniform read/write access to network entities.
//!
//! Tree items refer to entities through an [`EntityRef`], an id that is
//! resolved against the network at every access. An id whose entity has
//! been deleted yields [`CellValue::Empty`] and is never editable.
//!
//! Columns are addressed by title. [`EntityColumn::resolve`] maps a title
//! to the typed column of one entity kind, so hot loops such as sorting
//! resolve once and read many times.

mod image;
mod measure;
mod point;

use std::fmt;
use std::sync::Arc;

use crate::error::{BrowseError, Result, UserErrorKind};
use crate::network::{ControlNetwork, MeasureId, NetworkStore, PointId};
use crate::value::CellValue;

pub use image::ImageColumn;
pub use measure::MeasureColumn;
pub use point::PointColumn;

/// The kind of entity an item refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Point,
    Measure,
    Image,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Point => "point",
            Self::Measure => "measure",
            Self::Image => "image",
        })
    }
}

/// A non-owning reference to a network entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Point(PointId),
    Measure(MeasureId),
    /// An image, by serial number.
    Image(Arc<str>),
}

/// A column resolved for one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityColumn {
    Point(PointColumn),
    Measure(MeasureColumn),
    Image(ImageColumn),
}

impl EntityColumn {
    /// Resolve `title` for entities of `kind`.
    pub fn resolve(kind: EntityKind, title: &str) -> Result<Self> {
        let column = match kind {
            EntityKind::Point => PointColumn::from_title(title).map(Self::Point),
            EntityKind::Measure => MeasureColumn::from_title(title).map(Self::Measure),
            EntityKind::Image => ImageColumn::from_title(title).map(Self::Image),
        };
        column.ok_or_else(|| BrowseError::not_found("column", title))
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Point(c) => c.title(),
            Self::Measure(c) => c.title(),
            Self::Image(c) => c.title(),
        }
    }

    pub fn kind(self) -> EntityKind {
        match self {
            Self::Point(_) => EntityKind::Point,
            Self::Measure(_) => EntityKind::Measure,
            Self::Image(_) => EntityKind::Image,
        }
    }

    pub fn is_read_only(self) -> bool {
        match self {
            Self::Point(c) => c.is_read_only(),
            Self::Measure(c) => c.is_read_only(),
            Self::Image(_) => true,
        }
    }

    pub fn affects_network_structure(self) -> bool {
        match self {
            Self::Point(c) => c.affects_network_structure(),
            Self::Measure(c) => c.affects_network_structure(),
            Self::Image(_) => false,
        }
    }
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Point(_) => EntityKind::Point,
            Self::Measure(_) => EntityKind::Measure,
            Self::Image(_) => EntityKind::Image,
        }
    }

    /// Whether the entity still exists.
    pub fn exists(&self, store: &NetworkStore) -> bool {
        match self {
            Self::Point(id) => store.point(*id).is_some(),
            Self::Measure(id) => store.measure(*id).is_some(),
            Self::Image(serial) => store.contains_image(serial),
        }
    }

    /// Text shown for the entity in the tree.
    pub fn display_name(&self, store: &NetworkStore) -> String {
        match self {
            Self::Point(id) => store.point(*id).map(|p| p.id.clone()).unwrap_or_default(),
            Self::Measure(id) => store
                .measure(*id)
                .map(|m| m.serial.to_string())
                .unwrap_or_default(),
            Self::Image(serial) => serial.to_string(),
        }
    }

    /// Read a cell by column title.
    pub fn value(&self, store: &NetworkStore, title: &str) -> Result<CellValue> {
        let column = EntityColumn::resolve(self.kind(), title)?;
        self.value_of(store, column)
    }

    /// Read a cell by resolved column.
    pub fn value_of(&self, store: &NetworkStore, column: EntityColumn) -> Result<CellValue> {
        Ok(match (self, column) {
            (Self::Point(id), EntityColumn::Point(c)) => point::value(store, *id, c),
            (Self::Measure(id), EntityColumn::Measure(c)) => measure::value(store, *id, c),
            (Self::Image(serial), EntityColumn::Image(c)) => image::value(store, serial, c),
            _ => {
                return Err(BrowseError::programmer(format!(
                    "{} column '{}' read from a {}",
                    column.kind(),
                    column.title(),
                    self.kind()
                )));
            }
        })
    }

    /// Display text of a cell.
    pub fn formatted(&self, store: &NetworkStore, title: &str) -> Result<String> {
        Ok(self.value(store, title)?.formatted())
    }

    /// Whether the user may edit the cell. Unknown titles are not editable.
    pub fn is_editable(&self, store: &NetworkStore, title: &str) -> bool {
        match (self, EntityColumn::resolve(self.kind(), title)) {
            (Self::Point(id), Ok(EntityColumn::Point(c))) => point::is_editable(store, *id, c),
            (Self::Measure(id), Ok(EntityColumn::Measure(c))) => {
                measure::is_editable(store, *id, c)
            }
            _ => false,
        }
    }

    /// Write a cell from user text. `"NULL"` clears numeric cells.
    ///
    /// Must not be called while holding a [`ControlNetwork::read`] guard.
    pub fn set(&self, network: &ControlNetwork, title: &str, text: &str) -> Result<()> {
        let column = EntityColumn::resolve(self.kind(), title)?;
        match (self, column) {
            (Self::Point(id), EntityColumn::Point(c)) => point::set(network, *id, c, text),
            (Self::Measure(id), EntityColumn::Measure(c)) => measure::set(network, *id, c, text),
            (Self::Image(_), _) => Err(UserErrorKind::ImageListUnchangeable.into()),
            _ => Err(BrowseError::programmer("column kind does not match entity")),
        }
    }

    /// Check the deletion policy without mutating anything.
    pub fn can_delete(&self, store: &NetworkStore) -> Result<()> {
        match self {
            Self::Point(id) => point::can_delete(store, *id),
            Self::Measure(id) => measure::can_delete(store, *id),
            Self::Image(_) => Err(UserErrorKind::ImageListUnchangeable.into()),
        }
    }

    /// Remove the entity from the network if policy allows.
    pub fn delete_from_network(&self, network: &ControlNetwork) -> Result<()> {
        self.can_delete(&network.read())?;
        match self {
            Self::Point(id) => network.delete_point(*id),
            Self::Measure(id) => network.delete_measure(*id),
            Self::Image(_) => Err(UserErrorKind::ImageListUnchangeable.into()),
        }
    }

    /// Warning to confirm before writing `new_text`, or an empty string.
    pub fn warning_message(&self, store: &NetworkStore, title: &str, new_text: &str) -> String {
        match (self, EntityColumn::resolve(self.kind(), title)) {
            (Self::Point(id), Ok(EntityColumn::Point(c))) => {
                point::warning_message(store, *id, c, new_text)
            }
            (Self::Measure(id), Ok(EntityColumn::Measure(c))) => {
                measure::warning_message(store, *id, c, new_text)
            }
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ControlMeasure, ControlPoint};

    #[test]
    fn test_deleted_entity_yields_empty() {
        let network = ControlNetwork::new();
        let p = network.add_point(ControlPoint::new("P1"));
        let entity = EntityRef::Point(p);
        assert_eq!(entity.formatted(&network.read(), "Point ID").unwrap(), "P1");

        network.delete_point(p).unwrap();
        let store = network.read();
        assert!(!entity.exists(&store));
        assert_eq!(entity.value(&store, "Point ID").unwrap(), CellValue::Empty);
        assert!(!entity.is_editable(&store, "Point ID"));
    }

    #[test]
    fn test_unknown_title_is_not_found() {
        let network = ControlNetwork::new();
        let p = network.add_point(ControlPoint::new("P1"));
        let err = EntityRef::Point(p).value(&network.read(), "Sample").unwrap_err();
        assert!(matches!(err, BrowseError::NotFound { what: "column", .. }));
    }

    #[test]
    fn test_mismatched_column_is_programmer_error() {
        let network = ControlNetwork::new();
        let p = network.add_point(ControlPoint::new("P1"));
        let column = EntityColumn::Measure(MeasureColumn::Sample);
        assert!(matches!(
            EntityRef::Point(p).value_of(&network.read(), column),
            Err(BrowseError::Programmer(_))
        ));
    }

    #[test]
    fn test_images_are_unchangeable() {
        let network = ControlNetwork::new();
        let p = network.add_point(ControlPoint::new("P1"));
        network.add_measure(p, ControlMeasure::new("cube1")).unwrap();
        let image = EntityRef::Image("cube1".into());

        assert_eq!(image.formatted(&network.read(), "Image ID").unwrap(), "cube1");
        assert_eq!(image.formatted(&network.read(), "Connections").unwrap(), "0");
        assert_eq!(
            image.set(&network, "Image ID", "x").unwrap_err().user_kind(),
            Some(UserErrorKind::ImageListUnchangeable)
        );
        assert_eq!(
            image.delete_from_network(&network).unwrap_err().user_kind(),
            Some(UserErrorKind::ImageListUnchangeable)
        );
    }

    #[test]
    fn test_measure_delete_refused_under_locked_point() {
        let network = ControlNetwork::new();
        let p = network.add_point(ControlPoint::new("P2").with_edit_lock(true));
        let m = network.add_measure(p, ControlMeasure::new("cube1")).unwrap();

        let err = EntityRef::Measure(m).delete_from_network(&network).unwrap_err();
        assert_eq!(err.user_kind(), Some(UserErrorKind::ParentEditLocked));
        assert_eq!(network.read().measure_count(), 1);
    }
}
