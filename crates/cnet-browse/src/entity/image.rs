//! Image columns. Images are read-only in the browser.

use crate::network::NetworkStore;
use crate::value::CellValue;

/// Columns describing an image or an image connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageColumn {
    ImageId,
    Connections,
}

impl ImageColumn {
    pub const ALL: [ImageColumn; 2] = [Self::ImageId, Self::Connections];

    pub fn title(self) -> &'static str {
        match self {
            Self::ImageId => "Image ID",
            Self::Connections => "Connections",
        }
    }

    pub fn from_title(title: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.title() == title)
    }
}

pub(crate) fn value(store: &NetworkStore, serial: &str, column: ImageColumn) -> CellValue {
    if !store.contains_image(serial) {
        return CellValue::Empty;
    }
    match column {
        ImageColumn::ImageId => CellValue::text(serial),
        ImageColumn::Connections => CellValue::Number(store.adjacent_images(serial).len() as f64),
    }
}
