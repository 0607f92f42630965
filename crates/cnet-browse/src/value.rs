//! Cell values.
//!
//! Every column of every entity yields a [`CellValue`]. Numeric columns
//! report unset values as [`CellValue::Null`], which formats as `"NULL"`.

use std::cmp::Ordering;
use std::fmt;

/// Literal used for unset numeric values.
pub const NULL_TEXT: &str = "NULL";

/// Text shown by busy placeholder rows.
pub const BUSY_TEXT: &str = "Working...";

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Free text.
    Text(String),
    /// A numeric value.
    Number(f64),
    /// A flag, shown as `Yes`/`No`.
    Bool(bool),
    /// The display name of an enumerated value.
    Enum(String),
    /// An unset numeric value.
    Null,
    /// No data, e.g. for an item whose entity was deleted.
    Empty,
}

impl CellValue {
    /// Wrap an optional number.
    pub fn number(value: Option<f64>) -> Self {
        value.map_or(Self::Null, Self::Number)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Display text.
    pub fn formatted(&self) -> String {
        self.to_string()
    }

    /// Total order used for sorting.
    ///
    /// Numbers compare numerically. `Null` sorts before every number and
    /// after every text. Text sorts before every number, so busy
    /// placeholders lead numeric columns. Anything else compares by its
    /// formatted text.
    pub fn compare(&self, other: &CellValue) -> Ordering {
        use CellValue::*;
        match (self, other) {
            (Number(a), Number(b)) => a.total_cmp(b),
            (Null, Null) => Ordering::Equal,
            (Null, Number(_)) => Ordering::Less,
            (Number(_), Null) => Ordering::Greater,
            (Null, Text(_)) => Ordering::Greater,
            (Text(_), Null) => Ordering::Less,
            (Text(a), Text(b)) => a.cmp(b),
            (Number(_), Text(_)) => Ordering::Greater,
            (Text(_), Number(_)) => Ordering::Less,
            _ => self.formatted().cmp(&other.formatted()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Enum(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(true) => f.write_str("Yes"),
            Self::Bool(false) => f.write_str("No"),
            Self::Null => f.write_str(NULL_TEXT),
            Self::Empty => Ok(()),
        }
    }
}

/// Parse user text for a numeric cell. `"NULL"` (any case) or blank means unset.
pub fn parse_number(text: &str) -> Option<Option<f64>> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NULL_TEXT) {
        return Some(None);
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite()).map(Some)
}

/// Parse user text for a flag cell.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}
