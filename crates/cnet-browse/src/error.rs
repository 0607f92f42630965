//! Error types for the browse engine.

use cnet_browse_core::CoreError;

/// Result type alias for browse operations.
pub type Result<T> = std::result::Result<T, BrowseError>;

/// Errors raised by the browse engine.
#[derive(Debug, thiserror::Error)]
pub enum BrowseError {
    /// A caller broke an API contract (wrong item kind, null-data item, ...).
    #[error("Programmer error: {0}")]
    Programmer(String),

    /// A user action was refused by edit policy. No state was changed.
    #[error("{0}")]
    User(UserErrorKind),

    /// A lookup by name failed.
    #[error("No {what} named '{name}'")]
    NotFound { what: &'static str, name: String },

    /// A range endpoint is not part of the current visible list.
    #[error("Item is not in the current visible list")]
    NotVisible,

    /// Runtime failure.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl BrowseError {
    /// Create a programmer error.
    pub fn programmer(message: impl Into<String>) -> Self {
        Self::Programmer(message.into())
    }

    /// Create a lookup failure.
    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            name: name.into(),
        }
    }

    /// The refusal reason, if this is a user error.
    pub fn user_kind(&self) -> Option<UserErrorKind> {
        match self {
            Self::User(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl From<UserErrorKind> for BrowseError {
    fn from(kind: UserErrorKind) -> Self {
        Self::User(kind)
    }
}

/// Reasons an edit or deletion is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum UserErrorKind {
    /// The entity itself is edit-locked.
    #[error("The entity is edit locked")]
    EditLocked,
    /// The measure's parent point is edit-locked.
    #[error("The parent point is edit locked")]
    ParentEditLocked,
    /// The column cannot be written.
    #[error("The column is read only")]
    ReadOnly,
    /// The value is not valid for this entity and column.
    #[error("The value is not valid for this entity")]
    InvalidForEntity,
    /// Images and image connections cannot be edited from the browser.
    #[error("The image list cannot be changed here")]
    ImageListUnchangeable,
    /// A point cannot be deleted while any of its measures is edit-locked.
    #[error("The point has edit locked measures")]
    HasLockedMeasures,
    /// Another point already has this identifier.
    #[error("A point with this id already exists")]
    DuplicatePointId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_display_and_kind() {
        let err: BrowseError = UserErrorKind::ParentEditLocked.into();
        assert_eq!(err.to_string(), "The parent point is edit locked");
        assert_eq!(err.user_kind(), Some(UserErrorKind::ParentEditLocked));
    }

    #[test]
    fn test_not_found_display() {
        let err = BrowseError::not_found("column", "Bogus");
        assert_eq!(err.to_string(), "No column named 'Bogus'");
        assert_eq!(err.user_kind(), None);
    }
}
