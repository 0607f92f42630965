//! Hierarchical projection of a control network.
//!
//! A [`TreeModel`] builds an item tree in one of three [`TreeLayout`]s,
//! filters it into a visible linked list, and answers range and selection
//! queries over the visible items.

mod builder;
mod item;
mod model;
mod visible;

pub use builder::TreeLayout;
#[cfg(test)]
pub(crate) use builder::build_tree;
pub use item::{ItemKind, ItemTree, KindMask, TreeItem};
pub use model::{TreeModel, TreeSignals};
