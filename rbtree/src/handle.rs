use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of one tree instance, used to reject handles from other trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TreeId(u64);

impl TreeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Reference to one node stored in a [`RedBlackTree`].
///
/// Handles are returned by [`insert`], [`find`], [`min`] and [`max`] and stay
/// valid until the node they name is erased, or the tree is cleared or
/// dropped. Erasing other nodes does not invalidate a handle.
///
/// A handle is only a name: reading the key or erasing the node goes through
/// the tree, which checks that the handle belongs to it and is still live.
///
/// [`RedBlackTree`]: crate::RedBlackTree
/// [`insert`]: crate::RedBlackTree::insert
/// [`find`]: crate::RedBlackTree::find
/// [`min`]: crate::RedBlackTree::min
/// [`max`]: crate::RedBlackTree::max
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub(crate) tree: TreeId,
    pub(crate) index: u32,
    pub(crate) generation: u32,
}
