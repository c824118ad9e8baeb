use std::collections::TryReserveError;

use thiserror::Error;

/// Errors returned by the fallible [`RedBlackTree`] operations.
///
/// [`RedBlackTree`]: crate::RedBlackTree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The handle was issued by another tree, or the node it named has
    /// already been erased.
    #[error("handle does not name a live node of this tree")]
    InvalidHandle,

    /// Growing the node table failed. The tree is left unchanged.
    #[error("failed to allocate a tree node")]
    AllocFailed {
        #[source]
        source: TryReserveError,
    },

    /// Every addressable node slot is in use.
    #[error("node table is full ({max} nodes)")]
    CapacityOverflow { max: usize },
}

/// A broken red-black or search tree property found by
/// [`RedBlackTree::validate`].
///
/// Node positions are reported as slot indices.
///
/// [`RedBlackTree::validate`]: crate::RedBlackTree::validate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("root is red")]
    RedRoot,

    #[error("sentinel is not a black leaf")]
    BadSentinel,

    #[error("red node at slot {index} has a red child")]
    RedChild { index: u32 },

    #[error("node at slot {index} is out of search order")]
    OutOfOrder { index: u32 },

    #[error("black height differs below slot {index}: left {left}, right {right}")]
    BlackHeight { index: u32, left: usize, right: usize },

    #[error("node at slot {index} does not point back to its parent")]
    BrokenParentLink { index: u32 },

    #[error("tree holds {counted} nodes but its length is {len}")]
    LengthMismatch { counted: usize, len: usize },
}
