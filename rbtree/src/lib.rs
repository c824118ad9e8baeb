#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Ordered key container backed by a red-black tree.
//!
//! ```
//! use rbtree::RedBlackTree;
//!
//! let mut tree = RedBlackTree::new();
//! let ten = tree.insert(10);
//! tree.insert(30);
//! tree.insert(20);
//!
//! assert_eq!(tree.to_ordered_sequence(), [10, 20, 30]);
//! assert_eq!(tree.key_of(tree.min().unwrap()), Some(&10));
//!
//! assert_eq!(tree.erase(ten), Ok(10));
//! assert!(tree.erase(ten).is_err());
//! assert_eq!(tree.find(&10), None);
//! ```

mod error;
mod handle;
mod red_black_tree;

pub use error::{InvariantViolation, TreeError};
pub use handle::Handle;
pub use red_black_tree::{Iter, RedBlackTree};
