//! # arbres
//!
//! A persistent AVL tree map for Rust with structural sharing and cached
//! subtree sizes.
//!
//! ## Overview
//!
//! This library provides an immutable ordered map in which every update
//! returns a new map handle and older handles stay valid forever:
//!
//! - **Persistence**: insert and remove copy only the touched path; the rest
//!   of the tree is shared between versions
//! - **Balance**: AVL rotations keep lookups, inserts and removals O(log N)
//!   regardless of insertion order
//! - **Cached Sizes**: every node caches its subtree size, so `len` is O(1)
//! - **Lazy Iteration**: in-order traversal is pull-based and can be
//!   abandoned early without visiting the rest of the tree
//!
//! ## Feature Flags
//!
//! - `arc`: Use `Arc` instead of `Rc` for reference counting, making maps
//!   `Send + Sync` so snapshots can be read from multiple threads
//!
//! ## Example
//!
//! ```rust
//! use arbres::prelude::*;
//!
//! let map = PersistentAvlMap::new()
//!     .insert(3, "three")
//!     .insert(1, "one")
//!     .insert(2, "two");
//!
//! assert_eq!(map.get(&2), Some(&"two"));
//!
//! // Removal produces a new version; the original is untouched
//! let removed = map.remove(&2);
//! assert_eq!(map.len(), 3);
//! assert_eq!(removed.len(), 2);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Note: Disabling redundant_closure_for_method_calls due to clippy 0.1.92 panic bug
#![allow(clippy::redundant_closure_for_method_calls)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types.
///
/// # Usage
///
/// ```rust
/// use arbres::prelude::*;
/// ```
pub mod prelude {

    pub use crate::persistent::*;
}

pub mod persistent;
