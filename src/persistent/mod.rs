//! Persistent (immutable) data structures.
//!
//! This module provides persistent data structures that use structural
//! sharing for efficient immutable operations. All operations return new
//! versions of the structure without modifying the original, making them
//! safe to share and ideal for functional programming patterns.
//!
//! # Available Structures
//!
//! ## `PersistentAvlMap`
//!
//! An ordered map based on an AVL tree with O(log N) insert, remove and
//! lookup, O(1) length, and lazy in-order iteration.
//!
//! ```rust
//! use arbres::persistent::PersistentAvlMap;
//!
//! let map = PersistentAvlMap::new()
//!     .insert(3, "three")
//!     .insert(1, "one")
//!     .insert(2, "two");
//!
//! // Entries iterate in sorted key order
//! let keys: Vec<&i32> = map.keys().collect();
//! assert_eq!(keys, vec![&1, &2, &3]);
//!
//! // The original is never modified
//! let removed = map.remove(&2);
//! assert_eq!(map.len(), 3);
//! assert_eq!(removed.len(), 2);
//! ```
//!
//! # Thread Safety
//!
//! By default, structures use `Rc` for reference counting and are not
//! thread-safe. Enable the `arc` feature to use `Arc` instead, making all
//! structures `Send + Sync` so snapshots can be read concurrently.

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`, which is
/// thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`, which is
/// thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod avlmap;

pub use avlmap::PersistentAvlMap;
pub use avlmap::PersistentAvlMapIntoIterator;
pub use avlmap::PersistentAvlMapIterator;
