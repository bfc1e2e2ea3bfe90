//! Persistent (immutable) ordered map based on an AVL tree.
//!
//! This module provides [`PersistentAvlMap`], an immutable ordered map
//! that uses structural sharing for efficient operations.
//!
//! # Overview
//!
//! `PersistentAvlMap` is based on a persistent AVL tree, a height-balanced
//! binary search tree that provides efficient ordered map operations.
//!
//! - O(log N) get
//! - O(log N) insert
//! - O(log N) remove
//! - O(log N) min/max
//! - O(1) len and `is_empty`
//!
//! All operations return new maps without modifying the original,
//! and structural sharing ensures memory efficiency.
//!
//! # Examples
//!
//! ```rust
//! use arbres::persistent::PersistentAvlMap;
//!
//! let map = PersistentAvlMap::new()
//!     .insert(3, "three")
//!     .insert(1, "one")
//!     .insert(2, "two");
//!
//! // Entries are always in sorted order
//! let keys: Vec<&i32> = map.keys().collect();
//! assert_eq!(keys, vec![&1, &2, &3]);
//!
//! // Previous versions are never affected
//! let removed = map.remove(&1);
//! assert_eq!(map.len(), 3);
//! assert_eq!(removed.len(), 2);
//! ```
//!
//! # Internal Structure
//!
//! The AVL tree maintains the following invariants:
//! 1. Left keys < node key < right keys at every node
//! 2. The heights of the two child subtrees differ by at most one
//! 3. Keys are unique
//!
//! Rebalancing after insert and remove uses the standard single and double
//! rotations, selected by the balance factor of the updated node. Each node
//! caches its subtree height (for balancing) and its subtree size (for O(1)
//! `len`); both caches are recomputed bottom-up whenever a path is rebuilt.
//! These invariants ensure the tree height is O(log N).

use super::ReferenceCounter;
use smallvec::SmallVec;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;

// =============================================================================
// Node Definition
// =============================================================================

/// Internal node structure for the AVL tree.
#[derive(Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    /// Cached height of the subtree rooted at this node (a leaf has height 1)
    height: u8,
    /// Cached number of entries in the subtree rooted at this node
    size: usize,
    left: Option<ReferenceCounter<Self>>,
    right: Option<ReferenceCounter<Self>>,
}

impl<K, V> Node<K, V> {
    /// Creates a new node with no children.
    const fn leaf(key: K, value: V) -> Self {
        Self {
            key,
            value,
            height: 1,
            size: 1,
            left: None,
            right: None,
        }
    }

    /// Creates a new node over the given children, recomputing the caches.
    fn new(
        key: K,
        value: V,
        left: Option<ReferenceCounter<Self>>,
        right: Option<ReferenceCounter<Self>>,
    ) -> Self {
        let subtree_height = 1 + height(left.as_ref()).max(height(right.as_ref()));
        let subtree_size = 1 + size(left.as_ref()) + size(right.as_ref());
        Self {
            key,
            value,
            height: subtree_height,
            size: subtree_size,
            left,
            right,
        }
    }

    /// Creates a copy of this node with new children, recomputing the caches.
    fn with_children(
        &self,
        left: Option<ReferenceCounter<Self>>,
        right: Option<ReferenceCounter<Self>>,
    ) -> Self
    where
        K: Clone,
        V: Clone,
    {
        Self::new(self.key.clone(), self.value.clone(), left, right)
    }

    /// Returns the height difference between the left and right subtrees.
    fn balance_factor(&self) -> i16 {
        i16::from(height(self.left.as_ref())) - i16::from(height(self.right.as_ref()))
    }
}

/// Helper function returning the cached height of an optional node.
fn height<K, V>(node: Option<&ReferenceCounter<Node<K, V>>>) -> u8 {
    node.map_or(0, |node_ref| node_ref.height)
}

/// Helper function returning the cached subtree size of an optional node.
fn size<K, V>(node: Option<&ReferenceCounter<Node<K, V>>>) -> usize {
    node.map_or(0, |node_ref| node_ref.size)
}

/// Message constant for panic when a rebuilt subtree violates the AVL bound.
const BALANCE_INVARIANT_PANIC_MESSAGE: &str =
    "rebalancing must leave every balance factor within -1..=1";

// =============================================================================
// PersistentAvlMap Definition
// =============================================================================

/// A persistent (immutable) ordered map based on an AVL tree.
///
/// `PersistentAvlMap` is an immutable data structure that uses structural
/// sharing to efficiently support functional programming patterns.
///
/// Keys must implement `Ord` for ordering. The map maintains entries in
/// sorted key order, enabling ordered iteration, and every node caches the
/// size of its subtree so `len` is O(1).
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log N)          |
/// | `insert`       | O(log N)          |
/// | `remove`       | O(log N)          |
/// | `contains_key` | O(log N)          |
/// | `min`/`max`    | O(log N)          |
/// | `len`          | O(1)              |
/// | `is_empty`     | O(1)              |
///
/// # Examples
///
/// ```rust
/// use arbres::persistent::PersistentAvlMap;
///
/// let map = PersistentAvlMap::singleton(42, "answer");
/// assert_eq!(map.get(&42), Some(&"answer"));
///
/// // Ordered iteration
/// let map = PersistentAvlMap::new()
///     .insert(3, "three")
///     .insert(1, "one")
///     .insert(2, "two");
///
/// let keys: Vec<&i32> = map.keys().collect();
/// assert_eq!(keys, vec![&1, &2, &3]);
/// ```
#[derive(Clone)]
pub struct PersistentAvlMap<K, V> {
    /// Root node of the tree
    root: Option<ReferenceCounter<Node<K, V>>>,
}

// Static assertions to verify the sharing mode of the reference counter
#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentAvlMap<i32, String>: Send, Sync);
#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(PersistentAvlMap<i32, String>: Send, Sync);

impl<K, V> PersistentAvlMap<K, V> {
    /// Creates a new empty map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map: PersistentAvlMap<i32, String> = PersistentAvlMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { root: None }
    }

    /// Returns the number of entries in the map.
    ///
    /// # Complexity
    ///
    /// O(1), read from the root's cached subtree size.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    /// assert_eq!(map.len(), 2);
    /// ```
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        size(self.root.as_ref())
    }

    /// Returns `true` if the map contains no entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let empty: PersistentAvlMap<i32, String> = PersistentAvlMap::new();
    /// assert!(empty.is_empty());
    ///
    /// let non_empty = empty.insert(1, "one".to_string());
    /// assert!(!non_empty.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

impl<K: Clone + Ord, V: Clone> PersistentAvlMap<K, V> {
    /// Creates a map containing a single key-value pair.
    ///
    /// # Arguments
    ///
    /// * `key` - The key
    /// * `value` - The value
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::singleton(42, "answer");
    /// assert_eq!(map.len(), 1);
    /// assert_eq!(map.get(&42), Some(&"answer"));
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::new().insert(key, value)
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but the
    /// ordering on the borrowed form must match the ordering on the key type.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to look up
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert("hello".to_string(), 42);
    ///
    /// // Can use &str to look up String keys
    /// assert_eq!(map.get("hello"), Some(&42));
    /// assert_eq!(map.get("world"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Self::get_from_node(self.root.as_ref(), key)
    }

    /// Recursive helper for get.
    fn get_from_node<'a, Q>(
        node: Option<&'a ReferenceCounter<Node<K, V>>>,
        key: &Q,
    ) -> Option<&'a V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        node.and_then(|node_ref| match key.cmp(node_ref.key.borrow()) {
            Ordering::Less => Self::get_from_node(node_ref.left.as_ref(), key),
            Ordering::Greater => Self::get_from_node(node_ref.right.as_ref(), key),
            Ordering::Equal => Some(&node_ref.value),
        })
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to check
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert("key".to_string(), 42);
    ///
    /// assert!(map.contains_key("key"));
    /// assert!(!map.contains_key("other"));
    /// ```
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map already contains the key, the value is replaced.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to insert
    /// * `value` - The value to insert
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map1 = PersistentAvlMap::new().insert(1, "one");
    /// let map2 = map1.insert(1, "ONE");
    ///
    /// assert_eq!(map1.get(&1), Some(&"one")); // Original unchanged
    /// assert_eq!(map2.get(&1), Some(&"ONE")); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        self.replace(key, value).0
    }

    /// Inserts a key-value pair, returning the new map and the previous value.
    ///
    /// This is the full form of [`insert`](Self::insert): the second element
    /// of the returned pair is the value the key mapped to before the call,
    /// or `None` if the key was not present.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to insert
    /// * `value` - The value to insert
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let (map, previous) = PersistentAvlMap::new().replace(1, "one");
    /// assert_eq!(previous, None);
    ///
    /// let (updated, previous) = map.replace(1, "ONE");
    /// assert_eq!(previous, Some("one"));
    /// assert_eq!(updated.get(&1), Some(&"ONE"));
    /// assert_eq!(map.get(&1), Some(&"one")); // Original unchanged
    /// ```
    #[must_use]
    pub fn replace(&self, key: K, value: V) -> (Self, Option<V>) {
        let (new_root, previous_value) = Self::insert_into_node(self.root.as_ref(), key, value);

        debug_assert!(
            (-1..=1).contains(&new_root.balance_factor()),
            "{}",
            BALANCE_INVARIANT_PANIC_MESSAGE
        );

        (
            Self {
                root: Some(new_root),
            },
            previous_value,
        )
    }

    /// Recursive helper for insert.
    /// Returns (`new_node`, `previous_value`) where `previous_value` is the
    /// value the key mapped to before, if any.
    fn insert_into_node(
        node: Option<&ReferenceCounter<Node<K, V>>>,
        key: K,
        value: V,
    ) -> (ReferenceCounter<Node<K, V>>, Option<V>) {
        match node {
            None => (ReferenceCounter::new(Node::leaf(key, value)), None),
            Some(node_ref) => match key.cmp(&node_ref.key) {
                Ordering::Less => {
                    let (new_left, previous_value) =
                        Self::insert_into_node(node_ref.left.as_ref(), key, value);
                    let new_node =
                        node_ref.with_children(Some(new_left), node_ref.right.clone());
                    (
                        ReferenceCounter::new(Self::rebalance(new_node)),
                        previous_value,
                    )
                }
                Ordering::Greater => {
                    let (new_right, previous_value) =
                        Self::insert_into_node(node_ref.right.as_ref(), key, value);
                    let new_node =
                        node_ref.with_children(node_ref.left.clone(), Some(new_right));
                    (
                        ReferenceCounter::new(Self::rebalance(new_node)),
                        previous_value,
                    )
                }
                Ordering::Equal => {
                    // Key exists, update the value in place; the structure,
                    // height and size are unchanged
                    let new_node = Node {
                        key,
                        value,
                        height: node_ref.height,
                        size: node_ref.size,
                        left: node_ref.left.clone(),
                        right: node_ref.right.clone(),
                    };
                    (
                        ReferenceCounter::new(new_node),
                        Some(node_ref.value.clone()),
                    )
                }
            },
        }
    }

    /// Restores the AVL balance invariant after a structural change.
    /// Handles the four rotation cases selected by the balance factor.
    fn rebalance(node: Node<K, V>) -> Node<K, V> {
        let balance = node.balance_factor();

        // Case 1: Left-Left (left subtree too tall, left child not right-leaning)
        if balance > 1
            && let Some(left) = &node.left
            && left.balance_factor() >= 0
        {
            return Self::rotate_right(node);
        }

        // Case 2: Left-Right (left subtree too tall, left child right-leaning)
        if balance > 1
            && let Some(left) = &node.left
            && left.balance_factor() < 0
        {
            // First rotate left on the left child, then rotate right on node
            let new_left = Self::rotate_left((**left).clone());
            let new_node =
                node.with_children(Some(ReferenceCounter::new(new_left)), node.right.clone());
            return Self::rotate_right(new_node);
        }

        // Case 3: Right-Right (right subtree too tall, right child not left-leaning)
        if balance < -1
            && let Some(right) = &node.right
            && right.balance_factor() <= 0
        {
            return Self::rotate_left(node);
        }

        // Case 4: Right-Left (right subtree too tall, right child left-leaning)
        if balance < -1
            && let Some(right) = &node.right
            && right.balance_factor() > 0
        {
            // First rotate right on the right child, then rotate left on node
            let new_right = Self::rotate_right((**right).clone());
            let new_node =
                node.with_children(node.left.clone(), Some(ReferenceCounter::new(new_right)));
            return Self::rotate_left(new_node);
        }

        node
    }

    /// Rotates the tree to the right around the given node.
    ///
    /// The left child becomes the root of the subtree; the caches of the two
    /// rebuilt nodes are recomputed bottom-up.
    fn rotate_right(node: Node<K, V>) -> Node<K, V> {
        if let Some(left) = node.left {
            let new_right = Node::new(node.key, node.value, left.right.clone(), node.right);
            Node::new(
                left.key.clone(),
                left.value.clone(),
                left.left.clone(),
                Some(ReferenceCounter::new(new_right)),
            )
        } else {
            node
        }
    }

    /// Rotates the tree to the left around the given node.
    ///
    /// The right child becomes the root of the subtree; the caches of the two
    /// rebuilt nodes are recomputed bottom-up.
    fn rotate_left(node: Node<K, V>) -> Node<K, V> {
        if let Some(right) = node.right {
            let new_left = Node::new(node.key, node.value, node.left, right.left.clone());
            Node::new(
                right.key.clone(),
                right.value.clone(),
                Some(ReferenceCounter::new(new_left)),
                right.right.clone(),
            )
        } else {
            node
        }
    }

    /// Removes a key from the map.
    ///
    /// Returns a new map without the key. If the key doesn't exist,
    /// returns a clone of the original map.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to remove
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    /// let removed = map.remove(&1);
    ///
    /// assert_eq!(map.len(), 2);     // Original unchanged
    /// assert_eq!(removed.len(), 1); // New version
    /// assert_eq!(removed.get(&1), None);
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.extract(key).0
    }

    /// Removes a key, returning the new map and the removed value.
    ///
    /// This is the full form of [`remove`](Self::remove): the second element
    /// of the returned pair is the value the key mapped to, or `None` if the
    /// key was absent. When the key is absent the returned map shares its
    /// entire structure with the original and nothing is allocated.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to remove
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    ///
    /// let (removed, value) = map.extract(&1);
    /// assert_eq!(value, Some("one"));
    /// assert_eq!(removed.len(), 1);
    ///
    /// let (unchanged, value) = map.extract(&9);
    /// assert_eq!(value, None);
    /// assert_eq!(unchanged.len(), 2);
    /// ```
    #[must_use]
    pub fn extract<Q>(&self, key: &Q) -> (Self, Option<V>)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match Self::remove_from_node(self.root.as_ref(), key) {
            None => (self.clone(), None),
            Some((new_root, removed_value)) => {
                debug_assert!(
                    new_root
                        .as_ref()
                        .is_none_or(|root| (-1..=1).contains(&root.balance_factor())),
                    "{}",
                    BALANCE_INVARIANT_PANIC_MESSAGE
                );

                (Self { root: new_root }, Some(removed_value))
            }
        }
    }

    /// Recursive helper for extract.
    /// Returns `None` when the key is absent so the caller can reuse the
    /// original handle without allocating.
    fn remove_from_node<Q>(
        node: Option<&ReferenceCounter<Node<K, V>>>,
        key: &Q,
    ) -> Option<(Option<ReferenceCounter<Node<K, V>>>, V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        node.and_then(|node_ref| match key.cmp(node_ref.key.borrow()) {
            Ordering::Less => {
                let (new_left, removed_value) =
                    Self::remove_from_node(node_ref.left.as_ref(), key)?;
                let new_node = node_ref.with_children(new_left, node_ref.right.clone());
                Some((
                    Some(ReferenceCounter::new(Self::rebalance(new_node))),
                    removed_value,
                ))
            }
            Ordering::Greater => {
                let (new_right, removed_value) =
                    Self::remove_from_node(node_ref.right.as_ref(), key)?;
                let new_node = node_ref.with_children(node_ref.left.clone(), new_right);
                Some((
                    Some(ReferenceCounter::new(Self::rebalance(new_node))),
                    removed_value,
                ))
            }
            Ordering::Equal => {
                let removed_value = node_ref.value.clone();
                match (&node_ref.left, &node_ref.right) {
                    (None, None) => Some((None, removed_value)),
                    (Some(left), None) => Some((Some(left.clone()), removed_value)),
                    (None, Some(right)) => Some((Some(right.clone()), removed_value)),
                    (Some(_), Some(right)) => {
                        // Promote the in-order successor: remove the minimum
                        // of the right subtree and reuse its entry here
                        let (new_right, successor_key, successor_value) =
                            Self::remove_min_from(right);
                        let new_node = Node::new(
                            successor_key,
                            successor_value,
                            node_ref.left.clone(),
                            new_right,
                        );
                        Some((
                            Some(ReferenceCounter::new(Self::rebalance(new_node))),
                            removed_value,
                        ))
                    }
                }
            }
        })
    }

    /// Removes the minimum entry from a subtree.
    /// Returns the rebuilt subtree together with the removed key and value.
    fn remove_min_from(
        node: &ReferenceCounter<Node<K, V>>,
    ) -> (Option<ReferenceCounter<Node<K, V>>>, K, V) {
        match &node.left {
            None => (node.right.clone(), node.key.clone(), node.value.clone()),
            Some(left) => {
                let (new_left, minimum_key, minimum_value) = Self::remove_min_from(left);
                let new_node = node.with_children(new_left, node.right.clone());
                (
                    Some(ReferenceCounter::new(Self::rebalance(new_node))),
                    minimum_key,
                    minimum_value,
                )
            }
        }
    }

    /// Returns the entry with the minimum key.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert(3, "three")
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    ///
    /// assert_eq!(map.min(), Some((&1, &"one")));
    /// ```
    #[must_use]
    pub fn min(&self) -> Option<(&K, &V)> {
        Self::min_from_node(self.root.as_ref())
    }

    /// Recursive helper for min.
    fn min_from_node(node: Option<&ReferenceCounter<Node<K, V>>>) -> Option<(&K, &V)> {
        node.and_then(|node_ref| {
            node_ref.left.as_ref().map_or_else(
                || Some((&node_ref.key, &node_ref.value)),
                |left| Self::min_from_node(Some(left)),
            )
        })
    }

    /// Returns the entry with the maximum key.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert(3, "three")
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    ///
    /// assert_eq!(map.max(), Some((&3, &"three")));
    /// ```
    #[must_use]
    pub fn max(&self) -> Option<(&K, &V)> {
        Self::max_from_node(self.root.as_ref())
    }

    /// Recursive helper for max.
    fn max_from_node(node: Option<&ReferenceCounter<Node<K, V>>>) -> Option<(&K, &V)> {
        node.and_then(|node_ref| {
            node_ref.right.as_ref().map_or_else(
                || Some((&node_ref.key, &node_ref.value)),
                |right| Self::max_from_node(Some(right)),
            )
        })
    }

    /// Returns an iterator over entries in sorted key order.
    ///
    /// The traversal is lazy: entries are produced on demand from an explicit
    /// stack of pending nodes, so abandoning the iterator early never visits
    /// the rest of the tree. Each call returns an independent iterator over
    /// the same immutable snapshot.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert(3, "three")
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    ///
    /// for (key, value) in map.iter() {
    ///     println!("{}: {}", key, value);
    /// }
    ///
    /// // Early termination does not traverse the remainder
    /// let first_two: Vec<&i32> = map.iter().map(|(key, _)| key).take(2).collect();
    /// assert_eq!(first_two, vec![&1, &2]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentAvlMapIterator<'_, K, V> {
        PersistentAvlMapIterator::new(self)
    }

    /// Returns an iterator over keys in sorted order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert(3, "three")
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    ///
    /// let keys: Vec<&i32> = map.keys().collect();
    /// assert_eq!(keys, vec![&1, &2, &3]);
    /// ```
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over values in key order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert(1, 10)
    ///     .insert(2, 20)
    ///     .insert(3, 30);
    ///
    /// let sum: i32 = map.values().sum();
    /// assert_eq!(sum, 60);
    /// ```
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Returns an iterator over key-value pairs in sorted key order.
    ///
    /// This is an alias for [`iter`](Self::iter), provided for API consistency
    /// with other functional programming languages.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    /// for (key, value) in map.entries() {
    ///     println!("{}: {}", key, value);
    /// }
    /// ```
    #[inline]
    #[must_use]
    pub fn entries(&self) -> PersistentAvlMapIterator<'_, K, V> {
        self.iter()
    }

    /// Applies a function to all values, keeping keys unchanged.
    ///
    /// Returns a new map with the same keys but transformed values.
    /// The length of the map is preserved, and entries remain in sorted key order.
    ///
    /// # Type Parameters
    ///
    /// * `W` - The type of the transformed values
    /// * `F` - The transformation function type
    ///
    /// # Arguments
    ///
    /// * `transform` - A function to apply to each value
    ///
    /// # Complexity
    ///
    /// O(n log n) where n is the number of entries
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert(1, 10)
    ///     .insert(2, 20);
    /// let doubled = map.map_values(|v| v * 2);
    /// assert_eq!(doubled.get(&1), Some(&20));
    /// assert_eq!(doubled.get(&2), Some(&40));
    /// ```
    #[must_use]
    pub fn map_values<W, F>(&self, mut transform: F) -> PersistentAvlMap<K, W>
    where
        K: Clone + Ord,
        W: Clone,
        F: FnMut(&V) -> W,
    {
        self.iter()
            .map(|(key, value)| (key.clone(), transform(value)))
            .collect()
    }

    /// Applies a function to all keys, keeping values unchanged.
    ///
    /// Returns a new map with transformed keys and the original values.
    /// The new map will be ordered by the new keys.
    ///
    /// # Warning
    ///
    /// Key transformation may cause collisions. When multiple original keys
    /// map to the same new key, only one entry will be kept. The collision
    /// behavior depends on internal iteration order.
    ///
    /// # Type Parameters
    ///
    /// * `L` - The type of the transformed keys
    /// * `F` - The transformation function type
    ///
    /// # Arguments
    ///
    /// * `transform` - A function to apply to each key
    ///
    /// # Complexity
    ///
    /// O(n log n) where n is the number of entries
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("bb".to_string(), 2)
    ///     .insert("ccc".to_string(), 3);
    /// let by_length = map.map_keys(|k| k.len());
    /// assert_eq!(by_length.get(&1), Some(&1));
    /// assert_eq!(by_length.get(&2), Some(&2));
    /// assert_eq!(by_length.get(&3), Some(&3));
    /// ```
    #[must_use]
    pub fn map_keys<L, F>(&self, mut transform: F) -> PersistentAvlMap<L, V>
    where
        L: Clone + Ord,
        V: Clone,
        F: FnMut(&K) -> L,
    {
        self.iter()
            .map(|(key, value)| (transform(key), value.clone()))
            .collect()
    }

    /// Applies a function to each entry, keeping only those that return Some.
    ///
    /// This combines filtering and mapping in a single operation.
    /// Entries for which the function returns None are excluded from the result.
    /// The result maintains sorted key order.
    ///
    /// # Type Parameters
    ///
    /// * `W` - The type of the transformed values
    /// * `F` - The filter-map function type
    ///
    /// # Arguments
    ///
    /// * `filter_transform` - A function that receives a reference to the key and the value,
    ///   and returns `Some(new_value)` to include or `None` to exclude
    ///
    /// # Complexity
    ///
    /// O(n log n) where n is the number of entries
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert(1, "1".to_string())
    ///     .insert(2, "abc".to_string())
    ///     .insert(3, "42".to_string());
    /// let parsed = map.filter_map(|_, v| v.parse::<i32>().ok());
    /// assert_eq!(parsed.len(), 2);
    /// assert_eq!(parsed.get(&1), Some(&1));
    /// assert_eq!(parsed.get(&3), Some(&42));
    /// ```
    #[must_use]
    pub fn filter_map<W, F>(&self, mut filter_transform: F) -> PersistentAvlMap<K, W>
    where
        K: Clone + Ord,
        W: Clone,
        F: FnMut(&K, &V) -> Option<W>,
    {
        self.iter()
            .filter_map(|(key, value)| {
                filter_transform(key, value).map(|new_value| (key.clone(), new_value))
            })
            .collect()
    }

    /// Merges two maps, with values from `other` taking precedence on key conflicts.
    ///
    /// Returns a new map containing all entries from both maps.
    /// When a key exists in both maps, the value from `other` is used.
    ///
    /// # Arguments
    ///
    /// * `other` - The map to merge with
    ///
    /// # Complexity
    ///
    /// O(m log(n + m)) where n is the size of self and m is the size of other
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map1 = PersistentAvlMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    /// let map2 = PersistentAvlMap::new()
    ///     .insert(2, "TWO")
    ///     .insert(3, "three");
    /// let merged = map1.merge(&map2);
    /// assert_eq!(merged.get(&1), Some(&"one"));
    /// assert_eq!(merged.get(&2), Some(&"TWO")); // From map2
    /// assert_eq!(merged.get(&3), Some(&"three"));
    /// ```
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for (key, value) in other {
            result = result.insert(key.clone(), value.clone());
        }
        result
    }

    /// Merges two maps with a custom conflict resolver.
    ///
    /// Returns a new map containing all entries from both maps.
    /// When a key exists in both maps, the resolver function is called
    /// with the key and both values to determine the final value.
    ///
    /// # Arguments
    ///
    /// * `other` - The map to merge with
    /// * `resolver` - A function that receives (key, `self_value`, `other_value`) and
    ///   returns the value to use in the merged map
    ///
    /// # Complexity
    ///
    /// O(m log(n + m)) where n is the size of self and m is the size of other
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map1 = PersistentAvlMap::new()
    ///     .insert(1, 100)
    ///     .insert(2, 200);
    /// let map2 = PersistentAvlMap::new()
    ///     .insert(2, 50)
    ///     .insert(3, 300);
    /// let merged = map1.merge_with(&map2, |_, v1, v2| *v1.max(v2));
    /// assert_eq!(merged.get(&1), Some(&100));
    /// assert_eq!(merged.get(&2), Some(&200)); // max(200, 50)
    /// assert_eq!(merged.get(&3), Some(&300));
    /// ```
    #[must_use]
    pub fn merge_with<F>(&self, other: &Self, mut resolver: F) -> Self
    where
        F: FnMut(&K, &V, &V) -> V,
    {
        let mut result = self.clone();
        for (key, other_value) in other {
            let new_value = result.get(key).map_or_else(
                || other_value.clone(),
                |self_value| resolver(key, self_value, other_value),
            );
            result = result.insert(key.clone(), new_value);
        }
        result
    }

    /// Removes entries for which the predicate returns true.
    ///
    /// Returns a new map containing only entries for which the predicate
    /// returns false. The result maintains sorted key order.
    ///
    /// # Arguments
    ///
    /// * `predicate` - A function that receives a reference to the key and value,
    ///   and returns true if the entry should be deleted
    ///
    /// # Complexity
    ///
    /// O(n log n) where n is the number of entries
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert(1, 10)
    ///     .insert(2, 20)
    ///     .insert(3, 30);
    /// let small_values = map.delete_if(|_, v| *v >= 20);
    /// assert_eq!(small_values.len(), 1);
    /// assert_eq!(small_values.get(&1), Some(&10));
    /// ```
    #[must_use]
    pub fn delete_if<F>(&self, mut predicate: F) -> Self
    where
        K: Clone + Ord,
        V: Clone,
        F: FnMut(&K, &V) -> bool,
    {
        self.iter()
            .filter(|(key, value)| !predicate(key, value))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Keeps only entries for which the predicate returns true.
    ///
    /// Returns a new map containing only entries for which the predicate
    /// returns true. The result maintains sorted key order.
    ///
    /// # Arguments
    ///
    /// * `predicate` - A function that receives a reference to the key and value,
    ///   and returns true if the entry should be kept
    ///
    /// # Complexity
    ///
    /// O(n log n) where n is the number of entries
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert(1, 10)
    ///     .insert(2, 20)
    ///     .insert(3, 30);
    /// let even_keys = map.keep_if(|k, _| k % 2 == 0);
    /// assert_eq!(even_keys.len(), 1);
    /// assert_eq!(even_keys.get(&2), Some(&20));
    /// ```
    #[must_use]
    pub fn keep_if<F>(&self, mut predicate: F) -> Self
    where
        K: Clone + Ord,
        V: Clone,
        F: FnMut(&K, &V) -> bool,
    {
        self.iter()
            .filter(|(key, value)| predicate(key, value))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Partitions the map into two maps based on a predicate.
    ///
    /// Returns a tuple of two maps:
    /// - The first contains entries for which the predicate returns true
    /// - The second contains entries for which the predicate returns false
    ///
    /// Both resulting maps maintain sorted key order.
    ///
    /// # Arguments
    ///
    /// * `predicate` - A function that receives a reference to the key and value,
    ///   and returns true to include in the first map, false for the second
    ///
    /// # Complexity
    ///
    /// O(n log n) where n is the number of entries
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map = PersistentAvlMap::new()
    ///     .insert(1, 10)
    ///     .insert(2, 20)
    ///     .insert(3, 30)
    ///     .insert(4, 40);
    /// let (even_keys, odd_keys) = map.partition(|k, _| k % 2 == 0);
    /// assert_eq!(even_keys.len(), 2);
    /// assert_eq!(odd_keys.len(), 2);
    /// ```
    #[must_use]
    pub fn partition<F>(&self, mut predicate: F) -> (Self, Self)
    where
        K: Clone + Ord,
        V: Clone,
        F: FnMut(&K, &V) -> bool,
    {
        let mut matching = Self::new();
        let mut not_matching = Self::new();

        for (key, value) in self {
            if predicate(key, value) {
                matching = matching.insert(key.clone(), value.clone());
            } else {
                not_matching = not_matching.insert(key.clone(), value.clone());
            }
        }

        (matching, not_matching)
    }

    /// Verifies the structural invariants of the tree.
    ///
    /// Walks every node and checks the binary-search-tree ordering, the AVL
    /// balance bound, and the exactness of the cached heights and sizes.
    /// Intended as a validation hook for tests and debugging; production
    /// operations maintain these invariants on their own.
    ///
    /// # Panics
    ///
    /// Panics if any invariant is violated.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arbres::persistent::PersistentAvlMap;
    ///
    /// let map: PersistentAvlMap<i32, i32> = (0..100).map(|n| (n, n)).collect();
    /// map.check_invariants();
    /// ```
    pub fn check_invariants(&self) {
        Self::check_node(self.root.as_ref(), None, None);
    }

    /// Recursive helper for `check_invariants`.
    /// Returns the verified height and size of the subtree.
    fn check_node<'a>(
        node: Option<&'a ReferenceCounter<Node<K, V>>>,
        lower_bound: Option<&'a K>,
        upper_bound: Option<&'a K>,
    ) -> (u8, usize) {
        let Some(node_ref) = node else {
            return (0, 0);
        };

        if let Some(bound) = lower_bound {
            assert!(*bound < node_ref.key, "key order violated on a right spine");
        }
        if let Some(bound) = upper_bound {
            assert!(node_ref.key < *bound, "key order violated on a left spine");
        }

        let (left_height, left_size) =
            Self::check_node(node_ref.left.as_ref(), lower_bound, Some(&node_ref.key));
        let (right_height, right_size) =
            Self::check_node(node_ref.right.as_ref(), Some(&node_ref.key), upper_bound);

        let balance = i16::from(left_height) - i16::from(right_height);
        assert!(
            (-1..=1).contains(&balance),
            "balance factor {balance} out of range"
        );

        let expected_height = 1 + left_height.max(right_height);
        assert_eq!(node_ref.height, expected_height, "cached height is stale");

        let expected_size = 1 + left_size + right_size;
        assert_eq!(node_ref.size, expected_size, "cached size is stale");

        (expected_height, expected_size)
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// Inline capacity of the iterator's traversal stack.
/// A stack of 16 covers trees of several thousand entries without
/// touching the heap (the stack depth is bounded by the tree height).
const TRAVERSAL_STACK_CAPACITY: usize = 16;

/// An iterator over key-value pairs of a [`PersistentAvlMap`].
///
/// This iterator performs a lazy in-order traversal using an explicit stack
/// of pending nodes: each `next` call pops the node holding the smallest
/// remaining key and pushes the left spine of that node's right subtree.
/// Entries are produced on demand, so an early exit never visits the
/// remainder of the tree.
pub struct PersistentAvlMapIterator<'a, K, V> {
    /// Stack of nodes whose entry and right subtree are still pending
    traversal_stack: SmallVec<[&'a Node<K, V>; TRAVERSAL_STACK_CAPACITY]>,
    /// Total number of entries in the snapshot (for `ExactSizeIterator`)
    total_entries: usize,
    /// Number of entries already returned
    entries_returned: usize,
}

impl<'a, K, V> PersistentAvlMapIterator<'a, K, V> {
    /// Creates a new iterator positioned before the smallest key.
    fn new(map: &'a PersistentAvlMap<K, V>) -> Self {
        let mut iterator = Self {
            traversal_stack: SmallVec::new(),
            total_entries: map.len(),
            entries_returned: 0,
        };
        iterator.descend_to_leftmost(map.root.as_deref());
        iterator
    }

    /// Pushes the left spine of the given subtree onto the stack.
    ///
    /// After this call the stack top holds the node with the smallest key
    /// of the subtree.
    fn descend_to_leftmost(&mut self, subtree: Option<&'a Node<K, V>>) {
        let mut current = subtree;
        while let Some(node_ref) = current {
            self.traversal_stack.push(node_ref);
            current = node_ref.left.as_deref();
        }
    }
}

impl<'a, K, V> Iterator for PersistentAvlMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node_ref = self.traversal_stack.pop()?;
        self.entries_returned += 1;
        self.descend_to_leftmost(node_ref.right.as_deref());
        Some((&node_ref.key, &node_ref.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total_entries.saturating_sub(self.entries_returned);
        (remaining, Some(remaining))
    }
}

impl<K, V> ExactSizeIterator for PersistentAvlMapIterator<'_, K, V> {
    fn len(&self) -> usize {
        self.total_entries.saturating_sub(self.entries_returned)
    }
}

/// An owning iterator over key-value pairs of a [`PersistentAvlMap`].
pub struct PersistentAvlMapIntoIterator<K, V> {
    entries: Vec<(K, V)>,
    current_index: usize,
}

impl<K: Clone, V: Clone> Iterator for PersistentAvlMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_index >= self.entries.len() {
            None
        } else {
            let entry = self.entries[self.current_index].clone();
            self.current_index += 1;
            Some(entry)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len().saturating_sub(self.current_index);
        (remaining, Some(remaining))
    }
}

impl<K: Clone, V: Clone> ExactSizeIterator for PersistentAvlMapIntoIterator<K, V> {
    fn len(&self) -> usize {
        self.entries.len().saturating_sub(self.current_index)
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Default for PersistentAvlMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Ord, V: Clone> FromIterator<(K, V)> for PersistentAvlMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map = map.insert(key, value);
        }
        map
    }
}

impl<K: Clone + Ord, V: Clone> IntoIterator for PersistentAvlMap<K, V> {
    type Item = (K, V);
    type IntoIter = PersistentAvlMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let entries: Vec<(K, V)> = self
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        PersistentAvlMapIntoIterator {
            entries,
            current_index: 0,
        }
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentAvlMap<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentAvlMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Clone + Ord, V: Clone + PartialEq> PartialEq for PersistentAvlMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }

        // Compare all entries
        for (key, value) in self {
            match other.get(key) {
                Some(other_value) if other_value == value => {}
                _ => return false,
            }
        }

        true
    }
}

impl<K: Clone + Ord, V: Clone + Eq> Eq for PersistentAvlMap<K, V> {}

/// Computes a hash value for this map.
///
/// The hash is computed by first hashing the length, then hashing each
/// (key, value) pair in key order. This ensures that:
///
/// - Maps with different sizes have different hashes (with high probability)
/// - The insertion order does not affect the hash value (since iteration is in key order)
/// - Equal maps produce equal hash values (Hash-Eq consistency)
///
/// # Examples
///
/// ```rust
/// use arbres::persistent::PersistentAvlMap;
/// use std::collections::HashMap;
///
/// let mut outer: HashMap<PersistentAvlMap<i32, String>, &str> = HashMap::new();
/// let key = PersistentAvlMap::new()
///     .insert(1, "one".to_string())
///     .insert(2, "two".to_string());
/// outer.insert(key.clone(), "value");
/// assert_eq!(outer.get(&key), Some(&"value"));
/// ```
impl<K, V> Hash for PersistentAvlMap<K, V>
where
    K: Clone + Ord + Hash,
    V: Clone + Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hash the length first to distinguish maps of different sizes
        self.len().hash(state);
        // Hash each entry in key order (iteration returns entries in key order)
        for (key, value) in self {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl<K: Clone + Ord + fmt::Debug, V: Clone + fmt::Debug> fmt::Debug for PersistentAvlMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Clone + Ord + fmt::Display, V: Clone + fmt::Display> fmt::Display
    for PersistentAvlMap<K, V>
{
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        let mut first = true;
        for (key, value) in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}: {value}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Tests
// =============================================================================


// =============================================================================
// Send + Sync Tests (arc feature only)
// =============================================================================


// =============================================================================
// Multithread Tests (arc feature only)
// =============================================================================
