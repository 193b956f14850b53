//! Sorted, unique-by-id collection.
//!
//! [`SortedIndex`] keeps its items ordered by a comparator while also
//! maintaining an `id → position` map, so lookups by id are O(1) and
//! positional access stays valid after every mutation.
//!
//! # Invariants
//!
//! After any sequence of [`SortedIndex::add`] / [`SortedIndex::delete`]:
//!
//! - items are sorted according to the comparator
//! - `index.at(index.position_of(id)?)` is the item with that id
//! - no two items share an id
//!
//! Mutations are O(log n) to locate the splice point plus O(n) to shift the
//! recorded positions. Entity counts are in the hundreds, so that is fine.
//!
//! # Example
//!
//! ```
//! use cruisemap::index::{Keyed, SortedIndex};
//!
//! struct Item { id: String, rank: u32 }
//! impl Keyed for Item {
//!     fn id(&self) -> &str { &self.id }
//! }
//!
//! let mut index = SortedIndex::new(|a: &Item, b: &Item| a.rank.cmp(&b.rank));
//! index.add(Item { id: "b".into(), rank: 2 });
//! index.add(Item { id: "a".into(), rank: 1 });
//!
//! assert_eq!(index.at(0).map(|i| i.id.as_str()), Some("a"));
//! assert_eq!(index.position_of("b"), Some(1));
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Anything addressable by a string id.
pub trait Keyed {
    /// The unique id. An empty id marks the item as invalid.
    fn id(&self) -> &str;
}

impl<T: Keyed + ?Sized> Keyed for Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }
}

/// Comparator used to order a [`SortedIndex`].
pub type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Ordered collection with unique ids and O(1) id lookup.
pub struct SortedIndex<T: Keyed> {
    compare: Comparator<T>,
    items: Vec<T>,
    positions: HashMap<String, usize>,
}

impl<T: Keyed> SortedIndex<T> {
    /// Creates an empty index ordered by `compare`.
    pub fn new<F>(compare: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self {
            compare: Box::new(compare),
            items: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Creates an index from an initial set of items.
    ///
    /// Items with an empty id are dropped. Later duplicates of an id replace
    /// earlier ones.
    pub fn from_items<F, I>(compare: F, items: I) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        let mut index = Self::new(compare);
        for item in items {
            index.add(item);
        }
        index
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the index holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Looks up an item by id.
    pub fn item(&self, id: &str) -> Option<&T> {
        self.positions.get(id).and_then(|&pos| self.items.get(pos))
    }

    /// Returns the item at a sorted position.
    pub fn at(&self, position: usize) -> Option<&T> {
        self.items.get(position)
    }

    /// Returns the sorted position of an id.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Returns true if an item with this id is present.
    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Adds or replaces an item, keeping sort order.
    ///
    /// - empty id: ignored
    /// - id present and comparator-equal to the stored item: replaced in place
    /// - id present but sorting elsewhere: removed, then reinserted
    ///
    /// New items are placed after every comparator-equal item already stored.
    ///
    /// Returns the number of items after the operation.
    pub fn add(&mut self, item: T) -> usize {
        if item.id().is_empty() {
            return self.items.len();
        }

        if let Some(&pos) = self.positions.get(item.id()) {
            if (self.compare)(&self.items[pos], &item) == Ordering::Equal {
                self.items[pos] = item;
                return self.items.len();
            }
            let id = item.id().to_string();
            self.delete(&id);
        }

        let insert_at = self.insertion_point(&item);
        for pos in self.positions.values_mut() {
            if *pos >= insert_at {
                *pos += 1;
            }
        }
        self.positions.insert(item.id().to_string(), insert_at);
        self.items.insert(insert_at, item);

        self.items.len()
    }

    /// Removes an item by id, returning it.
    pub fn delete(&mut self, id: &str) -> Option<T> {
        let pos = self.positions.remove(id)?;
        let removed = self.items.remove(pos);
        for other in self.positions.values_mut() {
            if *other > pos {
                *other -= 1;
            }
        }
        Some(removed)
    }

    /// Iterates items in sorted order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Items matching a predicate, in sorted order.
    pub fn filter<P>(&self, mut predicate: P) -> Vec<&T>
    where
        P: FnMut(&T) -> bool,
    {
        self.items.iter().filter(|item| predicate(item)).collect()
    }

    /// Sorted items as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Binary search for the splice point, advancing past equal items.
    fn insertion_point(&self, item: &T) -> usize {
        let mut left = 0usize;
        let mut right = self.items.len();
        while left < right {
            let mid = left + (right - left) / 2;
            match (self.compare)(&self.items[mid], item) {
                Ordering::Equal => {
                    let mut pos = mid + 1;
                    while pos < self.items.len()
                        && (self.compare)(&self.items[pos], item) == Ordering::Equal
                    {
                        pos += 1;
                    }
                    return pos;
                }
                Ordering::Less => left = mid + 1,
                Ordering::Greater => right = mid,
            }
        }
        left
    }
}

impl<'a, T: Keyed> IntoIterator for &'a SortedIndex<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Keyed> fmt::Debug for SortedIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortedIndex")
            .field("len", &self.items.len())
            .finish_non_exhaustive()
    }
}
