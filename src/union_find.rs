//! Union-Find (Disjoint Set Union) over arbitrary hashable keys.
//!
//! Keys are interned into dense indices so the forest itself is two flat
//! vectors. Used to compute connected components of the routing graph and of
//! the oracle's network graph.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Union-Find with path halving and union by size.
///
/// # Example
/// ```
/// use trail_router::UnionFind;
///
/// let mut uf = UnionFind::new();
/// uf.union(&1u64, &2u64);
/// uf.make_set(3u64);
/// assert!(uf.connected(&1, &2));
/// assert!(!uf.connected(&1, &3));
/// assert_eq!(uf.component_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct UnionFind<T: Eq + Hash + Clone> {
    index: HashMap<T, usize>,
    keys: Vec<T>,
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl<T: Eq + Hash + Clone> Default for UnionFind<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash + Clone> UnionFind<T> {
    /// Create a new empty Union-Find structure.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a Union-Find with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            keys: Vec::with_capacity(capacity),
            parent: Vec::with_capacity(capacity),
            size: Vec::with_capacity(capacity),
        }
    }

    /// Add `item` as its own set (no-op if already present). Returns its slot.
    pub fn make_set(&mut self, item: T) -> usize {
        if let Some(&slot) = self.index.get(&item) {
            return slot;
        }
        let slot = self.keys.len();
        self.index.insert(item.clone(), slot);
        self.keys.push(item);
        self.parent.push(slot);
        self.size.push(1);
        slot
    }

    fn root(&mut self, mut slot: usize) -> usize {
        while self.parent[slot] != slot {
            // Path halving
            self.parent[slot] = self.parent[self.parent[slot]];
            slot = self.parent[slot];
        }
        slot
    }

    /// Find the representative of the set containing `item`, adding it if unknown.
    pub fn find(&mut self, item: &T) -> T {
        let slot = self.make_set(item.clone());
        let root = self.root(slot);
        self.keys[root].clone()
    }

    /// Union the sets containing `a` and `b`.
    ///
    /// Returns true if the sets were different (union performed).
    pub fn union(&mut self, a: &T, b: &T) -> bool {
        let slot_a = self.make_set(a.clone());
        let slot_b = self.make_set(b.clone());
        let mut root_a = self.root(slot_a);
        let mut root_b = self.root(slot_b);
        if root_a == root_b {
            return false;
        }
        if self.size[root_a] < self.size[root_b] {
            std::mem::swap(&mut root_a, &mut root_b);
        }
        self.parent[root_b] = root_a;
        self.size[root_a] += self.size[root_b];
        true
    }

    /// Check if two elements are in the same set.
    pub fn connected(&mut self, a: &T, b: &T) -> bool {
        match (self.index.get(a).copied(), self.index.get(b).copied()) {
            (Some(sa), Some(sb)) => self.root(sa) == self.root(sb),
            _ => a == b,
        }
    }

    /// Number of distinct sets.
    pub fn component_count(&mut self) -> usize {
        (0..self.keys.len()).filter(|&s| self.root(s) == s).count()
    }

    /// Get all sets as a map from representative -> members.
    pub fn groups(&mut self) -> HashMap<T, Vec<T>> {
        let mut groups: HashMap<T, Vec<T>> = HashMap::new();
        for slot in 0..self.keys.len() {
            let root = self.root(slot);
            groups
                .entry(self.keys[root].clone())
                .or_default()
                .push(self.keys[slot].clone());
        }
        groups
    }

    /// Dense component labels in insertion order of each component's first
    /// member: the first key ever added is in component 0, and so on.
    pub fn component_labels(&mut self) -> Vec<(T, usize)> {
        let mut label_of_root: BTreeMap<usize, usize> = BTreeMap::new();
        let mut labels = Vec::with_capacity(self.keys.len());
        for slot in 0..self.keys.len() {
            let root = self.root(slot);
            let next = label_of_root.len();
            let label = *label_of_root.entry(root).or_insert(next);
            labels.push((self.keys[slot].clone(), label));
        }
        labels
    }

    /// Get the number of elements in the structure.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if the structure is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let mut uf: UnionFind<u64> = UnionFind::new();
        uf.make_set(1);
        uf.make_set(2);
        uf.make_set(3);

        assert!(!uf.connected(&1, &2));
        assert!(uf.union(&1, &2));
        assert!(!uf.union(&2, &1));
        assert!(uf.connected(&1, &2));
        assert!(!uf.connected(&1, &3));
        assert_eq!(uf.component_count(), 2);
    }

    #[test]
    fn test_long_chain_collapses() {
        let mut uf: UnionFind<u64> = UnionFind::new();
        for i in 0..100 {
            uf.union(&i, &(i + 1));
        }
        let root = uf.find(&0);
        assert_eq!(uf.find(&100), root);
        assert_eq!(uf.component_count(), 1);
        assert_eq!(uf.len(), 101);
    }

    #[test]
    fn test_component_labels_are_dense_and_ordered() {
        let mut uf: UnionFind<&str> = UnionFind::new();
        uf.make_set("a");
        uf.make_set("x");
        uf.union(&"a", &"b");
        uf.union(&"x", &"y");

        let labels: HashMap<&str, usize> = uf.component_labels().into_iter().collect();
        assert_eq!(labels["a"], 0);
        assert_eq!(labels["b"], 0);
        assert_eq!(labels["x"], 1);
        assert_eq!(labels["y"], 1);
        assert_eq!(uf.groups().len(), 2);
    }
}
