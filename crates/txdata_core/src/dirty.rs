//! Dirty-position sets.

/// A set of top-level field positions that changed in a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    words: Vec<u64>,
}

impl DirtySet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a position. Returns true if it was not marked before.
    pub fn insert(&mut self, position: usize) -> bool {
        let (word, bit) = (position / 64, position % 64);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        let mask = 1u64 << bit;
        let fresh = self.words[word] & mask == 0;
        self.words[word] |= mask;
        fresh
    }

    /// Returns true if the position is marked.
    #[must_use]
    pub fn contains(&self, position: usize) -> bool {
        self.words
            .get(position / 64)
            .is_some_and(|w| w & (1u64 << (position % 64)) != 0)
    }

    /// Returns true if no position is marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Returns the number of marked positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Unmarks every position.
    pub fn clear(&mut self) {
        self.words.clear();
    }

    /// Iterates marked positions in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, w)| {
            (0..64).filter(move |b| w & (1u64 << b) != 0).map(move |b| i * 64 + b)
        })
    }
}

impl FromIterator<usize> for DirtySet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = Self::new();
        for position in iter {
            set.insert(position);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[test]
    fn insert_and_iterate() {
        let mut set = DirtySet::new();
        assert!(set.insert(3));
        assert!(set.insert(70));
        assert!(!set.insert(3));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![3, 70]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(70));
        assert!(!set.contains(4));
    }

    #[test]
    fn clear_empties() {
        let mut set: DirtySet = [1, 2].into_iter().collect();
        assert!(!set.is_empty());
        set.clear();
        assert!(set.is_empty());
        assert!(!set.contains(1));
    }

    proptest! {
        #[test]
        fn behaves_like_ordered_set(positions in prop::collection::vec(0usize..300, 0..64)) {
            let mut set = DirtySet::new();
            let mut model = BTreeSet::new();
            for position in positions {
                prop_assert_eq!(set.insert(position), model.insert(position));
            }
            prop_assert_eq!(set.len(), model.len());
            prop_assert_eq!(set.iter().collect::<Vec<_>>(), model.into_iter().collect::<Vec<_>>());
        }
    }
}
