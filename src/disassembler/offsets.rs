//! Bitfield set of bytecode offsets.
//!
//! [`OffsetSet`] records which offsets of a code array start an instruction or are the target
//! of a branch. Both questions are asked for every offset of every method, so the set packs
//! one bit per offset instead of hashing.

/// A fixed-capacity set of code offsets.
pub struct OffsetSet {
    data: Vec<usize>,
    elements: usize,
}

const BITS: usize = usize::BITS as usize;

impl OffsetSet {
    /// Create an empty set able to hold offsets `0..elements`.
    pub fn new(elements: usize) -> OffsetSet {
        OffsetSet {
            data: vec![0_usize; elements.div_ceil(BITS)],
            elements,
        }
    }

    /// Capacity of the set.
    pub fn len(&self) -> usize {
        self.elements
    }

    /// Whether the set has no capacity.
    pub fn is_empty(&self) -> bool {
        self.elements == 0
    }

    /// Whether `offset` is part of the set. Offsets beyond the capacity never are.
    pub fn contains(&self, offset: usize) -> bool {
        if offset >= self.elements {
            return false;
        }

        self.data
            .get(offset / BITS)
            .is_some_and(|bitfield| (bitfield >> (offset % BITS)) & 1 != 0)
    }

    /// Add `offset`, returning `false` if it lies beyond the capacity.
    pub fn insert(&mut self, offset: usize) -> bool {
        if offset >= self.elements {
            return false;
        }

        match self.data.get_mut(offset / BITS) {
            Some(bitfield) => {
                *bitfield |= 1_usize << (offset % BITS);
                true
            }
            None => false,
        }
    }

    /// Iterate the offsets in the set in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, bitfield)| **bitfield != 0)
            .flat_map(|(word, bitfield)| {
                (0..BITS)
                    .filter(move |bit| (bitfield >> bit) & 1 != 0)
                    .map(move |bit| word * BITS + bit)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_contains() {
        let mut set = OffsetSet::new(200);
        assert_eq!(set.len(), 200);
        assert!(set.insert(0));
        assert!(set.insert(64));
        assert!(set.insert(199));
        assert!(!set.insert(200));

        assert!(set.contains(0));
        assert!(set.contains(64));
        assert!(!set.contains(63));
        assert!(!set.contains(500));
    }

    #[test]
    fn test_iter_sorted() {
        let mut set = OffsetSet::new(4096);
        for offset in [4000, 3, 128, 127, 64] {
            set.insert(offset);
        }
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![3, 64, 127, 128, 4000]);
        assert!(OffsetSet::new(0).is_empty());
    }
}
