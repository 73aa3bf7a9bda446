//! Fixed size bit-set recording which component types an entity owns.

/// Number of distinct component types representable in one domain.
pub const MAX_COMPONENTS: usize = 64;

/// Fixed size bit-set, one bit per registered component type.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitSet {
    bits: u64,
}

impl BitSet {
    /// Create a new BitSet with *ZERO* bit.
    #[inline]
    pub fn new() -> Self {
        BitSet { bits: 0 }
    }

    /// Adds a value to the set.
    #[inline]
    pub fn insert(&mut self, index: usize) {
        self.bits |= Self::bit(index);
    }

    /// Removes a value from the set.
    #[inline]
    pub fn remove(&mut self, index: usize) {
        self.bits &= !Self::bit(index);
    }

    /// Returns `true` if this set contains the specified integer.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        (self.bits & Self::bit(index)) != 0
    }

    /// Clears all bits in this set.
    #[inline]
    pub fn clear(&mut self) {
        self.bits = 0;
    }

    /// Returns whether there are no bits set in this set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Returns the number of bits set.
    #[inline]
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Returns true if every bit of `rhs` is also set in self.
    #[inline]
    pub fn is_superset(&self, rhs: &Self) -> bool {
        (self.bits & rhs.bits) == rhs.bits
    }

    /// Returns true if self and `rhs` have no bit in common.
    #[inline]
    pub fn is_disjoint(&self, rhs: &Self) -> bool {
        (self.bits & rhs.bits) == 0
    }

    /// Returns an bit-set that intersect self with `rhs`.
    #[inline]
    pub fn intersect_with(&self, rhs: &Self) -> Self {
        BitSet {
            bits: self.bits & rhs.bits,
        }
    }

    /// Returns an bit-set that union self with `rhs`.
    #[inline]
    pub fn union_with(&self, rhs: &Self) -> Self {
        BitSet {
            bits: self.bits | rhs.bits,
        }
    }

    /// Returns an iterator into this bit-set.
    #[inline]
    pub fn iter(&self) -> BitSetIter {
        BitSetIter { bits: self.bits }
    }

    #[inline]
    fn bit(index: usize) -> u64 {
        assert!(
            index < MAX_COMPONENTS,
            "Too many components. (MAX_COMPONENTS: {:?})",
            MAX_COMPONENTS
        );

        1 << index
    }
}

impl<'a> From<&'a [usize]> for BitSet {
    fn from(indices: &'a [usize]) -> Self {
        let mut bits = BitSet::new();
        for &v in indices {
            bits.insert(v);
        }
        bits
    }
}

pub struct BitSetIter {
    bits: u64,
}

impl Iterator for BitSetIter {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bits == 0 {
            return None;
        }

        let index = self.bits.trailing_zeros() as usize;
        self.bits &= self.bits - 1;
        Some(index)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn basic() {
        let mut bits = BitSet::new();

        assert!(!bits.contains(5));

        bits.insert(5);
        assert!(bits.contains(5));

        bits.insert(9);
        assert!(bits.contains(9));
        assert!(!bits.contains(12));

        bits.insert(63);
        assert!(bits.contains(63));

        bits.insert(5);
        assert!(bits.contains(5));
        assert_eq!(bits.len(), 3);

        bits.remove(5);
        assert!(!bits.contains(5));
        assert!(bits.contains(9));
        assert!(bits.contains(63));

        bits.clear();
        assert!(bits.is_empty());
    }

    #[test]
    fn superset() {
        let lhs = BitSet::from(&[1, 3, 9][..]);
        let rhs = BitSet::from(&[3, 9][..]);

        assert!(lhs.is_superset(&rhs));
        assert!(!rhs.is_superset(&lhs));
        assert!(lhs.is_superset(&BitSet::new()));
        assert!(!lhs.is_disjoint(&rhs));

        let v = lhs.intersect_with(&BitSet::from(&[2, 3, 10][..]));
        assert_eq!(v.iter().collect::<Vec<_>>(), vec![3]);
        assert_eq!(
            lhs.union_with(&BitSet::from(&[0][..])).iter().collect::<Vec<_>>(),
            vec![0, 1, 3, 9]
        );
    }

    #[test]
    #[should_panic]
    fn overflow() {
        let mut bits = BitSet::new();
        bits.insert(MAX_COMPONENTS);
    }
}
