//! The minterm character algebra ("solver").
//!
//! A minterm is a maximal class of bytes that every predicate in a pattern
//! treats identically. `compute_minterms` refines the byte space by the set
//! of distinct `ByteSet` classes a pattern uses; the resulting partition is
//! small, so a predicate over the partition fits in a `u64` mask with one
//! bit per minterm. All derivative and nullability computation downstream
//! operates on those masks.
//!
//! The all-zero mask is reserved: it is the algebra's `False`, which the
//! matching automaton uses as a sentinel for "the final line terminator of
//! the input" (see `MatchingState::next_char_kind`).

use crate::byteset::ByteSet;

/// A predicate over the minterm partition: bit `i` set means minterm `i`
/// is included.
pub type MintermSet = u64;

/// Most minterms a single pattern may induce, bounded by the mask width.
pub const MAX_MINTERMS: usize = 64;

/// Character-algebra operations the automaton core depends on.
///
/// Equality of predicates is `Eq` on `Pred`; `empty` is the distinguished
/// `False` value reserved as the final-line-terminator sentinel.
pub trait MintermAlgebra: Send + Sync {
    type Pred: Clone + Eq + std::hash::Hash + Send + Sync;

    /// The unsatisfiable predicate (`False`).
    fn empty(&self) -> Self::Pred;

    /// Conjunction of two predicates.
    fn and(&self, a: &Self::Pred, b: &Self::Pred) -> Self::Pred;

    /// Whether any byte satisfies the predicate.
    fn is_satisfiable(&self, p: &Self::Pred) -> bool;
}

/// Partition the byte space by a collection of classes.
///
/// Starts from the single block of all bytes and splits each block by each
/// class in turn. Every input class is then a union of output blocks, and
/// the blocks are pairwise disjoint and cover all 256 byte values. Order of
/// the result is deterministic for a given input order.
pub fn compute_minterms(classes: &[ByteSet]) -> Vec<ByteSet> {
    let mut blocks = vec![ByteSet::FULL];
    for class in classes {
        let mut refined = Vec::with_capacity(blocks.len() * 2);
        for block in &blocks {
            let inside = block.intersect(class);
            let outside = block.intersect(&class.complement());
            if !inside.is_empty() {
                refined.push(inside);
            }
            if !outside.is_empty() {
                refined.push(outside);
            }
        }
        blocks = refined;
    }
    blocks
}

/// The concrete algebra over a computed minterm partition.
///
/// Predicates are `MintermSet` masks. A byte-to-minterm classifier table
/// gives O(1) translation of input bytes to minterm ids during matching.
pub struct MintermSetAlgebra {
    minterms: Vec<ByteSet>,
    classifier: [u8; 256],
    full: MintermSet,
}

impl MintermSetAlgebra {
    /// Build the algebra from a minterm partition.
    ///
    /// The partition must be pairwise disjoint and cover all byte values,
    /// with at most [`MAX_MINTERMS`] blocks; `compute_minterms` guarantees
    /// the first two properties, the compiler checks the third.
    pub fn new(minterms: Vec<ByteSet>) -> Self {
        debug_assert!(!minterms.is_empty() && minterms.len() <= MAX_MINTERMS);
        let mut classifier = [0u8; 256];
        for (id, mt) in minterms.iter().enumerate() {
            for b in mt.iter() {
                classifier[b as usize] = id as u8;
            }
        }
        let full = if minterms.len() == 64 {
            u64::MAX
        } else {
            (1u64 << minterms.len()) - 1
        };
        MintermSetAlgebra {
            minterms,
            classifier,
            full,
        }
    }

    /// Number of minterms in the partition.
    #[inline]
    pub fn minterm_count(&self) -> usize {
        self.minterms.len()
    }

    /// The minterm id an input byte belongs to.
    #[inline]
    pub fn minterm_id(&self, b: u8) -> u32 {
        self.classifier[b as usize] as u32
    }

    /// The predicate holding exactly one minterm.
    #[inline]
    pub fn mask_of(&self, id: u32) -> MintermSet {
        1u64 << id
    }

    /// Translate a byte class to the mask of minterms it covers.
    ///
    /// Minterms are either contained in the class or disjoint from it, so
    /// "intersects" and "is contained in" coincide here.
    pub fn translate(&self, class: &ByteSet) -> MintermSet {
        let mut mask = 0u64;
        for (id, mt) in self.minterms.iter().enumerate() {
            if !mt.intersect(class).is_empty() {
                mask |= 1u64 << id;
            }
        }
        mask
    }

    /// The predicate satisfied by every byte.
    #[inline]
    pub fn full(&self) -> MintermSet {
        self.full
    }
}

impl MintermAlgebra for MintermSetAlgebra {
    type Pred = MintermSet;

    #[inline]
    fn empty(&self) -> MintermSet {
        0
    }

    #[inline]
    fn and(&self, a: &MintermSet, b: &MintermSet) -> MintermSet {
        a & b
    }

    #[inline]
    fn is_satisfiable(&self, p: &MintermSet) -> bool {
        *p != 0
    }
}
