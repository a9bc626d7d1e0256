//! Fixed-width bitmaps over `u32` words.
//!
//! Used for terminal read-sets and NFA-node membership. Two sets of the
//! same width compare equal iff they hold the same members, which is what
//! DFA duplicate-state suppression relies on.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitSet {
    nbits: usize,
    words: Vec<u32>,
}

impl BitSet {
    /// An empty set over the universe `0..nbits`.
    pub fn new(nbits: usize) -> Result<Self> {
        let nwords = nbits
            .checked_add(31)
            .ok_or(Error::SizeOverflow)?
            / 32;
        Ok(Self {
            nbits,
            words: vec![0; nwords],
        })
    }

    pub fn len(&self) -> usize {
        self.nbits
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    #[inline]
    pub fn set(&mut self, i: usize) {
        debug_assert!(i < self.nbits);
        self.words[i / 32] |= 1 << (i % 32);
    }

    #[inline]
    pub fn test(&self, i: usize) -> bool {
        debug_assert!(i < self.nbits);
        self.words[i / 32] & (1 << (i % 32)) != 0
    }

    pub fn clear(&mut self) {
        for w in &mut self.words {
            *w = 0;
        }
    }

    /// Union `other` into `self`; reports whether any bit changed.
    /// Both sets must share a universe.
    pub fn union_with(&mut self, other: &BitSet) -> bool {
        debug_assert_eq!(self.nbits, other.nbits);
        let mut changed = false;
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            let prev = *a;
            *a |= b;
            changed |= *a != prev;
        }
        changed
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate over set members in ascending order.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &w)| {
            (0..32)
                .filter(move |b| w & (1 << b) != 0)
                .map(move |b| wi * 32 + b)
        })
    }
}
