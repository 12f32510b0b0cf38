//! Fixed-width bitset over component indices.
//!
//! Backed by a growable `Vec<u64>`, same "no bloat" approach as the
//! original `BitSet` this is adapted from, extended with a superset test:
//! table-matches-system reduces to "does this table's bitset contain every
//! bit the system's match bitset requires".

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitset {
    words: Vec<u64>,
}

impl Bitset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(64)],
        }
    }

    pub fn set(&mut self, index: usize) {
        let (word, bit) = (index / 64, index % 64);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << bit;
    }

    pub fn is_set(&self, index: usize) -> bool {
        let (word, bit) = (index / 64, index % 64);
        self.words.get(word).is_some_and(|w| (w & (1u64 << bit)) != 0)
    }

    /// `self` is superset-or-equal of `required`: every bit set in
    /// `required` is also set in `self`.
    pub fn is_superset_of(&self, required: &Bitset) -> bool {
        for (i, &req) in required.words.iter().enumerate() {
            let mine = self.words.get(i).copied().unwrap_or(0);
            if mine & req != req {
                return false;
            }
        }
        true
    }
}
