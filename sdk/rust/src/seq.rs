//! Circular sequence-number arithmetic.
//!
//! All window tests go through modular distance so that a window which wraps
//! past the end of the space (`base > next` numerically) behaves the same as
//! one that does not.

/// A circular space of `size` sequence numbers, `0..size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceSpace {
    size: usize,
}

impl SequenceSpace {
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "sequence space must not be empty");
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn next(&self, seq: usize) -> usize {
        (seq + 1) % self.size
    }

    pub fn prev(&self, seq: usize) -> usize {
        (seq + self.size - 1) % self.size
    }

    /// Steps needed to walk forward from `from` to `to`.
    pub fn distance(&self, from: usize, to: usize) -> usize {
        (to + self.size - from % self.size) % self.size
    }

    /// Whether `seq` lies in the `width` numbers starting at `base`.
    pub fn contains(&self, seq: usize, base: usize, width: usize) -> bool {
        seq < self.size && self.distance(base, seq) < width
    }

    /// Map a header field to a slot index, rejecting values outside the space
    /// (sentinels, corrupted fields).
    pub fn index(&self, raw: i32) -> Option<usize> {
        usize::try_from(raw).ok().filter(|&seq| seq < self.size)
    }
}
