//! Fixed-capacity condition register
//!
//! A register is a plain value: 64 words of 64 bits, one bit per condition.
//! Bit value 1 means CLOSED, 0 means OPEN.
//!
//! INVARIANTS:
//! - Every index satisfies `index < CAPACITY`; anything else panics.
//! - Transitions are applied strictly in the order given, so repeated indices
//!   within one batch observe each other's effect.

use bitvec::prelude::*;
use std::fmt;

/// Bits per register word
pub const WORD_BITS: usize = 64;

/// Number of words in a register
pub const WORDS: usize = 64;

/// Total addressable conditions
pub const CAPACITY: usize = WORDS * WORD_BITS;

/// Word storage: bit `i` lives in word `i / 64` at position `i % 64`
type Bits = BitArray<[u64; WORDS], Lsb0>;

/// Validates a condition index.
///
/// # Panics
/// Panics if `index >= CAPACITY`. An out-of-range index is a programming
/// error and is never truncated or wrapped.
#[inline]
fn checked(index: usize) -> usize {
    assert!(
        index < CAPACITY,
        "condition index {index} out of range: a register holds no more than {CAPACITY} conditions"
    );
    index
}

/// Bitset holding the OPEN/CLOSED state of every condition
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Register {
    bits: Bits,
}

impl Default for Register {
    fn default() -> Self {
        Self::new()
    }
}

impl Register {
    /// Register with every condition OPEN
    pub fn new() -> Self {
        Self { bits: Bits::ZERO }
    }

    /// Register with every condition CLOSED
    pub fn all_closed_register() -> Self {
        Self {
            bits: Bits::new([u64::MAX; WORDS]),
        }
    }

    /// Raw words, word 0 holding conditions 0..64
    pub fn words(&self) -> &[u64] {
        self.bits.as_raw_slice()
    }

    /// Close every index in order.
    ///
    /// Returns the new register and the indices whose bit was 0 immediately
    /// before being set. A duplicate only reports its first real transition.
    #[must_use]
    pub fn close(mut self, indices: &[usize]) -> (Register, Vec<usize>) {
        let mut changed = Vec::with_capacity(indices.len());
        for &index in indices {
            if !self.bits.replace(checked(index), true) {
                changed.push(index);
            }
        }
        (self, changed)
    }

    /// Open every index in order. Symmetric to [`Register::close`].
    #[must_use]
    pub fn open(mut self, indices: &[usize]) -> (Register, Vec<usize>) {
        let mut changed = Vec::with_capacity(indices.len());
        for &index in indices {
            if self.bits.replace(checked(index), false) {
                changed.push(index);
            }
        }
        (self, changed)
    }

    /// Flip every index in order.
    ///
    /// Returns the new register, the indices flipped 0→1 (closed) and the
    /// indices flipped 1→0 (opened). An index given twice flips twice.
    #[must_use]
    pub fn toggle(mut self, indices: &[usize]) -> (Register, Vec<usize>, Vec<usize>) {
        let mut closed = Vec::new();
        let mut opened = Vec::new();
        for &index in indices {
            let index = checked(index);
            let was_closed = self.bits[index];
            self.bits.set(index, !was_closed);
            if was_closed {
                opened.push(index);
            } else {
                closed.push(index);
            }
        }
        (self, closed, opened)
    }

    /// True when the condition is CLOSED
    pub fn closed(&self, index: usize) -> bool {
        self.bits[checked(index)]
    }

    /// True when the condition is OPEN
    pub fn opened(&self, index: usize) -> bool {
        !self.closed(index)
    }

    /// True when every index is CLOSED (vacuously true for an empty slice)
    pub fn all_closed(&self, indices: &[usize]) -> bool {
        indices.iter().all(|&i| self.closed(i))
    }

    /// True when at least one index is CLOSED
    pub fn any_closed(&self, indices: &[usize]) -> bool {
        indices.iter().any(|&i| self.closed(i))
    }

    /// True when every index is OPEN (vacuously true for an empty slice)
    pub fn all_opened(&self, indices: &[usize]) -> bool {
        indices.iter().all(|&i| self.opened(i))
    }

    /// True when at least one index is OPEN
    pub fn any_opened(&self, indices: &[usize]) -> bool {
        indices.iter().any(|&i| self.opened(i))
    }

    /// Number of CLOSED conditions
    pub fn count_closed(&self) -> usize {
        self.bits.count_ones()
    }

    /// Iterate CLOSED indices in ascending order
    pub fn iter_closed(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter_ones()
    }

    /// Diagnostic dump: one row per word, highest word first.
    ///
    /// Each row is the word number left-aligned in five columns followed by
    /// the word as 64 binary digits, most significant bit first.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, word) in self.bits.as_raw_slice().iter().enumerate().rev() {
            writeln!(f, "{:<5}{:064b}", row, word)?;
        }
        Ok(())
    }
}
