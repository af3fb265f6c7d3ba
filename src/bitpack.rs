//! Bit-packed storage of arbitrary-width unsigned integers at arbitrary bit
//! offsets in a contiguous bitstream.
//!
//! Built on `bitvec`'s `BitField` extension (`store_be`/`load_be`) over
//! `Msb0`-ordered bit slices, the same mechanism genedex's own rank
//! structure uses for its per-block bit store
//! (`text_with_rank_support/block.rs`). Values are stored MSB-first
//! (`Msb0`), backed directly by a byte vector, so the byte stream
//! [`BitWriter::as_bytes`] produces and [`BitReader`] reads back is the
//! same contiguous MSB-first bitstring independent of host endianness —
//! there is no separate word-then-reinterpret-as-bytes step to keep in
//! sync. Widths from 1 up to 64 bits are supported, matching `BitField`'s
//! accumulator width.

use bitvec::field::BitField;
use bitvec::order::Msb0;
use bitvec::slice::BitSlice;
use bitvec::vec::BitVec;

use crate::error::{Error, Result};

/// An append-only bit-packed string used by the builder. Tracks its own
/// write cursor so callers can interleave fixed- and variable-width writes
/// without re-deriving offsets by hand.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bits: BitVec<u8, Msb0>,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len_bits(&self) -> u64 {
        self.bits.len() as u64
    }

    /// Appends a `width`-bit value (1..=64) to the end of the string.
    pub fn append(&mut self, width: u32, value: u64) {
        debug_assert!((1..=64).contains(&width));
        debug_assert!(width == 64 || value < (1u64 << width));
        let start = self.bits.len();
        self.bits.resize(start + width as usize, false);
        self.bits[start..start + width as usize].store_be(value);
    }

    /// Overwrites a `width`-bit value at an already-written bit offset.
    /// Used for prologue fields (partial sums, offsets) whose value is not
    /// known until the bucket they describe has been fully accumulated.
    pub fn overwrite(&mut self, bit_offset: u64, width: u32, value: u64) {
        debug_assert!((1..=64).contains(&width));
        let start = bit_offset as usize;
        let end = start + width as usize;
        debug_assert!(end as u64 <= self.bits.len());
        self.bits[start..end].store_be(value);
    }

    pub fn get(&self, bit_offset: u64, width: u32) -> u64 {
        debug_assert!((1..=64).contains(&width));
        let start = bit_offset as usize;
        self.bits[start..start + width as usize].load_be()
    }

    /// Returns the buffer as raw bytes: since the backing store is already
    /// byte-addressable MSB-first (`Msb0` order over `u8` elements), this
    /// is a direct copy with no per-word endian flip needed. Trailing bits
    /// that don't fill a whole byte are zero-padded.
    pub fn as_bytes(&self) -> Vec<u8> {
        self.bits.clone().into_vec()
    }
}

/// A read-only view over a packed bitstring backed by a byte slice (which
/// may be an mmap'd region). `bytes.len()` need not be a multiple of 8, and
/// a read may run past the end of `bytes` entirely; both cases logically
/// zero-extend.
pub struct BitReader<'a> {
    bits: &'a BitSlice<u8, Msb0>,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bits: BitSlice::from_slice(bytes),
        }
    }

    pub fn get(&self, bit_offset: u64, width: u32) -> u64 {
        debug_assert!((1..=64).contains(&width));
        let start = bit_offset as usize;
        let end = start + width as usize;
        let len = self.bits.len();

        if end <= len {
            self.bits[start..end].load_be()
        } else if start >= len {
            0
        } else {
            // the requested range straddles the end of the backing slice:
            // zero-extend the missing tail rather than panic, matching the
            // behavior of reading past an unwritten region.
            let mut tail: BitVec<u8, Msb0> = self.bits[start..].to_bitvec();
            tail.resize(width as usize, false);
            tail[..].load_be()
        }
    }
}

/// Stores `count` consecutive `width`-bit values, the uniform-array store
/// variant.
pub(crate) fn store_uniform_array(writer: &mut BitWriter, width: u32, values: impl IntoIterator<Item = u64>) {
    for v in values {
        writer.append(width, v);
    }
}

/// Fetches `counts.len()` consecutive `width`-bit values starting at
/// `bit_offset` from `reader` and adds them into `counts` (used to
/// accumulate composition counts into a running rank, the hot path of
/// `addSymCountsFromComposition`).
pub(crate) fn fetch_uniform_add_array(reader: &BitReader, bit_offset: u64, width: u32, counts: &mut [usize]) {
    for (i, c) in counts.iter_mut().enumerate() {
        *c += reader.get(bit_offset + i as u64 * width as u64, width) as usize;
    }
}

/// Computes `ceil(log2(n))`, the bit width needed to store `n` distinct
/// values (n >= 1). `bit_width(1) == 0`.
pub fn bit_width(n: u64) -> u32 {
    if n <= 1 {
        0
    } else {
        (n - 1).ilog2() + 1
    }
}

pub(crate) fn checked_bit_width(n: u64, what: &str) -> Result<u32> {
    if n == 0 {
        return Err(Error::config(format!("{what} must be nonzero")));
    }
    Ok(bit_width(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn round_trip_single_values() {
        let mut w = BitWriter::new();
        w.append(3, 0b101);
        w.append(64, u64::MAX);
        w.append(1, 1);
        w.append(7, 0);
        w.append(5, 0b10110 & 0b11111);

        assert_eq!(w.get(0, 3), 0b101);
        assert_eq!(w.get(3, 64), u64::MAX);
        assert_eq!(w.get(67, 1), 1);
        assert_eq!(w.get(68, 7), 0);
        assert_eq!(w.get(75, 5), 0b10110 & 0b11111);
    }

    #[test]
    fn cross_word_boundary() {
        let mut w = BitWriter::new();
        // push 60 bits of zero padding then a 20-bit value straddling a
        // byte boundary midway through
        w.append(60, 0);
        w.append(20, 0xABCDE & ((1 << 20) - 1));
        assert_eq!(w.get(60, 20), 0xABCDE & ((1 << 20) - 1));
    }

    #[test]
    fn bit_reader_matches_writer_bytes() {
        let mut w = BitWriter::new();
        w.append(9, 300);
        w.append(40, 123456789);
        w.append(3, 5);

        let bytes = w.as_bytes();
        let r = BitReader::new(&bytes);
        assert_eq!(r.get(0, 9), 300);
        assert_eq!(r.get(9, 40), 123456789);
        assert_eq!(r.get(49, 3), 5);
    }

    #[test]
    fn bit_reader_zero_extends_past_buffer() {
        let mut w = BitWriter::new();
        w.append(8, 0xFF);
        let bytes = w.as_bytes();
        let r = BitReader::new(&bytes);
        // entirely past the buffer
        assert_eq!(r.get(64, 16), 0);
        // straddles the end of the buffer
        assert_eq!(r.get(4, 16), 0xF00);
    }

    #[test]
    fn overwrite_prologue_field() {
        let mut w = BitWriter::new();
        w.append(32, 0);
        w.append(8, 0xFF);
        w.overwrite(0, 32, 424242);
        assert_eq!(w.get(0, 32), 424242);
        assert_eq!(w.get(32, 8), 0xFF);
    }

    #[test]
    fn uniform_array_round_trips() {
        let mut w = BitWriter::new();
        store_uniform_array(&mut w, 5, [3u64, 17, 31, 0, 9]);
        let bytes = w.as_bytes();
        let r = BitReader::new(&bytes);
        let mut counts = vec![0usize; 5];
        fetch_uniform_add_array(&r, 0, 5, &mut counts);
        assert_eq!(counts, vec![3, 17, 31, 0, 9]);
        // adding again should accumulate, not overwrite
        fetch_uniform_add_array(&r, 0, 5, &mut counts);
        assert_eq!(counts, vec![6, 34, 62, 0, 18]);
    }

    #[test]
    fn bit_width_matches_ceil_log2() {
        assert_eq!(bit_width(1), 0);
        assert_eq!(bit_width(2), 1);
        assert_eq!(bit_width(3), 2);
        assert_eq!(bit_width(4), 2);
        assert_eq!(bit_width(5), 3);
        assert_eq!(bit_width(256), 8);
        assert_eq!(bit_width(257), 9);
    }

    #[test]
    fn checked_bit_width_rejects_zero() {
        assert!(checked_bit_width(0, "alphabet size").is_err());
        assert_eq!(checked_bit_width(1, "alphabet size").unwrap(), 0);
    }

    proptest! {
        #[test]
        fn prop_round_trip(values in prop::collection::vec((1u32..=64u32, any::<u64>()), 0..200)) {
            let mut w = BitWriter::new();
            let mut offsets = Vec::new();
            for &(width, value) in &values {
                let masked = if width == 64 { value } else { value & ((1u64 << width) - 1) };
                offsets.push((w.len_bits(), width, masked));
                w.append(width, masked);
            }
            for (offset, width, expected) in offsets {
                prop_assert_eq!(w.get(offset, width), expected);
            }
        }
    }
}
