//! The multi-range alphabet: a partition of the input alphabet into
//! disjoint ranges, each handled by a different on-disk encoding strategy.
//!
//! The partition into dense/region-list ranges is a build-time parameter
//! here, not a property fixed by the choice of Rust type, so the mapping
//! is a runtime value rather than a compile-time translation table.

use crate::error::{Error, Result};

/// How one alphabet range is stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeMode {
    /// Dense: every occurrence of a symbol in this range is folded into the
    /// block composition/permutation encoding.
    BlockComposition,
    /// Sparse: every occurrence of a symbol in this range is stored as a
    /// `(position, length, symbol)` run in the sequence range list.
    RegionList,
}

/// A contiguous sub-interval of internal symbol ids handled by one
/// [`RangeMode`].
#[derive(Debug, Clone, Copy)]
pub struct RangeDescriptor {
    pub mode: RangeMode,
    pub start: u8,
    pub len: u8,
}

impl RangeDescriptor {
    pub fn end(&self) -> u8 {
        self.start + self.len
    }
}

/// The full alphabet partition: an input-symbol -> internal-symbol mapping
/// plus the ranges that subdivide the internal symbols.
///
/// Symbol 0 is reserved for the sequence terminator and is never part of
/// any user-supplied range.
#[derive(Debug, Clone)]
pub struct AlphabetPartition {
    /// io byte -> internal symbol id, or `255` for "not in alphabet".
    to_internal: [u8; 256],
    /// internal symbol id -> io byte, for the reverse mapping.
    to_io: Vec<u8>,
    ranges: Vec<RangeDescriptor>,
    /// One fallback symbol per mode, used by the encoder for symbols that
    /// escape their range during bitstring encoding.
    block_fallback: u8,
    region_fallback: u8,
}

impl AlphabetPartition {
    /// Reconstructs a partition purely from its range descriptors, as
    /// stored in the `.bdx` header. The io-byte mapping is lost on disk
    /// (the format only needs internal symbol ids to re-derive ranks), so
    /// the reconstructed `to_internal`/`to_io` tables are identity-ish
    /// placeholders: every operation the reader needs (`mode_of`,
    /// `range_of`, `dense_secondary_mapping`, `block_fallback`,
    /// `region_fallback`) depends only on internal ids and ranges, never
    /// on the original io bytes.
    pub fn from_ranges(ranges: &[RangeDescriptor]) -> Result<Self> {
        let size = ranges.iter().map(|r| r.end() as usize).max().unwrap_or(0) + 1;
        let mut to_internal = [255u8; 256];
        let mut to_io = vec![0u8; size];
        for i in 0..size.min(256) {
            to_internal[i] = i as u8;
            to_io[i] = i as u8;
        }

        let block_fallback = ranges
            .iter()
            .find(|r| r.mode == RangeMode::BlockComposition)
            .map(|r| r.start)
            .ok_or_else(|| Error::corrupt("index header has no BlockComposition range"))?;
        let region_fallback = ranges
            .iter()
            .find(|r| r.mode == RangeMode::RegionList)
            .map(|r| r.start)
            .unwrap_or(block_fallback);

        Ok(Self {
            to_internal,
            to_io,
            ranges: ranges.to_vec(),
            block_fallback,
            region_fallback,
        })
    }

    /// Builds a partition from an ordered list of `(io_symbols, mode)`
    /// groups. Symbol 0 is reserved for the terminator and must not appear
    /// in `groups`.
    pub fn new(groups: &[(Vec<u8>, RangeMode)]) -> Result<Self> {
        let mut to_internal = [255u8; 256];
        let mut to_io = vec![0u8];
        let mut ranges = Vec::new();
        let mut block_fallback = None;
        let mut region_fallback = None;

        for (symbols, mode) in groups {
            if symbols.is_empty() {
                continue;
            }
            let start = to_io.len() as u8;
            for &sym in symbols {
                if to_internal[sym as usize] != 255 {
                    return Err(Error::config(format!(
                        "symbol {sym:?} assigned to more than one range"
                    )));
                }
                to_internal[sym as usize] = to_io.len() as u8;
                to_io.push(sym);
            }
            let len = symbols.len() as u8;
            ranges.push(RangeDescriptor {
                mode: *mode,
                start,
                len,
            });

            match mode {
                RangeMode::BlockComposition => block_fallback.get_or_insert(start),
                RangeMode::RegionList => region_fallback.get_or_insert(start),
            };
        }

        let block_fallback = block_fallback
            .ok_or_else(|| Error::config("alphabet has no BlockComposition range"))?;
        // a region fallback is only required if a RegionList range exists;
        // default to the block fallback otherwise (it is never used).
        let region_fallback = region_fallback.unwrap_or(block_fallback);

        Ok(Self {
            to_internal,
            to_io,
            ranges,
            block_fallback,
            region_fallback,
        })
    }

    /// Total number of symbols, including the terminator.
    pub fn size(&self) -> usize {
        self.to_io.len()
    }

    pub fn num_ranges(&self) -> usize {
        self.ranges.len()
    }

    pub fn range(&self, idx: usize) -> RangeDescriptor {
        self.ranges[idx]
    }

    pub fn range_size(&self, idx: usize) -> usize {
        self.ranges[idx].len as usize
    }

    pub fn ranges(&self) -> &[RangeDescriptor] {
        &self.ranges
    }

    pub fn range_of(&self, internal_symbol: u8) -> Option<usize> {
        self.ranges
            .iter()
            .position(|r| internal_symbol >= r.start && internal_symbol < r.end())
    }

    pub fn mode_of(&self, internal_symbol: u8) -> Option<RangeMode> {
        self.range_of(internal_symbol).map(|i| self.ranges[i].mode)
    }

    /// Maps an io byte to its internal symbol. Returns `None` if the byte
    /// is not part of the alphabet.
    pub fn map(&self, io_symbol: u8) -> Option<u8> {
        let v = self.to_internal[io_symbol as usize];
        (v != 255).then_some(v)
    }

    pub fn reverse_map(&self, internal_symbol: u8) -> u8 {
        self.to_io[internal_symbol as usize]
    }

    pub fn block_fallback(&self) -> u8 {
        self.block_fallback
    }

    pub fn region_fallback(&self) -> u8 {
        self.region_fallback
    }

    /// Number of internal symbols handled by `BlockComposition` ranges
    /// (the dense alphabet size `a` of the composition/permutation
    /// table).
    pub fn num_dense_symbols(&self) -> usize {
        self.ranges
            .iter()
            .filter(|r| r.mode == RangeMode::BlockComposition)
            .map(|r| r.len as usize)
            .sum()
    }

    pub fn is_in_selected_ranges(&self, symbol: u8, selection: &[usize]) -> bool {
        match self.range_of(symbol) {
            Some(idx) => selection.contains(&idx),
            None => false,
        }
    }

    /// Builds a secondary alphabet containing only the selected ranges plus
    /// a fallback symbol for whatever mode those ranges share. Symbols
    /// outside the selection map to the fallback in
    /// [`symbols_transform`](SecondaryAlphabet::symbols_transform).
    pub fn secondary_mapping(&self, selection: &[usize]) -> Result<SecondaryAlphabet> {
        let mut internal_to_secondary = vec![None; self.size()];
        let mut secondary_to_internal = Vec::new();
        let mut next = 0u8;
        for &idx in selection {
            let r = self.ranges[idx];
            for s in r.start..r.end() {
                internal_to_secondary[s as usize] = Some(next);
                secondary_to_internal.push(s);
                next += 1;
            }
        }
        let fallback = next;
        // the fallback occupies one extra slot past the selected ranges
        Ok(SecondaryAlphabet {
            internal_to_secondary,
            secondary_to_internal,
            fallback,
            size: next as usize + 1,
        })
    }

    pub fn dense_secondary_mapping(&self) -> Result<SecondaryAlphabet> {
        let selection: Vec<usize> = self
            .ranges
            .iter()
            .enumerate()
            .filter(|(_, r)| r.mode == RangeMode::BlockComposition)
            .map(|(i, _)| i)
            .collect();
        self.secondary_mapping(&selection)
    }
}

/// A remapping from the base alphabet into a smaller secondary alphabet
/// containing only selected ranges, with one extra fallback slot.
#[derive(Debug, Clone)]
pub struct SecondaryAlphabet {
    internal_to_secondary: Vec<Option<u8>>,
    secondary_to_internal: Vec<u8>,
    fallback: u8,
    size: usize,
}

impl SecondaryAlphabet {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn fallback(&self) -> u8 {
        self.fallback
    }

    pub fn map(&self, internal_symbol: u8) -> u8 {
        self.internal_to_secondary[internal_symbol as usize].unwrap_or(self.fallback)
    }

    /// Inverse of [`map`](Self::map) for non-fallback secondary symbols.
    /// The fallback slot has no unique preimage (every region-list symbol
    /// collapses into it); callers that unpack a block without an overlay
    /// pass must treat a fallback readback as "some region-list symbol,
    /// to be filled in by the overlay."
    pub fn reverse_map(&self, secondary_symbol: u8) -> u8 {
        self.secondary_to_internal
            .get(secondary_symbol as usize)
            .copied()
            .unwrap_or(secondary_symbol)
    }

    /// Remaps an in-place array of internal symbols into the secondary
    /// alphabet, in place.
    pub fn symbols_transform(&self, arr: &mut [u8]) {
        for s in arr.iter_mut() {
            *s = self.map(*s);
        }
    }
}

/// An ASCII DNA alphabet with `N` folded into a region-list range, the
/// default shape used throughout the tests for region-list coverage.
pub fn ascii_dna_with_n() -> Result<AlphabetPartition> {
    AlphabetPartition::new(&[
        (b"ACGT".to_vec(), RangeMode::BlockComposition),
        (b"N".to_vec(), RangeMode::RegionList),
    ])
}

/// A plain ASCII DNA alphabet with no region-list range.
pub fn ascii_dna() -> Result<AlphabetPartition> {
    AlphabetPartition::new(&[(b"ACGT".to_vec(), RangeMode::BlockComposition)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_only_alphabet() {
        let a = ascii_dna().unwrap();
        assert_eq!(a.size(), 5); // terminator + ACGT
        assert_eq!(a.num_dense_symbols(), 4);
        assert_eq!(a.map(b'A'), Some(1));
        assert_eq!(a.map(b'Z'), None);
        assert_eq!(a.reverse_map(1), b'A');
    }

    #[test]
    fn dna_with_n_region_list() {
        let a = ascii_dna_with_n().unwrap();
        assert_eq!(a.size(), 6);
        assert_eq!(a.num_dense_symbols(), 4);
        let n = a.map(b'N').unwrap();
        assert_eq!(a.mode_of(n), Some(RangeMode::RegionList));
        assert_eq!(
            a.mode_of(a.map(b'A').unwrap()),
            Some(RangeMode::BlockComposition)
        );
    }

    #[test]
    fn secondary_mapping_collapses_region_list_to_fallback() {
        let a = ascii_dna_with_n().unwrap();
        let secondary = a.dense_secondary_mapping().unwrap();
        assert_eq!(secondary.size(), 5); // 4 dense + fallback
        let n = a.map(b'N').unwrap();
        assert_eq!(secondary.map(n), secondary.fallback());
        let g = a.map(b'G').unwrap();
        assert_ne!(secondary.map(g), secondary.fallback());
    }

    #[test]
    fn duplicate_symbol_is_rejected() {
        let err = AlphabetPartition::new(&[(b"AA".to_vec(), RangeMode::BlockComposition)]);
        assert!(err.is_err());
    }
}
