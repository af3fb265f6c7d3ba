//! The block-compressed EIS reader: opens a `.bdx` file (mmap'd when the
//! platform supports it, buffered otherwise) and answers `rank`/`get`
//! queries against it.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::trace;

use crate::alphabet::{AlphabetPartition, RangeMode};
use crate::comp_perm::CompPermTable;
use crate::error::{Error, Result};
use crate::range_list::{RangeHint, RangeListView};

use super::header::Header;

/// Owns either an mmap'd view of the index file or an in-memory buffered
/// copy; both expose the same `&[u8]` to the rest of the reader so
/// correctness does not depend on which path was taken.
enum Backing {
    Mmap(Mmap),
    Buffered(Vec<u8>),
}

impl Backing {
    fn as_slice(&self) -> &[u8] {
        match self {
            Backing::Mmap(m) => m,
            Backing::Buffered(v) => v,
        }
    }
}

pub struct EisReader {
    backing: Backing,
    header: Header,
    alphabet: AlphabetPartition,
    comp_table: CompPermTable,
    range_list: RangeListView,
    num_blocks: u64,
    num_buckets: u64,
    bucket_stride_bits: u64,
}

/// A direct-mapped super-block cache slot plus a range-list cursor: the
/// re-entrancy vehicle every query takes by exclusive reference.
#[derive(Default)]
pub struct Hint {
    cached_bucket: Option<u64>,
    range_hint: RangeHint,
}

impl EisReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let backing = match unsafe { Mmap::map(&file) } {
            Ok(m) => Backing::Mmap(m),
            Err(_) => Backing::Buffered(std::fs::read(path)?),
        };
        Self::from_backing(backing)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_backing(Backing::Buffered(bytes))
    }

    fn from_backing(backing: Backing) -> Result<Self> {
        let bytes = backing.as_slice();
        let header = Header::parse(bytes)?;

        let alphabet = AlphabetPartition::from_ranges(&header.ranges)?;
        let secondary = alphabet.dense_secondary_mapping()?;
        let a = secondary.size();
        let b = header.block_size as usize;

        // unbounded: a reader must be able to open whatever a builder
        // produced, so re-deriving the table never refuses on a budget.
        let comp_table = CompPermTable::build(b, a, usize::MAX)?;

        let num_blocks = header.sequence_length.div_ceil(header.block_size).max(1);
        let num_buckets = num_blocks.div_ceil(header.blocks_per_bucket);

        let comp_index_width = comp_table.comp_index_width().max(1) as u64;
        let bucket_stride_bits = a as u64 * header.partial_sum_bits as u64
            + header.bits_per_var_disk_offset as u64
            + header.blocks_per_bucket * comp_index_width;

        let range_list_bytes = bytes
            .get(header.range_offset as usize..)
            .ok_or_else(|| Error::corrupt("range offset points past end of file"))?;
        let (range_list, _consumed) = RangeListView::parse(range_list_bytes, a)?;

        trace!(num_blocks, num_buckets, "opened block-compressed EIS");

        Ok(Self {
            backing,
            header,
            alphabet,
            comp_table,
            range_list,
            num_blocks,
            num_buckets,
            bucket_stride_bits,
        })
    }

    pub fn sequence_length(&self) -> u64 {
        self.header.sequence_length
    }

    pub fn alphabet(&self) -> &AlphabetPartition {
        &self.alphabet
    }

    pub fn block_size(&self) -> usize {
        self.header.block_size as usize
    }

    fn bucket_of(&self, pos: u64) -> u64 {
        (pos / self.header.block_size) / self.header.blocks_per_bucket
    }

    fn block_of(&self, pos: u64) -> u64 {
        pos / self.header.block_size
    }

    fn cw_region(&self) -> &[u8] {
        let bytes = self.backing.as_slice();
        &bytes[self.header.header_len as usize..self.header.variable_offset as usize]
    }

    fn var_region(&self) -> &[u8] {
        let bytes = self.backing.as_slice();
        &bytes[self.header.variable_offset as usize..self.header.range_offset as usize]
    }

    /// `partialSymSum(bucket, sym)`: the stored running sum for `sym` at
    /// the start of `bucket`.
    fn partial_sym_sum(&self, bucket: u64, sym: u8) -> u64 {
        let bit_start = bucket * self.bucket_stride_bits + sym as u64 * self.header.partial_sum_bits as u64;
        self.get_cw_bits(bit_start, self.header.partial_sum_bits.max(1))
    }

    fn var_idx_offset(&self, bucket: u64) -> u64 {
        let a = self.comp_table.alphabet_size();
        let bit_start = bucket * self.bucket_stride_bits + a as u64 * self.header.partial_sum_bits as u64;
        self.get_cw_bits(bit_start, self.header.bits_per_var_disk_offset.max(1))
    }

    fn comp_idx(&self, bucket: u64, local_block: u64) -> usize {
        let a = self.comp_table.alphabet_size();
        let comp_index_width = self.comp_table.comp_index_width().max(1) as u64;
        let prologue_bits = a as u64 * self.header.partial_sum_bits as u64 + self.header.bits_per_var_disk_offset as u64;
        let bit_start =
            bucket * self.bucket_stride_bits + prologue_bits + local_block * comp_index_width;
        self.get_cw_bits(bit_start, comp_index_width as u32) as usize
    }

    fn get_cw_bits(&self, bit_offset: u64, width: u32) -> u64 {
        let reader = crate::bitpack::BitReader::new(self.cw_region());
        reader.get(bit_offset, width)
    }

    /// Returns `(compIdx, permIdx)` for block `block_num`.
    fn block_indices(&self, block_num: u64) -> (usize, usize) {
        let bucket = block_num / self.header.blocks_per_bucket;
        let local_block = block_num % self.header.blocks_per_bucket;
        let comp_idx = self.comp_idx(bucket, local_block);

        // sum the perm widths of every block before this one in the bucket
        // to find this block's bit offset within the variable region.
        let var_start = self.var_idx_offset(bucket);
        let mut bit_offset = var_start;
        for lb in 0..local_block {
            let ci = self.comp_idx(bucket, lb);
            bit_offset += self.comp_table.perm_width(ci) as u64;
        }

        let perm_width = self.comp_table.perm_width(comp_idx).max(1);
        let reader = crate::bitpack::BitReader::new(self.var_region());
        let perm_idx = reader.get(bit_offset, perm_width) as usize;

        (comp_idx, perm_idx)
    }

    /// Unpacks block `block_num` into `out` (length = block size, last
    /// block may be logically shorter; callers slice). When `overlay` is
    /// set, region-list runs covering this block's positions are applied
    /// and remapped back to the base alphabet.
    pub fn get_block(&self, block_num: u64, overlay: bool, hint: &mut Hint, out: &mut [u8]) {
        let b = self.header.block_size as usize;
        let (comp_idx, perm_idx) = self.block_indices(block_num);
        self.comp_table.index_pair_to_block(comp_idx, perm_idx, out, b);

        let secondary = self
            .alphabet
            .dense_secondary_mapping()
            .expect("dense mapping always exists");
        for s in out.iter_mut() {
            *s = secondary.reverse_map(*s);
        }

        if overlay {
            let start_pos = block_num * b as u64;
            self.range_list
                .apply_ranges_to_substring(out, start_pos, b, &mut hint.range_hint, |s| s);
        }
    }

    /// `rank(sym, pos)`: number of occurrences of `sym` in `[0, pos)`.
    pub fn rank(&self, sym: u8, pos: u64, hint: &mut Hint) -> u64 {
        if pos == 0 {
            return 0;
        }
        let pos = pos.min(self.header.sequence_length);

        if self.alphabet.mode_of(sym) != Some(RangeMode::BlockComposition) {
            return self
                .range_list
                .symbol_count_in_region(0, pos, sym, &mut hint.range_hint);
        }

        let bucket = self.bucket_of(pos);
        hint.cached_bucket = Some(bucket);

        let secondary = self.alphabet.dense_secondary_mapping().expect("dense mapping always exists");
        let secondary_sym = secondary.map(sym);

        let mut total = self.partial_sym_sum(bucket, secondary_sym);

        let block_of_pos = self.block_of(pos);
        let bucket_start_block = bucket * self.header.blocks_per_bucket;
        for blk in bucket_start_block..block_of_pos {
            let (comp_idx, _) = self.block_indices(blk);
            total += self.comp_table.sym_count_from_composition(comp_idx, secondary_sym) as u64;
        }

        let b = self.header.block_size as usize;
        let offset_in_block = (pos % self.header.block_size) as usize;
        if offset_in_block > 0 {
            let mut block = vec![0u8; b];
            self.get_block(block_of_pos, true, hint, &mut block);
            for &s in &block[..offset_in_block] {
                if s == sym {
                    total += 1;
                }
            }
        }

        total
    }

    /// `get(i)`: the symbol at BWT position `i`.
    pub fn get(&self, pos: u64, hint: &mut Hint) -> u8 {
        let b = self.header.block_size as usize;
        let block_num = self.block_of(pos);
        let offset = (pos % self.header.block_size) as usize;
        let mut block = vec![0u8; b];
        self.get_block(block_num, true, hint, &mut block);
        block[offset]
    }

    pub fn num_blocks(&self) -> u64 {
        self.num_blocks
    }

    pub fn num_buckets(&self) -> u64 {
        self.num_buckets
    }

    pub fn range_list(&self) -> &RangeListView {
        &self.range_list
    }

    pub fn header(&self) -> &Header {
        &self.header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::{ascii_dna, ascii_dna_with_n};
    use crate::config::Config;
    use crate::eis::builder::EisBuilder;

    fn build_sample(text: &str, b: usize, bpb: usize) -> (EisReader, AlphabetPartition) {
        let alphabet = ascii_dna().unwrap();
        let config = Config::new().block_size(b).blocks_per_bucket(bpb);
        let builder = EisBuilder::new(alphabet.clone(), config).unwrap();
        let symbols: Vec<u8> = text.bytes().map(|c| alphabet.map(c).unwrap()).collect();
        let n = symbols.len() as u64;
        let built = builder.build(symbols.into_iter(), n).unwrap();
        let reader = EisReader::from_bytes(built.bytes).unwrap();
        (reader, alphabet)
    }

    fn build_sample_with_n(text: &str, b: usize, bpb: usize) -> (EisReader, AlphabetPartition) {
        let alphabet = ascii_dna_with_n().unwrap();
        let config = Config::new().block_size(b).blocks_per_bucket(bpb);
        let builder = EisBuilder::new(alphabet.clone(), config).unwrap();
        let symbols: Vec<u8> = text.bytes().map(|c| alphabet.map(c).unwrap()).collect();
        let n = symbols.len() as u64;
        let built = builder.build(symbols.into_iter(), n).unwrap();
        let reader = EisReader::from_bytes(built.bytes).unwrap();
        (reader, alphabet)
    }

    #[test]
    fn get_round_trips_every_position() {
        let text = "ACGTACGTACGTAC";
        let (reader, alphabet) = build_sample(text, 3, 2);
        let mut hint = Hint::default();
        for (i, c) in text.bytes().enumerate() {
            let sym = alphabet.map(c).unwrap();
            assert_eq!(reader.get(i as u64, &mut hint), sym);
        }
    }

    #[test]
    fn rank_matches_naive_count() {
        let text = "ACGTACGTACGTACGTAC";
        let (reader, alphabet) = build_sample(text, 4, 3);
        let mut hint = Hint::default();
        let symbols: Vec<u8> = text.bytes().map(|c| alphabet.map(c).unwrap()).collect();

        for sym in [alphabet.map(b'A').unwrap(), alphabet.map(b'C').unwrap()] {
            for pos in 0..=symbols.len() {
                let naive = symbols[..pos].iter().filter(|&&s| s == sym).count() as u64;
                assert_eq!(reader.rank(sym, pos as u64, &mut hint), naive, "pos={pos}");
            }
        }
    }

    /// A RegionList-mode escaped symbol (`N`) falling inside the partial
    /// tail of a block must not be counted as the last dense symbol when
    /// ranking that symbol: regression test for the `overlay=false`
    /// partial-block bug (escaped positions were reverse-mapped without
    /// the range-list overlay and aliased the last dense symbol's id).
    #[test]
    fn rank_excludes_escaped_symbols_from_partial_block() {
        let text = "ACGTNACGTNNACGTACGNT";
        let (reader, alphabet) = build_sample_with_n(text, 4, 3);
        let mut hint = Hint::default();
        let symbols: Vec<u8> = text.bytes().map(|c| alphabet.map(c).unwrap()).collect();

        let last_dense = alphabet.map(b'T').unwrap();
        for pos in 0..=symbols.len() {
            let naive = symbols[..pos].iter().filter(|&&s| s == last_dense).count() as u64;
            assert_eq!(reader.rank(last_dense, pos as u64, &mut hint), naive, "pos={pos}");
        }
    }
}
