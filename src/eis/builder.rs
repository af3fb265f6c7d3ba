//! The block-compressed EIS builder: consumes a BWT symbol stream
//! left-to-right exactly once and produces the bytes of a `.bdx` file.

use std::io::Write;

use tracing::debug;

use crate::alphabet::AlphabetPartition;
use crate::bitpack::{BitWriter, bit_width};
use crate::comp_perm::CompPermTable;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::range_list::RangeList;

use super::header::Header;

const PAGE_SIZE: u64 = 4096;

/// Everything the builder needs to know before it can size the header:
/// gathered in one pass by buffering the whole symbol stream in memory.
/// Buffering the BWT rather than doing a genuine two-phase streaming
/// build keeps the bucket/tail bookkeeping honest without a
/// provisional-header-rewrite step.
pub struct EisBuilder {
    alphabet: AlphabetPartition,
    config: Config,
}

/// The fully built, in-memory representation of a `.bdx` file, ready to
/// be persisted or handed directly to [`crate::eis::EisReader::from_bytes`].
pub struct BuiltIndex {
    pub bytes: Vec<u8>,
    pub sequence_length: u64,
}

impl EisBuilder {
    pub fn new(alphabet: AlphabetPartition, config: Config) -> Result<Self> {
        config.validate(&alphabet)?;
        Ok(Self { alphabet, config })
    }

    /// Consumes `bwt_symbols` (internal symbol ids, i.e. already mapped
    /// through [`AlphabetPartition::map`]) and builds the complete index.
    /// A short iterator before its declared length is a fatal build error.
    pub fn build(&self, bwt_symbols: impl Iterator<Item = u8>, declared_length: u64) -> Result<BuiltIndex> {
        let b = self.config.block_size;
        let bpb = self.config.blocks_per_bucket;

        let secondary = self.alphabet.dense_secondary_mapping()?;
        let a = secondary.size();
        let comp_table = CompPermTable::build(b, a, self.config.composition_table_budget)?;

        let comp_index_width = comp_table.comp_index_width();
        let max_perm_width = comp_table.max_perm_width().max(1);

        let mut range_list = RangeList::new(self.config.region_sums);

        let mut comp_cache = BitWriter::new();
        let mut perm_cache = BitWriter::new();

        let mut buck = vec![0u64; a];
        let mut bucket_prologues: Vec<(Vec<u64>, u64)> = Vec::new(); // (partial sums at bucket start, var bit offset)
        let mut num_blocks: u64 = 0;
        let mut blocks_in_bucket: usize = 0;
        let mut n_read: u64 = 0;

        let mut block_buf = vec![0u8; b];
        let mut block_len = 0usize;

        let mut flush_block = |block_buf: &[u8],
                                block_len: usize,
                                buck: &mut [u64],
                                comp_cache: &mut BitWriter,
                                perm_cache: &mut BitWriter,
                                range_list: &mut RangeList,
                                pos_base: u64| {
            let mut block = vec![self.alphabet.block_fallback(); b];
            block[..block_len].copy_from_slice(&block_buf[..block_len]);

            for (i, &sym) in block.iter().enumerate().take(block_len) {
                // The reserved terminator (internal id 0, `mode_of == None`)
                // shares the block-encoding fallback slot with RegionList
                // symbols and must be tracked the same way, or its position
                // is unrecoverable on read: nothing else records which
                // fallback-slot position was actually the terminator.
                let needs_range_entry = matches!(
                    self.alphabet.mode_of(sym),
                    Some(crate::alphabet::RangeMode::RegionList)
                ) || sym == 0;
                if needs_range_entry {
                    range_list.append(pos_base + i as u64, 1, sym);
                }
            }

            let mut secondary_block = block.clone();
            secondary.symbols_transform(&mut secondary_block);

            for &s in &secondary_block {
                buck[s as usize] += 1;
            }

            let (comp_idx, perm_idx) = comp_table.block_to_index_pair(&secondary_block);
            comp_cache.append(comp_index_width.max(1), comp_idx as u64);
            let perm_width = comp_table.perm_width(comp_idx).max(1);
            perm_cache.append(perm_width, perm_idx as u64);
        };

        for sym in bwt_symbols {
            if n_read >= declared_length {
                return Err(Error::corrupt(
                    "BWT stream produced more symbols than the declared sequence length",
                ));
            }

            block_buf[block_len] = sym;
            block_len += 1;
            n_read += 1;

            if block_len == b {
                if blocks_in_bucket == 0 {
                    bucket_prologues.push((buck.clone(), perm_cache.len_bits()));
                }
                flush_block(
                    &block_buf,
                    block_len,
                    &mut buck,
                    &mut comp_cache,
                    &mut perm_cache,
                    &mut range_list,
                    num_blocks * b as u64,
                );
                num_blocks += 1;
                block_len = 0;
                blocks_in_bucket += 1;
                if blocks_in_bucket == bpb {
                    blocks_in_bucket = 0;
                }
            }
        }

        if n_read < declared_length {
            return Err(Error::corrupt(format!(
                "BWT stream ended early: got {n_read} symbols, expected {declared_length}"
            )));
        }

        if block_len > 0 {
            if blocks_in_bucket == 0 {
                bucket_prologues.push((buck.clone(), perm_cache.len_bits()));
            }
            flush_block(
                &block_buf,
                block_len,
                &mut buck,
                &mut comp_cache,
                &mut perm_cache,
                &mut range_list,
                num_blocks * b as u64,
            );
            num_blocks += 1;
        } else if num_blocks == 0 {
            bucket_prologues.push((buck.clone(), 0));
        }

        debug!(num_blocks, a, b, "block-compressed EIS: blocks folded");

        range_list.compact();

        let partial_sum_bits = bit_width(declared_length + 1).max(1);
        let bits_per_var_disk_offset = bit_width(perm_cache.len_bits() + 1).max(1);
        let bits_per_length = bit_width(declared_length + 1).max(1);

        let num_buckets = bucket_prologues.len();

        // constant-width region: per bucket, [partial sums: a * partial_sum_bits]
        // [var offset: bits_per_var_disk_offset] [compIdx array: bpb * comp_index_width]
        let mut cw = BitWriter::new();
        for (bucket_idx, (sums, var_offset)) in bucket_prologues.iter().enumerate() {
            for &s in sums {
                cw.append(partial_sum_bits, s);
            }
            cw.append(bits_per_var_disk_offset, *var_offset);

            let blocks_in_this_bucket = if bucket_idx + 1 == num_buckets {
                num_blocks as usize - bucket_idx * bpb
            } else {
                bpb
            };
            for local_block in 0..blocks_in_this_bucket {
                let global_block = bucket_idx * bpb + local_block;
                let comp_idx = comp_cache.get(global_block as u64 * comp_index_width.max(1) as u64, comp_index_width.max(1));
                cw.append(comp_index_width.max(1), comp_idx);
            }
            // pad unused compIdx slots in the final bucket so every bucket has a
            // uniform stride, simplifying bucket-offset arithmetic on read.
            for _ in blocks_in_this_bucket..bpb {
                cw.append(comp_index_width.max(1), 0);
            }
        }

        let cw_bytes = cw.as_bytes();
        let var_bytes = perm_cache.as_bytes();

        let mut range_bytes = Vec::new();
        range_list.write_to(declared_length, a, &mut range_bytes);

        let header_body_len_estimate = 512; // generous fixed budget for the tagged-record body
        let header_len = (8 + header_body_len_estimate + PAGE_SIZE - 1) / PAGE_SIZE * PAGE_SIZE;

        let variable_offset = header_len + cw_bytes.len() as u64;
        let range_offset = variable_offset + var_bytes.len() as u64;

        let header = Header {
            block_size: b as u64,
            blocks_per_bucket: bpb as u64,
            variable_offset,
            range_offset,
            sequence_length: declared_length,
            bits_per_length: bits_per_length,
            bits_per_var_disk_offset: bits_per_var_disk_offset,
            partial_sum_bits,
            block_fallback: self.alphabet.block_fallback(),
            region_fallback: self.alphabet.region_fallback(),
            ranges: self.alphabet.ranges().to_vec(),
            region_sums: self.config.region_sums,
            reversibly_sorted: self.config.reversibly_sorted,
            callback_middle_bits: None,
            callback_extra_bits: None,
            max_extra_bits: None,
            header_len,
        };

        let header_bytes = header.write(&self.alphabet);
        if header_bytes.len() as u64 > header_len {
            return Err(Error::corrupt(
                "header grew beyond its reserved, page-aligned budget",
            ));
        }

        let mut out = Vec::with_capacity(range_offset as usize + range_bytes.len());
        out.extend_from_slice(&header_bytes);
        out.resize(header_len as usize, 0);
        out.extend_from_slice(&cw_bytes);
        out.resize(variable_offset as usize, 0);
        out.extend_from_slice(&var_bytes);
        out.resize(range_offset as usize, 0);
        out.extend_from_slice(&range_bytes);

        Ok(BuiltIndex {
            bytes: out,
            sequence_length: declared_length,
        })
    }
}

impl BuiltIndex {
    /// Persists the built index to `path`; any I/O failure leaves whatever
    /// bytes were already flushed to `path` in place (no rollback is
    /// attempted).
    pub fn write_to_path(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(&self.bytes)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::ascii_dna;

    #[test]
    fn builds_small_index_without_error() {
        let alphabet = ascii_dna().unwrap();
        let config = Config::new().block_size(2).blocks_per_bucket(4);
        let builder = EisBuilder::new(alphabet.clone(), config).unwrap();

        let symbols: Vec<u8> = "ACGTACGTAC"
            .bytes()
            .map(|b| alphabet.map(b).unwrap())
            .collect();
        let n = symbols.len() as u64;

        let built = builder.build(symbols.into_iter(), n).unwrap();
        assert!(!built.bytes.is_empty());
        assert_eq!(built.sequence_length, n);
    }

    #[test]
    fn rejects_short_stream() {
        let alphabet = ascii_dna().unwrap();
        let config = Config::new().block_size(2).blocks_per_bucket(4);
        let builder = EisBuilder::new(alphabet.clone(), config).unwrap();

        let symbols: Vec<u8> = "AC".bytes().map(|b| alphabet.map(b).unwrap()).collect();
        let err = builder.build(symbols.into_iter(), 10);
        assert!(err.is_err());
    }
}
