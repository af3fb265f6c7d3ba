//! The BWT context retriever: a sparse forward map from sampled text
//! positions to BWT positions, used to regenerate arbitrary substrings of
//! the original text by walking `LF` backward.
//!
//! Every `stride`-th suffix-array entry is sampled and `LF` recovers the
//! rest; the sampling table is persisted in an explicitly stride-tagged
//! `.cxm` file so a retriever can be reloaded without rebuilding.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::bitpack::{BitReader, BitWriter, bit_width};
use crate::error::{Error, Result};

/// Anything that can answer the two queries the backward `LF`-walk needs.
/// Implemented by [`crate::bwt_seq::BwtSequence`].
pub trait LfSource {
    fn lf(&self, bwt_pos: u64) -> u64;
    fn symbol_at(&self, bwt_pos: u64) -> u8;
    fn sequence_length(&self) -> u64;
}

fn autosize_stride(n: u64) -> u32 {
    let outer = bit_width(n.max(2));
    bit_width(outer.max(2) as u64).max(1)
}

/// Accumulates suffix-array entries during a build and produces a
/// [`ContextRetriever`] once every entry has been observed.
pub struct ContextFactory {
    n: u64,
    stride: u64,
    map_interval_log2: u32,
    bits_per_length: u32,
    // slot -> bwt position, indexed by (sa_entry + n - 1) % n / stride
    slots: Vec<Option<u64>>,
}

impl ContextFactory {
    /// `map_interval_log2 == None` requests autosizing to a stride of
    /// `⌈log2 ⌈log2 N⌉⌉`.
    pub fn new(n: u64, map_interval_log2: Option<u32>) -> Self {
        let log2 = map_interval_log2.unwrap_or_else(|| autosize_stride(n));
        let stride = 1u64 << log2;
        let num_slots = (n.div_ceil(stride)) as usize + 1;
        Self {
            n,
            stride,
            map_interval_log2: log2,
            bits_per_length: bit_width(n.max(1) + 1).max(1),
            slots: vec![None; num_slots],
        }
    }

    /// Observes one suffix-array entry `sa_i` produced at BWT position
    /// `bwt_pos`, marking it if its text-position offset lands on a
    /// stride boundary. `sa_i == 0` additionally always fills the reserved
    /// terminator slot (`slots.len() - 1`), since its offset `n - 1` is not
    /// in general a multiple of `stride` but every `nextMark` query past
    /// the text end must still resolve to a known row.
    pub fn observe(&mut self, bwt_pos: u64, sa_i: u64) {
        let offset = (sa_i + self.n - 1) % self.n;
        if offset % self.stride == 0 {
            let slot = (offset / self.stride) as usize;
            self.slots[slot] = Some(bwt_pos);
        }
        if sa_i == 0 {
            let last = self.slots.len() - 1;
            self.slots[last] = Some(bwt_pos);
        }
    }

    /// Finalises the factory into a retriever and, if `path` is given,
    /// persists the `.<stride>cxm` map file.
    pub fn finish(self, path: Option<&Path>) -> Result<ContextRetriever> {
        let mut writer = BitWriter::new();
        let mut resolved = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let v = slot.ok_or_else(|| {
                Error::corrupt("context factory: not every stride slot was observed")
            })?;
            writer.append(self.bits_per_length, v);
            resolved.push(v);
        }

        if let Some(path) = path {
            let mut out = Vec::new();
            out.extend_from_slice(&(self.map_interval_log2 as u16).to_ne_bytes());
            out.extend_from_slice(&(self.bits_per_length as u16).to_ne_bytes());
            out.extend_from_slice(&writer.as_bytes());
            let mut file = File::create(path)?;
            file.write_all(&out)?;
        }

        Ok(ContextRetriever {
            n: self.n,
            stride: self.stride,
            bits_per_length: self.bits_per_length,
            slots: resolved,
        })
    }
}

/// The read-time, immutable context map.
#[derive(Debug, Clone)]
pub struct ContextRetriever {
    n: u64,
    stride: u64,
    bits_per_length: u32,
    slots: Vec<u64>,
}

impl ContextRetriever {
    /// Opens a specific `.<stride>cxm` file at a known log2 stride.
    pub fn open(path: impl AsRef<Path>, n: u64) -> Result<Self> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;
        Self::parse(&bytes, n)
    }

    /// Tries strides `0, 1, 2, …` against `base_path.<stride>cxm` until
    /// one opens and validates.
    pub fn load_autosize(base_path: impl AsRef<Path>, n: u64) -> Result<Self> {
        let base_path = base_path.as_ref();
        for stride in 0..64u32 {
            let candidate = context_map_path(base_path, stride);
            if let Ok(bytes) = std::fs::read(&candidate) {
                if let Ok(retriever) = Self::parse(&bytes, n) {
                    return Ok(retriever);
                }
            }
        }
        Err(Error::IntegrityMismatch(
            crate::error::IntegrityError::ContextMapLoadFailure {
                base: base_path.display().to_string(),
            },
        ))
    }

    fn parse(bytes: &[u8], n: u64) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::corrupt("context map file too short"));
        }
        let map_interval_log2 = u16::from_ne_bytes(bytes[0..2].try_into().unwrap()) as u32;
        let bits_per_length = u16::from_ne_bytes(bytes[2..4].try_into().unwrap()) as u32;
        if bits_per_length == 0 || bits_per_length > 64 {
            return Err(Error::corrupt("context map file has invalid bitsPerLength"));
        }

        let stride = 1u64 << map_interval_log2;
        let num_slots = (n.div_ceil(stride)) as usize + 1;

        let reader = BitReader::new(&bytes[4..]);
        let mut slots = Vec::with_capacity(num_slots);
        for i in 0..num_slots {
            slots.push(reader.get(i as u64 * bits_per_length as u64, bits_per_length));
        }

        Ok(Self {
            n,
            stride,
            bits_per_length,
            slots,
        })
    }

    /// `nextMark(pos)`: the next sampled `(textPos, bwtPos)` mark at or
    /// after `pos`.
    pub fn next_mark(&self, pos: u64) -> (u64, u64) {
        if pos >= self.n.saturating_sub(1) {
            let slot = self.slots.len() - 1;
            return (self.n - 1, self.slots[slot]);
        }
        let slot = pos.div_ceil(self.stride) as usize;
        let text_pos = slot as u64 * self.stride;
        (text_pos, self.slots[slot])
    }

    /// `accessSubsequence(start, len, out)`: regenerates `T[start ..
    /// start+len)` by finding the next mark, walking `LF` back to
    /// `start+len-1`, then emitting symbols while continuing the walk.
    pub fn access_subsequence(&self, start: u64, len: usize, source: &impl LfSource, out: &mut [u8]) {
        if len == 0 {
            return;
        }
        let target_end = start + len as u64 - 1;
        let (mut text_pos, mut bwt_pos) = self.next_mark(target_end);

        while text_pos > target_end {
            bwt_pos = source.lf(bwt_pos);
            text_pos -= 1;
        }

        for i in (0..len).rev() {
            out[i] = source.symbol_at(bwt_pos);
            bwt_pos = source.lf(bwt_pos);
        }
    }

    pub fn bits_per_length(&self) -> u32 {
        self.bits_per_length
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }
}

fn context_map_path(base: &Path, stride: u32) -> PathBuf {
    let mut name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(&format!(".{stride}cxm"));
    base.with_file_name(name)
}
